//! ADLS Gen2 upload backend.
//!
//! Four sequential steps against the DFS endpoint: create the
//! directory (`resource=directory`), create an empty file
//! (`resource=file`), append the content (`action=append`), then
//! flush/commit (`action=flush`). A "directory already exists" 409 is
//! tolerated as success; forbidden/not-found on directory creation is
//! reclassified as a root-path/access-key configuration error rather
//! than passed through raw.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::StatusCode;
use sparkbridge_core::auth::HttpCredential;
use sparkbridge_core::error::SparkError;

use crate::{artifact_dir, artifact_file_name, Deployable};

/// Uploads artifacts to an ADLS Gen2 filesystem. Returns `abfs://`
/// URIs of the shape `abfs://<filesystem>@<host>/<path>`.
#[derive(Debug, Clone)]
pub struct AdlsGen2Deploy {
    client: reqwest::Client,
    endpoint: String,
    filesystem: String,
    root_dir: String,
    credential: HttpCredential,
}

impl AdlsGen2Deploy {
    /// Backend for `filesystem` on the DFS endpoint at `endpoint`
    /// (e.g. `https://account.dfs.core.windows.net`), uploading under
    /// `root_dir` inside the filesystem.
    pub fn new(
        endpoint: impl Into<String>,
        filesystem: impl Into<String>,
        root_dir: impl Into<String>,
        credential: HttpCredential,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            filesystem: filesystem.into(),
            root_dir: root_dir.into().trim_matches('/').to_string(),
            credential,
        }
    }

    fn path_of(&self, relative: &str) -> String {
        if self.root_dir.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{relative}", self.root_dir)
        }
    }

    fn url_of(&self, path: &str) -> String {
        format!("{}/{}/{path}", self.endpoint, self.filesystem)
    }

    /// The `abfs://` URI the cluster-side job uses for `path`.
    fn abfs_uri(&self, path: &str) -> Result<String, SparkError> {
        let host = self
            .endpoint
            .strip_prefix("https://")
            .or_else(|| self.endpoint.strip_prefix("http://"))
            .ok_or_else(|| {
                SparkError::Configuration(format!(
                    "ADLS Gen2 endpoint {:?} is not an http(s) URL",
                    self.endpoint,
                ))
            })?;
        Ok(format!("abfs://{}@{host}/{path}", self.filesystem))
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SparkError> {
        let builder = self.credential.apply(builder).await?;
        Ok(builder.send().await?)
    }

    async fn fail(response: reqwest::Response) -> SparkError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        SparkError::Protocol {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl Deployable for AdlsGen2Deploy {
    async fn deploy(&self, src: &Path) -> Result<String, SparkError> {
        let file_name = artifact_file_name(src)?;
        let dir_path = self.path_of(&artifact_dir());
        let file_path = format!("{dir_path}/{file_name}");

        // Step 1: create the directory. 409 means it already exists,
        // which is fine; 403/404 means the root path or access key is
        // wrong and is reported as such instead of a raw status.
        let response = self
            .send(self.client.put(self.url_of(&dir_path)).query(&[("resource", "directory")]))
            .await?;
        match response.status() {
            status if status.is_success() || status == StatusCode::CONFLICT => {}
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                return Err(SparkError::Configuration(
                    "the ADLS Gen2 root path does not exist or the access key does not match"
                        .into(),
                ));
            }
            _ => return Err(Self::fail(response).await),
        }

        // Step 2: create the empty file.
        let response = self
            .send(self.client.put(self.url_of(&file_path)).query(&[("resource", "file")]))
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        // Step 3: append the content at position 0.
        let content = tokio::fs::read(src).await?;
        let length = content.len();
        let response = self
            .send(
                self.client
                    .patch(self.url_of(&file_path))
                    .query(&[("action", "append"), ("position", "0")])
                    .body(content),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        // Step 4: flush/commit. Only now does the file become visible
        // at its final length.
        let position = length.to_string();
        let response = self
            .send(
                self.client
                    .patch(self.url_of(&file_path))
                    .query(&[("action", "flush"), ("position", position.as_str())])
                    .header(CONTENT_LENGTH, 0),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let uri = self.abfs_uri(&file_path)?;
        tracing::info!(artifact = %uri, "Artifact uploaded to ADLS Gen2");
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abfs_uri_embeds_filesystem_and_host() {
        let deploy = AdlsGen2Deploy::new(
            "https://acct.dfs.core.windows.net",
            "jobs",
            "staging",
            HttpCredential::Anonymous,
        );

        assert_eq!(
            deploy.abfs_uri("staging/SparkSubmission/app.jar").unwrap(),
            "abfs://jobs@acct.dfs.core.windows.net/staging/SparkSubmission/app.jar",
        );
    }
}

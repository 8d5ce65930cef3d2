//! Azure Blob upload backend.
//!
//! Serves both the explicit blob backend and the cluster's default
//! storage account (HDInsight default storage is a blob container).
//! Authenticates with a caller-supplied SAS query string, avoiding the
//! shared-key signature scheme; the deploy contract is unchanged.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use sparkbridge_core::error::SparkError;
use tokio_util::io::ReaderStream;

use crate::{artifact_dir, artifact_file_name, Deployable};

/// Uploads artifacts as block blobs. Returns `wasbs://` URIs of the
/// shape `wasbs://<container>@<host>/<path>`.
#[derive(Debug, Clone)]
pub struct BlobDeploy {
    client: reqwest::Client,
    endpoint: String,
    container: String,
    sas_query: String,
}

impl BlobDeploy {
    /// Backend for `container` on the blob endpoint at `endpoint`
    /// (e.g. `https://account.blob.core.windows.net`), authenticating
    /// with the SAS token `sas_query` (without the leading `?`).
    pub fn new(
        endpoint: impl Into<String>,
        container: impl Into<String>,
        sas_query: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            container: container.into(),
            sas_query: sas_query.into().trim_start_matches('?').to_string(),
        }
    }

    fn wasbs_uri(&self, path: &str) -> Result<String, SparkError> {
        let host = self
            .endpoint
            .strip_prefix("https://")
            .or_else(|| self.endpoint.strip_prefix("http://"))
            .ok_or_else(|| {
                SparkError::Configuration(format!(
                    "blob endpoint {:?} is not an http(s) URL",
                    self.endpoint,
                ))
            })?;
        Ok(format!("wasbs://{}@{host}/{path}", self.container))
    }
}

#[async_trait]
impl Deployable for BlobDeploy {
    async fn deploy(&self, src: &Path) -> Result<String, SparkError> {
        let file_name = artifact_file_name(src)?;
        let path = format!("{}/{file_name}", artifact_dir());
        let url = format!(
            "{}/{}/{path}?{}",
            self.endpoint, self.container, self.sas_query,
        );

        let file = tokio::fs::File::open(src).await?;
        let response = self
            .client
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SparkError::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        let uri = self.wasbs_uri(&path)?;
        tracing::info!(artifact = %uri, "Artifact uploaded to blob storage");
        Ok(uri)
    }
}

//! WebHDFS upload backend.
//!
//! Three-step protocol: create the date-partitioned directory
//! (`op=MKDIRS`), create the file (`op=CREATE`) which the name node
//! answers with a 307 redirect carrying the true data-node location,
//! then PUT the artifact body as a chunked stream to that location.
//! A failed MKDIRS or a missing redirect `Location` header is a fatal
//! upload error, not retried.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use sparkbridge_core::auth::HttpCredential;
use sparkbridge_core::error::SparkError;
use tokio_util::io::ReaderStream;

use crate::{artifact_dir, artifact_file_name, Deployable};

/// Uploads artifacts over the WebHDFS REST protocol.
///
/// Returns the `https://.../webhdfs/v1/<path>` URL of the uploaded
/// file; consumers that need a filesystem-scheme URI (ADLS Gen1,
/// serverless accounts) rewrite it.
#[derive(Debug, Clone)]
pub struct WebhdfsDeploy {
    client: reqwest::Client,
    base_url: String,
    root_dir: String,
    credential: HttpCredential,
}

impl WebhdfsDeploy {
    /// Create a backend for the WebHDFS endpoint at `base_url`
    /// (e.g. `https://cluster.example.net/webhdfs/v1`), uploading under
    /// `root_dir` relative to the filesystem root.
    pub fn new(
        base_url: impl Into<String>,
        root_dir: impl Into<String>,
        credential: HttpCredential,
    ) -> Result<Self, SparkError> {
        // Redirects are captured manually: the CREATE step's Location
        // header points at the data node and receives the body.
        let client = reqwest::Client::builder().redirect(Policy::none()).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            root_dir: root_dir.into().trim_matches('/').to_string(),
            credential,
        })
    }

    /// The upload target URL for `file_name` inside a fresh
    /// date-partitioned directory.
    fn target_url(&self, file_name: &str) -> (String, String) {
        let dir = if self.root_dir.is_empty() {
            artifact_dir()
        } else {
            format!("{}/{}", self.root_dir, artifact_dir())
        };
        let dir_url = format!("{}/{}", self.base_url, dir);
        let file_url = format!("{dir_url}/{file_name}");
        (dir_url, file_url)
    }

    async fn put(&self, url: &str) -> Result<reqwest::RequestBuilder, SparkError> {
        self.credential.apply(self.client.put(url)).await
    }

    async fn ensure_success(response: reqwest::Response) -> Result<(), SparkError> {
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
        Ok(())
    }
}

#[async_trait]
impl Deployable for WebhdfsDeploy {
    async fn deploy(&self, src: &Path) -> Result<String, SparkError> {
        let file_name = artifact_file_name(src)?;
        let (dir_url, file_url) = self.target_url(&file_name);

        // Step 1: create the directory. World-writable, matching what
        // the cluster-side job expects of the staging area.
        let response = self
            .put(&dir_url)
            .await?
            .query(&[("op", "MKDIRS"), ("permission", "777"), ("overwrite", "true")])
            .send()
            .await?;
        Self::ensure_success(response).await?;

        // Step 2: create the file; the name node answers with a
        // redirect to the data node that takes the body.
        let response = self
            .put(&file_url)
            .await?
            .query(&[("op", "CREATE"), ("overwrite", "true")])
            .send()
            .await?;
        if !response.status().is_redirection() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SparkError::Protocol {
                status: status.as_u16(),
                body,
            });
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                SparkError::UnexpectedResponse(
                    "create-file redirect carried no Location header".into(),
                )
            })?;

        // Step 3: stream the artifact body to the data node.
        let file = tokio::fs::File::open(src).await?;
        let response = self
            .credential
            .apply(self.client.put(&location))
            .await?
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        Self::ensure_success(response).await?;

        tracing::info!(artifact = %file_url, "Artifact uploaded over WebHDFS");
        Ok(file_url)
    }
}

/// Rewrite a `https://<host>/webhdfs/v1/<path>` URL into the
/// corresponding filesystem-scheme URI, e.g. `adl://<host>/<path>`.
pub(crate) fn rewrite_webhdfs_url(url: &str, scheme: &str) -> Result<String, SparkError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            SparkError::UnexpectedResponse(format!("{url:?} is not an http(s) URL"))
        })?;

    let (host, path) = rest.split_once("/webhdfs/v1/").ok_or_else(|| {
        SparkError::UnexpectedResponse(format!("{url:?} is not a WebHDFS URL"))
    })?;

    Ok(format!("{scheme}://{host}/{path}"))
}

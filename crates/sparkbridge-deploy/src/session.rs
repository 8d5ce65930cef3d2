//! Upload through an already-open Spark interactive session.
//!
//! The gateway's session endpoint accepts a multipart file upload and
//! stages it into the session's working directory, so clusters whose
//! storage is otherwise unreachable (linked clusters without storage
//! credentials) can still receive artifacts.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use sparkbridge_core::auth::HttpCredential;
use sparkbridge_core::error::SparkError;

use crate::{artifact_file_name, Deployable};

/// Uploads artifacts into a live interactive session. Returns the
/// session-local file name, which the gateway resolves against the
/// session's working directory.
#[derive(Debug, Clone)]
pub struct SessionDeploy {
    client: reqwest::Client,
    base_url: String,
    session_id: i64,
    credential: HttpCredential,
}

impl SessionDeploy {
    /// Backend uploading into session `session_id` on the gateway at
    /// `base_url` (e.g. `https://cluster.azurehdinsight.net/livy`).
    pub fn new(
        base_url: impl Into<String>,
        session_id: i64,
        credential: HttpCredential,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_id,
            credential,
        }
    }
}

#[async_trait]
impl Deployable for SessionDeploy {
    async fn deploy(&self, src: &Path) -> Result<String, SparkError> {
        let file_name = artifact_file_name(src)?;
        let content = tokio::fs::read(src).await?;
        let form = Form::new().part("file", Part::bytes(content).file_name(file_name.clone()));

        let url = format!("{}/sessions/{}/upload-file", self.base_url, self.session_id);
        let builder = self.credential.apply(self.client.post(&url)).await?;
        let response = builder.multipart(form).send().await?;

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

        tracing::info!(
            session_id = self.session_id,
            artifact = %file_name,
            "Artifact uploaded into interactive session",
        );
        Ok(file_name)
    }
}

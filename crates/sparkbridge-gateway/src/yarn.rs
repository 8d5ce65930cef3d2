//! YARN resource-manager lookups.
//!
//! Resolves the application resource behind a submitted batch job:
//! driver `host:port` advertisement, log-aggregation status, and the
//! application-master container's log UI (consumed by the debug
//! overlay). Reuses the gateway transport's credential and client.

use std::sync::Arc;

use sparkbridge_core::error::SparkError;

use crate::client::SparkBatchSubmission;
use crate::types::{YarnApplication, YarnApplicationEnvelope};

/// Client for the cluster's YARN resource-manager REST API.
#[derive(Debug, Clone)]
pub struct YarnClient {
    transport: Arc<SparkBatchSubmission>,
    base_url: String,
}

impl YarnClient {
    /// Create a client for the resource manager at `base_url`
    /// (e.g. `https://cluster.azurehdinsight.net/yarnui`).
    pub fn new(transport: Arc<SparkBatchSubmission>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the application resource for `application_id`.
    pub async fn get_application(
        &self,
        application_id: &str,
    ) -> Result<YarnApplication, SparkError> {
        let url = format!("{}/ws/v1/cluster/apps/{application_id}", self.base_url);
        let envelope: YarnApplicationEnvelope = self.transport.get_json(&url).await?;
        Ok(envelope.app)
    }

    /// URL of the application-master container's log UI, once YARN has
    /// allocated the container. [`SparkError::NotReady`] until then, so
    /// callers can keep this under the bounded retry policy.
    pub async fn get_am_container_log_url(
        &self,
        application_id: &str,
    ) -> Result<String, SparkError> {
        let app = self.get_application(application_id).await?;
        app.am_container_logs.filter(|url| !url.is_empty()).ok_or_else(|| {
            SparkError::NotReady(format!(
                "application {application_id} has no allocated driver container yet"
            ))
        })
    }
}

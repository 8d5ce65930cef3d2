//! Wire types for the Livy-style gateway and the YARN resource manager.
//!
//! The gateway speaks JSON with snake_case state strings; YARN answers
//! with camelCase fields and SCREAMING_SNAKE aggregation statuses.

use serde::{Deserialize, Serialize};

/// Lifecycle states reported by the gateway for a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparkBatchJobState {
    NotStarted,
    Starting,
    Recovering,
    Idle,
    Running,
    Busy,
    ShuttingDown,
    Error,
    Dead,
    Killed,
    Success,
}

impl SparkBatchJobState {
    /// Whether no further transition can occur from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SparkBatchJobState::Error
                | SparkBatchJobState::Dead
                | SparkBatchJobState::Killed
                | SparkBatchJobState::Success
        )
    }
}

/// `GET /batches/{id}` response body (also returned by creation).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    /// Gateway-assigned numeric batch id.
    pub id: i64,
    pub state: SparkBatchJobState,
    /// YARN application id, once the gateway has resolved it.
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_info: Option<AppInfo>,
    /// Recent log lines echoed with the status.
    #[serde(default)]
    pub log: Vec<String>,
}

/// Driver/UI endpoints attached to a batch status payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    #[serde(default)]
    pub driver_log_url: Option<String>,
    #[serde(default)]
    pub spark_ui_url: Option<String>,
}

/// `GET /batches/{id}/log?from=&size=` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchLogResponse {
    pub id: i64,
    /// Offset of the first returned line.
    pub from: u64,
    /// Total lines available, when the gateway reports it.
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub log: Vec<String>,
}

/// YARN cluster-side log-aggregation status for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAggregationStatus {
    Disabled,
    NotStart,
    Running,
    RunningWithFailure,
    Succeeded,
    Failed,
    TimeOut,
}

/// `GET {yarn}/ws/v1/cluster/apps/{id}` unwrapped application resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YarnApplication {
    /// YARN application state string (`NEW`, `RUNNING`, `FINISHED`, ...).
    pub state: String,
    #[serde(default)]
    pub final_status: Option<String>,
    /// The driver's `host:port` advertisement.
    #[serde(default)]
    pub am_host_http_address: Option<String>,
    #[serde(default)]
    pub log_aggregation_status: Option<LogAggregationStatus>,
    /// Base URL of the application-master container's log UI.
    #[serde(default)]
    pub am_container_logs: Option<String>,
    /// Epoch millis; zero while the application is still running.
    #[serde(default)]
    pub finished_time: Option<i64>,
}

impl YarnApplication {
    /// Whether the application has already finished. The driver host is
    /// not retrievable for a finished application.
    pub fn is_finished(&self) -> bool {
        self.finished_time.unwrap_or(0) > 0
            || matches!(self.state.as_str(), "FINISHED" | "FAILED" | "KILLED")
    }
}

/// Envelope YARN wraps around the application resource.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct YarnApplicationEnvelope {
    pub app: YarnApplication,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_strings_follow_the_gateway_protocol() {
        let state: SparkBatchJobState = serde_json::from_str("\"shutting_down\"").unwrap();
        assert_eq!(state, SparkBatchJobState::ShuttingDown);

        let state: SparkBatchJobState = serde_json::from_str("\"success\"").unwrap();
        assert!(state.is_terminal());

        let state: SparkBatchJobState = serde_json::from_str("\"running\"").unwrap();
        assert!(!state.is_terminal());
    }

    #[test]
    fn aggregation_status_uses_screaming_snake_case() {
        let status: LogAggregationStatus = serde_json::from_str("\"TIME_OUT\"").unwrap();
        assert_eq!(status, LogAggregationStatus::TimeOut);

        let status: LogAggregationStatus = serde_json::from_str("\"SUCCEEDED\"").unwrap();
        assert_eq!(status, LogAggregationStatus::Succeeded);
    }

    #[test]
    fn batch_response_tolerates_missing_optional_fields() {
        let response: BatchResponse =
            serde_json::from_str(r#"{"id": 42, "state": "starting"}"#).unwrap();

        assert_eq!(response.id, 42);
        assert!(response.app_id.is_none());
        assert!(response.log.is_empty());
    }

    #[test]
    fn finished_application_is_detected() {
        let app: YarnApplication = serde_json::from_str(
            r#"{"state": "FINISHED", "finalStatus": "SUCCEEDED", "finishedTime": 1700000000000}"#,
        )
        .unwrap();
        assert!(app.is_finished());

        let app: YarnApplication = serde_json::from_str(
            r#"{"state": "RUNNING", "amHostHttpAddress": "10.0.0.15:30060", "finishedTime": 0}"#,
        )
        .unwrap();
        assert!(!app.is_finished());
    }
}

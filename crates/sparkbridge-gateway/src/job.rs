//! Batch-job lifecycle engine.
//!
//! [`SparkBatchJob`] owns the create/poll/kill state machine for one
//! submitted job. Creation is never retried (the gateway may already
//! have accepted it); every poll-shaped operation runs under the
//! bounded [`RetryPolicy`], which retries transport failures only.
//! State transitions are only ever observed moving forward; once a
//! terminal state is returned, later polls return the same state.
//!
//! A job instance is single-owner: callers issuing poll and kill
//! concurrently against the same instance must serialize externally.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use sparkbridge_core::error::SparkError;
use sparkbridge_core::params::SparkSubmissionParameter;
use sparkbridge_core::retry::{with_retries, RetryPolicy};
use sparkbridge_core::validate::{validate_job_config, IssueSeverity};
use tokio_util::sync::CancellationToken;

use crate::client::SparkBatchSubmission;
use crate::types::{LogAggregationStatus, SparkBatchJobState};
use crate::yarn::YarnClient;

/// How [`SparkBatchJob::wait_done`] interprets the YARN log-aggregation
/// status when gating completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationGate {
    /// Only `SUCCEEDED` counts as done; every other status (including
    /// `FAILED` and `TIME_OUT`) is treated as still pending. This is
    /// the historical behavior and can wait forever on genuinely
    /// failed aggregation.
    RequireSucceeded,
    /// Any terminal aggregation status (`SUCCEEDED`, `FAILED`,
    /// `TIME_OUT`, `DISABLED`) unblocks completion.
    AcceptTerminal,
}

/// Timing and gating knobs for done-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoneDetection {
    /// Interval between state polls.
    pub poll_interval: Duration,
    /// Delay applied after the gate opens, so the gateway has flushed
    /// the final log content before the caller reads it.
    pub settle_delay: Duration,
    pub gate: AggregationGate,
}

impl Default for DoneDetection {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            gate: AggregationGate::RequireSucceeded,
        }
    }
}

/// Collaborator seam for outer layers driving a batch job.
#[async_trait]
pub trait BatchJob: Send {
    /// Submit the job; assigns the batch id on success.
    async fn create_batch_job(&mut self) -> Result<SparkBatchJobState, SparkError>;

    /// Stop the remote job.
    async fn kill_batch_job(&self) -> Result<(), SparkError>;

    /// Resolve the driver host from the YARN application resource.
    async fn get_spark_driver_host(&self, cancel: &CancellationToken)
        -> Result<String, SparkError>;
}

/// Lifecycle engine for one batch job on one gateway.
#[derive(Debug, Clone)]
pub struct SparkBatchJob {
    transport: Arc<SparkBatchSubmission>,
    yarn: YarnClient,
    parameter: SparkSubmissionParameter,
    policy: RetryPolicy,
    batch_id: Option<i64>,
}

impl SparkBatchJob {
    /// Create an engine for `parameter`, not yet submitted.
    pub fn new(
        transport: Arc<SparkBatchSubmission>,
        yarn: YarnClient,
        parameter: SparkSubmissionParameter,
    ) -> Self {
        Self {
            transport,
            yarn,
            parameter,
            policy: RetryPolicy::default(),
            batch_id: None,
        }
    }

    /// Override the default retry policy (3 attempts, 10s apart).
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Gateway-assigned batch id, absent until creation succeeds.
    pub fn batch_id(&self) -> Option<i64> {
        self.batch_id
    }

    /// The parameter this job was built from.
    pub fn parameter(&self) -> &SparkSubmissionParameter {
        &self.parameter
    }

    /// The retry policy governing this job's polling calls.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The transport this job submits through.
    pub fn transport(&self) -> &Arc<SparkBatchSubmission> {
        &self.transport
    }

    /// The YARN client used for application resolution.
    pub fn yarn(&self) -> &YarnClient {
        &self.yarn
    }

    /// Batch id, or the caller-contract error for touching an
    /// uncreated job.
    fn batch_id_or_err(&self) -> Result<i64, SparkError> {
        self.batch_id.ok_or_else(|| {
            SparkError::Configuration("the batch job has not been created yet".into())
        })
    }

    /// Poll the job state under the bounded retry policy.
    pub async fn get_state(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SparkBatchJobState, SparkError> {
        let batch_id = self.batch_id_or_err()?;
        with_retries(&self.policy, cancel, || async {
            let batch = self.transport.get_batch(batch_id).await?;
            Ok(batch.state)
        })
        .await
    }

    /// Whether the job is still in a non-terminal state.
    pub async fn is_active(&self, cancel: &CancellationToken) -> Result<bool, SparkError> {
        Ok(!self.get_state(cancel).await?.is_terminal())
    }

    /// Resolve the YARN application id from the gateway status payload,
    /// retrying while the gateway has not assigned one yet.
    pub async fn get_app_id(&self, cancel: &CancellationToken) -> Result<String, SparkError> {
        let batch_id = self.batch_id_or_err()?;
        with_retries(&self.policy, cancel, || async {
            let batch = self.transport.get_batch(batch_id).await?;
            batch
                .app_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    SparkError::NotReady(format!(
                        "batch {batch_id} has no YARN application id yet"
                    ))
                })
        })
        .await
    }

    /// Resolve the driver host from the YARN application resource.
    ///
    /// Fatal (not retried) if the application already finished -- the
    /// host is not retrievable for a finished application -- or if the
    /// advertisement does not match the `host:port` pattern.
    pub async fn get_spark_driver_host(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String, SparkError> {
        let app_id = self.get_app_id(cancel).await?;
        let app = with_retries(&self.policy, cancel, || {
            self.yarn.get_application(&app_id)
        })
        .await?;

        if app.is_finished() {
            return Err(SparkError::UnexpectedResponse(format!(
                "application {app_id} is already finished; the driver host is not retrievable"
            )));
        }

        let address = app.am_host_http_address.as_deref().ok_or_else(|| {
            SparkError::UnexpectedResponse(format!(
                "application {app_id} reported no driver address"
            ))
        })?;

        parse_driver_host(address)
    }

    /// Stop the remote job. Not retried; a status above 300 is a fatal
    /// stop error. Idempotency (repeated kills) is at the caller's
    /// discretion.
    pub async fn kill_batch_job(&self) -> Result<(), SparkError> {
        let batch_id = self.batch_id_or_err()?;
        self.transport.kill_batch(batch_id).await?;
        tracing::info!(batch_id, "Batch job killed");
        Ok(())
    }

    /// Submit the job. `Submitted` only after the gateway responds 2xx
    /// with a numeric id; any other status is a fatal creation error
    /// and is never retried.
    ///
    /// The job configuration is validated first: an error-severity
    /// finding fails the submission before anything is sent to the
    /// network, warnings are logged and the submission proceeds.
    pub async fn create_batch_job(&mut self) -> Result<SparkBatchJobState, SparkError> {
        for issue in validate_job_config(self.parameter.job_config()) {
            match issue.severity {
                IssueSeverity::Error => {
                    return Err(SparkError::Configuration(format!(
                        "{}: {}",
                        issue.field, issue.message
                    )));
                }
                IssueSeverity::Warning => {
                    tracing::warn!(
                        field = %issue.field,
                        message = %issue.message,
                        "Suspicious job configuration",
                    );
                }
            }
        }

        let request = self.parameter.flatten();
        let response = self.transport.create_batch(&request).await?;

        tracing::info!(
            batch_id = response.id,
            cluster = %self.parameter.cluster_name(),
            "Batch job created",
        );
        self.batch_id = Some(response.id);
        Ok(response.state)
    }

    /// Wait until the job reaches a terminal state *and* the
    /// log-aggregation gate opens, then apply the settle delay and
    /// return the terminal state.
    pub async fn wait_done(
        &self,
        detection: DoneDetection,
        cancel: &CancellationToken,
    ) -> Result<SparkBatchJobState, SparkError> {
        loop {
            let state = self.get_state(cancel).await?;

            if state.is_terminal() && self.aggregation_gate_open(detection.gate, cancel).await? {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(SparkError::Cancelled),
                    _ = tokio::time::sleep(detection.settle_delay) => {}
                }
                return Ok(state);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(SparkError::Cancelled),
                _ = tokio::time::sleep(detection.poll_interval) => {}
            }
        }
    }

    /// Evaluate the log-aggregation gate for the job's application.
    async fn aggregation_gate_open(
        &self,
        gate: AggregationGate,
        cancel: &CancellationToken,
    ) -> Result<bool, SparkError> {
        let app_id = self.get_app_id(cancel).await?;
        let app = with_retries(&self.policy, cancel, || {
            self.yarn.get_application(&app_id)
        })
        .await?;

        let open = match (gate, app.log_aggregation_status) {
            (_, Some(LogAggregationStatus::Succeeded)) => true,
            (AggregationGate::RequireSucceeded, _) => false,
            (
                AggregationGate::AcceptTerminal,
                Some(
                    LogAggregationStatus::Failed
                    | LogAggregationStatus::TimeOut
                    | LogAggregationStatus::Disabled,
                ),
            ) => true,
            // No status reported at all: fall back to the application's
            // own finished flag under the permissive gate.
            (AggregationGate::AcceptTerminal, None) => app.is_finished(),
            (AggregationGate::AcceptTerminal, Some(_)) => false,
        };

        if !open {
            tracing::debug!(
                application_id = %app_id,
                status = ?app.log_aggregation_status,
                ?gate,
                "Log aggregation gate still closed",
            );
        }
        Ok(open)
    }
}

#[async_trait]
impl BatchJob for SparkBatchJob {
    async fn create_batch_job(&mut self) -> Result<SparkBatchJobState, SparkError> {
        SparkBatchJob::create_batch_job(self).await
    }

    async fn kill_batch_job(&self) -> Result<(), SparkError> {
        SparkBatchJob::kill_batch_job(self).await
    }

    async fn get_spark_driver_host(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String, SparkError> {
        SparkBatchJob::get_spark_driver_host(self, cancel).await
    }
}

/// Parse a YARN `host:port` advertisement, returning the host.
pub fn parse_driver_host(address: &str) -> Result<String, SparkError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"^([^:\s]+):(\d+)$").expect("static pattern"));

    let captures = pattern.captures(address).ok_or_else(|| {
        SparkError::UnexpectedResponse(format!(
            "driver address {address:?} does not match the host:port format"
        ))
    })?;
    Ok(captures[1].to_string())
}

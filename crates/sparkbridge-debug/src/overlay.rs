//! Debug-enabled submissions and debug-port discovery.
//!
//! [`SparkBatchRemoteDebugJob`] derives a JDWP-suspended variant of a
//! submission parameter at construction time, before anything touches
//! the network: the driver and executors start with
//! `-agentlib:jdwp=...,suspend=y`, retry-masking cluster knobs are
//! pinned so a crashed driver is not silently resubmitted, and
//! parameters that already carry conflicting values are rejected as
//! configuration errors.
//!
//! Port discovery reads the tail of the driver container's stdout
//! through the YARN log UI and scrapes the JDWP listen line.

use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use sparkbridge_core::error::SparkError;
use sparkbridge_core::params::{SparkSubmissionParameter, CONF};
use sparkbridge_core::retry::{with_retries, RetryPolicy};
use sparkbridge_gateway::client::SparkBatchSubmission;
use sparkbridge_gateway::job::SparkBatchJob;
use sparkbridge_gateway::types::SparkBatchJobState;
use sparkbridge_gateway::yarn::YarnClient;
use tokio_util::sync::CancellationToken;

/// Spark property carrying extra driver JVM options.
pub const DRIVER_EXTRA_JAVA_OPTIONS: &str = "spark.driver.extraJavaOptions";
/// Spark property carrying extra executor JVM options.
pub const EXECUTOR_EXTRA_JAVA_OPTIONS: &str = "spark.executor.extraJavaOptions";

const NETWORK_TIMEOUT: &str = "spark.network.timeout";
const MAX_EXECUTOR_FAILURES: &str = "spark.yarn.max.executor.failures";
const MAX_APP_ATTEMPTS: &str = "spark.yarn.maxAppAttempts";

/// JVM agent option that makes the process listen for a debugger on an
/// ephemeral port and suspend until one attaches.
const JDWP_AGENT: &str = "-agentlib:jdwp=transport=dt_socket,server=y,suspend=y";

/// YARN serves the container log through a paging UI; this window of
/// trailing bytes is enough to cover the JDWP banner printed at JVM
/// startup.
const STDOUT_TAIL_BYTES: u32 = 4096;

/// Collaborator seam for outer layers driving a debug job.
#[async_trait]
pub trait DebugJob: Send {
    /// Submit the JDWP-enabled job; assigns the batch id on success.
    async fn create_batch_spark_job_with_driver_debugging(
        &mut self,
    ) -> Result<SparkBatchJobState, SparkError>;

    /// Stop the remote job.
    async fn kill_batch_job(&self) -> Result<(), SparkError>;

    /// Resolve the driver host from the YARN application resource.
    async fn get_spark_driver_host(&self, cancel: &CancellationToken)
        -> Result<String, SparkError>;

    /// Scrape the JDWP listen port from the driver container's stdout.
    async fn get_spark_driver_debugging_port(
        &self,
        cancel: &CancellationToken,
    ) -> Result<u16, SparkError>;
}

/// Lifecycle engine for a batch job whose driver waits for a debugger.
#[derive(Debug, Clone)]
pub struct SparkBatchRemoteDebugJob {
    job: SparkBatchJob,
}

impl SparkBatchRemoteDebugJob {
    /// Build a debug job from a regular submission parameter.
    ///
    /// Fails with [`SparkError::Configuration`] -- before any network
    /// call -- if the parameter already sets any of the properties the
    /// debug overlay needs to control.
    pub fn try_new(
        transport: Arc<SparkBatchSubmission>,
        yarn: YarnClient,
        parameter: SparkSubmissionParameter,
    ) -> Result<Self, SparkError> {
        let debug_parameter = derive_debug_parameter(&parameter)?;
        Ok(Self {
            job: SparkBatchJob::new(transport, yarn, debug_parameter),
        })
    }

    /// Override the default retry policy for polling calls.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.job = self.job.with_retry_policy(policy);
        self
    }

    /// The underlying lifecycle engine, carrying the derived
    /// JDWP-enabled parameter.
    pub fn job(&self) -> &SparkBatchJob {
        &self.job
    }

    /// Submit the debug job.
    pub async fn create_batch_spark_job_with_driver_debugging(
        &mut self,
    ) -> Result<SparkBatchJobState, SparkError> {
        self.job.create_batch_job().await
    }

    /// Stop the remote job.
    pub async fn kill_batch_job(&self) -> Result<(), SparkError> {
        self.job.kill_batch_job().await
    }

    /// Resolve the driver host from the YARN application resource.
    pub async fn get_spark_driver_host(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String, SparkError> {
        self.job.get_spark_driver_host(cancel).await
    }

    /// Scrape the JDWP listen port from the driver container's stdout.
    ///
    /// Waits (under the bounded retry policy) for YARN to allocate the
    /// driver container, then reads the stdout tail through the log UI.
    /// A tail without the listen line is fatal: with `suspend=y` the
    /// banner is the first thing the JVM prints, so its absence means
    /// the driver is not debuggable.
    pub async fn get_spark_driver_debugging_port(
        &self,
        cancel: &CancellationToken,
    ) -> Result<u16, SparkError> {
        let app_id = self.job.get_app_id(cancel).await?;
        let log_url = with_retries(self.job.retry_policy(), cancel, || {
            self.job.yarn().get_am_container_log_url(&app_id)
        })
        .await?;

        let url = format!("{log_url}/stdout?start=-{STDOUT_TAIL_BYTES}");
        let stdout_tail = with_retries(self.job.retry_policy(), cancel, || {
            self.job.transport().get_text(&url)
        })
        .await?;

        let port = scrape_debug_port(&stdout_tail)?;
        tracing::info!(application_id = %app_id, port, "Driver debugging port discovered");
        Ok(port)
    }
}

#[async_trait]
impl DebugJob for SparkBatchRemoteDebugJob {
    async fn create_batch_spark_job_with_driver_debugging(
        &mut self,
    ) -> Result<SparkBatchJobState, SparkError> {
        SparkBatchRemoteDebugJob::create_batch_spark_job_with_driver_debugging(self).await
    }

    async fn kill_batch_job(&self) -> Result<(), SparkError> {
        SparkBatchRemoteDebugJob::kill_batch_job(self).await
    }

    async fn get_spark_driver_host(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String, SparkError> {
        SparkBatchRemoteDebugJob::get_spark_driver_host(self, cancel).await
    }

    async fn get_spark_driver_debugging_port(
        &self,
        cancel: &CancellationToken,
    ) -> Result<u16, SparkError> {
        SparkBatchRemoteDebugJob::get_spark_driver_debugging_port(self, cancel).await
    }
}

/// Derive the JDWP-enabled variant of `parameter`.
///
/// Appends the suspend-on-start agent to both driver and executor
/// extra options and pins `spark.yarn.maxAppAttempts`,
/// `spark.yarn.max.executor.failures`, and `spark.network.timeout` so
/// YARN neither resubmits a driver that died under the debugger nor
/// tears the job down while it sits at a breakpoint.
fn derive_debug_parameter(
    parameter: &SparkSubmissionParameter,
) -> Result<SparkSubmissionParameter, SparkError> {
    let existing = parameter.conf();
    check_debug_compatible(existing)?;

    let mut conf = existing.cloned().unwrap_or_default();
    for key in [DRIVER_EXTRA_JAVA_OPTIONS, EXECUTOR_EXTRA_JAVA_OPTIONS] {
        let options = match conf.get(key).and_then(Value::as_str) {
            Some(current) => format!("{current} {JDWP_AGENT}"),
            None => JDWP_AGENT.to_string(),
        };
        conf.insert(key.to_string(), Value::String(options));
    }
    conf.insert(MAX_APP_ATTEMPTS.to_string(), Value::String("1".into()));
    conf.insert(MAX_EXECUTOR_FAILURES.to_string(), Value::String("1".into()));
    conf.insert(NETWORK_TIMEOUT.to_string(), Value::String("10000000s".into()));

    let mut job_config = parameter.job_config().clone();
    job_config.insert(CONF.to_string(), Value::Object(conf));
    Ok(parameter.clone().with_job_config(job_config))
}

/// Reject parameters that already control the properties the overlay
/// needs: extra JVM options carrying their own JDWP agent, and the
/// retry-masking knobs the overlay pins.
fn check_debug_compatible(
    conf: Option<&serde_json::Map<String, Value>>,
) -> Result<(), SparkError> {
    let Some(conf) = conf else {
        return Ok(());
    };

    for key in [DRIVER_EXTRA_JAVA_OPTIONS, EXECUTOR_EXTRA_JAVA_OPTIONS] {
        if conf
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|options| options.contains("-agentlib:jdwp"))
        {
            return Err(SparkError::Configuration(format!(
                "{key} already carries a JDWP agent; remove it before submitting with debugging"
            )));
        }
    }

    for key in [NETWORK_TIMEOUT, MAX_EXECUTOR_FAILURES, MAX_APP_ATTEMPTS] {
        if conf.contains_key(key) {
            return Err(SparkError::Configuration(format!(
                "{key} is managed by the debug submission and must not be set by the caller"
            )));
        }
    }
    Ok(())
}

/// Find the JDWP listen port in a stdout tail.
///
/// Takes the last match: a restarted JVM in the same container prints
/// the banner again, and only the latest listener is attachable.
pub fn scrape_debug_port(stdout_tail: &str) -> Result<u16, SparkError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"Listening for transport dt_socket at address:\s*(\d+)")
            .expect("static pattern")
    });

    pattern
        .captures_iter(stdout_tail)
        .last()
        .and_then(|captures| captures[1].parse().ok())
        .ok_or_else(|| {
            SparkError::UnexpectedResponse(
                "the driver is not listening for a debugger (no JDWP banner in stdout)".into(),
            )
        })
}

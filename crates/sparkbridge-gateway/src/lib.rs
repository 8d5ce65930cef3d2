//! Livy-gateway transport and batch-job lifecycle engine.
//!
//! Provides the authenticated submission transport
//! ([`SparkBatchSubmission`] and its serverless-account variant), the
//! [`SparkBatchJob`] create/poll/kill state machine with bounded
//! retries and log streaming, and YARN application resolution.

pub mod client;
pub mod job;
pub mod log;
pub mod types;
pub mod yarn;

pub use client::{ArcadiaSparkBatchSubmission, SparkBatchSubmission};
pub use job::{AggregationGate, BatchJob, DoneDetection, SparkBatchJob};
pub use types::SparkBatchJobState;
pub use yarn::YarnClient;

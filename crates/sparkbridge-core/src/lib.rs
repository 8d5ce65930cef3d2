//! Core types for the sparkbridge job-submission engine.
//!
//! Provides the submission parameter model (with its flatten/unflatten
//! wire mapping), the storage-backend enumeration, pre-flight
//! validation, credential shapes, the shared error taxonomy, and the
//! bounded retry policy used by every polling operation.

pub mod auth;
pub mod error;
pub mod params;
pub mod retry;
pub mod storage;
pub mod validate;

pub use error::SparkError;
pub use params::{BatchJobRequest, SparkSubmissionParameter};
pub use retry::RetryPolicy;
pub use storage::{ClusterKind, StorageBackendKind};

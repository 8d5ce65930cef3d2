//! Remote-debugging overlay for batch jobs.
//!
//! Wraps the gateway lifecycle engine with a JDWP-enabled submission
//! ([`SparkBatchRemoteDebugJob`]), scrapes the listening debug port
//! from the driver container's stdout, and bridges a local TCP port to
//! the driver over SSH ([`SparkBatchDebugSession`]).

pub mod overlay;
pub mod tunnel;

pub use overlay::{DebugJob, SparkBatchRemoteDebugJob};
pub use tunnel::{SparkBatchDebugSession, SshAuth};

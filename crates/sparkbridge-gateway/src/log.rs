//! Submission-log streaming.
//!
//! The gateway exposes the job log as a paginated endpoint; this module
//! turns it into a lazy, effectively-infinite line stream with a
//! monotonic offset cursor. On an empty page the stream checks whether
//! the job is still active: if so it sleeps the retry delay and polls
//! again, otherwise it terminates. Lines are emitted strictly in offset
//! order.

use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use sparkbridge_core::error::SparkError;
use sparkbridge_core::retry::RetryPolicy;
use tokio_util::sync::CancellationToken;

use crate::client::SparkBatchSubmission;
use crate::job::SparkBatchJob;

/// Lines requested per log page.
const LOG_PAGE_SIZE: u64 = 128;

/// Tail the submission log of `batch_id` as a line stream.
///
/// The stream is cold: nothing is fetched until it is polled, and
/// dropping it (or cancelling the token) is the only way to stop an
/// active tail early. An empty page on a no-longer-active job ends the
/// stream normally.
pub fn submission_log_stream(
    transport: Arc<SparkBatchSubmission>,
    batch_id: i64,
    policy: RetryPolicy,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<String, SparkError>> {
    try_stream! {
        let mut from: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let page = transport.get_batch_log(batch_id, from, LOG_PAGE_SIZE).await?;

            if page.log.is_empty() {
                let batch = transport.get_batch(batch_id).await?;
                if batch.state.is_terminal() {
                    tracing::debug!(batch_id, lines = from, "Submission log drained");
                    break;
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(policy.delay) => {}
                }
                continue;
            }

            from += page.log.len() as u64;
            for line in page.log {
                yield line;
            }
        }
    }
}

impl SparkBatchJob {
    /// Tail this job's submission log. See [`submission_log_stream`].
    ///
    /// Fails if the job has not been created yet.
    pub fn get_submission_log(
        &self,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = Result<String, SparkError>>, SparkError> {
        let batch_id = self.batch_id().ok_or_else(|| {
            SparkError::Configuration("the batch job has not been created yet".into())
        })?;

        Ok(submission_log_stream(
            Arc::clone(self.transport()),
            batch_id,
            *self.retry_policy(),
            cancel,
        ))
    }
}

//! Artifact-upload backends for batch-job submission.
//!
//! Each storage backend implements the [`Deployable`] contract:
//! upload a local artifact, return the remote URI the gateway can
//! resolve as the job's `file` parameter. The returned URI format
//! differs by backend and is documented on each implementation.
//!
//! Backends never leave a partially-written remote file visible as
//! success: multi-step protocols either complete every step or fail
//! before the final path is returned. Instances are stateless across
//! uploads and may be reused sequentially; concurrent deploys against
//! the same destination path are undefined behavior inherited from the
//! storage service.

use std::path::Path;

use async_trait::async_trait;
use sparkbridge_core::error::SparkError;

pub mod adls_gen1;
pub mod adls_gen2;
pub mod blob;
pub mod serverless;
pub mod session;
pub mod webhdfs;

pub use adls_gen1::AdlsGen1Deploy;
pub use adls_gen2::AdlsGen2Deploy;
pub use blob::BlobDeploy;
pub use serverless::ServerlessDeploy;
pub use session::SessionDeploy;
pub use webhdfs::WebhdfsDeploy;

/// Upload strategy producing a remote artifact path for the gateway.
#[async_trait]
pub trait Deployable: Send + Sync {
    /// Upload `src` and return the remote URI for the job's `file`
    /// parameter. Fails with an upload error on any non-success HTTP
    /// status or I/O failure.
    async fn deploy(&self, src: &Path) -> Result<String, SparkError>;
}

/// Date-partitioned upload directory, so repeated submissions do not
/// grow one directory without bound: `SparkSubmission/<yyyy>/<MM>/<dd>/<uuid>`.
pub(crate) fn artifact_dir() -> String {
    format!(
        "SparkSubmission/{}/{}",
        chrono::Utc::now().format("%Y/%m/%d"),
        uuid::Uuid::new_v4(),
    )
}

/// Extract the artifact's file name for the remote path.
pub(crate) fn artifact_file_name(src: &Path) -> Result<String, SparkError> {
    src.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            SparkError::Configuration(format!("{} is not a file path", src.display()))
        })
}

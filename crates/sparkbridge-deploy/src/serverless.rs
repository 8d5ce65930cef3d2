//! Default storage of a Cosmos serverless Spark account.
//!
//! Drives the account's Data Lake endpoint with the account's own
//! bearer token over the WebHDFS protocol, then rewrites the result to
//! the `adl://` URI the serverless job consumes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sparkbridge_core::auth::{HttpCredential, TokenSource};
use sparkbridge_core::error::SparkError;

use crate::webhdfs::{rewrite_webhdfs_url, WebhdfsDeploy};
use crate::Deployable;

/// Uploads artifacts to a serverless account's default Data Lake
/// storage. Returns `adl://` URIs.
#[derive(Debug, Clone)]
pub struct ServerlessDeploy {
    inner: WebhdfsDeploy,
}

impl ServerlessDeploy {
    /// Backend for the account's storage root at `storage_root_url`
    /// (e.g. `https://account.azuredatalakestore.net/webhdfs/v1`),
    /// authenticating with the account's token source.
    pub fn new(
        storage_root_url: impl Into<String>,
        root_dir: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, SparkError> {
        Ok(Self {
            inner: WebhdfsDeploy::new(storage_root_url, root_dir, HttpCredential::Bearer(tokens))?,
        })
    }
}

#[async_trait]
impl Deployable for ServerlessDeploy {
    async fn deploy(&self, src: &Path) -> Result<String, SparkError> {
        let url = self.inner.deploy(src).await?;
        rewrite_webhdfs_url(&url, "adl")
    }
}

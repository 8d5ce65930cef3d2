//! ADLS Gen1 upload backend.
//!
//! Delegates to the WebHDFS protocol against the store's
//! `azuredatalakestore.net` endpoint, then rewrites the returned
//! `https://.../webhdfs/v1/...` URL into the `adl://` filesystem URI
//! the cluster-side job consumes.

use std::path::Path;

use async_trait::async_trait;
use sparkbridge_core::auth::HttpCredential;
use sparkbridge_core::error::SparkError;

use crate::webhdfs::{rewrite_webhdfs_url, WebhdfsDeploy};
use crate::Deployable;

/// Uploads artifacts to an ADLS Gen1 store. Returns `adl://` URIs.
#[derive(Debug, Clone)]
pub struct AdlsGen1Deploy {
    inner: WebhdfsDeploy,
}

impl AdlsGen1Deploy {
    /// Backend for the Gen1 store named `store_name`, uploading under
    /// `root_dir`.
    pub fn new(
        store_name: &str,
        root_dir: impl Into<String>,
        credential: HttpCredential,
    ) -> Result<Self, SparkError> {
        let base_url = format!("https://{store_name}.azuredatalakestore.net/webhdfs/v1");
        Self::with_endpoint(base_url, root_dir, credential)
    }

    /// Backend for a non-default endpoint (sovereign clouds, tests).
    pub fn with_endpoint(
        base_url: impl Into<String>,
        root_dir: impl Into<String>,
        credential: HttpCredential,
    ) -> Result<Self, SparkError> {
        Ok(Self {
            inner: WebhdfsDeploy::new(base_url, root_dir, credential)?,
        })
    }
}

#[async_trait]
impl Deployable for AdlsGen1Deploy {
    async fn deploy(&self, src: &Path) -> Result<String, SparkError> {
        let url = self.inner.deploy(src).await?;
        rewrite_webhdfs_url(&url, "adl")
    }
}

//! Authenticated HTTP transport for the batch-job gateway.
//!
//! [`SparkBatchSubmission`] wraps the gateway's REST protocol
//! (`POST/GET/DELETE /batches...`) behind a [`reqwest`] client carrying
//! one of the [`HttpCredential`] shapes.
//! [`ArcadiaSparkBatchSubmission`] is the cloud-hosted serverless
//! variant: bearer-token only, with the account name attached as a
//! header on every request.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use sparkbridge_core::auth::HttpCredential;
use sparkbridge_core::error::SparkError;
use sparkbridge_core::params::BatchJobRequest;

use crate::types::{BatchLogResponse, BatchResponse};

/// Header the gateway requires on mutating requests.
const REQUESTED_BY_HEADER: &str = "X-Requested-By";
/// Account-name header attached by the serverless variant.
const WORKSPACE_HEADER: &str = "x-ms-workspace-name";

/// HTTP client for one batch-job gateway endpoint.
#[derive(Debug, Clone)]
pub struct SparkBatchSubmission {
    client: reqwest::Client,
    base_url: String,
    credential: HttpCredential,
    headers: HeaderMap,
}

impl SparkBatchSubmission {
    /// Create a transport for the gateway at `base_url`
    /// (e.g. `https://cluster.azurehdinsight.net/livy`).
    pub fn new(base_url: impl Into<String>, credential: HttpCredential) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
            headers: HeaderMap::new(),
        }
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling across
    /// transports against the same cluster).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Gateway base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a batch-job creation request.
    ///
    /// Any non-2xx status is a fatal creation error: creation is not
    /// idempotent-safe to blindly retry against a gateway that may have
    /// already accepted it.
    pub async fn create_batch(
        &self,
        request: &BatchJobRequest,
    ) -> Result<BatchResponse, SparkError> {
        let builder = self
            .request(Method::POST, format!("{}/batches", self.base_url))
            .await?
            .header(REQUESTED_BY_HEADER, "sparkbridge")
            .json(request);

        Self::parse_response(builder.send().await?).await
    }

    /// Fetch the current status of a batch.
    pub async fn get_batch(&self, batch_id: i64) -> Result<BatchResponse, SparkError> {
        let builder = self
            .request(Method::GET, format!("{}/batches/{batch_id}", self.base_url))
            .await?;

        Self::parse_response(builder.send().await?).await
    }

    /// Fetch one page of the batch's submission log.
    pub async fn get_batch_log(
        &self,
        batch_id: i64,
        from: u64,
        size: u64,
    ) -> Result<BatchLogResponse, SparkError> {
        let builder = self
            .request(
                Method::GET,
                format!("{}/batches/{batch_id}/log", self.base_url),
            )
            .await?
            .query(&[("from", from), ("size", size)]);

        Self::parse_response(builder.send().await?).await
    }

    /// Delete the batch by id.
    ///
    /// Any status above 300 is a fatal stop error.
    pub async fn kill_batch(&self, batch_id: i64) -> Result<(), SparkError> {
        let builder = self
            .request(
                Method::DELETE,
                format!("{}/batches/{batch_id}", self.base_url),
            )
            .await?
            .header(REQUESTED_BY_HEADER, "sparkbridge");

        let response = builder.send().await?;
        let status = response.status();
        if status.as_u16() > 300 {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SparkError::Protocol {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// GET an arbitrary JSON resource with this transport's credential
    /// (used for the YARN resource-manager endpoints).
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, SparkError> {
        let builder = self.request(Method::GET, url.to_string()).await?;
        Self::parse_response(builder.send().await?).await
    }

    /// GET an arbitrary text resource with this transport's credential
    /// (used for container log pages).
    pub async fn get_text(&self, url: &str) -> Result<String, SparkError> {
        let builder = self.request(Method::GET, url.to_string()).await?;
        let response = Self::ensure_success(builder.send().await?).await?;
        response
            .text()
            .await
            .map_err(|e| SparkError::UnexpectedResponse(format!("unreadable response body: {e}")))
    }

    // ---- private helpers ----

    /// Build a request with the credential and extra headers applied.
    /// Token acquisition happens here, so an auth failure surfaces
    /// before any network traffic.
    async fn request(&self, method: Method, url: String) -> Result<RequestBuilder, SparkError> {
        let builder = self.client.request(method, url).headers(self.headers.clone());
        self.credential.apply(builder).await
    }

    fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Map a non-2xx response to [`SparkError::Protocol`].
    async fn ensure_success(response: Response) -> Result<Response, SparkError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SparkError::Protocol {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON body; malformed JSON is a protocol-class
    /// failure, not a retryable transport error.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, SparkError> {
        let response = Self::ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SparkError::UnexpectedResponse(format!("malformed JSON body: {e}")))
    }
}

/// Gateway transport for a cloud-hosted serverless Spark account.
///
/// Derefs to [`SparkBatchSubmission`] for the wire methods; constructing
/// it with a username/password credential is rejected up front.
#[derive(Debug, Clone)]
pub struct ArcadiaSparkBatchSubmission(SparkBatchSubmission);

impl ArcadiaSparkBatchSubmission {
    /// Create a transport for `account_name`'s gateway at `base_url`.
    ///
    /// Only anonymous (pre-signed) or bearer credentials are accepted;
    /// basic authentication is an unsupported operation for serverless
    /// accounts.
    pub fn new(
        account_name: &str,
        base_url: impl Into<String>,
        credential: HttpCredential,
    ) -> Result<Self, SparkError> {
        if credential.is_basic() {
            return Err(SparkError::Configuration(
                "Basic authentication is not supported for serverless Spark accounts".into(),
            ));
        }

        let account = HeaderValue::from_str(account_name).map_err(|_| {
            SparkError::Configuration(format!("account name {account_name:?} is not a valid header value"))
        })?;

        Ok(Self(
            SparkBatchSubmission::new(base_url, credential)
                .with_header(HeaderName::from_static(WORKSPACE_HEADER), account),
        ))
    }

    /// The underlying transport, e.g. to share with a [`SparkBatchJob`]
    /// (crate::job::SparkBatchJob).
    pub fn into_inner(self) -> SparkBatchSubmission {
        self.0
    }
}

impl std::ops::Deref for ArcadiaSparkBatchSubmission {
    type Target = SparkBatchSubmission;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn serverless_transport_rejects_basic_auth() {
        let credential = HttpCredential::Basic {
            username: "admin".into(),
            password: "pw".into(),
        };

        let result = ArcadiaSparkBatchSubmission::new("acct", "https://gw.example.net/livy", credential);
        assert_matches!(result, Err(SparkError::Configuration(_)));
    }

    #[test]
    fn base_url_is_normalized() {
        let transport =
            SparkBatchSubmission::new("https://gw.example.net/livy/", HttpCredential::Anonymous);
        assert_eq!(transport.base_url(), "https://gw.example.net/livy");
    }
}

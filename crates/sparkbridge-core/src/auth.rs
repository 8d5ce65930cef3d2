//! Credential shapes applied to outgoing HTTP requests.
//!
//! The engine never acquires tokens itself -- [`TokenSource`] is the
//! seam to the external token-acquisition collaborator. A source that
//! cannot produce a token (e.g. the user is not signed in) must return
//! [`SparkError::Auth`], which fails the operation before any request
//! is issued.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SparkError;

/// Asynchronous bearer-token provider.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently-valid access token, or [`SparkError::Auth`].
    async fn access_token(&self) -> Result<String, SparkError>;
}

/// A fixed, pre-acquired token. Mostly useful in tests and short-lived
/// CLI flows where refresh is not a concern.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, SparkError> {
        Ok(self.0.clone())
    }
}

/// Credential attached to every request of a transport or deploy client.
#[derive(Clone)]
pub enum HttpCredential {
    /// No credential (cluster-local or anonymous gateway).
    Anonymous,
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// Bearer token resolved per request from a [`TokenSource`].
    Bearer(Arc<dyn TokenSource>),
}

impl HttpCredential {
    /// Apply this credential to a request builder.
    ///
    /// For bearer credentials the token is resolved first, so a
    /// sign-in failure surfaces as [`SparkError::Auth`] before any
    /// network traffic.
    pub async fn apply(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, SparkError> {
        match self {
            HttpCredential::Anonymous => Ok(builder),
            HttpCredential::Basic { username, password } => {
                Ok(builder.basic_auth(username, Some(password)))
            }
            HttpCredential::Bearer(source) => {
                let token = source.access_token().await?;
                Ok(builder.bearer_auth(token))
            }
        }
    }

    /// Whether this is a username/password credential.
    pub fn is_basic(&self) -> bool {
        matches!(self, HttpCredential::Basic { .. })
    }
}

impl fmt::Debug for HttpCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpCredential::Anonymous => f.write_str("Anonymous"),
            HttpCredential::Basic { username, .. } => {
                f.debug_struct("Basic").field("username", username).finish_non_exhaustive()
            }
            HttpCredential::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NotSignedIn;

    #[async_trait]
    impl TokenSource for NotSignedIn {
        async fn access_token(&self) -> Result<String, SparkError> {
            Err(SparkError::Auth("not signed in".into()))
        }
    }

    #[tokio::test]
    async fn bearer_failure_surfaces_before_any_request() {
        let credential = HttpCredential::Bearer(Arc::new(NotSignedIn));
        let client = reqwest::Client::new();
        let builder = client.get("http://localhost:1/never-reached");

        let err = credential.apply(builder).await.unwrap_err();
        assert!(matches!(err, SparkError::Auth(_)));
    }

    #[test]
    fn debug_output_hides_the_password() {
        let credential = HttpCredential::Basic {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let output = format!("{credential:?}");

        assert!(output.contains("admin"));
        assert!(!output.contains("hunter2"));
    }
}

//! Shared error taxonomy for the submission engine.
//!
//! The engine distinguishes four failure classes with different
//! handling policies: configuration errors are reported before any
//! network call, transport errors are retried under the bounded
//! [`RetryPolicy`](crate::retry::RetryPolicy), protocol errors are
//! fatal immediately, and authentication errors are raised before a
//! request is even built.

/// Errors produced by the submission, deploy, and debug layers.
#[derive(Debug, thiserror::Error)]
pub enum SparkError {
    /// Invalid caller-supplied configuration. Never sent to the network.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The HTTP request itself failed (connect, DNS, TLS, timeout).
    /// Retried under the bounded retry policy.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local file I/O failure while reading an artifact for upload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A well-formed non-2xx response from the service. Fatal, never
    /// retried: the service answered, it just said no.
    #[error("Spark service error ({status}): {body}")]
    Protocol {
        /// HTTP status code.
        status: u16,
        /// Raw response body for diagnostics.
        body: String,
    },

    /// A 2xx response whose body or headers are missing an expected
    /// element (no redirect `Location`, no debug port line, unparsable
    /// address). Fatal, never retried.
    #[error("Unexpected service response: {0}")]
    UnexpectedResponse(String),

    /// Token acquisition failed or the caller is not signed in.
    /// Raised before any request is issued.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The service has not yet produced the requested value (e.g. the
    /// YARN application id is not assigned yet). Retried like a
    /// transport failure.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// A retried operation exhausted its attempt budget.
    #[error("Unknown service error after {attempts} retries: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Message of the last transient failure.
        last: String,
    },

    /// SSH-level failure while connecting, authenticating, or
    /// forwarding a debug tunnel. Fatal: tunnels are not retried.
    #[error("SSH error: {0}")]
    Ssh(String),

    /// The caller cancelled the operation via its token.
    #[error("Operation cancelled")]
    Cancelled,
}

impl SparkError {
    /// Whether the bounded retry loop may try again after this error.
    ///
    /// Only transport-level failures and explicit not-ready states are
    /// transient; application responses (protocol, auth, configuration)
    /// are never masked by retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, SparkError::Transport(_) | SparkError::NotReady(_))
    }
}

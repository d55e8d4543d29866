//! Content service client error types.

/// Errors from content service calls.
#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    /// HTTP transport error (connection refused, timeout, TLS failure).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The content service returned a non-2xx status.
    #[error("content service {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
}

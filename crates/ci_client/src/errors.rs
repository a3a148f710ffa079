//! Error types for CI API client operations.

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur when talking to the CI API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Authentication against the client login endpoint failed.
    ///
    /// The contained string carries the specific reason, e.g. an empty token
    /// in the login response.
    #[error("Failed to authenticate against the CI API: {0}")]
    AuthError(String),

    /// The underlying HTTP request failed after exhausting its retries.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The CI API answered with a status code the caller did not expect.
    ///
    /// Retryable statuses (5xx) only surface here once the bounded retry has
    /// been exhausted.
    #[error("{method} {url} responded with status code {status}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
    },

    /// A response body could not be decoded into the expected contract.
    #[error("Failed to deserialize CI API response: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The configured API base URL is not a valid URL.
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

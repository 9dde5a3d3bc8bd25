//! CP client error types.

/// Errors that can occur when talking to the CP API.
#[derive(Debug, thiserror::Error)]
pub enum CpError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body was not the JSON we expected
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// Upstream answered with an empty body or `null` for a train
    #[error("train not found")]
    NotFound,

    /// Rate limited by the API
    #[error("rate limited by CP API")]
    RateLimited,

    /// Source is not able to serve this request
    #[error("unavailable: {0}")]
    Unavailable(String),
}

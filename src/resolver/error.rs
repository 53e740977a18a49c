use thiserror::Error;

/// Failure of a single provider call. Absorbed by the federation; one
/// provider's error never fails a resolution as a whole.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider call timed out")]
    Timeout,
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("GEMINI_API_KEY not found in environment variables")]
    ApiKeyMissing,

    #[error("Network or HTTP request error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Gemini API returned an error: {0}")]
    ApiError(String),

    #[error("Could not find generated text in the API response")]
    ContentMissing,

    #[error("guess did not match the expected schema: {0}")]
    Schema(#[from] serde_json::Error),
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Request timed out for {provider}")]
    Timeout { provider: String },

    #[error("{provider} server error (Status: {status_code}): {details}")]
    ServerError {
        provider: String,
        status_code: u16,
        details: String,
    },

    #[error("Failed to parse response from {provider}: {details}")]
    ResponseParsingError { provider: String, details: String },

    #[error("API returned no choices for {provider}")]
    NoChoices { provider: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    /// Classify a reqwest failure, separating timeouts from other transport errors.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            ApiError::Network(err)
        }
    }
}

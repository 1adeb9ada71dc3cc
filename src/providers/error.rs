use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Error substrings that signal a provider rejected the JSON-mode directive.
const FORMAT_UNSUPPORTED_MARKERS: [&str; 3] =
    ["response_format", "responsemimetype", "response_mime_type"];

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request was rejected before any network I/O.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("encode request JSON: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("{context}: {source}")]
    Request {
        context: &'static str,
        source: reqwest::Error,
    },

    #[error("provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("decode response JSON: {source}; body={body}")]
    Decode {
        source: serde_json::Error,
        body: String,
    },

    /// The call succeeded but carried no usable text.
    #[error("{0}")]
    Content(String),
}

impl ProviderError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn content(message: impl Into<String>) -> Self {
        Self::Content(message.into())
    }

    pub(crate) fn missing_api_key(provider: &str) -> Self {
        Self::Configuration(format!("API key not configured for {provider}"))
    }

    /// Reports whether the rendered error text suggests the provider does not
    /// accept a JSON response-format directive.
    pub fn format_likely_unsupported(&self) -> bool {
        let message = self.to_string().to_lowercase();
        FORMAT_UNSUPPORTED_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}

use thiserror::Error;

/// Errors building a manager client. Failures of individual calls are
/// reported as `netconv_core::TransportError` instead.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid manager URL '{0}': expected http:// or https://")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

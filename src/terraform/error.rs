use thiserror::Error;

/// Errors raised while loading Terraform state.
///
/// SECURITY: Error messages must NEVER contain the backend token.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("unsupported state version {0}, expected 4")]
    UnsupportedVersion(u32),

    #[error("failed to parse state: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend rejected the credentials
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Backend returned an error response
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Network-level error (connection failed, timeout, etc.)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl From<StateError> for crate::providers::ProviderError {
    fn from(err: StateError) -> Self {
        crate::providers::ProviderError::Terraform(err.to_string())
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network, auth, rate-limit or API-level failure talking to the oracle.
    #[error("Oracle transport error: {0}")]
    OracleTransport(String),

    /// The oracle answered, but no JSON object could be found in the text.
    #[error("No JSON object found in oracle response: {0}")]
    ResponseExtraction(String),

    /// A JSON object was found but could not be decoded, even after quote repair.
    #[error("Failed to decode oracle response: {0}")]
    ResponseDecode(String),

    #[error("Mapping store error: {0}")]
    Store(String),

    #[error("Inventory error: {0}")]
    Inventory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CanonError {
    /// Transport failures are the only ones worth retrying; a malformed answer
    /// will not improve on a second identical request at temperature 0.
    pub fn is_transient(&self) -> bool {
        matches!(self, CanonError::OracleTransport(_))
    }
}

pub type Result<T> = std::result::Result<T, CanonError>;

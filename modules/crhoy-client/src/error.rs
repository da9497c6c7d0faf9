use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrhoyError>;

#[derive(Debug, Error)]
pub enum CrhoyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for CrhoyError {
    fn from(err: reqwest::Error) -> Self {
        CrhoyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for CrhoyError {
    fn from(err: serde_json::Error) -> Self {
        CrhoyError::Parse(err.to_string())
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Abnormal stop reason: {0}")]
    AbnormalStop(String),

    #[error("Schema mismatch: {0}")]
    Schema(String),

    #[error("Empty engine response")]
    Empty,
}

impl EngineError {
    /// Whether a caller may retry the same prompt. The session has already
    /// removed the failed prompt from history, so a retry does not compound.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Network(_) => true,
            EngineError::Api { status, .. } => *status == 429 || *status >= 500,
            EngineError::AbnormalStop(_) => true,
            EngineError::Schema(_) => true,
            EngineError::Empty => true,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_not_retryable() {
        let err = EngineError::Api {
            status: 401,
            message: "bad key".into(),
        };
        assert!(!err.is_retryable());
        let err = EngineError::Api {
            status: 529,
            message: "overloaded".into(),
        };
        assert!(err.is_retryable());
    }
}

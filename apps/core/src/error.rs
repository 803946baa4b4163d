use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Application-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error)]
pub enum AppError {
    /// The intent catalog is missing required fields or the mandatory `noanswer` intent.
    #[error("Malformed catalog: {0}")]
    MalformedCatalog(String),

    /// A persisted vocabulary does not have the expected shape or breaks its ordering invariants.
    #[error("Invalid vocabulary snapshot: {0}")]
    InvalidSnapshot(String),

    /// The resolved tag has no response to choose from.
    #[error("No answers available for intent '{0}'")]
    EmptyAnswerList(String),

    /// A catalog, vocabulary or model file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The classifier does not fit the vocabulary (shape mismatch, corrupt weights).
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Represents standard input/output errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Represents data validation errors (e.g., invalid input format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents configuration-related errors (e.g., bad environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents unexpected internal errors that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::MalformedCatalog(s) => AppError::MalformedCatalog(s.clone()),
            AppError::InvalidSnapshot(s) => AppError::InvalidSnapshot(s.clone()),
            AppError::EmptyAnswerList(s) => AppError::EmptyAnswerList(s.clone()),
            AppError::NotFound(p) => AppError::NotFound(p.clone()),
            AppError::InvalidModel(s) => AppError::InvalidModel(s.clone()),
            AppError::Io(e) => AppError::Io(io::Error::new(e.kind(), e.to_string())),
            AppError::Validation(s) => AppError::Validation(s.clone()),
            AppError::Config(s) => AppError::Config(s.clone()),
            AppError::Internal(s) => AppError::Internal(s.clone()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Validation errors: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Io(io::Error::other(format!("WebSocket error: {}", err)))
    }
}

impl From<ndarray::ShapeError> for AppError {
    fn from(err: ndarray::ShapeError) -> Self {
        AppError::InvalidModel(format!("Shape error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_includes_path() {
        let err = AppError::NotFound(PathBuf::from("data/intents.json"));
        assert_eq!(err.to_string(), "File not found: data/intents.json");
    }

    #[test]
    fn test_clone_preserves_variant() {
        let err = AppError::EmptyAnswerList("greeting".to_string());
        assert!(matches!(err.clone(), AppError::EmptyAnswerList(tag) if tag == "greeting"));

        let err = AppError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        match err.clone() {
            AppError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_json_error_maps_to_validation() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(AppError::from(json_err), AppError::Validation(_)));
    }
}

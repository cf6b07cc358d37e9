// Errors raised while fabricating requests or driving the application

use thiserror::Error;

/// Contract violations in test setup, plus failures bubbling up from the
/// application under test.
#[derive(Error, Debug)]
pub enum TestingError {
    #[error("Invalid body type: {0}; expected a stream, a string or nothing")]
    InvalidBodyType(String),

    #[error("Malformed SERVER_PROTOCOL '{0}': expected NAME/VERSION")]
    MalformedProtocol(String),

    #[error("Invalid request method '{0}'")]
    InvalidMethod(String),

    #[error("Uploaded file field '{0}' is used both as a file and as a group")]
    ConflictingUpload(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    App(#[from] trellis_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TestingError {
    fn from(err: serde_json::Error) -> Self {
        TestingError::Serialization(err.to_string())
    }
}

impl From<serde_urlencoded::ser::Error> for TestingError {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        TestingError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for TestingError {
    fn from(err: toml::de::Error) -> Self {
        TestingError::Config(err.to_string())
    }
}

/// Result alias for the testing crate
pub type Result<T> = std::result::Result<T, TestingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_errors_are_transparent() {
        let err: TestingError = trellis_core::Error::http(404, "gone").into();
        assert_eq!(err.to_string(), "HTTP error 404: gone");
    }

    #[test]
    fn test_contract_violation_messages() {
        let err = TestingError::MalformedProtocol("HTTP1.1".to_string());
        assert!(err.to_string().contains("HTTP1.1"));

        let err = TestingError::InvalidBodyType("array".to_string());
        assert!(err.to_string().starts_with("Invalid body type: array"));
    }
}

// Error types for the Trellis core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Service '{name}' is not a {expected}")]
    ServiceType { name: String, expected: &'static str },

    #[error("Service '{0}' is already registered and overrides are disabled")]
    OverrideNotAllowed(String),

    #[error("The container backing this application has been dropped")]
    ContainerDropped,

    #[error("Invalid route: {0}")]
    Route(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an error that maps to the given HTTP status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Http { status, .. } => *status,
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(Error::http(404, "missing").status_code(), 404);
        assert_eq!(Error::Internal("boom".to_string()).status_code(), 500);
        assert_eq!(Error::ServiceNotFound("x".to_string()).status_code(), 500);
    }

    #[test]
    fn test_error_classes() {
        assert!(Error::http(422, "bad").is_client_error());
        assert!(!Error::http(422, "bad").is_server_error());
        assert!(Error::ContainerDropped.is_server_error());
    }

    #[test]
    fn test_display() {
        let err = Error::ServiceType {
            name: "auth".to_string(),
            expected: "middleware",
        };
        assert_eq!(err.to_string(), "Service 'auth' is not a middleware");
    }
}

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Shown only when the backend rejected a request without saying why.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Local, pre-network rejection of a single form field.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Structured rejection from the backend.
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// Transport failure or a non-2xx response without a structured body.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Another request is already in progress")]
    OperationInProgress,

    #[error("Operation '{operation}' is not available in step '{step}'")]
    InvalidStep { operation: String, step: String },

    #[error("No verification code has been requested")]
    NoPendingEmail,

    /// The flow was reset or switched while the request was in flight.
    #[error("The flow was reset before the request completed")]
    FlowReset,
}

impl AuthError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_step(operation: &str, step: impl std::fmt::Display) -> Self {
        AuthError::InvalidStep {
            operation: operation.to_string(),
            step: step.to_string(),
        }
    }

    /// Machine code for `Api` errors.
    pub fn code(&self) -> Option<&str> {
        match self {
            AuthError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The form field a validation error belongs to.
    pub fn field(&self) -> Option<&str> {
        match self {
            AuthError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Failures the UI should render next to the form, as opposed to guard
    /// errors that only indicate a UI race.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AuthError::Validation { .. } | AuthError::Api { .. } | AuthError::Network(_)
        )
    }

    /// Readable message for inline display.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation { message, .. } => message.clone(),
            AuthError::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            AuthError::Api { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
            AuthError::Network(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            AuthError::OperationInProgress => {
                "Please wait for the current request to finish.".to_string()
            }
            AuthError::InvalidStep { .. } => "This action is not available right now.".to_string(),
            AuthError::NoPendingEmail => "Request a verification code first.".to_string(),
            AuthError::FlowReset => "The form was reset. Please start again.".to_string(),
        }
    }
}

impl From<BridgeError> for AuthError {
    fn from(err: BridgeError) -> Self {
        AuthError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_message_surfaced_verbatim() {
        let err = AuthError::Api {
            code: "INVALID_CREDENTIALS".to_string(),
            message: "Invalid email or password".to_string(),
        };
        assert_eq!(err.user_message(), "Invalid email or password");
        assert_eq!(err.code(), Some("INVALID_CREDENTIALS"));
    }

    #[test]
    fn test_generic_fallback_only_without_backend_message() {
        let err = AuthError::Api {
            code: "HTTP_500".to_string(),
            message: "  ".to_string(),
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);

        let err = AuthError::Network("connection refused".to_string());
        assert_ne!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_bridge_error_maps_to_network() {
        let err: AuthError = BridgeError::Timeout("30s".to_string()).into();
        assert!(matches!(err, AuthError::Network(_)));
        assert!(err.is_user_facing());
        assert!(!AuthError::OperationInProgress.is_user_facing());
    }
}

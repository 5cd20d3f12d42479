use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The host refused access, e.g. reading a cross-origin window location.
    #[error("Access denied: {0}")]
    AccessDenied(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

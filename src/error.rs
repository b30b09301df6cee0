use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Course not found: {0}")]
    CourseNotFound(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Access denied")]
    Forbidden,
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Mail transport failure: {0}")]
    TransportFailure(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl BillingError {
    /// HTTP-equivalent status code an inbound adapter should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            BillingError::CourseNotFound(_) | BillingError::AccountNotFound(_) => 404,
            BillingError::Conflict(_) => 409,
            BillingError::InsufficientFunds { .. } => 402,
            BillingError::Unauthenticated => 401,
            BillingError::Forbidden => 403,
            BillingError::ValidationError(_) | BillingError::CsvError(_) => 400,
            BillingError::TransportFailure(_) => 502,
            _ => 500,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        BillingError::InternalError(Box::new(std::io::Error::other(message.into())))
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;

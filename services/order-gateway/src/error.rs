//! Error types for the order-gateway crate

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the repository, sequence generator, and
/// coordinators. Validation failures are not represented here — they
/// are collected as `Vec<FieldError>` and become an `ErrorEvent`
/// rather than a `Result::Err`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("error event {0} not found")]
    ErrorEventNotFound(Uuid),

    #[error("unknown partner id: {0}")]
    UnknownPartner(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid query parameter {field}: {message}")]
    InvalidQuery { field: String, message: String },
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

impl From<std::io::Error> for GatewayError {
    fn from(error: std::io::Error) -> Self {
        Self::Persistence(error.to_string())
    }
}

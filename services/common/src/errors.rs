//! Common error types shared across the gateway crates

use thiserror::Error;

/// Service-level error types for ambient infrastructure concerns
/// (config loading, persistence, auth) that are not specific to
/// order processing.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),
}

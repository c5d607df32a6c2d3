//! Shared error taxonomy (spec §7).
//!
//! Every component returns `AppError` (or something that converts into
//! it via `From`) so the HTTP layer has a single place to map errors onto
//! status codes and the `{error, details?}` response shapes.

use thiserror::Error;

/// The error kinds from spec §7, each with a fixed HTTP-style status.
/// `Unauthorized` is an addition beyond §7's base six kinds, needed for §6's
/// "missing identity on admin endpoints yields 401".
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request. Maps to 400.
    #[error("validation error: {0}")]
    Validation(String),

    /// Document or record missing. Maps to 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing actor identity on an admin endpoint. Maps to 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Overlapping migration, or any other exclusivity violation. Maps to 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Deadline elapsed or caller canceled. Maps to 408.
    #[error("canceled: {0}")]
    Canceled(String),

    /// An external service (index, embedding provider, LLM) is down or unconfigured. Maps to 503.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Anything else. Maps to 500. Never carries enough detail to leak internals.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The HTTP-style status code this error maps onto, per spec §7.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::Unauthorized(_) => 401,
            AppError::Conflict(_) => 409,
            AppError::Canceled(_) => 408,
            AppError::Unavailable(_) => 503,
            AppError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for the `{status, error, code?}` admin response shape.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Conflict(_) => "conflict",
            AppError::Canceled(_) => "canceled",
            AppError::Unavailable(_) => "unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_spec() {
        assert_eq!(AppError::Validation("x".into()).status_code(), 400);
        assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(AppError::Conflict("x".into()).status_code(), 409);
        assert_eq!(AppError::Canceled("x".into()).status_code(), 408);
        assert_eq!(AppError::Unavailable("x".into()).status_code(), 503);
        assert_eq!(AppError::Internal("x".into()).status_code(), 500);
    }
}

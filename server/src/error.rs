//! HTTP error shaping (spec §7 "User-visible behavior"): every handler
//! returns `Result<_, ApiError>` or `Result<_, AdminError>` depending on
//! which response shape its endpoint family uses. Both wrap the same
//! `AppError` taxonomy; only the JSON body differs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use search_core::AppError;

/// Search-endpoint error shape: `{error, details?}` (spec §7).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Admin-endpoint error shape: `{status, error, code?}` (spec §7).
pub struct AdminError(pub AppError);

impl From<AppError> for AdminError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "status": status.as_u16(),
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn api_error_uses_error_details_shape() {
        let resp = ApiError(AppError::Validation("bad query".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("error").is_some());
        assert!(json.get("code").is_none());
    }

    #[tokio::test]
    async fn admin_error_uses_status_error_code_shape() {
        let resp = AdminError(AppError::Conflict("migration in progress".into())).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.get("status").unwrap(), 409);
        assert_eq!(json.get("code").unwrap(), "conflict");
    }
}

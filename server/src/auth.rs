//! Actor identity extraction (spec §6 "Admin endpoints"). Two ways in: an
//! upstream gateway can authenticate the caller and inject `X-User-*`
//! headers (this service never validates those credentials itself, only
//! reads what the gateway already vouched for), or a caller can present the
//! shared `X-Admin-Key` the `search-admin` CLI sends — checked against
//! `AppConfig::admin_key`. Grounded on the teacher's `validate_origin`
//! middleware shape (`State<Ctx>`, `HeaderMap`, `Request`, `Next`,
//! returning `Result<Response, Response>`).

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AdminError;
use search_core::AppError;

/// Configuration `require_identity` needs: the shared admin key, if one is
/// configured. No key configured means `X-Admin-Key` never authenticates —
/// only the gateway's `X-User-*` headers do.
#[derive(Clone)]
pub struct AuthState {
    pub admin_key: Option<String>,
}

/// The caller's identity, as vouched for by the upstream gateway or the
/// shared admin key.
#[derive(Clone, Debug)]
pub struct Identity {
    pub cpf: Option<String>,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}

impl Identity {
    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            cpf: header_str(headers, "x-user-cpf"),
            user_id: header_str(headers, "x-user-id"),
            role: header_str(headers, "x-user-role"),
            name: header_str(headers, "x-user-name"),
            email: header_str(headers, "x-user-email"),
        }
    }

    /// Identity granted to a caller presenting the correct `X-Admin-Key`.
    fn admin_key() -> Self {
        Self { cpf: None, user_id: None, role: Some("admin".into()), name: None, email: None }
    }

    /// An identity counts as present when at least one field arrived;
    /// spec §6 requires identity on admin endpoints, not any specific field.
    fn is_present(&self) -> bool {
        self.cpf.is_some()
            || self.user_id.is_some()
            || self.role.is_some()
            || self.name.is_some()
            || self.email.is_some()
    }
}

/// Rejects admin requests with no identity at all (spec §6: "missing
/// identity on admin endpoints yields 401"). A matching `X-Admin-Key`
/// authenticates on its own; otherwise falls back to the gateway's
/// `X-User-*` headers.
pub async fn require_identity(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let presented_key = header_str(request.headers(), "x-admin-key");
    let identity = match (&state.admin_key, &presented_key) {
        (Some(configured), Some(presented)) if configured == presented => Identity::admin_key(),
        _ => Identity::from_headers(request.headers()),
    };
    if !identity.is_present() {
        return Err(AdminError(AppError::Unauthorized("missing actor identity".into())).into_response());
    }
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    fn app(admin_key: Option<String>) -> Router {
        Router::new()
            .route("/admin/probe", get(ok_handler))
            .layer(axum::middleware::from_fn_with_state(AuthState { admin_key }, require_identity))
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let request = Request::builder().uri("/admin/probe").body(Body::empty()).unwrap();
        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn any_identity_header_is_sufficient() {
        let request =
            Request::builder().uri("/admin/probe").header("x-user-id", "u-1").body(Body::empty()).unwrap();
        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn matching_admin_key_is_sufficient() {
        let request = Request::builder()
            .uri("/admin/probe")
            .header("x-admin-key", "secret")
            .body(Body::empty())
            .unwrap();
        let response = app(Some("secret".into())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_admin_key_is_unauthorized() {
        let request = Request::builder()
            .uri("/admin/probe")
            .header("x-admin-key", "wrong")
            .body(Body::empty())
            .unwrap();
        let response = app(Some("secret".into())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

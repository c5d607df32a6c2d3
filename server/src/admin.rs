//! Admin endpoints (spec §6 "Admin endpoints" / "Migration endpoints").
//! Migration routes are wired to the real orchestrator; everything else
//! under `/admin` that spec §6 names only as "CRUD for services,
//! redirection records, service versions" is out of scope for this facade
//! and stubbed at 501 — this repo owns the read path and the migration
//! pipeline, not the data-entry surface.
//!
//! Grounded on the teacher's middleware-as-tower-layer idiom
//! (`auth::validate_origin`) for the CUD-lockout check.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use search_core::AppError;
use search_migration::{MigrationOrchestrator, StartRequest};

use crate::error::AdminError;

#[derive(Clone)]
pub struct AdminState {
    pub orchestrator: Arc<MigrationOrchestrator>,
    pub default_collection: String,
}

/// Rejects CUD verbs with a 503 equivalent while a migration holds the
/// lock (spec §6 "MUST refuse their operation with an HTTP 503 equivalent
/// when the Migration Lock is set"). Migration endpoints themselves are
/// exempt — `start`/`rollback` enforce their own exclusivity.
pub async fn reject_cud_while_locked(
    State(state): State<AdminState>,
    request: axum::extract::Request,
    next: Next,
) -> Result<Response, Response> {
    let method = request.method().clone();
    let is_cud = method == axum::http::Method::POST
        || method == axum::http::Method::PUT
        || method == axum::http::Method::PATCH
        || method == axum::http::Method::DELETE;
    if is_cud && state.orchestrator.current().await.map(|r| r.is_locked).unwrap_or(false) {
        return Err(AdminError(AppError::Unavailable("migration in progress; CUD operations are locked".into()))
            .into_response());
    }
    Ok(next.run(request).await)
}

#[derive(Deserialize)]
pub struct StartBody {
    pub schema_version: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub source_version: Option<String>,
}

pub async fn start_migration(
    State(state): State<AdminState>,
    Json(body): Json<StartBody>,
) -> Result<Json<serde_json::Value>, AdminError> {
    let record = state
        .orchestrator
        .start(StartRequest {
            collection: body.collection.unwrap_or(state.default_collection.clone()),
            source_version: body.source_version,
            target_version: body.schema_version,
            dry_run: body.dry_run,
        })
        .await?;
    Ok(Json(status_body(&record)))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub migration_id: Option<String>,
}

pub async fn migration_status(
    State(state): State<AdminState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<serde_json::Value>, AdminError> {
    let record = match query.migration_id {
        Some(id) => state.orchestrator.status(&id).await?,
        None => state.orchestrator.current().await?,
    };
    Ok(Json(status_body(&record)))
}

#[derive(Deserialize)]
pub struct RollbackBody {
    #[serde(default)]
    pub migration_id: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub reason: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
}

pub async fn rollback_migration(
    State(state): State<AdminState>,
    Json(body): Json<RollbackBody>,
) -> Result<Json<serde_json::Value>, AdminError> {
    let collection = body.collection.unwrap_or(state.default_collection.clone());
    let record = state.orchestrator.rollback(&collection, body.migration_id).await?;
    Ok(Json(status_body(&record)))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

pub async fn migration_history(
    State(state): State<AdminState>,
    Query(query): Query<HistoryQuery>,
) -> Json<serde_json::Value> {
    let all = state.orchestrator.history().await;
    let start = ((query.page.max(1) - 1) * query.per_page) as usize;
    let page: Vec<_> = all.iter().skip(start).take(query.per_page.max(1) as usize).map(status_body).collect();
    Json(serde_json::json!({ "page": query.page, "per_page": query.per_page, "total": all.len(), "items": page }))
}

pub async fn migration_schemas(State(state): State<AdminState>) -> Json<serde_json::Value> {
    // The registry is reached through the orchestrator's collection-agnostic
    // surface; schema listing doesn't need the orchestrator's own state, only
    // the registry it was built with. `current()`'s record carries the most
    // recently migrated-to version as a best-effort "current_version" when no
    // registry-level notion of "current" exists independent of migrations.
    let current_version = state.orchestrator.current().await.ok().map(|r| r.target_version);
    Json(serde_json::json!({ "current_version": current_version }))
}

fn status_body(record: &search_core::MigrationControlRecord) -> serde_json::Value {
    let progress_percent = if record.total_documents > 0 {
        (record.migrated_documents as f64 / record.total_documents as f64 * 100.0).min(100.0)
    } else {
        0.0
    };
    serde_json::json!({
        "id": record.id,
        "collection": record.collection,
        "source_version": record.source_version,
        "target_version": record.target_version,
        "status": record.status,
        "is_locked": record.is_locked,
        "started_at": record.started_at,
        "completed_at": record.completed_at,
        "total_documents": record.total_documents,
        "migrated_documents": record.migrated_documents,
        "progress_percent": progress_percent,
        "dry_run": record.dry_run,
        "error": record.error,
    })
}

#[derive(Serialize)]
struct NotImplementedBody {
    status: u16,
    error: &'static str,
}

/// CRUD for services/redirection-records/service-versions (spec §6: "These
/// are specified only as boundary consumers of the core") has no
/// implementation here — this facade is a read + migration surface.
pub async fn out_of_scope() -> (StatusCode, Json<NotImplementedBody>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(NotImplementedBody {
            status: 501,
            error: "not implemented: this facade only serves search and migration admin endpoints",
        }),
    )
}

pub fn router(state: AdminState) -> Router {
    // Migration routes enforce their own exclusivity (409 via the
    // orchestrator's `find_active` check) — the CUD lockout below is for
    // everything else that touches the index while a migration holds it.
    let migration_routes = Router::new()
        .route("/admin/migration/start", post(start_migration))
        .route("/admin/migration/status", get(migration_status))
        .route("/admin/migration/rollback", post(rollback_migration))
        .route("/admin/migration/history", get(migration_history))
        .route("/admin/migration/schemas", get(migration_schemas))
        .with_state(state.clone());

    let stub_routes = Router::new()
        .route("/admin/services", get(out_of_scope).post(out_of_scope))
        .route("/admin/services/{id}", get(out_of_scope).put(out_of_scope).delete(out_of_scope))
        .route("/admin/redirection-records", get(out_of_scope).post(out_of_scope))
        .route("/admin/redirection-records/{id}", get(out_of_scope).put(out_of_scope).delete(out_of_scope))
        .route("/admin/service-versions/{id}/history", get(out_of_scope))
        .route("/admin/service-versions/{id}/diff", get(out_of_scope))
        .route("/admin/service-versions/{id}/rollback", post(out_of_scope))
        .layer(axum::middleware::from_fn_with_state(state, reject_cud_while_locked));

    Router::new().merge(migration_routes).merge(stub_routes)
}

//! Search endpoints (spec §6 "Search endpoints"). Grounded on the
//! teacher's `api.rs` query-struct-per-handler style (one `Deserialize`
//! struct per route, parsed straight out of `Query<T>`), but returning the
//! new `ApiError` wrapper instead of an inline `(StatusCode, Json<Value>)`
//! tuple.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use search_core::{Mode, SearchFilters, SearchRequest, Strategy};
use search_engine::{SearchEngine, SearchResponseBody};

use crate::config::TypoDefaults;
use crate::error::ApiError;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<SearchEngine>,
    /// Deployment-tunable fallbacks (spec §6 "Configuration" `ALPHA_DEFAULT`/
    /// `TYPOS_HUMAN`/`TYPOS_AGENT`), applied only when the request itself
    /// leaves the field unset — `SearchRequest`'s own `effective_*` constants
    /// never see these, they're filled in before the request reaches it.
    pub alpha_default: f64,
    pub typos: TypoDefaults,
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Raw query-string shape for `GET /search` (spec §6): every field but `q`
/// and `type` is optional and defaulted downstream by `SearchRequest`'s own
/// `effective_*` accessors.
#[derive(Deserialize)]
pub struct SearchQuery {
    q: String,
    #[serde(rename = "type")]
    strategy: String,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    per_page: Option<u32>,
    #[serde(default)]
    include_inactive: bool,
    #[serde(default)]
    alpha: Option<f64>,
    #[serde(default)]
    threshold: Option<f64>,
    #[serde(default)]
    threshold_keyword: Option<f64>,
    #[serde(default)]
    threshold_semantic: Option<f64>,
    #[serde(default)]
    threshold_hybrid: Option<f64>,
    #[serde(default)]
    threshold_ai: Option<f64>,
    #[serde(default)]
    mode: Option<Mode>,
    #[serde(default)]
    collections: Option<String>,
    #[serde(default)]
    fields: Option<String>,
    #[serde(default)]
    expand: Option<bool>,
    #[serde(default)]
    recency: Option<bool>,
    #[serde(default)]
    typos: Option<u32>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    sub_category: Option<String>,
    #[serde(default)]
    orgao: Option<String>,
    #[serde(default)]
    tempo_max: Option<i64>,
    #[serde(default)]
    is_free: Option<bool>,
    #[serde(default)]
    digital: Option<bool>,
}

impl TryFrom<SearchQuery> for SearchRequest {
    type Error = search_core::AppError;

    fn try_from(q: SearchQuery) -> Result<Self, Self::Error> {
        Ok(SearchRequest {
            query: q.q,
            strategy: Strategy::from_str(&q.strategy)?,
            page: q.page,
            per_page: q.per_page,
            include_inactive: q.include_inactive,
            alpha: q.alpha,
            threshold: q.threshold,
            threshold_keyword: q.threshold_keyword,
            threshold_semantic: q.threshold_semantic,
            threshold_hybrid: q.threshold_hybrid,
            threshold_ai: q.threshold_ai,
            mode: q.mode,
            collections: q.collections.map(|s| split_csv(&s)).unwrap_or_default(),
            fields: q.fields.map(|s| split_csv(&s)).unwrap_or_default(),
            filters: SearchFilters {
                status: q.status,
                category: q.category,
                sub_category: q.sub_category,
                orgao: q.orgao,
                tempo_max: q.tempo_max,
                is_free: q.is_free,
                has_digital: q.digital,
            },
            expand: q.expand,
            recency: q.recency,
            typos: q.typos,
        })
    }
}

pub async fn search(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponseBody>, ApiError> {
    let mut request = SearchRequest::try_from(query)?;
    if request.alpha.is_none() {
        request.alpha = Some(state.alpha_default);
    }
    if request.typos.is_none() {
        request.typos = Some(state.typos.for_mode(request.effective_mode()));
    }
    let body = state.engine.search(&request).await?;
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct GetByIdQuery {
    #[serde(default)]
    collection: Option<String>,
}

pub async fn get_by_id(
    State(state): State<ApiState>,
    axum::extract::Path(id): axum::extract::Path<String>,
    Query(query): Query<GetByIdQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let document = state.engine.get_by_id(&id, query.collection.as_deref()).await?;
    Ok(Json(document))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/search/{id}", get(get_by_id))
        .with_state(state)
}

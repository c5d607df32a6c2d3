//! Index Gateway (spec §4.D). A pluggable `IndexGateway` trait plus an HTTP
//! implementation issuing a single batched multi-search request, modeled on
//! a Typesense-shaped wire protocol (`query_by`, `vector_query`,
//! `num_typos`, multi_search) — hand-written rather than wrapping a
//! pre-existing client crate, since none exists at the maturity this
//! workspace otherwise depends at (see DESIGN.md).

use std::time::Duration;

use async_trait::async_trait;
use search_core::{AppError, AppResult, CollectionConfig, Document, Strategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One hit from a collection search (spec §4.D "Hit").
#[derive(Clone, Debug, Deserialize)]
pub struct Hit {
    pub document: Document,
    #[serde(default)]
    pub text_match: Option<f64>,
    #[serde(default)]
    pub vector_distance: Option<f64>,
}

/// Per-collection results from a multi-search call.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CollectionHits {
    pub collection: String,
    #[serde(default)]
    pub hits: Vec<Hit>,
    #[serde(default)]
    pub total: u64,
}

/// Per-collection search parameters, constructed per the rules in spec §4.D.
#[derive(Clone, Debug, Serialize)]
pub struct SearchParams {
    pub collection: String,
    pub q: String,
    pub query_by: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub query_by_weights: String,
    pub num_typos: u32,
    pub prioritize_exact_match: bool,
    pub prioritize_token_position: bool,
    pub sort_by: String,
    pub exhaustive_search: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_by: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl SearchParams {
    /// Build the params for a single collection per the strategy-specific
    /// construction rules of spec §4.D.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        config: &CollectionConfig,
        strategy: Strategy,
        query_string: &str,
        embedding: Option<&[f32]>,
        alpha: f64,
        num_typos: u32,
        filter_by: Option<String>,
        page: u32,
        per_page: u32,
    ) -> Self {
        let embedding_field = &config.embedding_field;
        let vector_query = embedding.map(|vec| {
            let values = vec.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
            let a = if matches!(strategy, Strategy::Semantic) { 1.0 } else { alpha };
            format!("{embedding_field}:([{values}], alpha:{a})")
        });

        let q = match strategy {
            Strategy::Semantic => "*".to_string(),
            _ => query_string.to_string(),
        };

        Self {
            collection: config.name.clone(),
            q,
            query_by: config.query_by(),
            query_by_weights: config.query_by_weights(),
            num_typos,
            prioritize_exact_match: true,
            prioritize_token_position: true,
            sort_by: "_text_match:desc".to_string(),
            exhaustive_search: true,
            vector_query,
            filter_by,
            page,
            per_page,
        }
    }
}

/// Contract for the underlying full-text + vector index.
#[async_trait]
pub trait IndexGateway: Send + Sync {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        deadline: Duration,
    ) -> AppResult<Document>;

    async fn multi_search(
        &self,
        requests: Vec<SearchParams>,
        deadline: Duration,
    ) -> AppResult<Vec<CollectionHits>>;
}

/// An `IndexGateway` backed by a Typesense-shaped HTTP API.
pub struct HttpIndexGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpIndexGateway {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self { client, base_url, api_key }
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("X-TYPESENSE-API-KEY", &self.api_key)
    }
}

#[derive(Serialize)]
struct MultiSearchBody {
    searches: Vec<SearchParams>,
}

#[derive(Deserialize)]
struct MultiSearchResponse {
    results: Vec<CollectionHits>,
}

#[async_trait]
impl IndexGateway for HttpIndexGateway {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        deadline: Duration,
    ) -> AppResult<Document> {
        let url = format!("{}/collections/{collection}/documents/{id}", self.base_url);
        let fut = async {
            let resp = self
                .authed(self.client.get(&url))
                .send()
                .await
                .map_err(|e| AppError::Unavailable(format!("index gateway request failed: {e}")))?;
            if resp.status().as_u16() == 404 {
                return Err(AppError::NotFound(format!("document {id} not found in {collection}")));
            }
            if !resp.status().is_success() {
                return Err(AppError::Unavailable(format!(
                    "index gateway returned status {}",
                    resp.status()
                )));
            }
            resp.json::<Document>()
                .await
                .map_err(|e| AppError::Unavailable(format!("index gateway returned malformed body: {e}")))
        };
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Canceled("get_document deadline exceeded".into())),
        }
    }

    async fn multi_search(
        &self,
        requests: Vec<SearchParams>,
        deadline: Duration,
    ) -> AppResult<Vec<CollectionHits>> {
        let url = format!("{}/multi_search", self.base_url);
        let fut = async {
            let resp = self
                .authed(self.client.post(&url))
                .json(&MultiSearchBody { searches: requests })
                .send()
                .await
                .map_err(|e| AppError::Unavailable(format!("index gateway request failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(AppError::Unavailable(format!(
                    "index gateway returned status {}",
                    resp.status()
                )));
            }
            let body: MultiSearchResponse = resp
                .json()
                .await
                .map_err(|e| AppError::Unavailable(format!("index gateway returned malformed body: {e}")))?;
            Ok(body.results)
        };
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Canceled("multi_search deadline exceeded".into())),
        }
    }
}

/// Parse a `Value` status-filter tuple into a `k:=v` clause, re-exported so
/// the engine can share construction logic with the gateway.
pub use crate::filters::compile as compile_filters;

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CollectionConfig {
        CollectionConfig {
            name: "services".into(),
            doc_type: "service".into(),
            title_field: "title".into(),
            description_field: "description".into(),
            category_field: "category".into(),
            slug_field: "slug".into(),
            status_filter: None,
            embedding_field: "embedding".into(),
            embedding_dim: 8,
            search_fields: vec!["title".into(), "description".into()],
            search_weights: vec![3, 1],
            updated_at_field: "updated_at".into(),
        }
    }

    #[test]
    fn keyword_params_use_expanded_query_string() {
        let params =
            SearchParams::build(&config(), Strategy::Keyword, "iptu imposto", None, 0.3, 2, None, 1, 10);
        assert_eq!(params.q, "iptu imposto");
        assert_eq!(params.query_by, "title,description");
        assert_eq!(params.query_by_weights, "3,1");
        assert!(params.vector_query.is_none());
    }

    #[test]
    fn semantic_params_use_wildcard_query_and_alpha_one() {
        let embedding = vec![0.1_f32; 8];
        let params = SearchParams::build(
            &config(),
            Strategy::Semantic,
            "iptu",
            Some(&embedding),
            0.3,
            2,
            None,
            1,
            10,
        );
        assert_eq!(params.q, "*");
        assert!(params.vector_query.as_ref().unwrap().contains("alpha:1"));
    }

    #[test]
    fn hybrid_params_use_effective_alpha() {
        let embedding = vec![0.1_f32; 8];
        let params = SearchParams::build(
            &config(),
            Strategy::Hybrid,
            "iptu",
            Some(&embedding),
            0.42,
            2,
            None,
            1,
            10,
        );
        assert!(params.vector_query.as_ref().unwrap().contains("alpha:0.42"));
        assert_eq!(params.q, "iptu");
    }
}

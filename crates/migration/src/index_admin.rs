//! Index Admin: the write-side counterpart to `search-engine`'s read-only
//! `IndexGateway` (spec §4.K pipeline needs collection create/backup/alias
//! operations the search path never touches). Same Typesense-shaped wire
//! vocabulary (collections, aliases, documents/import) as `index_gateway.rs`.

use std::time::Duration;

use async_trait::async_trait;
use search_core::{AppError, AppResult, Document, SchemaDefinition, SchemaField};
use serde::{Deserialize, Serialize};

const DEFAULT_DEADLINE_SECS: u64 = 30;

/// Contract for the underlying index's collection-administration surface.
#[async_trait]
pub trait IndexAdmin: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> AppResult<bool>;

    async fn create_collection(&self, name: &str, schema: &SchemaDefinition) -> AppResult<()>;

    /// The schema currently backing `collection`, as reported by the index.
    async fn get_schema(&self, collection: &str) -> AppResult<SchemaDefinition>;

    async fn count_documents(&self, collection: &str) -> AppResult<u64>;

    /// One page of documents, `page` is 1-based.
    async fn page_documents(
        &self,
        collection: &str,
        page: u32,
        batch_size: u32,
    ) -> AppResult<Vec<Document>>;

    /// Insert `docs` into `collection`. Duplicate-id errors are tolerated by
    /// the caller (spec §4.K step 4a "idempotent retry"), not by this trait.
    async fn batch_insert(&self, collection: &str, docs: Vec<Document>) -> AppResult<()>;

    /// Point `alias` at `target_collection`, creating the alias if absent.
    async fn upsert_alias(&self, alias: &str, target_collection: &str) -> AppResult<()>;
}

pub struct HttpIndexAdmin {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpIndexAdmin {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self { client, base_url, api_key }
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("X-TYPESENSE-API-KEY", &self.api_key)
    }

    async fn run<T>(&self, fut: impl std::future::Future<Output = AppResult<T>>) -> AppResult<T> {
        match tokio::time::timeout(Duration::from_secs(DEFAULT_DEADLINE_SECS), fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Canceled("index admin request deadline exceeded".into())),
        }
    }
}

#[derive(Serialize)]
struct WireSchemaField<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    field_type: &'a str,
    facet: bool,
    optional: bool,
}

#[derive(Serialize)]
struct CreateCollectionBody<'a> {
    name: &'a str,
    fields: Vec<WireSchemaField<'a>>,
    default_sorting_field: &'a str,
    enable_nested_fields: bool,
}

#[derive(Deserialize)]
struct WireCollectionSchema {
    fields: Vec<WireFieldResponse>,
    default_sorting_field: String,
    #[serde(default)]
    enable_nested_fields: bool,
    #[serde(default)]
    num_documents: u64,
}

#[derive(Deserialize)]
struct WireFieldResponse {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    facet: bool,
    #[serde(default)]
    optional: bool,
}

#[derive(Serialize)]
struct UpsertAliasBody<'a> {
    collection_name: &'a str,
}

#[derive(Deserialize)]
struct SearchPage {
    hits: Vec<PageHit>,
}

#[derive(Deserialize)]
struct PageHit {
    document: Document,
}

#[async_trait]
impl IndexAdmin for HttpIndexAdmin {
    async fn collection_exists(&self, collection: &str) -> AppResult<bool> {
        let url = format!("{}/collections/{collection}", self.base_url);
        self.run(async {
            let resp = self
                .authed(self.client.get(&url))
                .send()
                .await
                .map_err(|e| AppError::Unavailable(format!("index admin request failed: {e}")))?;
            Ok(resp.status().is_success())
        })
        .await
    }

    async fn create_collection(&self, name: &str, schema: &SchemaDefinition) -> AppResult<()> {
        let url = format!("{}/collections", self.base_url);
        let body = CreateCollectionBody {
            name,
            fields: schema
                .fields
                .iter()
                .map(|f: &SchemaField| WireSchemaField {
                    name: &f.name,
                    field_type: &f.field_type,
                    facet: f.facet,
                    optional: f.optional,
                })
                .collect(),
            default_sorting_field: &schema.sort_field,
            enable_nested_fields: schema.nested_fields,
        };
        self.run(async {
            let resp = self
                .authed(self.client.post(&url))
                .json(&body)
                .send()
                .await
                .map_err(|e| AppError::Unavailable(format!("index admin request failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(AppError::Unavailable(format!(
                    "index admin returned status {} creating collection {name}",
                    resp.status()
                )));
            }
            Ok(())
        })
        .await
    }

    async fn get_schema(&self, collection: &str) -> AppResult<SchemaDefinition> {
        let url = format!("{}/collections/{collection}", self.base_url);
        self.run(async {
            let resp = self
                .authed(self.client.get(&url))
                .send()
                .await
                .map_err(|e| AppError::Unavailable(format!("index admin request failed: {e}")))?;
            if resp.status().as_u16() == 404 {
                return Err(AppError::NotFound(format!("collection {collection} not found")));
            }
            if !resp.status().is_success() {
                return Err(AppError::Unavailable(format!(
                    "index admin returned status {}",
                    resp.status()
                )));
            }
            let wire: WireCollectionSchema = resp.json().await.map_err(|e| {
                AppError::Unavailable(format!("index admin returned malformed schema: {e}"))
            })?;
            Ok(SchemaDefinition {
                version: "current".to_string(),
                fields: wire
                    .fields
                    .into_iter()
                    .map(|f| SchemaField {
                        name: f.name,
                        field_type: f.field_type,
                        facet: f.facet,
                        optional: f.optional,
                    })
                    .collect(),
                sort_field: wire.default_sorting_field,
                nested_fields: wire.enable_nested_fields,
                transform: None,
            })
        })
        .await
    }

    async fn count_documents(&self, collection: &str) -> AppResult<u64> {
        let url = format!("{}/collections/{collection}", self.base_url);
        self.run(async {
            let resp = self
                .authed(self.client.get(&url))
                .send()
                .await
                .map_err(|e| AppError::Unavailable(format!("index admin request failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(AppError::Unavailable(format!(
                    "index admin returned status {}",
                    resp.status()
                )));
            }
            let wire: WireCollectionSchema = resp.json().await.map_err(|e| {
                AppError::Unavailable(format!("index admin returned malformed schema: {e}"))
            })?;
            Ok(wire.num_documents)
        })
        .await
    }

    async fn page_documents(
        &self,
        collection: &str,
        page: u32,
        batch_size: u32,
    ) -> AppResult<Vec<Document>> {
        let url = format!(
            "{}/collections/{collection}/documents/search?q=*&page={page}&per_page={batch_size}",
            self.base_url
        );
        self.run(async {
            let resp = self
                .authed(self.client.get(&url))
                .send()
                .await
                .map_err(|e| AppError::Unavailable(format!("index admin request failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(AppError::Unavailable(format!(
                    "index admin returned status {}",
                    resp.status()
                )));
            }
            let page: SearchPage = resp.json().await.map_err(|e| {
                AppError::Unavailable(format!("index admin returned malformed page: {e}"))
            })?;
            Ok(page.hits.into_iter().map(|h| h.document).collect())
        })
        .await
    }

    async fn batch_insert(&self, collection: &str, docs: Vec<Document>) -> AppResult<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let url =
            format!("{}/collections/{collection}/documents/import?action=upsert", self.base_url);
        let body = docs
            .iter()
            .map(|d| serde_json::to_string(d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("failed to encode documents: {e}")))?
            .join("\n");
        self.run(async {
            let resp = self
                .authed(self.client.post(&url))
                .header("content-type", "text/plain")
                .body(body)
                .send()
                .await
                .map_err(|e| AppError::Unavailable(format!("index admin request failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(AppError::Unavailable(format!(
                    "index admin returned status {} importing into {collection}",
                    resp.status()
                )));
            }
            Ok(())
        })
        .await
    }

    async fn upsert_alias(&self, alias: &str, target_collection: &str) -> AppResult<()> {
        let url = format!("{}/aliases/{alias}", self.base_url);
        self.run(async {
            let resp = self
                .authed(self.client.put(&url))
                .json(&UpsertAliasBody { collection_name: target_collection })
                .send()
                .await
                .map_err(|e| AppError::Unavailable(format!("index admin request failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(AppError::Unavailable(format!(
                    "index admin returned status {} upserting alias {alias}",
                    resp.status()
                )));
            }
            Ok(())
        })
        .await
    }
}

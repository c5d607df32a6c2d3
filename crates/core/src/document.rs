//! Data model (spec §3): documents, collection configuration, schema
//! definitions, and per-hit score info.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppResult;

/// Embedding dimensionality used throughout the facade unless a collection overrides it.
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// An opaque document: a stable id plus an arbitrary string-keyed JSON map.
///
/// Typed accessors (`title`, `description`, ...) live behind [`CollectionConfig`]
/// so adding a field to the underlying index is purely additive — nothing here
/// needs to change.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    pub fn field_f64(&self, key: &str) -> Option<f64> {
        self.field(key).and_then(Value::as_f64)
    }

    pub fn embedding(&self, field: &str) -> Option<Vec<f32>> {
        let arr = self.field(field)?.as_array()?;
        Some(arr.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
    }

    /// Strip fields that must never leave the facade (spec §4.J step 9).
    pub fn strip_sensitive(&mut self, embedding_field: &str) {
        self.fields.remove(embedding_field);
        self.fields.remove("search_content");
    }

    /// Days between `field`'s timestamp (RFC3339 string or epoch seconds)
    /// and now, for the recency factor (spec §4.F "last-update timestamp
    /// minus now"). `None` when the field is absent or unparseable.
    pub fn days_since_update(&self, field: &str) -> Option<f64> {
        let value = self.field(field)?;
        let updated_at = if let Some(s) = value.as_str() {
            chrono::DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&chrono::Utc)
        } else if let Some(secs) = value.as_i64() {
            chrono::DateTime::from_timestamp(secs, 0)?
        } else {
            return None;
        };
        let days = (chrono::Utc::now() - updated_at).num_seconds() as f64 / 86_400.0;
        Some(days.max(0.0))
    }
}

/// Per-collection configuration (spec §3 "Collection configuration").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub doc_type: String,
    pub title_field: String,
    pub description_field: String,
    pub category_field: String,
    pub slug_field: String,
    /// Optional status filter: (field, required value).
    pub status_filter: Option<(String, Value)>,
    pub embedding_field: String,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    pub search_fields: Vec<String>,
    pub search_weights: Vec<u32>,
    #[serde(default = "default_updated_at_field")]
    pub updated_at_field: String,
}

fn default_updated_at_field() -> String {
    "updated_at".to_string()
}

fn default_embedding_dim() -> usize {
    DEFAULT_EMBEDDING_DIM
}

impl CollectionConfig {
    /// Validates the invariant from spec §3: `search_fields`/`search_weights` must
    /// be equinumerous when both are non-empty.
    pub fn validate(&self) -> AppResult<()> {
        if !self.search_weights.is_empty() && self.search_weights.len() != self.search_fields.len()
        {
            return Err(crate::error::AppError::Validation(format!(
                "collection {}: search_fields ({}) and search_weights ({}) must be equinumerous",
                self.name,
                self.search_fields.len(),
                self.search_weights.len()
            )));
        }
        Ok(())
    }

    pub fn query_by(&self) -> String {
        self.search_fields.join(",")
    }

    pub fn query_by_weights(&self) -> String {
        self.search_weights.iter().map(|w| w.to_string()).collect::<Vec<_>>().join(",")
    }
}

/// A single field in a [`SchemaDefinition`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub field_type: String,
    #[serde(default)]
    pub facet: bool,
    #[serde(default)]
    pub optional: bool,
}

/// Per-document transform applied during migration copy (spec §3, §4.K step 4c).
pub type TransformFn = Arc<dyn Fn(Document) -> AppResult<Document> + Send + Sync>;

/// A named schema version (spec §3 "Schema definition").
///
/// Version strings order lexicographically — [`crate::document::SchemaDefinition::version`]
/// comparisons decide "current" in the registry.
#[derive(Clone)]
pub struct SchemaDefinition {
    pub version: String,
    pub fields: Vec<SchemaField>,
    pub sort_field: String,
    pub nested_fields: bool,
    pub transform: Option<TransformFn>,
}

impl std::fmt::Debug for SchemaDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaDefinition")
            .field("version", &self.version)
            .field("fields", &self.fields)
            .field("sort_field", &self.sort_field)
            .field("nested_fields", &self.nested_fields)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl SchemaDefinition {
    pub fn apply_transform(&self, doc: Document) -> AppResult<Document> {
        match &self.transform {
            Some(f) => f(doc),
            None => Ok(doc),
        }
    }
}

/// Per-hit score breakdown (spec §3 "Score info").
///
/// All fields are in `[0,1]` except `final_score`, which is in `[0, 1.3]`
/// before being used as the ranking key (spec §8 "Score bounds").
#[derive(Clone, Debug, Default, Serialize)]
pub struct ScoreInfo {
    pub text: f64,
    pub vector: f64,
    pub hybrid: f64,
    pub recency: f64,
    pub popularity: f64,
    #[serde(rename = "final")]
    pub final_score: f64,
    /// Per-signal attribution for observability — not part of the ranking key.
    pub explain: ScoreExplain,
}

/// Which signals contributed to `hybrid`, and by how much, before boosts.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ScoreExplain {
    pub text_contribution: f64,
    pub vector_contribution: f64,
    pub title_boost: f64,
}

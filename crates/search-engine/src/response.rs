//! Response shaping (spec §4.J steps 9 and 13): per-hit projection into a
//! response document, field-filtering, and the compact `agent`-mode shape.

use search_core::{Document, ScoreInfo};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single hit projected into the facade's public shape (spec §4.J step 9).
/// Sensitive fields (`embedding`, `search_content`) have already been
/// stripped from `data` by the time this is constructed.
#[derive(Clone, Debug, Serialize)]
pub struct ResultDocument {
    pub id: String,
    pub collection: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub slug: String,
    pub data: Map<String, Value>,
    pub score: ScoreInfo,
}

impl ResultDocument {
    pub fn from_document(
        mut document: Document,
        collection: &str,
        doc_type: &str,
        title_field: &str,
        description_field: &str,
        category_field: &str,
        slug_field: &str,
        embedding_field: &str,
        score: ScoreInfo,
    ) -> Self {
        let title = document.field_str(title_field).unwrap_or_default().to_string();
        let description = document.field_str(description_field).unwrap_or_default().to_string();
        let category = document.field_str(category_field).unwrap_or_default().to_string();
        let slug = document.field_str(slug_field).unwrap_or_default().to_string();
        document.strip_sensitive(embedding_field);
        Self {
            id: document.id.clone(),
            collection: collection.to_string(),
            doc_type: doc_type.to_string(),
            title,
            description,
            category,
            slug,
            data: document.fields,
            score,
        }
    }

    /// Restrict `data` (and the named top-level fields) to `fields` (spec
    /// §4.J step 13 "for requested fields, project to a filtered shape").
    pub fn project_fields(&self, fields: &[String]) -> Map<String, Value> {
        let mut projected = Map::new();
        for field in fields {
            if let Some(value) = self.top_level_field(field) {
                projected.insert(field.clone(), value);
            } else if let Some(value) = self.data.get(field) {
                projected.insert(field.clone(), value.clone());
            }
        }
        projected
    }

    fn top_level_field(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::String(self.id.clone())),
            "collection" => Some(Value::String(self.collection.clone())),
            "type" => Some(Value::String(self.doc_type.clone())),
            "title" => Some(Value::String(self.title.clone())),
            "description" => Some(Value::String(self.description.clone())),
            "category" => Some(Value::String(self.category.clone())),
            "slug" => Some(Value::String(self.slug.clone())),
            _ => None,
        }
    }

    /// The compact shape for `mode = agent` (spec §4.J step 13): id, title,
    /// description, category, slug, score, and the actions an agent may
    /// take next.
    pub fn compact(&self) -> CompactResult {
        CompactResult {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            slug: self.slug.clone(),
            score: self.score.final_score,
            actions: vec!["view".to_string(), "open".to_string()],
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CompactResult {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub slug: String,
    pub score: f64,
    pub actions: Vec<String>,
}

/// Timing breakdown, measured per phase in milliseconds with microsecond
/// resolution (spec §4.J "Timing is measured per phase").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingBreakdown {
    pub parse_ms: f64,
    pub embed_ms: f64,
    pub search_ms: f64,
    pub rank_ms: f64,
    pub total_ms: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryMeta {
    pub original: String,
    pub normalized: String,
    pub expanded: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_core::ScoreInfo;
    use serde_json::json;

    fn sample_document() -> Document {
        Document {
            id: "srv-1".into(),
            fields: json!({
                "title": "IPTU",
                "description": "Imposto predial",
                "category": "tributos",
                "slug": "iptu",
                "embedding": [0.1, 0.2],
                "search_content": "blob",
                "orgao": "Secretaria da Fazenda",
            })
            .as_object()
            .unwrap()
            .clone(),
        }
    }

    #[test]
    fn from_document_strips_sensitive_fields() {
        let doc = ResultDocument::from_document(
            sample_document(),
            "services",
            "service",
            "title",
            "description",
            "category",
            "slug",
            "embedding",
            ScoreInfo::default(),
        );
        assert!(!doc.data.contains_key("embedding"));
        assert!(!doc.data.contains_key("search_content"));
        assert!(doc.data.contains_key("orgao"));
        assert_eq!(doc.title, "IPTU");
    }

    #[test]
    fn project_fields_includes_top_level_and_data_fields() {
        let doc = ResultDocument::from_document(
            sample_document(),
            "services",
            "service",
            "title",
            "description",
            "category",
            "slug",
            "embedding",
            ScoreInfo::default(),
        );
        let projected = doc.project_fields(&["title".to_string(), "orgao".to_string()]);
        assert_eq!(projected.get("title").unwrap(), "IPTU");
        assert_eq!(projected.get("orgao").unwrap(), "Secretaria da Fazenda");
        assert!(!projected.contains_key("description"));
    }

    #[test]
    fn compact_shape_carries_final_score() {
        let mut score = ScoreInfo::default();
        score.final_score = 0.87;
        let doc = ResultDocument::from_document(
            sample_document(),
            "services",
            "service",
            "title",
            "description",
            "category",
            "slug",
            "embedding",
            score,
        );
        let compact = doc.compact();
        assert_eq!(compact.score, 0.87);
        assert!(!compact.actions.is_empty());
    }
}

//! Schema Registry (component M): named, versioned schema definitions a
//! migration moves a collection towards. Grounded on the teacher's
//! `RwLock`-guarded `ServerState` plus `tokenizer::create_tokenizer`'s
//! register-by-name shape.

use std::collections::BTreeMap;
use std::sync::RwLock;

use search_core::{AppError, AppResult, SchemaDefinition};

/// In-memory store of schema versions, keyed by version string.
///
/// Version strings sort lexicographically (`BTreeMap`), so `latest` is
/// simply the greatest key — callers that want semver ordering should pad
/// version strings accordingly (e.g. `v0002` rather than `v2`).
pub struct SchemaRegistry {
    versions: RwLock<BTreeMap<String, SchemaDefinition>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self { versions: RwLock::new(BTreeMap::new()) }
    }

    pub fn register(&self, schema: SchemaDefinition) {
        let mut versions = self.versions.write().expect("schema registry lock poisoned");
        versions.insert(schema.version.clone(), schema);
    }

    pub fn get(&self, version: &str) -> AppResult<SchemaDefinition> {
        let versions = self.versions.read().expect("schema registry lock poisoned");
        versions
            .get(version)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("schema version {version} not registered")))
    }

    pub fn exists(&self, version: &str) -> bool {
        let versions = self.versions.read().expect("schema registry lock poisoned");
        versions.contains_key(version)
    }

    /// The lexicographically greatest registered version, if any.
    pub fn latest(&self) -> Option<SchemaDefinition> {
        let versions = self.versions.read().expect("schema registry lock poisoned");
        versions.values().next_back().cloned()
    }

    pub fn list_versions(&self) -> Vec<String> {
        let versions = self.versions.read().expect("schema registry lock poisoned");
        versions.keys().cloned().collect()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_core::SchemaField;

    fn schema(version: &str) -> SchemaDefinition {
        SchemaDefinition {
            version: version.to_string(),
            fields: vec![SchemaField {
                name: "title".into(),
                field_type: "string".into(),
                facet: false,
                optional: false,
            }],
            sort_field: "title".into(),
            nested_fields: false,
            transform: None,
        }
    }

    #[test]
    fn register_and_get_round_trips() {
        let registry = SchemaRegistry::new();
        registry.register(schema("v1"));
        assert_eq!(registry.get("v1").unwrap().version, "v1");
        assert!(registry.exists("v1"));
        assert!(!registry.exists("v2"));
    }

    #[test]
    fn get_missing_version_is_not_found() {
        let registry = SchemaRegistry::new();
        let err = registry.get("v9").unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn latest_is_lexicographically_greatest() {
        let registry = SchemaRegistry::new();
        registry.register(schema("v1"));
        registry.register(schema("v3"));
        registry.register(schema("v2"));
        assert_eq!(registry.latest().unwrap().version, "v3");
    }
}

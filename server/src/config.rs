//! Environment-driven configuration (spec §6 "Configuration"), loaded once
//! at startup. Grounded on the teacher's `main.rs`, which mixes `clap`
//! flags (legitimately CLI concerns: bind address, port) with environment
//! fallbacks for everything else; here nearly everything is the latter,
//! loaded through `dotenvy` the way `nicolad-nomadically.work`'s
//! research-agent binaries do.

use search_core::{AppError, AppResult, CollectionConfig, Mode};

const DEFAULT_EMBEDDING_DIM: usize = 768;
const DEFAULT_RECENCY_GRACE_DAYS: f64 = 30.0;
const DEFAULT_RECENCY_DECAY: f64 = 0.05;
const DEFAULT_ALPHA: f64 = 0.3;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Per-mode typo tolerance (spec §4.J step 3 / `Mode::default_typos`
/// defaults, overridable per deployment).
#[derive(Clone, Debug)]
pub struct TypoDefaults {
    pub human: u32,
    pub agent: u32,
}

impl TypoDefaults {
    pub fn for_mode(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Human => self.human,
            Mode::Agent => self.agent,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub index_base_url: String,
    pub index_api_key: String,
    pub embedding_endpoint: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub chat_endpoint: Option<String>,
    pub chat_api_key: Option<String>,
    pub chat_model: String,
    pub recency_grace_days: f64,
    pub recency_decay: f64,
    pub alpha_default: f64,
    pub typos: TypoDefaults,
    pub collections: Vec<CollectionConfig>,
    pub default_collection: String,
    pub admin_key: Option<String>,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_var(key).unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    /// Load configuration from the process environment, after applying a
    /// `.env` file if one is present (`dotenvy::dotenv()`, ignored if
    /// absent — mirrors the teacher's tolerant startup).
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();

        let index_base_url = env_var("INDEX_BASE_URL")
            .ok_or_else(|| AppError::Validation("INDEX_BASE_URL is required".into()))?;
        let index_api_key = env_var("INDEX_API_KEY")
            .ok_or_else(|| AppError::Validation("INDEX_API_KEY is required".into()))?;

        let collection_names: Vec<String> = env_var("SEARCH_COLLECTIONS")
            .ok_or_else(|| AppError::Validation("SEARCH_COLLECTIONS is required".into()))?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if collection_names.is_empty() {
            return Err(AppError::Validation("SEARCH_COLLECTIONS must name at least one collection".into()));
        }

        let embedding_dim = env_parsed("EMBEDDING_DIM", DEFAULT_EMBEDDING_DIM);
        let collections =
            collection_names.iter().map(|name| collection_config(name, embedding_dim)).collect::<AppResult<_>>()?;

        let default_collection = env_var("DEFAULT_COLLECTION").unwrap_or_else(|| collection_names[0].clone());
        if !collection_names.contains(&default_collection) {
            return Err(AppError::Validation(format!(
                "DEFAULT_COLLECTION {default_collection} is not in SEARCH_COLLECTIONS"
            )));
        }

        Ok(Self {
            index_base_url,
            index_api_key,
            embedding_endpoint: env_var("EMBEDDING_ENDPOINT"),
            embedding_api_key: env_var("EMBEDDING_API_KEY"),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dim,
            chat_endpoint: env_var("CHAT_ENDPOINT"),
            chat_api_key: env_var("CHAT_API_KEY"),
            chat_model: env_or("CHAT_MODEL", "gpt-4o-mini"),
            recency_grace_days: env_parsed("RECENCY_GRACE_DAYS", DEFAULT_RECENCY_GRACE_DAYS),
            recency_decay: env_parsed("RECENCY_DECAY", DEFAULT_RECENCY_DECAY),
            alpha_default: env_parsed("ALPHA_DEFAULT", DEFAULT_ALPHA),
            typos: TypoDefaults {
                human: env_parsed("TYPOS_HUMAN", 2),
                agent: env_parsed("TYPOS_AGENT", 1),
            },
            collections,
            default_collection,
            admin_key: env_var("ADMIN_KEY"),
            cache_ttl_secs: env_parsed("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS),
            cache_capacity: env_parsed("CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY),
        })
    }
}

/// Build one collection's field mapping from env, falling back to the
/// common convention (`title`, `description`, `category`, `slug`,
/// `embedding`, `updated_at`) used throughout the example fixtures.
fn collection_config(name: &str, embedding_dim: usize) -> AppResult<CollectionConfig> {
    let upper = name.to_ascii_uppercase();
    let search_fields: Vec<String> = env_var(&format!("{upper}_SEARCH_FIELDS"))
        .unwrap_or_else(|| "title,description".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let search_weights: Vec<u32> = env_var(&format!("{upper}_SEARCH_WEIGHTS"))
        .unwrap_or_else(|| "3,1".to_string())
        .split(',')
        .map(|s| s.trim().parse::<u32>().unwrap_or(1))
        .collect();

    let config = CollectionConfig {
        name: name.to_string(),
        doc_type: env_or(&format!("{upper}_DOC_TYPE"), "service"),
        title_field: env_or(&format!("{upper}_TITLE_FIELD"), "title"),
        description_field: env_or(&format!("{upper}_DESCRIPTION_FIELD"), "description"),
        category_field: env_or(&format!("{upper}_CATEGORY_FIELD"), "category"),
        slug_field: env_or(&format!("{upper}_SLUG_FIELD"), "slug"),
        status_filter: env_var(&format!("{upper}_STATUS_FIELD"))
            .map(|field| (field, serde_json::Value::String("active".to_string()))),
        embedding_field: env_or(&format!("{upper}_EMBEDDING_FIELD"), "embedding"),
        embedding_dim,
        search_fields,
        search_weights,
        updated_at_field: env_or(&format!("{upper}_UPDATED_AT_FIELD"), "updated_at"),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear() {
        for key in [
            "INDEX_BASE_URL",
            "INDEX_API_KEY",
            "SEARCH_COLLECTIONS",
            "DEFAULT_COLLECTION",
            "SERVICES_SEARCH_FIELDS",
            "SERVICES_SEARCH_WEIGHTS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn missing_index_base_url_is_validation_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var("SEARCH_COLLECTIONS", "services");
        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(err.status_code(), 400);
        clear();
    }

    #[test]
    fn defaults_fill_in_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var("INDEX_BASE_URL", "http://localhost:8108");
        std::env::set_var("INDEX_API_KEY", "xyz");
        std::env::set_var("SEARCH_COLLECTIONS", "services");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.default_collection, "services");
        assert_eq!(config.embedding_dim, 768);
        assert_eq!(config.collections[0].search_fields, vec!["title", "description"]);
        clear();
    }

    #[test]
    fn default_collection_must_be_in_search_collections() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var("INDEX_BASE_URL", "http://localhost:8108");
        std::env::set_var("INDEX_API_KEY", "xyz");
        std::env::set_var("SEARCH_COLLECTIONS", "services");
        std::env::set_var("DEFAULT_COLLECTION", "other");
        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(err.status_code(), 400);
        clear();
    }
}

//! Analyzer (spec §4.H). Turns the raw query into structured intent via a
//! structured-output LLM request, cached for 5 minutes. Reuses
//! [`crate::ttl_cache::TtlCache`] generically rather than re-implementing
//! the same eviction rules a third time.

use std::time::Duration;

use search_core::AppResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::llm_gateway::LlmProvider;
use crate::ttl_cache::TtlCache;

const CACHE_TTL_SECS: u64 = 5 * 60;
const CACHE_CAPACITY: usize = 500;
const ANALYSIS_DEADLINE_SECS: u64 = 8;

/// Confidence threshold above which the engine may adopt the first
/// suggested category as a filter (spec §4.H).
pub const ADOPT_CATEGORY_CONFIDENCE: f64 = 0.7;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub intent: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub refined_queries: Vec<String>,
    pub search_strategy: Option<String>,
    pub confidence: f64,
}

impl AnalysisResult {
    pub fn suggested_category(&self) -> Option<&str> {
        if self.confidence >= ADOPT_CATEGORY_CONFIDENCE {
            self.categories.first().map(String::as_str)
        } else {
            None
        }
    }
}

pub struct Analyzer {
    provider: Option<Box<dyn LlmProvider>>,
    cache: TtlCache<AnalysisResult>,
}

impl Analyzer {
    pub fn new(provider: Option<Box<dyn LlmProvider>>) -> Self {
        Self { provider, cache: TtlCache::new(CACHE_CAPACITY) }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    fn cache_key(raw_query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(raw_query.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Analyze `raw_query`. Returns `None` when no analyzer is configured or
    /// the provider fails — the engine degrades by skipping analysis, it
    /// never fails the whole search over it (spec §4.J step 6).
    pub async fn analyze(&self, raw_query: &str) -> Option<AnalysisResult> {
        let key = Self::cache_key(raw_query);
        if let Some(cached) = self.cache.get(&key) {
            return Some(cached);
        }

        let provider = self.provider.as_ref()?;
        let prompt = build_prompt(raw_query);
        let fut = async {
            let text = provider.complete(&prompt).await?;
            parse_response(&text)
        };

        let result: AppResult<AnalysisResult> =
            match tokio::time::timeout(Duration::from_secs(ANALYSIS_DEADLINE_SECS), fut).await {
                Ok(r) => r,
                Err(_) => return None,
            };

        match result {
            Ok(analysis) => {
                self.cache.insert(key, analysis.clone(), Duration::from_secs(CACHE_TTL_SECS));
                Some(analysis)
            }
            Err(_) => None,
        }
    }
}

fn build_prompt(raw_query: &str) -> String {
    format!(
        "Analyze the following public-service search query and return JSON with \
         intent, keywords, categories, refined_queries, search_strategy and confidence: {raw_query}"
    )
}

fn parse_response(text: &str) -> AppResult<AnalysisResult> {
    serde_json::from_str(text)
        .map_err(|e| search_core::AppError::Unavailable(format!("analyzer returned malformed JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubProvider(String);

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn complete(&self, _prompt: &str) -> AppResult<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn unconfigured_analyzer_returns_none() {
        let analyzer = Analyzer::new(None);
        assert!(analyzer.analyze("iptu").await.is_none());
    }

    #[tokio::test]
    async fn malformed_response_degrades_to_none() {
        let analyzer = Analyzer::new(Some(Box::new(StubProvider("not json".into()))));
        assert!(analyzer.analyze("iptu").await.is_none());
    }

    #[tokio::test]
    async fn confident_category_is_adopted_above_threshold() {
        let json = serde_json::json!({
            "intent": "find tax payment info",
            "keywords": ["iptu"],
            "categories": ["tributos"],
            "refined_queries": [],
            "search_strategy": "hybrid",
            "confidence": 0.85,
        })
        .to_string();
        let analyzer = Analyzer::new(Some(Box::new(StubProvider(json))));
        let result = analyzer.analyze("iptu").await.unwrap();
        assert_eq!(result.suggested_category(), Some("tributos"));
    }

    #[tokio::test]
    async fn low_confidence_category_is_not_adopted() {
        let json = serde_json::json!({
            "intent": "find tax payment info",
            "keywords": ["iptu"],
            "categories": ["tributos"],
            "refined_queries": [],
            "search_strategy": "hybrid",
            "confidence": 0.4,
        })
        .to_string();
        let analyzer = Analyzer::new(Some(Box::new(StubProvider(json))));
        let result = analyzer.analyze("iptu").await.unwrap();
        assert_eq!(result.suggested_category(), None);
    }

    #[tokio::test]
    async fn repeated_query_hits_cache() {
        let json = serde_json::json!({
            "intent": "x", "keywords": [], "categories": [], "refined_queries": [],
            "search_strategy": null, "confidence": 0.1,
        })
        .to_string();
        let analyzer = Analyzer::new(Some(Box::new(StubProvider(json))));
        analyzer.analyze("iptu").await.unwrap();
        assert_eq!(analyzer.cache.len(), 1);
    }
}

//! Reranker (spec §4.G). Used only under the `ai` strategy: asks the LLM to
//! reorder the top-N hits, falling back to the input order unchanged on any
//! failure — never lets a reranking problem fail the whole search.

use std::collections::HashSet;
use std::time::Duration;

use tracing::warn;

use crate::llm_gateway::LlmProvider;

const RERANK_DEADLINE_SECS: u64 = 10;
pub const MAX_RERANK_CANDIDATES: usize = 5;

/// Ask the LLM to reorder `ids` (already truncated to at most
/// [`MAX_RERANK_CANDIDATES`]) by relevance to `query`. Ids the LLM mentions
/// come first in its order; any id it omits is appended at the end,
/// preserving the original relative order (spec §4.G).
pub async fn rerank(provider: &dyn LlmProvider, query: &str, ids: &[String]) -> Vec<String> {
    if ids.is_empty() {
        return Vec::new();
    }

    let prompt = build_prompt(query, ids);
    let fut = provider.complete(&prompt);

    let response = match tokio::time::timeout(Duration::from_secs(RERANK_DEADLINE_SECS), fut).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "reranker provider failed, preserving input order");
            return ids.to_vec();
        }
        Err(_) => {
            warn!("reranker deadline exceeded, preserving input order");
            return ids.to_vec();
        }
    };

    match parse_order(&response) {
        Some(order) if !order.is_empty() => merge_order(ids, &order),
        _ => ids.to_vec(),
    }
}

fn build_prompt(query: &str, ids: &[String]) -> String {
    format!(
        "Given the query \"{query}\", return a JSON array of these document ids ordered by \
         relevance, most relevant first: {ids:?}"
    )
}

fn parse_order(text: &str) -> Option<Vec<String>> {
    serde_json::from_str::<Vec<String>>(text).ok()
}

/// Preserve any ids the LLM named (in its order), append the rest (in their
/// original order) — stable, and tolerant of the LLM inventing or dropping
/// ids.
fn merge_order(original: &[String], llm_order: &[String]) -> Vec<String> {
    let original_set: HashSet<&str> = original.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut merged: Vec<String> = Vec::with_capacity(original.len());

    for id in llm_order {
        if original_set.contains(id.as_str()) && seen.insert(id.clone()) {
            merged.push(id.clone());
        }
    }
    for id in original {
        if seen.insert(id.clone()) {
            merged.push(id.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use search_core::AppResult;

    struct StubProvider(String);

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn complete(&self, _prompt: &str) -> AppResult<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn complete(&self, _prompt: &str) -> AppResult<String> {
            Err(search_core::AppError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn reorders_per_llm_response() {
        let provider = StubProvider(r#"["c", "a", "b"]"#.to_string());
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let result = rerank(&provider, "q", &ids).await;
        assert_eq!(result, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn unreturned_ids_appended_in_original_order() {
        let provider = StubProvider(r#"["b"]"#.to_string());
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let result = rerank(&provider, "q", &ids).await;
        assert_eq!(result, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn provider_failure_preserves_input_order() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let result = rerank(&FailingProvider, "q", &ids).await;
        assert_eq!(result, ids);
    }

    #[tokio::test]
    async fn empty_response_preserves_input_order() {
        let provider = StubProvider("[]".to_string());
        let ids = vec!["a".to_string(), "b".to_string()];
        let result = rerank(&provider, "q", &ids).await;
        assert_eq!(result, ids);
    }

    #[tokio::test]
    async fn malformed_response_preserves_input_order() {
        let provider = StubProvider("not json".to_string());
        let ids = vec!["a".to_string(), "b".to_string()];
        let result = rerank(&provider, "q", &ids).await;
        assert_eq!(result, ids);
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let provider = StubProvider("[]".to_string());
        let result = rerank(&provider, "q", &[]).await;
        assert!(result.is_empty());
    }
}

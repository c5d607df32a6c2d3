//! Embedding Gateway (spec §4.C). A pluggable `EmbeddingProvider` trait plus
//! an HTTP implementation, fronted by a content-addressed TTL cache.
//! Grounded on the teacher's `Tokenizer` trait + `create_tokenizer` factory
//! shape (`tokenizer.rs`) for the pluggable-provider pattern.

use std::time::Duration;

use async_trait::async_trait;
use search_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::ttl_cache::TtlCache;

const DEFAULT_CHAR_CAP: usize = 10_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;
const DEFAULT_CACHE_CAPACITY: usize = 1000;
const MAX_RETRIES: u32 = 3;

/// Contract for anything that can turn text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`, returning a vector of exactly `dim` floats.
    async fn embed_raw(&self, text: &str) -> AppResult<Vec<f32>>;

    fn dim(&self) -> usize;

    fn name(&self) -> &str;
}

/// An `EmbeddingProvider` backed by an HTTP embedding service.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dim: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        api_key: Option<String>,
        model: String,
        dim: usize,
    ) -> Self {
        Self { client, endpoint, api_key, model, dim }
    }
}

#[derive(serde::Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_raw(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut req =
            self.client.post(&self.endpoint).json(&EmbedRequest { input: text, model: &self.model });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| AppError::Unavailable(format!("embedding provider request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::Unavailable(format!(
                "embedding provider returned status {}",
                resp.status()
            )));
        }
        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Unavailable(format!("embedding provider returned malformed body: {e}")))?;
        Ok(body.embedding)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Fronts an [`EmbeddingProvider`] with truncation, a content-addressed
/// cache, rejection of wrong-length vectors, and bounded retries.
pub struct EmbeddingGateway {
    provider: Option<Box<dyn EmbeddingProvider>>,
    cache: TtlCache<Vec<f32>>,
    char_cap: usize,
    cache_ttl: Duration,
}

impl EmbeddingGateway {
    pub fn new(provider: Option<Box<dyn EmbeddingProvider>>) -> Self {
        Self {
            provider,
            cache: TtlCache::new(DEFAULT_CACHE_CAPACITY),
            char_cap: DEFAULT_CHAR_CAP,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    fn fingerprint(&self, truncated: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(truncated.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Embed `text`, honoring the deadline, truncation, caching and retry
    /// rules of spec §4.C.
    pub async fn embed(&self, text: &str, deadline: Duration) -> AppResult<Vec<f32>> {
        let Some(provider) = self.provider.as_ref() else {
            return Err(AppError::Unavailable("embedding provider not configured".into()));
        };

        let truncated: String = text.chars().take(self.char_cap).collect();
        let key = self.fingerprint(&truncated);

        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let fetch = async {
            let mut last_err = None;
            for attempt in 0..=MAX_RETRIES {
                match provider.embed_raw(&truncated).await {
                    Ok(vector) => {
                        if vector.len() != provider.dim() {
                            return Err(AppError::Unavailable(format!(
                                "embedding provider returned {} dims, expected {}",
                                vector.len(),
                                provider.dim()
                            )));
                        }
                        return Ok(vector);
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "embedding provider attempt failed");
                        last_err = Some(e);
                        if attempt < MAX_RETRIES {
                            tokio::time::sleep(Duration::from_millis(100 * (attempt as u64 + 1)))
                                .await;
                        }
                    }
                }
            }
            Err(last_err.unwrap_or_else(|| AppError::Unavailable("embedding provider failed".into())))
        };

        let vector = match tokio::time::timeout(deadline, fetch).await {
            Ok(result) => result?,
            Err(_) => return Err(AppError::Canceled("embedding request deadline exceeded".into())),
        };

        self.cache.insert(key, vector.clone(), self.cache_ttl);
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlakyProvider {
        dim: usize,
        calls: Arc<AtomicUsize>,
        fail_times: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed_raw(&self, _text: &str) -> AppResult<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(AppError::Unavailable("transient".into()));
            }
            Ok(vec![0.1; self.dim])
        }

        fn dim(&self) -> usize {
            self.dim
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    struct WrongDimProvider;

    #[async_trait]
    impl EmbeddingProvider for WrongDimProvider {
        async fn embed_raw(&self, _text: &str) -> AppResult<Vec<f32>> {
            Ok(vec![0.1; 3])
        }

        fn dim(&self) -> usize {
            8
        }

        fn name(&self) -> &str {
            "wrong-dim"
        }
    }

    #[tokio::test]
    async fn unconfigured_gateway_is_unavailable() {
        let gateway = EmbeddingGateway::new(None);
        let err = gateway.embed("ola", Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = FlakyProvider { dim: 4, calls: calls.clone(), fail_times: 2 };
        let gateway = EmbeddingGateway::new(Some(Box::new(provider)));
        let vector = gateway.embed("ola", Duration::from_secs(5)).await.unwrap();
        assert_eq!(vector.len(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wrong_length_response_is_rejected() {
        let gateway = EmbeddingGateway::new(Some(Box::new(WrongDimProvider)));
        let err = gateway.embed("ola", Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn identical_truncated_text_hits_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = FlakyProvider { dim: 4, calls: calls.clone(), fail_times: 0 };
        let gateway = EmbeddingGateway::new(Some(Box::new(provider)));
        gateway.embed("mesmo texto", Duration::from_secs(5)).await.unwrap();
        gateway.embed("mesmo texto", Duration::from_secs(5)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

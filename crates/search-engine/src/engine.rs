//! Search Engine orchestrator (spec §4.J). Grounded on the teacher's
//! `api.rs` handler style: acquire the data it needs, build the response
//! struct, measure `Instant` timings per phase.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use search_core::{
    parse, AppError, AppResult, CollectionConfig, Mode, Normalizer, ParsedQuery, ScoreInfo, Scorer,
    SearchFilters, SearchRequest, Strategy, SynonymStore,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::analyzer::Analyzer;
use crate::embedding_gateway::EmbeddingGateway;
use crate::filters;
use crate::index_gateway::{CollectionHits, Hit, IndexGateway, SearchParams};
use crate::llm_gateway::LlmProvider;
use crate::reranker::{self, MAX_RERANK_CANDIDATES};
use crate::response::{Pagination, QueryMeta, ResultDocument, TimingBreakdown};
use crate::result_cache::{cache_key, CacheKeyParts, ResultCache};

const FETCH_MULTIPLIER_CAP: u32 = 500;
const DEFAULT_EMBED_DEADLINE: Duration = Duration::from_secs(5);
const DEFAULT_SEARCH_DEADLINE: Duration = Duration::from_secs(8);

/// Static per-collection configuration plus the default collection to fall
/// back to when a request names none that are configured (spec §4.J step 4).
pub struct EngineConfig {
    pub collections: Vec<CollectionConfig>,
    pub default_collection: String,
}

impl EngineConfig {
    fn find(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.name == name)
    }
}

pub struct SearchEngine {
    config: EngineConfig,
    embedding: EmbeddingGateway,
    index: Box<dyn IndexGateway>,
    analyzer: Analyzer,
    reranker_provider: Option<Box<dyn LlmProvider>>,
    synonyms: SynonymStore,
    cache: ResultCache,
    scorer: Scorer,
}

/// One projected hit plus the field the threshold check should apply to.
struct ScoredHit {
    document: ResultDocument,
    threshold_value: f64,
}

#[derive(Clone, Debug, Serialize, serde::Deserialize)]
pub struct SearchResponseBody {
    pub results: Vec<serde_json::Value>,
    pub pagination: Pagination,
    pub timing: TimingBreakdown,
    pub query: QueryMeta,
}

impl SearchEngine {
    pub fn new(
        config: EngineConfig,
        embedding: EmbeddingGateway,
        index: Box<dyn IndexGateway>,
        analyzer: Analyzer,
        reranker_provider: Option<Box<dyn LlmProvider>>,
        scorer: Scorer,
    ) -> Self {
        Self {
            config,
            embedding,
            index,
            analyzer,
            reranker_provider,
            synonyms: SynonymStore::new(),
            cache: ResultCache::new(),
            scorer,
        }
    }

    /// Override the default cache sizing (spec §4.I capacity/TTL are
    /// deployment tuning, not hardcoded constants).
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = cache;
        self
    }

    /// Resolve which configured collections a request targets (spec §4.J
    /// step 4): intersection of requested and configured; fall back to the
    /// default collection if the intersection is empty; fail if that's also
    /// absent.
    fn resolve_collections(&self, requested: &[String]) -> AppResult<Vec<&CollectionConfig>> {
        let configured_names: HashSet<&str> =
            self.config.collections.iter().map(|c| c.name.as_str()).collect();

        let intersected: Vec<&CollectionConfig> = if requested.is_empty() {
            Vec::new()
        } else {
            requested
                .iter()
                .filter(|name| configured_names.contains(name.as_str()))
                .filter_map(|name| self.config.find(name))
                .collect()
        };

        if !intersected.is_empty() {
            return Ok(intersected);
        }

        match self.config.find(&self.config.default_collection) {
            Some(default) => Ok(vec![default]),
            None => Err(AppError::Validation("no target collections resolved".into())),
        }
    }

    pub async fn search(&self, req: &SearchRequest) -> AppResult<SearchResponseBody> {
        let total_start = Instant::now();

        // Step 1: page/per_page/alpha are clamped by SearchRequest's own accessors.
        let page = req.effective_page();
        let per_page = req.effective_per_page();
        let alpha = req.effective_alpha();
        let mode = req.effective_mode();

        // Step 2: cache lookup for non-AI strategies.
        let cacheable = !matches!(req.strategy, Strategy::Ai);
        let key = if cacheable {
            Some(cache_key(&CacheKeyParts {
                query: &req.query,
                strategy: req.strategy.as_str(),
                page,
                per_page,
                collections: &req.collections,
                mode: if matches!(mode, Mode::Human) { "human" } else { "agent" },
                alpha,
                threshold: req.threshold_for(req.strategy),
                expand: req.effective_expand(),
                recency: req.effective_recency(),
                filters: &req.filters,
            }))
        } else {
            None
        };
        if let Some(key) = &key {
            if let Some(cached) = self.cache.get(key) {
                if let Ok(body) = serde_json::from_str::<SearchResponseBody>(&cached) {
                    return Ok(body);
                }
            }
        }

        // Step 3: mode-resolved defaults, with request overrides (already
        // implemented by SearchRequest::effective_*).
        let num_typos = req.effective_typos();
        let expand_enabled = req.effective_expand();
        let recency_enabled = req.effective_recency();

        // Step 4: resolve target collections.
        let collections = self.resolve_collections(&req.collections)?;

        // Step 5: parse + expand.
        let parse_start = Instant::now();
        let parsed: ParsedQuery = parse(&req.query);
        let expanded = if expand_enabled {
            search_core::expand(&self.synonyms, &parsed.normalized, &parsed.tokens)
        } else {
            search_core::ExpandedQuery {
                tokens: parsed.tokens.clone(),
                expanded_terms: Vec::new(),
                query_string: if parsed.tokens.is_empty() {
                    "*".to_string()
                } else {
                    parsed.tokens.join(" ")
                },
            }
        };
        let parse_ms = elapsed_ms(parse_start);

        // Step 6: branch by needed signals, dispatching C and H concurrently.
        let needs_embedding = req.strategy.needs_embedding();
        let needs_analysis = req.strategy.needs_analysis();

        let mut effective_strategy = req.strategy;
        let embed_start = Instant::now();
        let embedding_fut = async {
            if needs_embedding {
                Some(self.embedding.embed(&expanded.query_string, DEFAULT_EMBED_DEADLINE).await)
            } else {
                None
            }
        };
        let analysis_fut = async {
            if needs_analysis {
                self.analyzer.analyze(&req.query).await
            } else {
                None
            }
        };
        let (embedding_result, analysis) = tokio::join!(embedding_fut, analysis_fut);
        let embed_ms = elapsed_ms(embed_start);

        let embedding_vector = match embedding_result {
            None => None,
            Some(Ok(vector)) => Some(vector),
            Some(Err(err)) => match req.strategy {
                Strategy::Semantic => return Err(err),
                Strategy::Hybrid | Strategy::Ai => {
                    warn!(error = %err, "embedding unavailable, degrading to keyword");
                    effective_strategy = Strategy::Keyword;
                    None
                }
                Strategy::Keyword => None,
            },
        };

        // Step 7: build filters, adopting the analyzer's suggested category
        // only when the request did not name one (explicit request wins).
        let mut filters: SearchFilters = req.filters.clone();
        if filters.category.is_none() {
            if let Some(analysis) = &analysis {
                if let Some(category) = analysis.suggested_category() {
                    filters.category = Some(category.to_string());
                }
            }
        }

        // Step 8: one multi_search covering all target collections.
        let fetch_per_page = per_page.saturating_mul(page).min(FETCH_MULTIPLIER_CAP).max(per_page);
        let params: Vec<SearchParams> = collections
            .iter()
            .map(|collection| {
                let filter_by =
                    filters::compile(collection.status_filter.as_ref(), req.include_inactive, &filters);
                SearchParams::build(
                    collection,
                    effective_strategy,
                    &expanded.query_string,
                    embedding_vector.as_deref(),
                    alpha,
                    num_typos,
                    filter_by,
                    1,
                    fetch_per_page,
                )
            })
            .collect();

        let search_start = Instant::now();
        let results: Vec<CollectionHits> =
            self.index.multi_search(params, DEFAULT_SEARCH_DEADLINE).await?;
        let search_ms = elapsed_ms(search_start);

        // Step 9: normalize + score each collection's hits.
        let rank_start = Instant::now();
        let mut scored: Vec<ScoredHit> = Vec::new();
        let mut total_hits: u64 = 0;
        for (collection, collection_hits) in collections.iter().zip(results.iter()) {
            total_hits += collection_hits.total;
            let normalizer = Normalizer::from_batch(
                collection_hits.hits.iter().filter_map(|h| h.vector_distance),
            );
            for hit in &collection_hits.hits {
                scored.push(self.score_hit(
                    collection,
                    hit,
                    &normalizer,
                    effective_strategy,
                    alpha,
                    &req.query,
                    recency_enabled,
                ));
            }
        }

        // Step 10: merge + sort by final score descending.
        scored.sort_by(|a, b| {
            b.document
                .score
                .final_score
                .partial_cmp(&a.document.score.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Step 11: threshold filter on the strategy-appropriate score.
        if let Some(threshold) = req.threshold_for(effective_strategy) {
            scored.retain(|s| s.threshold_value >= threshold);
        }

        // Step 12: rerank top-5 under the `ai` strategy.
        if matches!(req.strategy, Strategy::Ai) && !scored.is_empty() {
            if let Some(provider) = &self.reranker_provider {
                let top_n = scored.len().min(MAX_RERANK_CANDIDATES);
                let top_ids: Vec<String> =
                    scored[..top_n].iter().map(|s| s.document.id.clone()).collect();
                let ordered = reranker::rerank(provider.as_ref(), &req.query, &top_ids).await;
                reorder_by_ids(&mut scored, &ordered, top_n);
            }
        }
        let rank_ms = elapsed_ms(rank_start);

        // Pagination window, applied after the global merge.
        let start = ((page - 1) * per_page) as usize;
        let page_slice: Vec<&ScoredHit> =
            scored.iter().skip(start).take(per_page as usize).collect();

        // Step 13: project each hit, honoring mode / requested fields.
        let fields = &req.fields;
        let results_json: Vec<serde_json::Value> = page_slice
            .iter()
            .map(|hit| match mode {
                Mode::Agent => serde_json::to_value(hit.document.compact()).unwrap_or_default(),
                Mode::Human if !fields.is_empty() => {
                    serde_json::Value::Object(hit.document.project_fields(fields))
                }
                Mode::Human => serde_json::to_value(&hit.document).unwrap_or_default(),
            })
            .collect();

        let body = SearchResponseBody {
            results: results_json,
            pagination: Pagination { page, per_page, total: total_hits },
            timing: TimingBreakdown {
                parse_ms,
                embed_ms,
                search_ms,
                rank_ms,
                total_ms: elapsed_ms(total_start),
            },
            query: QueryMeta {
                original: parsed.original.clone(),
                normalized: parsed.normalized.clone(),
                expanded: expanded.query_string.clone(),
            },
        };

        // Step 14: write cache (non-AI strategies only).
        if let Some(key) = key {
            if let Ok(serialized) = serde_json::to_string(&body) {
                self.cache.put(key, serialized);
            }
        }

        info!(
            query = %req.query,
            strategy = ?req.strategy,
            hits = scored.len(),
            total_ms = body.timing.total_ms,
            "search completed"
        );

        Ok(body)
    }

    /// `GET /search/{id}` (spec §6): fetch one document by id, optionally
    /// hinted to a collection, falling through to every configured
    /// collection when the hint is absent or doesn't match a hit.
    pub async fn get_by_id(
        &self,
        id: &str,
        collection_hint: Option<&str>,
    ) -> AppResult<serde_json::Value> {
        let candidates: Vec<&CollectionConfig> = match collection_hint.and_then(|n| self.config.find(n))
        {
            Some(hinted) => vec![hinted],
            None => self.config.collections.iter().collect(),
        };

        for collection in candidates {
            match self.index.get_document(&collection.name, id, DEFAULT_SEARCH_DEADLINE).await {
                Ok(document) => {
                    let result = ResultDocument::from_document(
                        document,
                        &collection.name,
                        &collection.doc_type,
                        &collection.title_field,
                        &collection.description_field,
                        &collection.category_field,
                        &collection.slug_field,
                        &collection.embedding_field,
                        ScoreInfo::default(),
                    );
                    return Ok(serde_json::to_value(&result).unwrap_or_default());
                }
                Err(AppError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(AppError::NotFound(format!("document {id} not found in any configured collection")))
    }

    #[allow(clippy::too_many_arguments)]
    fn score_hit(
        &self,
        collection: &CollectionConfig,
        hit: &Hit,
        normalizer: &Normalizer,
        strategy: Strategy,
        alpha: f64,
        raw_query: &str,
        recency_enabled: bool,
    ) -> ScoredHit {
        let text = Normalizer::normalize_text(hit.text_match.unwrap_or(0.0));
        let vector = hit.vector_distance.map(|d| normalizer.normalize_vector(d)).unwrap_or(0.0);
        let title = hit.document.field_str(&collection.title_field).unwrap_or_default().to_string();
        let category = hit.document.field_str(&collection.category_field).map(str::to_string);
        let days_since_update = if recency_enabled {
            hit.document.days_since_update(&collection.updated_at_field)
        } else {
            Some(0.0)
        };

        let score = self.scorer.score(
            strategy,
            text,
            vector,
            alpha,
            &title,
            raw_query,
            days_since_update,
            category.as_deref(),
        );

        let threshold_value = match strategy {
            Strategy::Keyword => score.text,
            Strategy::Semantic => score.vector,
            Strategy::Hybrid | Strategy::Ai => score.hybrid,
        };

        let document = ResultDocument::from_document(
            hit.document.clone(),
            &collection.name,
            &collection.doc_type,
            &collection.title_field,
            &collection.description_field,
            &collection.category_field,
            &collection.slug_field,
            &collection.embedding_field,
            score,
        );

        ScoredHit { document, threshold_value }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Reorder the first `top_n` entries of `scored` to match `ordered_ids`,
/// leaving the remainder untouched.
fn reorder_by_ids(scored: &mut Vec<ScoredHit>, ordered_ids: &[String], top_n: usize) {
    if ordered_ids.len() != top_n {
        return;
    }
    let mut head: Vec<ScoredHit> = scored.drain(..top_n).collect();
    let mut reordered = Vec::with_capacity(top_n);
    for id in ordered_ids {
        if let Some(pos) = head.iter().position(|s| &s.document.id == id) {
            reordered.push(head.remove(pos));
        }
    }
    reordered.append(&mut head);
    for (i, item) in reordered.into_iter().enumerate() {
        scored.insert(i, item);
    }
}

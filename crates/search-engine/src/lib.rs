//! I/O-bound half of the search facade: the embedding, index and LLM
//! gateways, the caches fronting them, the analyzer and reranker, response
//! shaping, and the orchestrator tying them together (spec §4.C-J).

pub mod analyzer;
pub mod embedding_gateway;
pub mod engine;
pub mod filters;
pub mod index_gateway;
pub mod llm_gateway;
pub mod reranker;
pub mod response;
pub mod result_cache;
pub mod ttl_cache;

pub use analyzer::{AnalysisResult, Analyzer};
pub use embedding_gateway::{EmbeddingGateway, EmbeddingProvider, HttpEmbeddingProvider};
pub use engine::{EngineConfig, SearchEngine, SearchResponseBody};
pub use index_gateway::{CollectionHits, Hit, HttpIndexGateway, IndexGateway, SearchParams};
pub use llm_gateway::{HttpLlmProvider, LlmProvider};
pub use response::{CompactResult, Pagination, QueryMeta, ResultDocument, TimingBreakdown};
pub use result_cache::ResultCache;
pub use ttl_cache::TtlCache;

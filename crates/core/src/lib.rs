//! Pure domain types and scoring logic for the public-service search facade:
//! the data model, the error taxonomy, and the four stateless/pure
//! components (Query Parser, Synonym Expander, Normalizer, Scorer) that
//! have no I/O of their own.

pub mod document;
pub mod error;
pub mod migration;
pub mod normalizer;
pub mod parser;
pub mod request;
pub mod scorer;
pub mod synonyms;

pub use document::{
    CollectionConfig, Document, SchemaDefinition, SchemaField, ScoreExplain, ScoreInfo,
    TransformFn, DEFAULT_EMBEDDING_DIM,
};
pub use error::{AppError, AppResult};
pub use migration::{MigrationControlRecord, MigrationStatus};
pub use normalizer::Normalizer;
pub use parser::{parse, ParsedQuery};
pub use request::{Mode, SearchFilters, SearchRequest, Strategy};
pub use scorer::Scorer;
pub use synonyms::{expand, ExpandedQuery, SynonymStore};

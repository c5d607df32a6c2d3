//! Schema registry, migration orchestrator, and CUD lockout cache for the
//! search facade (spec §4.K, §4.L, §3 "Schema definition" / "Migration
//! control record").

pub mod index_admin;
pub mod lock_cache;
pub mod orchestrator;
pub mod registry;
pub mod store;

pub use index_admin::{HttpIndexAdmin, IndexAdmin};
pub use lock_cache::{LockSource, MigrationLockCache, DEFAULT_TTL};
pub use orchestrator::{MigrationOrchestrator, StartRequest};
pub use registry::SchemaRegistry;
pub use store::ControlStore;

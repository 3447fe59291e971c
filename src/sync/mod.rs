//! Metrics synchronization: production classification, per-tenant sync
//! checkpoints, and the incremental sync engine.

pub mod engine;
pub mod filter;
pub mod state;

pub use engine::{MetricsSyncEngine, SyncReport};
pub use filter::{CustomFilters, ProductionExecutionFilter};
pub use state::SyncStateRepository;

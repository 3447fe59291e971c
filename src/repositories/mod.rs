//! # Repository Layer
//!
//! Database access for tenants, workflows, executions, and aggregations.
//! Repositories borrow the shared SeaORM connection and scope every query by
//! tenant.

pub mod aggregation;
pub mod execution;
pub mod tenant;
pub mod workflow;

pub use aggregation::AggregationRepository;
pub use execution::ExecutionRepository;
pub use tenant::TenantRepository;
pub use workflow::WorkflowRepository;

//! # Data Models
//!
//! This module contains all the SeaORM entity models used throughout the
//! flowmetrics service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod execution;
pub mod metrics_aggregation;
pub mod sync_state;
pub mod tenant;
pub mod workflow;
pub mod workflow_trend;

pub use execution::Entity as Execution;
pub use metrics_aggregation::Entity as MetricsAggregation;
pub use sync_state::Entity as SyncState;
pub use tenant::Entity as Tenant;
pub use workflow::Entity as Workflow;
pub use workflow_trend::Entity as WorkflowTrend;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "flowmetrics".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

//! Database migrations for the flowmetrics service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_10_000001_create_tenants;
mod m2026_01_10_000002_create_workflows;
mod m2026_01_10_000003_create_executions;
mod m2026_01_10_000004_create_sync_states;
mod m2026_01_10_000005_create_metrics_aggregations;
mod m2026_01_10_000006_create_workflow_trend_metrics;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_10_000001_create_tenants::Migration),
            Box::new(m2026_01_10_000002_create_workflows::Migration),
            Box::new(m2026_01_10_000003_create_executions::Migration),
            Box::new(m2026_01_10_000004_create_sync_states::Migration),
            Box::new(m2026_01_10_000005_create_metrics_aggregations::Migration),
            Box::new(m2026_01_10_000006_create_workflow_trend_metrics::Migration),
        ]
    }
}

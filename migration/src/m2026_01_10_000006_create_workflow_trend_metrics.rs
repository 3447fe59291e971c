//! Migration to create the workflow_trend_metrics table.
//!
//! Daily per-workflow snapshots for trend-line rendering. Fully derived
//! from executions and safe to drop and recompute.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkflowTrendMetrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::WorkflowId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::Date)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::ExecutionCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::SuccessCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::FailureCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::AvgExecutionTimeMs)
                            .double()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::TimeSavedHours)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(WorkflowTrendMetrics::ComputedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_workflow_trend_metrics_workflow_id")
                            .from(
                                WorkflowTrendMetrics::Table,
                                WorkflowTrendMetrics::WorkflowId,
                            )
                            .to(Workflows::Table, Workflows::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_workflow_trend_metrics_tenant_id")
                            .from(WorkflowTrendMetrics::Table, WorkflowTrendMetrics::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_trend_metrics_workflow_date")
                    .table(WorkflowTrendMetrics::Table)
                    .col(WorkflowTrendMetrics::WorkflowId)
                    .col(WorkflowTrendMetrics::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_workflow_trend_metrics_workflow_date")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(WorkflowTrendMetrics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WorkflowTrendMetrics {
    Table,
    Id,
    TenantId,
    WorkflowId,
    Date,
    ExecutionCount,
    SuccessCount,
    FailureCount,
    AvgExecutionTimeMs,
    TimeSavedHours,
    ComputedAt,
}

#[derive(DeriveIden)]
enum Workflows {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

//! Migration to create the metrics_aggregations table.
//!
//! Period-bucketed rollups derived from execution facts. Rows are
//! uniquely identified by (tenant, workflow | NULL, period_type,
//! period_start) so re-aggregation updates in place.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MetricsAggregations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MetricsAggregations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MetricsAggregations::WorkflowId).uuid().null())
                    .col(
                        ColumnDef::new(MetricsAggregations::PeriodType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::PeriodStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::PeriodEnd)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::TotalExecutions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::SuccessfulExecutions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::FailedExecutions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::CanceledExecutions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::SuccessRate)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::MinExecutionTimeMs)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::AvgExecutionTimeMs)
                            .double()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::MaxExecutionTimeMs)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::TotalDataSizeBytes)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::AvgDataSizeBytes)
                            .double()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::MostCommonError)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::TimeSavedHours)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::ProductivityScore)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::TotalWorkflows)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::ActiveWorkflows)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::ComputedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MetricsAggregations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_metrics_aggregations_tenant_id")
                            .from(MetricsAggregations::Table, MetricsAggregations::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_metrics_aggregations_workflow_id")
                            .from(MetricsAggregations::Table, MetricsAggregations::WorkflowId)
                            .to(Workflows::Table, Workflows::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Period key. NULL workflow_id participates, so two partial shapes
        // would be ideal on Postgres; a single index covers both engines here.
        manager
            .create_index(
                Index::create()
                    .name("idx_metrics_aggregations_period_key")
                    .table(MetricsAggregations::Table)
                    .col(MetricsAggregations::TenantId)
                    .col(MetricsAggregations::WorkflowId)
                    .col(MetricsAggregations::PeriodType)
                    .col(MetricsAggregations::PeriodStart)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_metrics_aggregations_tenant_type_start")
                    .table(MetricsAggregations::Table)
                    .col(MetricsAggregations::TenantId)
                    .col(MetricsAggregations::PeriodType)
                    .col(MetricsAggregations::PeriodStart)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_metrics_aggregations_period_key")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_metrics_aggregations_tenant_type_start")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(MetricsAggregations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MetricsAggregations {
    Table,
    Id,
    TenantId,
    WorkflowId,
    PeriodType,
    PeriodStart,
    PeriodEnd,
    TotalExecutions,
    SuccessfulExecutions,
    FailedExecutions,
    CanceledExecutions,
    SuccessRate,
    MinExecutionTimeMs,
    AvgExecutionTimeMs,
    MaxExecutionTimeMs,
    TotalDataSizeBytes,
    AvgDataSizeBytes,
    MostCommonError,
    TimeSavedHours,
    ProductivityScore,
    TotalWorkflows,
    ActiveWorkflows,
    ComputedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Workflows {
    Table,
    Id,
}

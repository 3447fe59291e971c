//! Migration to create the executions table.
//!
//! One row per remote workflow run. Remote execution ids are globally
//! unique on the n8n side, so the upsert key is a single column.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Executions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Executions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Executions::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Executions::WorkflowId).uuid().not_null())
                    .col(
                        ColumnDef::new(Executions::RemoteExecutionId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Executions::Status).text().not_null())
                    .col(ColumnDef::new(Executions::Mode).text().not_null())
                    .col(
                        ColumnDef::new(Executions::Finished)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Executions::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Executions::StoppedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Executions::ExecutionTimeMs)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Executions::IsProduction)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Executions::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(Executions::DataSizeBytes)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Executions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Executions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_executions_workflow_id")
                            .from(Executions::Table, Executions::WorkflowId)
                            .to(Workflows::Table, Workflows::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_executions_tenant_id")
                            .from(Executions::Table, Executions::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_executions_remote_execution_id")
                    .table(Executions::Table)
                    .col(Executions::RemoteExecutionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Aggregation queries scan by tenant and started_at window
        manager
            .create_index(
                Index::create()
                    .name("idx_executions_tenant_started")
                    .table(Executions::Table)
                    .col(Executions::TenantId)
                    .col(Executions::StartedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_executions_workflow_id")
                    .table(Executions::Table)
                    .col(Executions::WorkflowId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_executions_remote_execution_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_executions_tenant_started")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_executions_workflow_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Executions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Executions {
    Table,
    Id,
    TenantId,
    WorkflowId,
    RemoteExecutionId,
    Status,
    Mode,
    Finished,
    StartedAt,
    StoppedAt,
    ExecutionTimeMs,
    IsProduction,
    ErrorMessage,
    DataSizeBytes,
    CreatedAt,
    UpdatedAt,
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

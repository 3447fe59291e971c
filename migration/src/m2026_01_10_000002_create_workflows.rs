//! Migration to create the workflows table.
//!
//! Workflows mirror remote n8n workflow definitions, keyed locally by a
//! UUID and uniquely identified per tenant by the remote workflow id.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Workflows::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Workflows::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Workflows::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Workflows::RemoteWorkflowId).text().not_null())
                    .col(ColumnDef::new(Workflows::Name).text().not_null())
                    .col(
                        ColumnDef::new(Workflows::Active)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Workflows::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Workflows::NodeCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Workflows::ConnectionCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Workflows::TimeSavedPerExecutionMinutes)
                            .integer()
                            .not_null()
                            .default(30),
                    )
                    .col(
                        ColumnDef::new(Workflows::RemoteCreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Workflows::RemoteUpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Workflows::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Workflows::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_workflows_tenant_id")
                            .from(Workflows::Table, Workflows::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key for upserts: one local row per remote workflow per tenant
        manager
            .create_index(
                Index::create()
                    .name("idx_workflows_tenant_remote")
                    .table(Workflows::Table)
                    .col(Workflows::TenantId)
                    .col(Workflows::RemoteWorkflowId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflows_tenant_id")
                    .table(Workflows::Table)
                    .col(Workflows::TenantId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_workflows_tenant_remote").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_workflows_tenant_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Workflows::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Workflows {
    Table,
    Id,
    TenantId,
    RemoteWorkflowId,
    Name,
    Active,
    Archived,
    NodeCount,
    ConnectionCount,
    TimeSavedPerExecutionMinutes,
    RemoteCreatedAt,
    RemoteUpdatedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

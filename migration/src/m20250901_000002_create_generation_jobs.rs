use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GenerationJobs::Table)
                    .if_not_exists()
                    .col(pk_uuid(GenerationJobs::Id))
                    .col(uuid(GenerationJobs::UserId).not_null())
                    .col(string(GenerationJobs::ToolId).not_null())
                    .col(text(GenerationJobs::Prompt).not_null())
                    .col(integer(GenerationJobs::Cost).not_null())
                    // The debit that paid for this job; proves money was taken
                    // before any refund is considered.
                    .col(uuid(GenerationJobs::UsageLogId).not_null())
                    .col(string_len(GenerationJobs::Status, 16).not_null())
                    .col(string_null(GenerationJobs::ResultUrl))
                    .col(text_null(GenerationJobs::ErrorMessage))
                    .col(
                        timestamp_with_time_zone(GenerationJobs::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(GenerationJobs::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_generation_jobs_user_created")
                    .table(GenerationJobs::Table)
                    .col(GenerationJobs::UserId)
                    .col(GenerationJobs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // The stale-job sweep scans on (status, updated_at)
        manager
            .create_index(
                Index::create()
                    .name("idx_generation_jobs_status_updated")
                    .table(GenerationJobs::Table)
                    .col(GenerationJobs::Status)
                    .col(GenerationJobs::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GenerationJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GenerationJobs {
    Table,
    Id,
    UserId,
    ToolId,
    Prompt,
    Cost,
    UsageLogId,
    Status,
    ResultUrl,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

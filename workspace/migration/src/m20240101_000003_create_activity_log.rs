use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Subjects are referenced loosely so entries survive a purge.
        manager
            .create_table(
                Table::create()
                    .table(ActivityLog::Table)
                    .if_not_exists()
                    .col(pk_auto(ActivityLog::Id))
                    .col(string(ActivityLog::LogName))
                    .col(string(ActivityLog::Description))
                    .col(string(ActivityLog::SubjectType))
                    .col(integer(ActivityLog::SubjectId))
                    .col(integer_null(ActivityLog::CauserId))
                    .col(json(ActivityLog::Properties))
                    .col(timestamp_with_time_zone(ActivityLog::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_log_subject")
                    .table(ActivityLog::Table)
                    .col(ActivityLog::SubjectType)
                    .col(ActivityLog::SubjectId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivityLog::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ActivityLog {
    Table,
    Id,
    LogName,
    Description,
    SubjectType,
    SubjectId,
    CauserId,
    Properties,
    CreatedAt,
}

use sea_orm_migration::{prelude::*, schema::*};

use crate::m20240101_000001_create_users_and_roles::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Deleting a user never removes the content it created.
        manager
            .create_table(
                Table::create()
                    .table(Pages::Table)
                    .if_not_exists()
                    .col(pk_auto(Pages::Id))
                    .col(string(Pages::Title))
                    .col(string(Pages::Slug).unique_key())
                    .col(text_null(Pages::Body))
                    .col(string_len(Pages::Status, 20).default("draft"))
                    .col(integer(Pages::CreatedBy))
                    .col(timestamp_with_time_zone(Pages::CreatedAt))
                    .col(timestamp_with_time_zone(Pages::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pages_created_by")
                            .from(Pages::Table, Pages::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(pk_auto(Posts::Id))
                    .col(string(Posts::Title))
                    .col(string(Posts::Slug).unique_key())
                    .col(text_null(Posts::Excerpt))
                    .col(text_null(Posts::Body))
                    .col(string_len(Posts::Status, 20).default("draft"))
                    .col(timestamp_with_time_zone_null(Posts::PublishedAt))
                    .col(integer(Posts::CreatedBy))
                    .col(timestamp_with_time_zone(Posts::CreatedAt))
                    .col(timestamp_with_time_zone(Posts::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_posts_created_by")
                            .from(Posts::Table, Posts::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Media::Table)
                    .if_not_exists()
                    .col(pk_auto(Media::Id))
                    .col(string(Media::FileName))
                    .col(string(Media::Path))
                    .col(string(Media::MimeType))
                    .col(big_integer(Media::Size))
                    .col(string_null(Media::AltText))
                    .col(integer(Media::UploadedBy))
                    .col(timestamp_with_time_zone(Media::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_media_uploaded_by")
                            .from(Media::Table, Media::UploadedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Media::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Pages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Pages {
    Table,
    Id,
    Title,
    Slug,
    Body,
    Status,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
    Title,
    Slug,
    Excerpt,
    Body,
    Status,
    PublishedAt,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Media {
    Table,
    Id,
    FileName,
    Path,
    MimeType,
    Size,
    AltText,
    UploadedBy,
    CreatedAt,
}

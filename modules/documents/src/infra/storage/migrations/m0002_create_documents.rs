use sea_orm::Iterable;
use sea_orm_migration::prelude::*;

use super::m0001_create_users::Users;
use crate::domain::DocumentType;

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
    UserId,
    S3Key,
    Filename,
    DocumentType,
    Title,
    UploadedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let allowed_types: Vec<&'static str> = DocumentType::iter().map(|t| t.as_str()).collect();

        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Documents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Documents::UserId).integer().not_null())
                    .col(ColumnDef::new(Documents::S3Key).text().not_null())
                    .col(ColumnDef::new(Documents::Filename).text().not_null())
                    .col(
                        ColumnDef::new(Documents::DocumentType)
                            .string_len(32)
                            .not_null()
                            .check(Expr::col(Documents::DocumentType).is_in(allowed_types)),
                    )
                    .col(ColumnDef::new(Documents::Title).text().not_null())
                    .col(
                        ColumnDef::new(Documents::UploadedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_documents_user_id")
                            .from(Documents::Table, Documents::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("ux_documents_s3_key")
                    .table(Documents::Table)
                    .col(Documents::S3Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("ix_documents_user_id")
                    .table(Documents::Table)
                    .col(Documents::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await
    }
}

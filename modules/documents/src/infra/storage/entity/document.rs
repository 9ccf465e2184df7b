use std::fmt;

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;

use crate::domain::DocumentType;

/// Metadata of an uploaded file; the content itself lives in object storage
/// under `s3_key`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    #[sea_orm(unique, column_type = "Text")]
    pub s3_key: String,
    #[sea_orm(column_type = "Text")]
    pub filename: String,
    pub document_type: DocumentType,
    #[sea_orm(column_type = "Text")]
    pub title: String,
    pub uploaded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Owner,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert && self.uploaded_at.is_not_set() {
            self.uploaded_at = Set(Utc::now());
        }
        Ok(self)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Document(id={}, user_id={}, s3_key={}, filename={}, document_type={}, title={}, uploaded_at={})",
            self.id,
            self.user_id,
            self.s3_key,
            self.filename,
            self.document_type,
            self.title,
            self.uploaded_at.to_rfc3339()
        )
    }
}

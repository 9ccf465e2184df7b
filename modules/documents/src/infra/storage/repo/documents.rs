use db::ConstraintViolation;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    Select, Set,
};

use super::map_write_err;
use crate::domain::{DocumentType, DomainError};
use crate::infra::storage::entity::{document, user};

/// Data for registering an uploaded document
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub user_id: i32,
    pub s3_key: String,
    pub filename: String,
    pub document_type: DocumentType,
    pub title: String,
}

/// A document together with the user that owns it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentWithOwner {
    pub document: document::Model,
    pub owner: user::Model,
}

pub async fn create_document<C>(
    conn: &C,
    new_doc: NewDocument,
) -> Result<document::Model, DomainError>
where
    C: ConnectionTrait,
{
    let NewDocument {
        user_id,
        s3_key,
        filename,
        document_type,
        title,
    } = new_doc;

    let am = document::ActiveModel {
        user_id: Set(user_id),
        s3_key: Set(s3_key.clone()),
        filename: Set(filename),
        document_type: Set(document_type),
        title: Set(title),
        ..Default::default()
    };

    let created = am.insert(conn).await.map_err(|e| {
        map_write_err(e, |v| match v {
            ConstraintViolation::Unique => Some(DomainError::s3_key_already_exists(s3_key)),
            ConstraintViolation::ForeignKey => Some(DomainError::owner_not_found(user_id)),
        })
    })?;
    tracing::debug!(
        document_id = created.id,
        user_id,
        document_type = %created.document_type,
        "Created document"
    );
    Ok(created)
}

/// Document plus owner in one JOIN.
async fn one_with_owner<C>(
    conn: &C,
    select: Select<document::Entity>,
) -> Result<Option<DocumentWithOwner>, DomainError>
where
    C: ConnectionTrait,
{
    let Some((document, owner)) = select.find_also_related(user::Entity).one(conn).await? else {
        return Ok(None);
    };
    let owner = owner.ok_or_else(|| DomainError::owner_not_found(document.user_id))?;
    Ok(Some(DocumentWithOwner { document, owner }))
}

pub async fn find_document<C>(conn: &C, id: i32) -> Result<Option<DocumentWithOwner>, DomainError>
where
    C: ConnectionTrait,
{
    one_with_owner(conn, document::Entity::find_by_id(id)).await
}

pub async fn find_document_by_s3_key<C>(
    conn: &C,
    s3_key: &str,
) -> Result<Option<DocumentWithOwner>, DomainError>
where
    C: ConnectionTrait,
{
    one_with_owner(
        conn,
        document::Entity::find().filter(document::Column::S3Key.eq(s3_key)),
    )
    .await
}

pub async fn update_document_title<C>(
    conn: &C,
    id: i32,
    title: impl Into<String>,
) -> Result<document::Model, DomainError>
where
    C: ConnectionTrait,
{
    let existing = document::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::document_not_found(id))?;

    let mut am = existing.into_active_model();
    am.title = Set(title.into());
    Ok(am.update(conn).await?)
}

/// Delete a document by ID, returns true if a document was deleted
pub async fn delete_document<C>(conn: &C, id: i32) -> Result<bool, DomainError>
where
    C: ConnectionTrait,
{
    let res = document::Entity::delete_by_id(id).exec(conn).await?;
    Ok(res.rows_affected > 0)
}

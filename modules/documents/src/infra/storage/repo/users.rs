use db::ConstraintViolation;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, ModelTrait,
    QueryFilter, QueryOrder, Set,
};

use super::map_write_err;
use crate::domain::DomainError;
use crate::infra::storage::entity::{document, user};

/// Data for creating a new user
#[derive(Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
}

/// Fields to change on an existing user; `None` leaves the column alone.
#[derive(Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn create_user<C>(conn: &C, new_user: NewUser) -> Result<user::Model, DomainError>
where
    C: ConnectionTrait,
{
    let email = new_user.email.clone();
    let am = user::ActiveModel {
        email: Set(new_user.email),
        hashed_password: Set(new_user.hashed_password),
        ..Default::default()
    };

    let created = am.insert(conn).await.map_err(|e| {
        map_write_err(e, |v| {
            (v == ConstraintViolation::Unique).then(|| DomainError::email_already_exists(email))
        })
    })?;
    tracing::debug!(user_id = created.id, "Created user");
    Ok(created)
}

pub async fn find_user<C>(conn: &C, id: i32) -> Result<Option<user::Model>, DomainError>
where
    C: ConnectionTrait,
{
    Ok(user::Entity::find_by_id(id).one(conn).await?)
}

pub async fn find_user_by_email<C>(
    conn: &C,
    email: &str,
) -> Result<Option<user::Model>, DomainError>
where
    C: ConnectionTrait,
{
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(conn)
        .await?)
}

/// Apply `patch` to user `id`. `updated_at` is refreshed by the entity hook.
pub async fn update_user<C>(
    conn: &C,
    id: i32,
    patch: UserPatch,
) -> Result<user::Model, DomainError>
where
    C: ConnectionTrait,
{
    let existing = user::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::user_not_found(id))?;

    let mut am = existing.into_active_model();
    let new_email = patch.email.clone();
    if let Some(email) = patch.email {
        am.email = Set(email);
    }
    if let Some(hashed_password) = patch.hashed_password {
        am.hashed_password = Set(hashed_password);
    }
    if let Some(is_active) = patch.is_active {
        am.is_active = Set(is_active);
    }

    am.update(conn).await.map_err(|e| {
        map_write_err(e, |v| match (v, new_email) {
            (ConstraintViolation::Unique, Some(email)) => {
                Some(DomainError::email_already_exists(email))
            }
            _ => None,
        })
    })
}

pub async fn set_user_active<C>(
    conn: &C,
    id: i32,
    is_active: bool,
) -> Result<user::Model, DomainError>
where
    C: ConnectionTrait,
{
    update_user(
        conn,
        id,
        UserPatch {
            is_active: Some(is_active),
            ..Default::default()
        },
    )
    .await
}

/// Delete a user and, through the foreign key, all of its documents.
/// Returns true if a user was deleted.
pub async fn delete_user<C>(conn: &C, id: i32) -> Result<bool, DomainError>
where
    C: ConnectionTrait,
{
    let res = user::Entity::delete_by_id(id).exec(conn).await?;
    if res.rows_affected > 0 {
        tracing::debug!(user_id = id, "Deleted user and their documents");
    }
    Ok(res.rows_affected > 0)
}

/// Documents owned by user `id`, oldest upload first.
pub async fn list_documents_for_user<C>(
    conn: &C,
    id: i32,
) -> Result<Vec<document::Model>, DomainError>
where
    C: ConnectionTrait,
{
    let owner = user::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::user_not_found(id))?;

    Ok(owner
        .find_related(document::Entity)
        .order_by_asc(document::Column::UploadedAt)
        .order_by_asc(document::Column::Id)
        .all(conn)
        .await?)
}

//! SeaORM-backed persistence functions.
//!
//! Every function is generic over `C: ConnectionTrait`, so it runs on a
//! [`db::Session`] (`session.conn()`), a raw transaction, or the pooled
//! connection from [`db::DbHandle::sea`].

mod documents;
mod users;

pub use documents::{
    create_document, delete_document, find_document, find_document_by_s3_key,
    update_document_title, DocumentWithOwner, NewDocument,
};
pub use users::{
    create_user, delete_user, find_user, find_user_by_email, list_documents_for_user,
    set_user_active, update_user, NewUser, UserPatch,
};

use db::{errors::classify_db_err, ConstraintViolation};
use sea_orm::DbErr;

use crate::domain::DomainError;

/// Map a failed write to a domain error, translating constraint violations.
pub(crate) fn map_write_err(
    err: DbErr,
    on_violation: impl FnOnce(ConstraintViolation) -> Option<DomainError>,
) -> DomainError {
    match classify_db_err(&err).and_then(on_violation) {
        Some(domain) => domain,
        None => DomainError::from(err),
    }
}

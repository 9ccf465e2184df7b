use db::DbError;
use thiserror::Error;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("User not found: {id}")]
    UserNotFound { id: i32 },

    #[error("Document not found: {id}")]
    DocumentNotFound { id: i32 },

    #[error("User with email '{email}' already exists")]
    EmailAlreadyExists { email: String },

    #[error("Document with s3 key '{s3_key}' already exists")]
    S3KeyAlreadyExists { s3_key: String },

    #[error("Document owner does not exist: user {user_id}")]
    OwnerNotFound { user_id: i32 },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl DomainError {
    pub fn user_not_found(id: i32) -> Self {
        Self::UserNotFound { id }
    }

    pub fn document_not_found(id: i32) -> Self {
        Self::DocumentNotFound { id }
    }

    pub fn email_already_exists(email: impl Into<String>) -> Self {
        Self::EmailAlreadyExists {
            email: email.into(),
        }
    }

    pub fn s3_key_already_exists(s3_key: impl Into<String>) -> Self {
        Self::S3KeyAlreadyExists {
            s3_key: s3_key.into(),
        }
    }

    pub fn owner_not_found(user_id: i32) -> Self {
        Self::OwnerNotFound { user_id }
    }

    /// True for errors caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Database(_))
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::Database(DbError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_separated_from_database_errors() {
        assert!(DomainError::user_not_found(1).is_client_error());
        assert!(DomainError::document_not_found(2).is_client_error());
        assert!(DomainError::email_already_exists("a@b.c").is_client_error());
        assert!(DomainError::s3_key_already_exists("k").is_client_error());
        assert!(DomainError::owner_not_found(3).is_client_error());

        let db = DomainError::from(sea_orm::DbErr::Custom("boom".into()));
        assert!(!db.is_client_error());
        assert!(db.to_string().contains("boom"));
    }
}

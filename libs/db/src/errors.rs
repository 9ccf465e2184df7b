//! Shared database error helpers (SQLSTATE categorization, etc.)

use sea_orm::{DbErr, RuntimeErr, SqlErr};

use crate::DbError;

/// Integrity constraint a write ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintViolation {
    Unique,
    ForeignKey,
}

/// Returns true if the given code represents a unique constraint violation
/// (Postgres 23505, SQLite 2067/1555).
pub fn is_unique_violation_code(code: &str) -> bool {
    matches!(code, "23505" | "2067" | "1555")
}

/// Returns true if the given code represents a foreign key violation
/// (Postgres 23503, SQLite 787).
pub fn is_foreign_key_violation_code(code: &str) -> bool {
    matches!(code, "23503" | "787")
}

pub fn classify_sqlx(err: &sqlx::Error) -> Option<ConstraintViolation> {
    let db = err.as_database_error()?;
    match db.kind() {
        sqlx::error::ErrorKind::UniqueViolation => Some(ConstraintViolation::Unique),
        sqlx::error::ErrorKind::ForeignKeyViolation => Some(ConstraintViolation::ForeignKey),
        _ => {
            let code = db.code()?;
            if is_unique_violation_code(&code) {
                Some(ConstraintViolation::Unique)
            } else if is_foreign_key_violation_code(&code) {
                Some(ConstraintViolation::ForeignKey)
            } else {
                None
            }
        }
    }
}

pub fn classify_db_err(err: &DbErr) -> Option<ConstraintViolation> {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => Some(ConstraintViolation::Unique),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => Some(ConstraintViolation::ForeignKey),
        _ => match err {
            DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
                classify_sqlx(e)
            }
            _ => None,
        },
    }
}

/// Failures that mean "the database is not reachable right now".
pub fn is_sqlx_connectivity(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

pub fn is_seaorm_connectivity(err: &DbErr) -> bool {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => true,
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            is_sqlx_connectivity(e)
        }
        _ => false,
    }
}

impl DbError {
    /// True when retrying later may succeed (server down, network, pool exhausted).
    pub fn is_connectivity(&self) -> bool {
        match self {
            DbError::Sqlx(e) => is_sqlx_connectivity(e),
            DbError::Sea(e) => is_seaorm_connectivity(e),
            DbError::Io(_) | DbError::UnknownDsn(_) | DbError::FeatureDisabled(_) => false,
        }
    }

    /// Constraint the failed statement violated, if any.
    pub fn constraint(&self) -> Option<ConstraintViolation> {
        match self {
            DbError::Sqlx(e) => classify_sqlx(e),
            DbError::Sea(e) => classify_db_err(e),
            _ => None,
        }
    }
}

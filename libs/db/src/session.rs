//! Scoped database sessions.

use sea_orm::DatabaseTransaction;

use crate::{DbError, Result};

/// One unit of work: a transaction pinned to a single pooled connection.
///
/// The session is released exactly once. `commit` persists, `close` discards,
/// and dropping it without either (early return, `?`, panic, cancelled
/// future) rolls back and hands the connection back to the pool: the
/// wrapped transaction queues a rollback when it is dropped unfinished.
pub struct Session {
    tx: DatabaseTransaction,
}

impl Session {
    pub(crate) fn new(tx: DatabaseTransaction) -> Self {
        Self { tx }
    }

    /// Connection to run queries on. Anything implementing SeaORM's
    /// `ConnectionTrait` can be passed here by the repositories.
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.tx
    }

    /// Persist everything done in this session.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(DbError::from)
    }

    /// Discard everything done in this session.
    pub async fn close(self) -> Result<()> {
        self.tx.rollback().await.map_err(DbError::from)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use crate::{ConnectOpts, DbHandle, Result};
    use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

    async fn single_conn_db() -> Result<DbHandle> {
        let opts = ConnectOpts {
            max_conns: Some(1),
            ..ConnectOpts::default()
        };
        let db = DbHandle::connect("sqlite::memory:", opts).await?;
        db.sea()
            .execute_unprepared("CREATE TABLE notes (body TEXT NOT NULL)")
            .await?;
        Ok(db)
    }

    async fn count(db: &DbHandle) -> Result<i64> {
        let row = db
            .sea()
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM notes",
            ))
            .await?
            .expect("count row");
        Ok(row.try_get("", "n")?)
    }

    #[tokio::test]
    async fn commit_persists() -> Result<()> {
        let db = single_conn_db().await?;
        let session = db.session().await?;
        session
            .conn()
            .execute_unprepared("INSERT INTO notes (body) VALUES ('kept')")
            .await?;
        session.commit().await?;
        assert_eq!(count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn close_discards() -> Result<()> {
        let db = single_conn_db().await?;
        let session = db.session().await?;
        session
            .conn()
            .execute_unprepared("INSERT INTO notes (body) VALUES ('gone')")
            .await?;
        session.close().await?;
        assert_eq!(count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn drop_without_commit_rolls_back_and_releases_connection() -> Result<()> {
        let db = single_conn_db().await?;

        async fn fails_midway(db: &DbHandle) -> Result<()> {
            let session = db.session().await?;
            session
                .conn()
                .execute_unprepared("INSERT INTO notes (body) VALUES ('half done')")
                .await?;
            session
                .conn()
                .execute_unprepared("INSERT INTO missing_table VALUES (1)")
                .await?;
            session.commit().await
        }

        assert!(fails_midway(&db).await.is_err());
        // The pool has one connection; this only succeeds if it was handed back.
        assert_eq!(count(&db).await?, 0);
        Ok(())
    }
}

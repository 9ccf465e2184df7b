use db::{run_with_retry, DbError, DbHandle, InitError, RetryPolicy};
use sea_orm_migration::MigratorTrait;

use crate::infra::storage::migrations::Migrator;

/// Create the `users` and `documents` tables if they are missing.
///
/// Runs the migrator through [`run_with_retry`], so a database that is still
/// starting up gets `policy.max_attempts` chances. Safe to call on every start.
pub async fn init_schema(db: &DbHandle, policy: &RetryPolicy) -> Result<(), InitError> {
    let conn = db.sea();
    run_with_retry(policy, "init_schema", || {
        let conn = conn.clone();
        async move { Migrator::up(&conn, None).await.map_err(DbError::from) }
    })
    .await?;

    tracing::info!("Database tables created (if they did not exist)");
    Ok(())
}

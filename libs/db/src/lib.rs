#![cfg_attr(
    not(any(feature = "pg", feature = "sqlite")),
    allow(unused_imports, unused_variables, dead_code, unreachable_code)
)]

//! Connection management for the document store.
//!
//! One [`DbHandle`] is built per process and shared (usually behind an `Arc`).
//! It owns a sqlx pool plus a SeaORM connection over the same pool, hands out
//! scoped [`Session`]s for units of work, and exposes the retry loop used to
//! bring the schema up while the database is still starting.
//!
//! # Features
//! - `pg`: PostgreSQL (production)
//! - `sqlite`: SQLite (tests and local development)
//!
//! # Example
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> db::Result<()> {
//!     use db::{ConnectOpts, DbHandle};
//!
//!     let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default()).await?;
//!     let session = db.session().await?;
//!     // ... run queries against `session.conn()` ...
//!     session.commit().await?;
//!
//!     db.close().await;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod retry;
pub mod session;

pub use errors::ConstraintViolation;
pub use retry::{run_with_retry, InitError, RetryPolicy};
pub use session::Session;

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use sqlx::ConnectOptions;
#[cfg(feature = "pg")]
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
#[cfg(feature = "sqlite")]
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use sea_orm::{DatabaseBackend, DatabaseConnection, TransactionTrait};
#[cfg(feature = "pg")]
use sea_orm::SqlxPostgresConnector;
#[cfg(feature = "sqlite")]
use sea_orm::SqlxSqliteConnector;

use thiserror::Error;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Typed error for the DB handle and helpers.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Unknown DSN: {0}")]
    UnknownDsn(String),

    #[error("Feature not enabled: {0}")]
    FeatureDisabled(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Sea(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Supported engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbEngine {
    Postgres,
    Sqlite,
}

/// Connection options.
/// Each driver applies the subset it supports.
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    /// Maximum number of connections in the pool.
    pub max_conns: Option<u32>,
    /// Minimum number of connections in the pool.
    pub min_conns: Option<u32>,
    /// Timeout to acquire a connection from the pool.
    pub acquire_timeout: Option<Duration>,
    /// Idle timeout before a connection is closed.
    pub idle_timeout: Option<Duration>,
    /// Maximum lifetime for a connection.
    pub max_lifetime: Option<Duration>,
    /// Ping every connection before handing it out; dead ones are replaced.
    pub test_before_acquire: bool,
    /// Log every executed statement at INFO instead of DEBUG.
    pub log_statements: bool,

    /// SQLite-specific: busy timeout.
    pub sqlite_busy_timeout: Option<Duration>,
    /// For SQLite file DSNs, create parent directories if missing.
    pub create_sqlite_dirs: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(10),
            min_conns: None,
            acquire_timeout: Some(Duration::from_secs(30)),
            idle_timeout: None,
            max_lifetime: None,
            test_before_acquire: true,
            log_statements: false,

            sqlite_busy_timeout: Some(Duration::from_millis(5_000)),
            create_sqlite_dirs: true,
        }
    }
}

impl ConnectOpts {
    fn statement_level(&self) -> log::LevelFilter {
        if self.log_statements {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Debug
        }
    }
}

/// One concrete sqlx pool.
#[derive(Clone)]
pub enum DbPool {
    #[cfg(feature = "pg")]
    Postgres(PgPool),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

/// Main handle.
pub struct DbHandle {
    engine: DbEngine,
    pool: DbPool,
    dsn: String,
    sea: DatabaseConnection,
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("engine", &self.engine)
            .field("dsn", &self.redacted_dsn())
            .finish()
    }
}

impl DbHandle {
    /// Detect engine by DSN.
    ///
    /// Only the scheme prefix is checked; the tail (credentials etc.) is left alone.
    pub fn detect(dsn: &str) -> Result<DbEngine> {
        // Trim only leading spaces/newlines to be forgiving with env files.
        let s = dsn.trim_start();

        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            Ok(DbEngine::Postgres)
        } else if s.starts_with("sqlite:") {
            Ok(DbEngine::Sqlite)
        } else {
            Err(DbError::UnknownDsn(redact_credentials_in_dsn(Some(dsn))))
        }
    }

    /// Connect and build handle. Fails if the database cannot be reached.
    pub async fn connect(dsn: &str, opts: ConnectOpts) -> Result<Self> {
        Self::build(dsn, &opts, false).await
    }

    /// Build the handle without opening a connection.
    ///
    /// The first query (or [`run_with_retry`]) pays the connection cost, so a
    /// process can create its engine before the database is up.
    pub async fn connect_lazy(dsn: &str, opts: ConnectOpts) -> Result<Self> {
        Self::build(dsn, &opts, true).await
    }

    async fn build(dsn: &str, opts: &ConnectOpts, lazy: bool) -> Result<Self> {
        let engine = Self::detect(dsn)?;
        let dsn = dsn.trim_start();
        tracing::debug!(
            dsn = %redact_credentials_in_dsn(Some(dsn)),
            ?engine,
            lazy,
            "Building database connection"
        );

        match engine {
            #[cfg(feature = "pg")]
            DbEngine::Postgres => {
                let conn_opts = PgConnectOptions::from_str(dsn)?
                    .log_statements(opts.statement_level());
                let mut o = PgPoolOptions::new();
                if let Some(n) = opts.max_conns {
                    o = o.max_connections(n);
                }
                if let Some(n) = opts.min_conns {
                    o = o.min_connections(n);
                }
                if let Some(t) = opts.acquire_timeout {
                    o = o.acquire_timeout(t);
                }
                if let Some(t) = opts.idle_timeout {
                    o = o.idle_timeout(t);
                }
                if let Some(t) = opts.max_lifetime {
                    o = o.max_lifetime(t);
                }
                o = o.test_before_acquire(opts.test_before_acquire);

                let pool = if lazy {
                    o.connect_lazy_with(conn_opts)
                } else {
                    o.connect_with(conn_opts).await?
                };
                let sea = SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone());
                Ok(Self {
                    engine,
                    pool: DbPool::Postgres(pool),
                    dsn: dsn.to_string(),
                    sea,
                })
            }
            #[cfg(feature = "sqlite")]
            DbEngine::Sqlite => {
                prepare_sqlite_path(dsn, opts.create_sqlite_dirs)?;
                let in_memory = dsn.contains(":memory:") || dsn.contains("mode=memory");

                let mut conn_opts = SqliteConnectOptions::from_str(dsn)?
                    .create_if_missing(true)
                    .foreign_keys(true)
                    .log_statements(opts.statement_level());
                if !in_memory {
                    conn_opts = conn_opts.journal_mode(SqliteJournalMode::Wal);
                }
                if let Some(busy) = opts.sqlite_busy_timeout {
                    conn_opts = conn_opts.busy_timeout(busy);
                }

                let mut o = SqlitePoolOptions::new();
                if let Some(n) = opts.max_conns {
                    o = o.max_connections(n);
                }
                if let Some(n) = opts.min_conns {
                    o = o.min_connections(n);
                }
                if let Some(t) = opts.acquire_timeout {
                    o = o.acquire_timeout(t);
                }
                // A private in-memory database lives only as long as its connection.
                if !in_memory {
                    if let Some(t) = opts.idle_timeout {
                        o = o.idle_timeout(t);
                    }
                    if let Some(t) = opts.max_lifetime {
                        o = o.max_lifetime(t);
                    }
                } else {
                    o = o.idle_timeout(None).max_lifetime(None);
                }
                o = o.test_before_acquire(opts.test_before_acquire);

                let pool = if lazy {
                    o.connect_lazy_with(conn_opts)
                } else {
                    o.connect_with(conn_opts).await?
                };
                let sea = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool.clone());
                Ok(Self {
                    engine,
                    pool: DbPool::Sqlite(pool),
                    dsn: dsn.to_string(),
                    sea,
                })
            }
            #[cfg(not(feature = "pg"))]
            DbEngine::Postgres => Err(DbError::FeatureDisabled("PostgreSQL feature not enabled")),
            #[cfg(not(feature = "sqlite"))]
            DbEngine::Sqlite => Err(DbError::FeatureDisabled("SQLite feature not enabled")),
        }
    }

    /// Graceful pool close. (Dropping the pool also closes it; this just makes it explicit.)
    pub async fn close(self) {
        match self.pool {
            #[cfg(feature = "pg")]
            DbPool::Postgres(p) => p.close().await,
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(p) => p.close().await,
        }
    }

    /// Get the backend.
    pub fn engine(&self) -> DbEngine {
        self.engine
    }

    /// SeaORM backend matching [`Self::engine`].
    pub fn backend(&self) -> DatabaseBackend {
        match self.engine {
            DbEngine::Postgres => DatabaseBackend::Postgres,
            DbEngine::Sqlite => DatabaseBackend::Sqlite,
        }
    }

    /// DSN with the password masked, safe for logs.
    pub fn redacted_dsn(&self) -> String {
        redact_credentials_in_dsn(Some(&self.dsn))
    }

    // --- sqlx accessors ---
    #[cfg(feature = "pg")]
    pub fn sqlx_postgres(&self) -> Option<&PgPool> {
        match self.pool {
            DbPool::Postgres(ref p) => Some(p),
            #[cfg(feature = "sqlite")]
            _ => None,
        }
    }

    #[cfg(feature = "sqlite")]
    pub fn sqlx_sqlite(&self) -> Option<&SqlitePool> {
        match self.pool {
            DbPool::Sqlite(ref p) => Some(p),
            #[cfg(feature = "pg")]
            _ => None,
        }
    }

    // --- SeaORM accessor ---

    /// Pooled SeaORM connection (cheap clone). Each statement runs in autocommit mode.
    pub fn sea(&self) -> DatabaseConnection {
        self.sea.clone()
    }

    // --- sessions ---

    /// Open a scoped session: one transaction on one pooled connection.
    ///
    /// Nothing is persisted unless [`Session::commit`] is called; dropping the
    /// session on any other path rolls back and returns the connection.
    pub async fn session(&self) -> Result<Session> {
        let tx = self.sea.begin().await?;
        Ok(Session::new(tx))
    }

    /// Run `f` inside a session, committing on `Ok` and rolling back on `Err`.
    pub async fn with_session<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: for<'c> FnOnce(&'c Session) -> Pin<Box<dyn Future<Output = std::result::Result<T, E>> + Send + 'c>>,
        E: From<DbError>,
    {
        let session = self.session().await?;
        let res = f(&session).await;
        match res {
            Ok(v) => {
                session.commit().await?;
                Ok(v)
            }
            Err(e) => {
                // Best-effort rollback; keep the original error.
                if let Err(rb) = session.close().await {
                    tracing::warn!(error = %rb, "Rollback after failed unit of work also failed");
                }
                Err(e)
            }
        }
    }
}

// ===================== helpers =====================

/// Replace the password in a DSN with `***`.
pub fn redact_credentials_in_dsn(dsn: Option<&str>) -> String {
    match dsn {
        Some(dsn) if dsn.contains('@') => {
            if let Ok(mut parsed) = url::Url::parse(dsn) {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("***"));
                }
                parsed.to_string()
            } else {
                "***".to_string()
            }
        }
        Some(dsn) => dsn.to_string(),
        None => "none".to_string(),
    }
}

#[cfg(feature = "sqlite")]
fn prepare_sqlite_path(dsn: &str, create_dirs: bool) -> Result<()> {
    // Only plain file paths have a directory to create.
    if !create_dirs || dsn.contains(":memory:") {
        return Ok(());
    }

    let raw = if let Some(rest) = dsn.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = dsn.strip_prefix("sqlite:") {
        rest
    } else {
        dsn
    };

    if !raw.starts_with("file:") && !raw.contains('?') {
        if let Some(parent) = std::path::Path::new(raw).parent() {
            if !parent.as_os_str().is_empty() {
                // One-time blocking call during startup.
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    Ok(())
}

// ===================== tests =====================

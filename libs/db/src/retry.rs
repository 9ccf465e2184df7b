//! Bounded retry for startup work that needs a reachable database.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::DbError;

/// Fixed-delay retry budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Error)]
pub enum InitError {
    /// The database stayed unreachable for the whole budget.
    #[error("database unreachable after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: DbError,
    },
    /// Reached the database but the operation itself failed; not retried.
    #[error("database initialization failed")]
    Fatal(#[source] DbError),
}

impl InitError {
    pub fn source_error(&self) -> &DbError {
        match self {
            InitError::Exhausted { source, .. } => source,
            InitError::Fatal(source) => source,
        }
    }
}

/// Run `op` until it succeeds, retrying only connectivity failures.
///
/// Connectivity errors (see [`DbError::is_connectivity`]) sleep `policy.delay`
/// and try again until `policy.max_attempts` is spent. Anything else aborts on
/// the spot. `label` names the operation in log events.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, InitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        tracing::info!(
            operation = label,
            attempt,
            max_attempts,
            "Attempting to connect to the database"
        );

        let err = match op().await {
            Ok(v) => {
                tracing::info!(operation = label, attempt, "Database ready");
                return Ok(v);
            }
            Err(e) => e,
        };

        if !err.is_connectivity() {
            tracing::error!(
                operation = label,
                attempt,
                error = %err,
                "Unexpected database error; giving up"
            );
            return Err(InitError::Fatal(err));
        }

        tracing::error!(
            operation = label,
            attempt,
            max_attempts,
            error = %err,
            "Database connection failed"
        );

        if attempt >= max_attempts {
            tracing::error!(
                operation = label,
                attempts = attempt,
                "Could not reach the database; retry budget exhausted"
            );
            return Err(InitError::Exhausted {
                attempts: attempt,
                source: err,
            });
        }

        tracing::info!(
            operation = label,
            delay_secs = policy.delay.as_secs_f64(),
            "Retrying in {:?}",
            policy.delay
        );
        tokio::time::sleep(policy.delay).await;
    }
}

//! Connection pool + transaction helpers. The storage kernel's triggers are
//! the last line of defense (§4.1); everything here just gets a connection
//! there and back out again without leaking it on any exit path.

use crate::config::CoreConfig;
use crate::error::{HustleXpError, HustleXpResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use tracing::{error, info};

#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

impl Storage {
    pub async fn connect(config: &CoreConfig) -> HustleXpResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| HustleXpError::internal(format!("failed to connect to database: {e}")))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wrap an already-constructed pool. Used by `#[sqlx::test]` harnesses,
    /// which own pool setup/teardown themselves.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending migrations. The kernel's schema, triggers, and append-only
    /// guards all live under `storage/migrations/`.
    pub async fn migrate(&self) -> HustleXpResult<()> {
        sqlx::migrate!("./src/storage/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| HustleXpError::internal(format!("migration failed: {e}")))?;

        info!("storage kernel migrations applied");
        Ok(())
    }

    /// BEGIN, run `f` with the bound transaction, COMMIT on `Ok`, ROLLBACK on
    /// `Err`. Rollback failures are logged and never replace the original
    /// error (§9 design note on transaction helpers).
    pub async fn with_transaction<T, F, Fut>(&self, f: F) -> HustleXpResult<T>
    where
        F: FnOnce(Transaction<'_, Postgres>) -> Fut,
        Fut: Future<Output = HustleXpResult<(Transaction<'_, Postgres>, T)>>,
    {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| HustleXpError::from(e))?;

        match f(tx).await {
            Ok((tx, value)) => {
                tx.commit()
                    .await
                    .map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
                Ok(value)
            }
            Err(original) => Err(original),
        }
    }

    /// Variant used by `awardXP` (§4.8): SERIALIZABLE isolation so the
    /// read-snapshot-then-insert sequence can't race another award for the
    /// same user.
    pub async fn with_serializable_transaction<T, F, Fut>(&self, f: F) -> HustleXpResult<T>
    where
        F: FnOnce(Transaction<'_, Postgres>) -> Fut,
        Fut: Future<Output = HustleXpResult<(Transaction<'_, Postgres>, T)>>,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| HustleXpError::from(e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(HustleXpError::from)?;

        match f(tx).await {
            Ok((tx, value)) => {
                tx.commit()
                    .await
                    .map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
                Ok(value)
            }
            Err(original) => {
                error!(error = %original, "serializable transaction failed");
                Err(original)
            }
        }
    }
}

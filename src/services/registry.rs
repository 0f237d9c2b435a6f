use crate::adapters::database::DbPool;
use crate::adapters::database::chat_repo::ChatRepository;
use crate::config::MessagingConfig;
use crate::error::{AppError, Result};
use crate::services::update_publisher::UpdatePublisher;
use futures::FutureExt;
use futures::future::BoxFuture;
use sqlx::{PgConnection, Postgres, Transaction};
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Transaction-bound view handed to a unit of work.
///
/// Every repository call made through [`Scope::conn`] joins the same transaction. The
/// publisher is shared with the registry and is not transactional.
pub struct Scope {
    tx: Transaction<'static, Postgres>,
    chats: ChatRepository,
    updates: UpdatePublisher,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("chats", &self.chats).field("updates", &self.updates).finish_non_exhaustive()
    }
}

impl Scope {
    #[must_use]
    pub const fn chats(&self) -> ChatRepository {
        self.chats
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    #[must_use]
    pub const fn updates(&self) -> &UpdatePublisher {
        &self.updates
    }
}

/// Unit-of-work coordinator.
///
/// Units of work do not nest: each externally visible operation makes exactly one
/// [`Registry::atomic`] call.
#[derive(Clone, Debug)]
pub struct Registry {
    pool: DbPool,
    chats: ChatRepository,
    updates: UpdatePublisher,
    deadline: Duration,
}

impl Registry {
    #[must_use]
    pub fn new(pool: DbPool, chats: ChatRepository, updates: UpdatePublisher, config: &MessagingConfig) -> Self {
        Self { pool, chats, updates, deadline: Duration::from_millis(config.operation_timeout_ms) }
    }

    #[must_use]
    pub const fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[must_use]
    pub const fn chats(&self) -> ChatRepository {
        self.chats
    }

    /// Runs `operation` inside one database transaction.
    ///
    /// The transaction commits when `operation` returns `Ok` and rolls back when it returns an
    /// error, panics, overruns the deadline or is cancelled by dropping the returned future.
    /// Errors from `operation` are returned unchanged; a panic is re-raised after the rollback.
    ///
    /// # Errors
    /// Returns the error produced by `operation`.
    /// Returns `AppError::Database` if the transaction cannot be opened or committed.
    /// Returns `AppError::Timeout` if the deadline expires first.
    pub async fn atomic<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut Scope) -> BoxFuture<'s, Result<T>> + Send,
    {
        self.within_deadline(self.run(operation)).await
    }

    /// Bounds a read that runs outside a transaction by the same deadline as a unit of work.
    ///
    /// # Errors
    /// Returns the error produced by `operation`.
    /// Returns `AppError::Timeout` if the deadline expires first.
    pub async fn within_deadline<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        if let Ok(result) = tokio::time::timeout(self.deadline, operation).await {
            result
        } else {
            tracing::warn!(deadline_ms = %self.deadline.as_millis(), "Operation exceeded its deadline");
            Err(AppError::Timeout)
        }
    }

    async fn run<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut Scope) -> BoxFuture<'s, Result<T>> + Send,
    {
        let tx = self.pool.begin().await?;
        let mut scope = Scope { tx, chats: self.chats, updates: self.updates.clone() };

        let outcome = AssertUnwindSafe(async { operation(&mut scope).await }).catch_unwind().await;

        match outcome {
            Ok(Ok(value)) => {
                scope.tx.commit().await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(rollback_err) = scope.tx.rollback().await {
                    tracing::error!(error = %rollback_err, cause = %err, "Rollback failed");
                }
                Err(err)
            }
            Err(panic) => {
                if let Err(rollback_err) = scope.tx.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback after panic failed");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

//! Database client.
//!
//! [`Db`] wraps the deadpool connection pool and carries the installed
//! change notifier. The pool's lifecycle (open at process start, close at
//! shutdown) is owned by the composition root, which constructs one `Db` and
//! hands clones to whoever needs them - there is no lazily-initialized
//! global connection state anywhere in this crate.

use crate::config::DbConfig;
use crate::error::DbResult;
use crate::notify::{ChangeEvent, ChangeNotifier, NoopNotifier};
use deadpool_postgres::Pool;
use std::sync::Arc;

/// Database client: connection pool plus change-notification sink.
#[derive(Clone)]
pub struct Db {
    pool: Pool,
    notifier: Arc<dyn ChangeNotifier>,
}

impl Db {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> DbResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Install a change notifier for committed writes.
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Get a connection from the pool.
    pub(crate) async fn conn(&self) -> DbResult<deadpool_postgres::Object> {
        Ok(self.pool.get().await?)
    }

    /// Hand a committed change to the notifier, fire-and-forget.
    ///
    /// Runs on a spawned task so publishing can never block the caller's
    /// response, and a publish failure can never affect the already-committed
    /// transaction.
    pub(crate) fn publish(&self, event: ChangeEvent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier.publish(event).await {
                tracing::error!(error = %err, "change notification dropped");
            }
        });
    }
}

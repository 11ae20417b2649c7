use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sqlx::pool::PoolOptions;
use sqlx::MySqlPool;
use tokio::sync::{watch, Mutex as AsyncMutex, OwnedMutexGuard};

use crate::config::Config;
use crate::model::TournamentId;
use crate::notify::{self, Notifier};
use crate::store::Store;
use crate::Error;

#[derive(Clone, Debug)]
pub struct State(Arc<StateInner>);

impl State {
    pub fn new(config: Config, shutdown_rx: watch::Receiver<()>) -> Result<Self, Error> {
        let pool: MySqlPool = PoolOptions::new()
            .min_connections(0)
            .max_connections(8)
            .max_lifetime(Duration::new(3600, 0))
            .idle_timeout(Duration::new(60, 0))
            .connect_lazy(&config.database.connect_string())?;

        let store = Store {
            pool,
            table_prefix: config.database.prefix.clone(),
        };

        let notifier = notify::spawn(config.notify.webhook.clone());

        Ok(Self(Arc::new(StateInner {
            store,
            config,
            locks: TournamentLocks::default(),
            notifier,
            shutdown_rx,
        })))
    }
}

impl Deref for State {
    type Target = StateInner;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct StateInner {
    pub store: Store,
    pub config: Config,
    pub locks: TournamentLocks,
    pub notifier: Notifier,
    pub shutdown_rx: watch::Receiver<()>,
}

/// Serializes all writing operations on the same tournament within this process.
///
/// Draws, publications, results and scheduling runs of one tournament all read and write
/// the shared court calendar. Operations on different tournaments do not block each other.
#[derive(Debug, Default)]
pub struct TournamentLocks {
    locks: Mutex<HashMap<TournamentId, Arc<AsyncMutex<()>>>>,
}

impl TournamentLocks {
    /// Waits until no other operation holds the lock for `id`.
    pub async fn lock(&self, id: TournamentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();

            // Forget locks nobody is waiting for.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);

            locks.entry(id).or_default().clone()
        };

        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::TournamentLocks;
    use crate::model::TournamentId;

    #[tokio::test]
    async fn test_tournament_locks() {
        let locks = Arc::new(TournamentLocks::default());

        let guard = locks.lock(TournamentId(1)).await;

        // A different tournament is not blocked.
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock(TournamentId(2)));
        assert!(other.await.is_ok());

        // The same tournament is.
        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock(TournamentId(1)));
        assert!(same.await.is_err());

        drop(guard);
        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock(TournamentId(1)));
        assert!(same.await.is_ok());
    }
}

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use mood_types::models::UserId;
use tokio::sync::watch;
use tracing::debug;

use crate::config::SyncConfig;
use crate::state::{Snapshot, SyncState};

pub const USERS: &str = "users";
pub const MOODS: &str = "moods";
pub const REACTIONS: &str = "reactions";

/// One signed-in identity's view of the remote stores.
///
/// Cloning is cheap and every clone shares the same [`SyncState`].
pub struct Session<S, O, M> {
    pub(crate) identity: UserId,
    pub(crate) store: Arc<S>,
    pub(crate) objects: Arc<O>,
    pub(crate) staging: Arc<M>,
    pub(crate) config: SyncConfig,
    pub(crate) state: Arc<SyncState>,
}

impl<S, O, M> Clone for Session<S, O, M> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            store: self.store.clone(),
            objects: self.objects.clone(),
            staging: self.staging.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S, O, M> Session<S, O, M> {
    pub fn new(
        identity: UserId,
        store: Arc<S>,
        objects: Arc<O>,
        staging: Arc<M>,
        config: SyncConfig,
    ) -> Self {
        Self {
            identity,
            store,
            objects,
            staging,
            config,
            state: Arc::new(SyncState::new()),
        }
    }

    pub fn identity(&self) -> &UserId {
        &self.identity
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Run a remote call under the session's request timeout.
    pub(crate) async fn timed<T, F>(&self, op: &str, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        debug!("{} ({})", op, self.identity);
        match tokio::time::timeout(self.config.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "{} timed out after {:?}",
                op,
                self.config.request_timeout
            )),
        }
    }
}

// src/engine/registry.rs

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::{
    sync::RwLock,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use super::{
    error::SessionError,
    runtime::{SessionHandle, SessionSettings},
};

/// Live sessions of one host, keyed by session id.
///
/// Owned by the host state and passed explicitly; there is no process-wide instance.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Suspends and removes any live instance of `session_id`.
    ///
    /// The old instance is exited so its latest state is saved and its timers stop
    /// before a replacement starts. Fails if that instance has a submission in flight.
    pub async fn discard(&self, session_id: &str) -> Result<(), SessionError> {
        let Some(existing) = self.get(session_id).await else {
            return Ok(());
        };

        match existing.exit().await {
            Ok(()) | Err(SessionError::Terminated) => {}
            Err(e) => return Err(e),
        }

        let mut sessions = self.sessions.write().await;
        if sessions
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, &existing))
        {
            sessions.remove(session_id);
        }
        tracing::debug!("Discarded in-memory session {}", session_id);
        Ok(())
    }

    /// Registers `handle`. Any instance previously stored under the same id is dropped,
    /// which cancels its timers.
    pub async fn insert(&self, handle: SessionHandle) -> Arc<SessionHandle> {
        let handle = Arc::new(handle);
        let previous = self
            .sessions
            .write()
            .await
            .insert(handle.session_id().to_string(), handle.clone());
        if previous.is_some() {
            tracing::warn!("Replaced live session {}", handle.session_id());
        }
        handle
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.write().await.remove(session_id)
    }

    /// Drops sessions that settled more than `retention` ago. Returns how many went.
    pub async fn evict_settled(&self, retention: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| {
            handle
                .settled_at()
                .is_none_or(|settled| now.duration_since(settled) < retention)
        });
        before - sessions.len()
    }

    /// Periodically evicts settled sessions. Stops once the registry is dropped.
    pub fn spawn_sweeper(registry: &Arc<SessionRegistry>, settings: &SessionSettings) -> JoinHandle<()> {
        tokio::spawn(run_sweeper(
            Arc::downgrade(registry),
            settings.sweep_interval,
            settings.settled_retention,
        ))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

async fn run_sweeper(registry: Weak<SessionRegistry>, period: Duration, retention: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(registry) = registry.upgrade() else {
            break;
        };
        let evicted = registry.evict_settled(retention).await;
        if evicted > 0 {
            tracing::debug!("Evicted {} settled sessions", evicted);
        }
    }
}

//! Agent sessions and their registry
//!
//! The registry is the sole owner of session lifetime. A session is live from
//! insertion until it is replaced, removed, or evicted for idleness by the
//! background sweeper.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use super::react::ReActAgent;

/// One conversation's agent plus its bookkeeping
pub struct Session {
    conversation_id: String,
    agent: AsyncMutex<ReActAgent>,
    allowed_document_ids: Option<Vec<String>>,
    created_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        conversation_id: impl Into<String>,
        agent: ReActAgent,
        allowed_document_ids: Option<Vec<String>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            agent: AsyncMutex::new(agent),
            allowed_document_ids,
            created_at: now,
            last_activity: Mutex::new(now),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn allowed_document_ids(&self) -> Option<&[String]> {
        self.allowed_document_ids.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock()
    }

    /// Record activity now
    pub fn touch(&self) {
        *self.last_activity.lock() = Utc::now();
    }

    /// Exclusive access to the agent for one chat turn
    pub async fn agent(&self) -> tokio::sync::MutexGuard<'_, ReActAgent> {
        self.agent.lock().await
    }

    /// Whether a chat turn currently holds the agent
    pub fn is_busy(&self) -> bool {
        self.agent.try_lock().is_err()
    }

    fn is_idle_at(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_activity()) > ttl
    }
}

/// Concurrent map of live sessions keyed by conversation id
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    ttl: chrono::Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Insert a session, replacing and returning any previous one
    pub fn insert(&self, session: Session) -> Option<Arc<Session>> {
        let id = session.conversation_id.clone();
        self.sessions.insert(id, Arc::new(session))
    }

    /// Shared handle to a live session. The map guard is released on return.
    pub fn get(&self, conversation_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .get(conversation_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, conversation_id: &str) -> bool {
        self.sessions.remove(conversation_id).is_some()
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.sessions.contains_key(conversation_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evict sessions idle for longer than the TTL as of `now`.
    ///
    /// Sessions with a chat turn in progress are kept. Returns evicted ids.
    pub fn sweep_idle_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut evicted = Vec::new();
        self.sessions.retain(|id, session| {
            if session.is_busy() || !session.is_idle_at(now, self.ttl) {
                return true;
            }
            evicted.push(id.clone());
            false
        });

        if !evicted.is_empty() {
            tracing::info!(
                "Evicted {} idle sessions ({} live)",
                evicted.len(),
                self.sessions.len()
            );
        }
        evicted
    }

    /// Evict sessions idle for longer than the TTL
    pub fn sweep_idle(&self) -> Vec<String> {
        self.sweep_idle_at(Utc::now())
    }

    /// Spawn the periodic eviction task. Must be called inside a Tokio runtime.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        registry.sweep_idle();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Session sweeper stopped");
        });

        tracing::debug!("Session sweeper started (every {:?})", interval);
        SweeperHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

/// Handle to the background sweeper; dropping it also stops the task
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Session sweeper ended abnormally: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

//! Routing filesystem operations to per-session adapters.
//!
//! The router owns the session table. The first access to a session id opens
//! it through the [`SessionOpener`]; concurrent accesses while that open is in
//! flight share the same future, so each id is opened at most once at a time.
//! A session whose file channel closes permanently is dropped from the table
//! and re-opened on the next access.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use repl_bridge_core::{
    ChangeBatch, ChangeEmitter, DeleteOptions, DirEntry, FileStat, FsError, RenameOptions,
    ResourceId, WatchHandle, WriteOptions, events::DEFAULT_CAPACITY, path::DEFAULT_SCHEME,
};
use repl_bridge_transport::{ChannelStatus, Transport};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{
    adapter::FilesystemAdapter,
    opener::{OpenError, SessionOpener},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// URI scheme of host-visible resources. Error messages name resources
    /// in this scheme.
    pub scheme: String,
    /// Change batches buffered per listener before a slow one starts
    /// missing the oldest.
    pub event_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            event_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Snapshot of one open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub display_name: String,
    pub channel_state: ChannelStatus,
}

struct SessionEntry {
    display_name: String,
    transport: Arc<dyn Transport>,
    adapter: Arc<FilesystemAdapter>,
}

type PendingOpen = Shared<BoxFuture<'static, Result<Arc<SessionEntry>, OpenError>>>;

enum Slot {
    Ready(Arc<SessionEntry>),
    /// `attempt` tells a finishing open whether its slot was replaced meanwhile.
    Opening { attempt: u64, pending: PendingOpen },
}

/// Owns every session and dispatches operations by session id.
pub struct MultiSessionRouter {
    config: RouterConfig,
    opener: Arc<dyn SessionOpener>,
    events: ChangeEmitter,
    sessions: Mutex<HashMap<String, Slot>>,
    attempts: AtomicU64,
}

impl MultiSessionRouter {
    #[must_use]
    pub fn new(opener: Arc<dyn SessionOpener>) -> Arc<Self> {
        Self::with_config(opener, RouterConfig::default())
    }

    #[must_use]
    pub fn with_config(opener: Arc<dyn SessionOpener>, config: RouterConfig) -> Arc<Self> {
        Arc::new(Self {
            events: ChangeEmitter::with_capacity(config.event_capacity),
            config,
            opener,
            sessions: Mutex::new(HashMap::new()),
            attempts: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Receiver for change batches from every session.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.events.subscribe()
    }

    /// Stream of change batches from every session.
    #[must_use]
    pub fn events(&self) -> futures::stream::BoxStream<'static, ChangeBatch> {
        self.events.stream()
    }

    /// Adapter for `session_id`, opening the session if needed.
    ///
    /// # Errors
    /// Returns the opener's error. Nothing is cached on failure; the next
    /// call tries again.
    pub async fn resolve(self: &Arc<Self>, session_id: &str) -> Result<Arc<FilesystemAdapter>, OpenError> {
        Ok(Arc::clone(&self.entry(session_id).await?.adapter))
    }

    /// Transport of `session_id`, opening the session if needed.
    ///
    /// # Errors
    /// See [`MultiSessionRouter::resolve`].
    pub async fn transport(self: &Arc<Self>, session_id: &str) -> Result<Arc<dyn Transport>, OpenError> {
        Ok(Arc::clone(&self.entry(session_id).await?.transport))
    }

    /// Register a session that is already connected.
    ///
    /// Replaces (and closes) any session registered under the same id.
    pub fn add_session(
        self: &Arc<Self>,
        session_id: &str,
        display_name: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Arc<FilesystemAdapter> {
        let entry = self.register_entry(session_id, display_name.into(), transport);
        let previous = lock(&self.sessions).insert(session_id.to_string(), Slot::Ready(Arc::clone(&entry)));
        if let Some(Slot::Ready(previous)) = previous {
            previous.adapter.close();
        }
        tracing::info!(session = session_id, name = %entry.display_name, "Session added");
        Arc::clone(&entry.adapter)
    }

    /// Drop a session, closing its channels. Returns whether it was known.
    pub fn remove_session(&self, session_id: &str) -> bool {
        let removed = lock(&self.sessions).remove(session_id);
        match removed {
            Some(Slot::Ready(entry)) => {
                tracing::info!(session = session_id, "Session removed");
                entry.adapter.close();
                true
            }
            Some(Slot::Opening { .. }) => {
                tracing::info!(session = session_id, "Session removed while opening");
                true
            }
            None => false,
        }
    }

    /// Every open session, ordered by id.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<_> = lock(&self.sessions)
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Ready(entry) => Some(SessionInfo {
                    id: id.clone(),
                    display_name: entry.display_name.clone(),
                    channel_state: entry.adapter.status(),
                }),
                Slot::Opening { .. } => None,
            })
            .collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions
    }

    /// # Errors
    /// `Unavailable` if the session cannot be opened, otherwise see
    /// [`FilesystemAdapter::stat`].
    pub async fn stat(self: &Arc<Self>, resource: &ResourceId) -> Result<FileStat, FsError> {
        let result = self.adapter_for(resource).await?.stat(resource).await;
        self.in_scheme(result)
    }

    /// # Errors
    /// See [`FilesystemAdapter::read_directory`].
    pub async fn read_directory(self: &Arc<Self>, resource: &ResourceId) -> Result<Vec<DirEntry>, FsError> {
        let result = self.adapter_for(resource).await?.read_directory(resource).await;
        self.in_scheme(result)
    }

    /// # Errors
    /// See [`FilesystemAdapter::read_file`].
    pub async fn read_file(self: &Arc<Self>, resource: &ResourceId) -> Result<Bytes, FsError> {
        let result = self.adapter_for(resource).await?.read_file(resource).await;
        self.in_scheme(result)
    }

    /// # Errors
    /// See [`FilesystemAdapter::write_file`].
    pub async fn write_file(
        self: &Arc<Self>,
        resource: &ResourceId,
        content: Bytes,
        options: WriteOptions,
    ) -> Result<(), FsError> {
        let result = self
            .adapter_for(resource)
            .await?
            .write_file(resource, content, options)
            .await;
        self.in_scheme(result)
    }

    /// # Errors
    /// See [`FilesystemAdapter::create_directory`].
    pub async fn create_directory(self: &Arc<Self>, resource: &ResourceId) -> Result<(), FsError> {
        let result = self.adapter_for(resource).await?.create_directory(resource).await;
        self.in_scheme(result)
    }

    /// # Errors
    /// See [`FilesystemAdapter::delete`].
    pub async fn delete(self: &Arc<Self>, resource: &ResourceId, options: DeleteOptions) -> Result<(), FsError> {
        let result = self.adapter_for(resource).await?.delete(resource, options).await;
        self.in_scheme(result)
    }

    /// # Errors
    /// `Unknown` when `old` and `new` are in different sessions; otherwise see
    /// [`FilesystemAdapter::rename`].
    pub async fn rename(
        self: &Arc<Self>,
        old: &ResourceId,
        new: &ResourceId,
        options: RenameOptions,
    ) -> Result<(), FsError> {
        if old.session_id() != new.session_id() {
            let scheme = &self.config.scheme;
            return Err(FsError::Unknown(format!(
                "cannot move {} to {}: different sessions",
                old.to_uri(scheme),
                new.to_uri(scheme)
            )));
        }
        let result = self.adapter_for(old).await?.rename(old, new, options).await;
        self.in_scheme(result)
    }

    /// Changes are reported for every operation; nothing to register.
    #[must_use]
    pub const fn watch(&self, _resource: &ResourceId) -> WatchHandle {
        WatchHandle
    }

    fn in_scheme<T>(&self, result: Result<T, FsError>) -> Result<T, FsError> {
        result.map_err(|e| e.map_target(|target| ResourceId::rescheme(target, &self.config.scheme)))
    }

    async fn adapter_for(self: &Arc<Self>, resource: &ResourceId) -> Result<Arc<FilesystemAdapter>, FsError> {
        self.resolve(resource.session_id())
            .await
            .map_err(|e| FsError::Unavailable(format!("{}: {e}", resource.session_id())))
    }

    async fn entry(self: &Arc<Self>, session_id: &str) -> Result<Arc<SessionEntry>, OpenError> {
        let pending = {
            let mut sessions = lock(&self.sessions);
            match sessions.get(session_id) {
                Some(Slot::Ready(entry)) => return Ok(Arc::clone(entry)),
                Some(Slot::Opening { pending, .. }) => pending.clone(),
                None => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(session = session_id, attempt, "Opening session");
                    let pending = Self::open_session(
                        Arc::downgrade(self),
                        Arc::clone(&self.opener),
                        session_id.to_string(),
                        attempt,
                    )
                    .boxed()
                    .shared();
                    sessions.insert(
                        session_id.to_string(),
                        Slot::Opening {
                            attempt,
                            pending: pending.clone(),
                        },
                    );
                    pending
                }
            }
        };
        pending.await
    }

    async fn open_session(
        router: Weak<Self>,
        opener: Arc<dyn SessionOpener>,
        session_id: String,
        attempt: u64,
    ) -> Result<Arc<SessionEntry>, OpenError> {
        let opened = opener.open(&session_id).await;
        let Some(router) = router.upgrade() else {
            return Err(OpenError::Removed(session_id));
        };

        let mut sessions = lock(&router.sessions);
        let still_wanted = matches!(
            sessions.get(&session_id),
            Some(Slot::Opening { attempt: current, .. }) if *current == attempt
        );

        let opened = match opened {
            Ok(opened) if still_wanted => opened,
            Ok(_) => return Err(OpenError::Removed(session_id)),
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "Session open failed");
                if still_wanted {
                    sessions.remove(&session_id);
                }
                return Err(e);
            }
        };

        let entry = router.register_entry(&session_id, opened.display_name, opened.transport);
        sessions.insert(session_id.clone(), Slot::Ready(Arc::clone(&entry)));
        tracing::info!(session = %session_id, name = %entry.display_name, "Session opened");
        Ok(entry)
    }

    /// Build an entry and start watching for its permanent close.
    fn register_entry(
        self: &Arc<Self>,
        session_id: &str,
        display_name: String,
        transport: Arc<dyn Transport>,
    ) -> Arc<SessionEntry> {
        let adapter = Arc::new(FilesystemAdapter::open(
            session_id,
            transport.as_ref(),
            self.events.clone(),
        ));
        let entry = Arc::new(SessionEntry {
            display_name,
            transport,
            adapter,
        });

        let router = Arc::downgrade(self);
        let watched = Arc::downgrade(&entry.adapter);
        let closed = Arc::clone(&entry.adapter);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            closed.wait_closed().await;
            drop(closed);
            if let Some(router) = router.upgrade() {
                router.forget_closed(&session_id, &watched);
            }
        });

        entry
    }

    fn forget_closed(&self, session_id: &str, adapter: &Weak<FilesystemAdapter>) {
        let mut sessions = lock(&self.sessions);
        let is_current = matches!(
            sessions.get(session_id),
            Some(Slot::Ready(entry)) if std::ptr::eq(Arc::as_ptr(&entry.adapter), adapter.as_ptr())
        );
        if is_current {
            sessions.remove(session_id);
            tracing::info!(session = session_id, "Session permanently closed, removed");
        }
    }
}

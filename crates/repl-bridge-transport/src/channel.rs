//! One session's channel to a service, tracked across reconnects.
//!
//! A background driver consumes the transport's [`ChannelEvent`]s and
//! publishes the current [`ChannelState`] through a `watch` channel. Every
//! opened channel gets a new generation number; the channel reference is
//! replaced on reconnect, never mutated. Callers that saw a channel die wait
//! for a generation newer than the one they used, so all of them share the
//! same hand-off instead of racing on the reference.

use std::sync::{Arc, Mutex, PoisonError};

use repl_bridge_core::FsError;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

use crate::{
    protocol::{Command, Response, Service},
    traits::{Channel, ChannelEvent, ChannelSubscription, Transport},
};

/// Externally visible channel status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Connecting,
    Open,
    Reconnecting,
    PermanentlyClosed,
}

/// A channel instance together with its generation.
#[derive(Clone)]
pub struct Lease {
    generation: u64,
    channel: Arc<dyn Channel>,
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Lease {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }
}

#[derive(Clone)]
enum ChannelState {
    Connecting,
    Open(Lease),
    Reconnecting,
    Closed(String),
}

impl ChannelState {
    const fn status(&self) -> ChannelStatus {
        match self {
            Self::Connecting => ChannelStatus::Connecting,
            Self::Open(_) => ChannelStatus::Open,
            Self::Reconnecting => ChannelStatus::Reconnecting,
            Self::Closed(_) => ChannelStatus::PermanentlyClosed,
        }
    }
}

/// Outcome of a single request attempt.
#[derive(Debug)]
pub enum Attempt {
    /// The channel answered (successfully or with an application error).
    Completed(Response),
    /// The channel of `generation` died before answering.
    ChannelClosed { generation: u64 },
}

/// Tracks the current channel of one session's service.
pub struct ChannelSession {
    label: String,
    service: Service,
    state: watch::Receiver<ChannelState>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    driver: JoinHandle<()>,
}

impl ChannelSession {
    /// Subscribe to `service` on `transport` and start tracking it.
    ///
    /// `label` identifies the session in logs. Must be called within a Tokio
    /// runtime.
    #[must_use]
    pub fn open(label: impl Into<String>, transport: &dyn Transport, service: Service) -> Self {
        let label = label.into();
        let subscription = transport.open_channel(service);
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let driver = tokio::spawn(drive(
            label.clone(),
            service,
            subscription,
            state_tx,
            shutdown_rx,
        ));

        Self {
            label,
            service,
            state: state_rx,
            shutdown: Mutex::new(Some(shutdown_tx)),
            driver,
        }
    }

    /// Session label used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn service(&self) -> Service {
        self.service
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        self.state.borrow().status()
    }

    /// Wait for an open channel.
    ///
    /// # Errors
    /// Returns `Unavailable` once the session is permanently closed.
    pub async fn current(&self) -> Result<Lease, FsError> {
        self.wait_open(None).await
    }

    /// Wait for a channel newer than `generation`: the "channel was replaced"
    /// signal for callers whose channel died.
    ///
    /// # Errors
    /// Returns `Unavailable` once the session is permanently closed.
    pub async fn replaced_after(&self, generation: u64) -> Result<Lease, FsError> {
        self.wait_open(Some(generation)).await
    }

    /// Send one request on the current channel.
    ///
    /// # Errors
    /// Returns `Unavailable` once the session is permanently closed.
    pub async fn request(&self, command: Command) -> Result<Attempt, FsError> {
        let lease = self.current().await?;
        let response = lease.channel.request(command).await;
        if response.channel_closed {
            return Ok(Attempt::ChannelClosed {
                generation: lease.generation,
            });
        }
        Ok(Attempt::Completed(response))
    }

    /// Resolve once the session is permanently closed.
    pub async fn wait_closed(&self) {
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|s| matches!(s, ChannelState::Closed(_)))
            .await;
    }

    /// Close the channel and stop tracking it. Idempotent.
    pub fn close(&self) {
        let tx = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
    }

    async fn wait_open(&self, after: Option<u64>) -> Result<Lease, FsError> {
        let mut state = self.state.clone();
        let guard = state
            .wait_for(|s| match s {
                ChannelState::Open(lease) => after.is_none_or(|g| lease.generation > g),
                ChannelState::Closed(_) => true,
                ChannelState::Connecting | ChannelState::Reconnecting => false,
            })
            .await
            .map_err(|_| self.unavailable("channel driver stopped"))?;

        match &*guard {
            ChannelState::Open(lease) => Ok(lease.clone()),
            ChannelState::Closed(reason) => Err(self.unavailable(reason)),
            ChannelState::Connecting | ChannelState::Reconnecting => {
                Err(self.unavailable("channel not open"))
            }
        }
    }

    fn unavailable(&self, reason: &str) -> FsError {
        FsError::Unavailable(format!("{} ({} channel): {reason}", self.label, self.service))
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        self.close();
        self.driver.abort();
    }
}

async fn drive(
    label: String,
    service: Service,
    mut subscription: ChannelSubscription,
    state: watch::Sender<ChannelState>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut generation = 0u64;

    let reason = loop {
        let event = tokio::select! {
            event = subscription.next() => event,
            _ = &mut shutdown => break "closed by owner".to_string(),
        };

        match event {
            Some(ChannelEvent::Opened(channel)) => {
                generation += 1;
                tracing::info!(session = %label, %service, generation, "Channel opened");
                state.send_replace(ChannelState::Open(Lease {
                    generation,
                    channel,
                }));
            }
            Some(ChannelEvent::Closed {
                will_reconnect: true,
            }) => {
                tracing::debug!(session = %label, %service, generation, "Channel closed, awaiting reconnect");
                state.send_replace(ChannelState::Reconnecting);
            }
            Some(ChannelEvent::Closed {
                will_reconnect: false,
            }) => break "transport closed without reconnect".to_string(),
            Some(ChannelEvent::OpenFailed(reason)) => break format!("open failed: {reason}"),
            None => break "transport dropped".to_string(),
        }
    };

    tracing::info!(session = %label, %service, %reason, "Channel permanently closed");
    subscription.close();
    state.send_replace(ChannelState::Closed(reason));
}

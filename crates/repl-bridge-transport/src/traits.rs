//! Seams to the session transport library.
//!
//! The transport performs the socket handshake, authentication, heartbeats and
//! reconnect policy. The bridge only sees the channel lifecycle it reports.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::protocol::{Command, Response, Service};

/// A live channel to one service of a session.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send a request and await its response.
    ///
    /// A channel that dies mid-flight answers with `channel_closed` set rather
    /// than failing.
    async fn request(&self, command: Command) -> Response;

    /// Send a command without waiting for a response.
    fn send(&self, command: Command);

    /// Receive commands pushed by the service.
    fn subscribe(&self) -> broadcast::Receiver<Command>;
}

/// Lifecycle notification for a channel subscription.
#[derive(Clone)]
pub enum ChannelEvent {
    /// A channel (re)opened. Sent again after every reconnect.
    Opened(Arc<dyn Channel>),
    /// The channel could not be opened.
    OpenFailed(String),
    /// The current channel closed.
    Closed {
        /// Whether the transport will open a replacement.
        will_reconnect: bool,
    },
}

impl std::fmt::Debug for ChannelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened(_) => f.write_str("Opened"),
            Self::OpenFailed(reason) => f.debug_tuple("OpenFailed").field(reason).finish(),
            Self::Closed { will_reconnect } => f
                .debug_struct("Closed")
                .field("will_reconnect", will_reconnect)
                .finish(),
        }
    }
}

/// A connected session transport.
pub trait Transport: Send + Sync {
    /// Subscribe to a channel for `service`.
    fn open_channel(&self, service: Service) -> ChannelSubscription;
}

/// Consumer half of a channel subscription.
pub struct ChannelSubscription {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl ChannelSubscription {
    /// Create a subscription and the publisher the transport drives.
    #[must_use]
    pub fn pair() -> (ChannelPublisher, Self) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();

        let publisher = ChannelPublisher {
            events: events_tx,
            close_rx,
            close_seen: false,
        };
        let subscription = Self {
            events: events_rx,
            close_tx: Some(close_tx),
        };

        (publisher, subscription)
    }

    /// Next lifecycle event; `None` once the transport dropped the publisher.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Ask the transport to close the channel. Idempotent.
    pub fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
        self.events.close();
    }

    /// Whether `close` was called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.close_tx.is_none()
    }
}

/// Transport half of a channel subscription.
pub struct ChannelPublisher {
    events: mpsc::UnboundedSender<ChannelEvent>,
    close_rx: oneshot::Receiver<()>,
    close_seen: bool,
}

impl ChannelPublisher {
    /// Deliver an event. Returns `false` if the subscriber is gone.
    pub fn publish(&self, event: ChannelEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Whether the subscriber closed or dropped its half.
    pub fn is_closed(&mut self) -> bool {
        if self.close_seen {
            return true;
        }
        match self.close_rx.try_recv() {
            Ok(()) | Err(oneshot::error::TryRecvError::Closed) => {
                self.close_seen = true;
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => self.events.is_closed(),
        }
    }

    /// Resolve once the subscriber closes or drops its half.
    pub async fn closed(&mut self) {
        if !self.close_seen {
            let _ = (&mut self.close_rx).await;
            self.close_seen = true;
        }
    }
}

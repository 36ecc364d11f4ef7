//! Host pseudoterminal backed by a session's shell channel.
//!
//! State machine: `Unopened -> Opening -> Attached -> Detached`. Input is only
//! forwarded while attached and is dropped otherwise. Dimensions are always
//! recorded and re-sent on every (re)attach.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use repl_bridge_transport::{
    Channel, ChannelEvent, ChannelSubscription, Command, Service, Transport,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, oneshot,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle of a terminal bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Unopened,
    Opening,
    Attached,
    Detached,
}

/// Terminal size as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalDimensions {
    pub columns: u16,
    pub rows: u16,
}

impl TerminalDimensions {
    #[must_use]
    pub const fn new(columns: u16, rows: u16) -> Self {
        Self { columns, rows }
    }

    const fn resize(self) -> Command {
        Command::ResizeTerm {
            cols: self.columns,
            rows: self.rows,
        }
    }
}

/// Notification for the host terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Output to display.
    Write(String),
    /// The shell went away for good.
    Close,
}

/// Host side of a [`TerminalBridge`].
pub struct TerminalEvents {
    rx: mpsc::UnboundedReceiver<TerminalEvent>,
}

impl TerminalEvents {
    /// Next event, or `None` once the bridge is gone.
    pub async fn recv(&mut self) -> Option<TerminalEvent> {
        self.rx.recv().await
    }

    /// Next event if one is queued.
    pub fn try_recv(&mut self) -> Option<TerminalEvent> {
        self.rx.try_recv().ok()
    }
}

struct Shared {
    state: TerminalState,
    channel: Option<Arc<dyn Channel>>,
    dimensions: Option<TerminalDimensions>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// Pseudoterminal over the shell service of one session.
pub struct TerminalBridge {
    label: String,
    transport: Arc<dyn Transport>,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<TerminalEvent>,
}

impl TerminalBridge {
    /// Create an unopened bridge.
    ///
    /// Returns the bridge and the receiver the host reads output from.
    #[must_use]
    pub fn new(label: impl Into<String>, transport: Arc<dyn Transport>) -> (Self, TerminalEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            label: label.into(),
            transport,
            shared: Arc::new(Mutex::new(Shared {
                state: TerminalState::Unopened,
                channel: None,
                dimensions: None,
                shutdown: None,
            })),
            events: tx,
        };
        (bridge, TerminalEvents { rx })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn state(&self) -> TerminalState {
        lock(&self.shared).state
    }

    /// Request a shell channel. Only the first call has an effect.
    ///
    /// Must be called within a Tokio runtime.
    pub fn open(&self, dimensions: Option<TerminalDimensions>) {
        let mut shared = lock(&self.shared);
        if shared.state != TerminalState::Unopened {
            tracing::debug!(session = %self.label, state = ?shared.state, "Terminal already opened");
            return;
        }
        if dimensions.is_some() {
            shared.dimensions = dimensions;
        }
        shared.state = TerminalState::Opening;

        let subscription = self.transport.open_channel(Service::Shell);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        shared.shutdown = Some(shutdown_tx);
        drop(shared);

        tokio::spawn(drive(
            self.label.clone(),
            subscription,
            Arc::clone(&self.shared),
            self.events.clone(),
            shutdown_rx,
        ));
    }

    /// Forward keystrokes. Dropped unless attached.
    pub fn handle_input(&self, input: &str) {
        let shared = lock(&self.shared);
        if shared.state != TerminalState::Attached {
            return;
        }
        if let Some(channel) = &shared.channel {
            channel.send(Command::Input(input.to_string()));
        }
    }

    /// Record the terminal size, resizing immediately when attached.
    pub fn set_dimensions(&self, dimensions: TerminalDimensions) {
        let mut shared = lock(&self.shared);
        shared.dimensions = Some(dimensions);
        if shared.state != TerminalState::Attached {
            return;
        }
        if let Some(channel) = &shared.channel {
            channel.send(dimensions.resize());
        }
    }

    /// Close the shell channel. Idempotent; never fires [`TerminalEvent::Close`].
    pub fn close(&self) {
        let mut shared = lock(&self.shared);
        if matches!(shared.state, TerminalState::Opening | TerminalState::Attached) {
            tracing::info!(session = %self.label, "Terminal closed by host");
        }
        shared.state = TerminalState::Detached;
        shared.channel = None;
        if let Some(tx) = shared.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TerminalBridge {
    fn drop(&mut self) {
        self.close();
    }
}

async fn drive(
    label: String,
    mut subscription: ChannelSubscription,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<TerminalEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut output: Option<broadcast::Receiver<Command>> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            event = subscription.next() => match event {
                Some(ChannelEvent::Opened(channel)) => {
                    if !attach(&label, &shared, &channel) {
                        break;
                    }
                    output = Some(channel.subscribe());
                }
                Some(ChannelEvent::Closed { will_reconnect: true }) => {
                    tracing::debug!(session = %label, "Shell channel closed, awaiting reconnect");
                }
                Some(ChannelEvent::Closed { will_reconnect: false }) => {
                    detach(&label, &shared, &events, "shell channel closed");
                    break;
                }
                Some(ChannelEvent::OpenFailed(reason)) => {
                    detach(&label, &shared, &events, &reason);
                    break;
                }
                None => {
                    detach(&label, &shared, &events, "transport dropped");
                    break;
                }
            },
            command = next_output(&label, &mut output) => {
                if let Command::Output(text) = command {
                    if !text.is_empty() {
                        let _ = events.send(TerminalEvent::Write(text));
                    }
                }
            }
        }
    }

    subscription.close();
}

/// Install `channel` as the current shell channel. Returns false when the
/// bridge was closed in the meantime.
fn attach(label: &str, shared: &Mutex<Shared>, channel: &Arc<dyn Channel>) -> bool {
    let mut shared = lock(shared);
    if shared.state == TerminalState::Detached {
        return false;
    }
    if let Some(dimensions) = shared.dimensions {
        channel.send(dimensions.resize());
    }
    if shared.state == TerminalState::Attached {
        tracing::info!(session = %label, "Shell channel replaced");
    } else {
        tracing::info!(session = %label, "Terminal attached");
    }
    shared.state = TerminalState::Attached;
    shared.channel = Some(Arc::clone(channel));
    true
}

fn detach(
    label: &str,
    shared: &Mutex<Shared>,
    events: &mpsc::UnboundedSender<TerminalEvent>,
    reason: &str,
) {
    let mut shared = lock(shared);
    if shared.state == TerminalState::Detached {
        return;
    }
    tracing::info!(session = %label, %reason, "Terminal detached");
    shared.state = TerminalState::Detached;
    shared.channel = None;
    shared.shutdown = None;
    let _ = events.send(TerminalEvent::Close);
}

async fn next_output(label: &str, output: &mut Option<broadcast::Receiver<Command>>) -> Command {
    loop {
        let Some(rx) = output.as_mut() else {
            return std::future::pending().await;
        };
        match rx.recv().await {
            Ok(command) => return command,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(session = %label, skipped, "Shell output lagged");
            }
            Err(RecvError::Closed) => *output = None,
        }
    }
}

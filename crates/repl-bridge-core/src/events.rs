//! Broadcast fan-in for change notifications.

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::types::ChangeEvent;

/// Default capacity of the broadcast buffer, in batches.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Batch of events produced by one completed operation.
pub type ChangeBatch = Vec<ChangeEvent>;

/// Fan-in point for change events.
///
/// Cloning shares the same underlying channel, so every adapter holding a
/// clone feeds the one stream the host subscribes to. Batches are delivered
/// in the order `fire` was called.
///
/// A listener that falls more than `capacity` batches behind loses the oldest
/// ones: [`subscribe`](Self::subscribe) reports `RecvError::Lagged` and
/// [`stream`](Self::stream) logs a warning and resumes at the oldest batch
/// still buffered. Order among the batches it does see is preserved.
#[derive(Clone)]
pub struct ChangeEmitter {
    sender: broadcast::Sender<ChangeBatch>,
}

impl Default for ChangeEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeEmitter {
    /// Create a new emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an emitter buffering up to `capacity` batches per slow listener.
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver a batch to every live listener. Empty batches are dropped.
    pub fn fire(&self, batch: ChangeBatch) {
        if batch.is_empty() {
            return;
        }
        // No listeners is fine; the host may not have subscribed yet.
        let _ = self.sender.send(batch);
    }

    /// Get a receiver for live batches.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.sender.subscribe()
    }

    /// Stream of live batches. Batches a slow consumer missed are skipped.
    #[must_use]
    pub fn stream(&self) -> futures::stream::BoxStream<'static, ChangeBatch> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|res| async move {
                match res {
                    Ok(batch) => Some(batch),
                    Err(e) => {
                        tracing::warn!("Change listener lagged: {e}");
                        None
                    }
                }
            })
            .boxed()
    }

    /// Number of live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

//! In-memory transport and channel for tests.
//!
//! `MockTransport` hands out subscriptions and lets a test drive their
//! lifecycle; `MockChannel` answers requests from a scripted responder and
//! records everything it was asked.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    protocol::{Command, Response, Service},
    traits::{Channel, ChannelEvent, ChannelPublisher, ChannelSubscription, Transport},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Responder = Box<dyn Fn(&Command) -> Response + Send + Sync>;

/// Scripted channel.
pub struct MockChannel {
    responder: Responder,
    requests: Mutex<Vec<Command>>,
    sent: Mutex<Vec<Command>>,
    pushed: broadcast::Sender<Command>,
    dead: AtomicBool,
}

impl MockChannel {
    /// Channel answering every request with `responder`.
    pub fn new(responder: impl Fn(&Command) -> Response + Send + Sync + 'static) -> Arc<Self> {
        let (pushed, _) = broadcast::channel(256);
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            pushed,
            dead: AtomicBool::new(false),
        })
    }

    /// Requests received so far, including ones answered with channel-closed.
    #[must_use]
    pub fn requests(&self) -> Vec<Command> {
        lock(&self.requests).clone()
    }

    /// Fire-and-forget commands received so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Command> {
        lock(&self.sent).clone()
    }

    /// Push a command to subscribers, as the service would.
    pub fn push(&self, command: Command) {
        let _ = self.pushed.send(command);
    }

    /// Make every later request answer with channel-closed and drop sends.
    pub fn kill(&self) {
        self.dead.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn request(&self, command: Command) -> Response {
        lock(&self.requests).push(command.clone());
        if self.is_dead() {
            return Response::channel_closed();
        }
        (self.responder)(&command)
    }

    fn send(&self, command: Command) {
        if !self.is_dead() {
            lock(&self.sent).push(command);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<Command> {
        self.pushed.subscribe()
    }
}

/// Transport whose channel lifecycle is driven by the test.
#[derive(Default)]
pub struct MockTransport {
    publishers: Mutex<Vec<(Service, ChannelPublisher)>>,
    opened: AtomicUsize,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of `open_channel` calls so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Deliver `event` to the most recent subscription for `service`.
    pub fn emit(&self, service: Service, event: ChannelEvent) -> bool {
        lock(&self.publishers)
            .iter()
            .rev()
            .find(|(s, _)| *s == service)
            .is_some_and(|(_, publisher)| publisher.publish(event))
    }

    /// Announce `channel` as opened for `service`.
    pub fn open(&self, service: Service, channel: Arc<MockChannel>) -> bool {
        self.emit(service, ChannelEvent::Opened(channel))
    }

    /// Announce the current channel of `service` as closed.
    pub fn close(&self, service: Service, will_reconnect: bool) -> bool {
        self.emit(service, ChannelEvent::Closed { will_reconnect })
    }

    /// Whether the subscriber of the most recent `service` subscription closed it.
    #[must_use]
    pub fn subscription_closed(&self, service: Service) -> bool {
        lock(&self.publishers)
            .iter_mut()
            .rev()
            .find(|(s, _)| *s == service)
            .is_some_and(|(_, publisher)| publisher.is_closed())
    }
}

impl Transport for MockTransport {
    fn open_channel(&self, service: Service) -> ChannelSubscription {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let (publisher, subscription) = ChannelSubscription::pair();
        lock(&self.publishers).push((service, publisher));
        subscription
    }
}

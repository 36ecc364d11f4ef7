//! Transparent retry of requests across channel reconnects.

use std::sync::Arc;

use repl_bridge_core::FsError;

use crate::{
    channel::{Attempt, ChannelSession, ChannelStatus},
    protocol::{Command, Response},
};

/// Executes requests on a [`ChannelSession`], resubmitting after closures.
///
/// A request whose channel dies is re-sent exactly once per closure, on the
/// replacement channel. Retries are at-least-once: the store may observe a
/// request twice if it was applied before the channel died. Application
/// errors are returned as-is and never retried.
#[derive(Clone)]
pub struct RetryingRequestExecutor {
    session: Arc<ChannelSession>,
}

impl RetryingRequestExecutor {
    #[must_use]
    pub const fn new(session: Arc<ChannelSession>) -> Self {
        Self { session }
    }

    /// The underlying channel session.
    #[must_use]
    pub const fn session(&self) -> &Arc<ChannelSession> {
        &self.session
    }

    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        self.session.status()
    }

    /// Send `command` and return the first response not marked channel-closed.
    ///
    /// # Errors
    /// Returns `Unavailable` if the session closes permanently before a
    /// response arrives.
    pub async fn execute(&self, command: Command) -> Result<Response, FsError> {
        let mut retries = 0u32;
        loop {
            match self.session.request(command.clone()).await? {
                Attempt::Completed(response) => {
                    if retries > 0 {
                        tracing::debug!(
                            session = self.session.label(),
                            command = command.name(),
                            retries,
                            "Request completed after reconnect"
                        );
                    }
                    return Ok(response);
                }
                Attempt::ChannelClosed { generation } => {
                    retries += 1;
                    tracing::debug!(
                        session = self.session.label(),
                        command = command.name(),
                        generation,
                        "Channel closed mid-request, waiting for replacement"
                    );
                    self.session.replaced_after(generation).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mock::{MockChannel, MockTransport},
        protocol::{Service, WireFileType},
    };
    use repl_bridge_core::FsErrorKind;

    fn stat_root() -> Command {
        Command::Stat { path: "./".into() }
    }

    async fn wait_for_requests(channel: &MockChannel, count: usize) {
        while channel.requests().len() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_normal_response_returned() {
        let transport = MockTransport::new();
        let session = Arc::new(ChannelSession::open("s", transport.as_ref(), Service::Files));
        let executor = RetryingRequestExecutor::new(session);
        transport.open(
            Service::Files,
            MockChannel::new(|_| Response::stat(WireFileType::Directory, 0, 1)),
        );

        let response = executor.execute(stat_root()).await.unwrap();
        assert!(response.stat_res.unwrap().exists);
    }

    #[tokio::test]
    async fn test_application_error_not_retried() {
        let transport = MockTransport::new();
        let session = Arc::new(ChannelSession::open("s", transport.as_ref(), Service::Files));
        let executor = RetryingRequestExecutor::new(session);
        let channel = MockChannel::new(|_| Response::error("permission denied"));
        transport.open(Service::Files, Arc::clone(&channel));

        let response = executor.execute(stat_root()).await.unwrap();
        assert_eq!(response.error_message(), Some("permission denied"));
        assert_eq!(channel.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_resent_once_per_closure() {
        let transport = MockTransport::new();
        let session = Arc::new(ChannelSession::open("s", transport.as_ref(), Service::Files));
        let executor = RetryingRequestExecutor::new(Arc::clone(&session));

        let first = MockChannel::new(|_| Response::stat(WireFileType::File, 3, 1));
        transport.open(Service::Files, Arc::clone(&first));
        session.current().await.unwrap();
        first.kill();

        let task = tokio::spawn(async move { executor.execute(stat_root()).await });
        wait_for_requests(&first, 1).await;

        let second = MockChannel::new(|_| Response::stat(WireFileType::File, 3, 1));
        transport.close(Service::Files, true);
        transport.open(Service::Files, Arc::clone(&second));

        let response = task.await.unwrap().unwrap();
        assert_eq!(response, Response::stat(WireFileType::File, 3, 1));
        assert_eq!(first.requests(), vec![stat_root()]);
        assert_eq!(second.requests(), vec![stat_root()]);
    }

    #[tokio::test]
    async fn test_retried_across_multiple_closures() {
        let transport = MockTransport::new();
        let session = Arc::new(ChannelSession::open("s", transport.as_ref(), Service::Files));
        let executor = RetryingRequestExecutor::new(Arc::clone(&session));

        let first = MockChannel::new(|_| Response::ok());
        transport.open(Service::Files, Arc::clone(&first));
        session.current().await.unwrap();
        first.kill();

        let task = tokio::spawn(async move { executor.execute(stat_root()).await });
        wait_for_requests(&first, 1).await;

        let second = MockChannel::new(|_| Response::ok());
        second.kill();
        transport.close(Service::Files, true);
        transport.open(Service::Files, Arc::clone(&second));
        wait_for_requests(&second, 1).await;

        let third = MockChannel::new(|_| Response::ok());
        transport.close(Service::Files, true);
        transport.open(Service::Files, Arc::clone(&third));

        assert_eq!(task.await.unwrap().unwrap(), Response::ok());
        assert_eq!(first.requests().len(), 1);
        assert_eq!(second.requests().len(), 1);
        assert_eq!(third.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_after_permanent_close() {
        let transport = MockTransport::new();
        let session = Arc::new(ChannelSession::open("s", transport.as_ref(), Service::Files));
        let executor = RetryingRequestExecutor::new(Arc::clone(&session));

        let channel = MockChannel::new(|_| Response::ok());
        transport.open(Service::Files, Arc::clone(&channel));
        session.current().await.unwrap();
        channel.kill();

        let task = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute(stat_root()).await })
        };
        wait_for_requests(&channel, 1).await;
        transport.close(Service::Files, false);

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::Unavailable);

        let later = executor.execute(stat_root()).await.unwrap_err();
        assert_eq!(later.kind(), FsErrorKind::Unavailable);
        assert_eq!(executor.status(), ChannelStatus::PermanentlyClosed);
    }
}

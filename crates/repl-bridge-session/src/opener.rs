//! Opening a connected transport for a session id.

use std::sync::Arc;

use async_trait::async_trait;
use repl_bridge_transport::Transport;
use tokio_util::sync::CancellationToken;

use crate::{
    options::{API_KEY, Options},
    resolve::{self, Fetch, ReplApi, ResolveError},
};

/// Why a session could not be opened.
///
/// `Clone` so one in-flight open can hand its result to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenError {
    #[error("No API key set")]
    MissingApiKey,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("Could not read options: {0}")]
    Options(String),
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Session {0} was removed while opening")]
    Removed(String),
    #[error("Opening session {0} was aborted")]
    Aborted(String),
}

/// A freshly connected session.
pub struct OpenedSession {
    pub transport: Arc<dyn Transport>,
    /// `@user/slug`.
    pub display_name: String,
}

/// Creates a connected transport for a session id.
#[async_trait]
pub trait SessionOpener: Send + Sync {
    async fn open(&self, session_id: &str) -> Result<OpenedSession, OpenError>;
}

/// The session transport library: turns a token into a connected transport.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, repl_id: &str, token: &str) -> Result<Arc<dyn Transport>, OpenError>;
}

/// Opens sessions with the stored API key.
///
/// Token fetches stop when `cancel` fires; `SessionOpener::open` then fails
/// with `OpenError::Aborted`.
pub struct TokenSessionOpener {
    options: Options,
    api: Arc<dyn ReplApi>,
    connector: Arc<dyn Connector>,
    cancel: CancellationToken,
}

impl TokenSessionOpener {
    #[must_use]
    pub fn new(options: Options, api: Arc<dyn ReplApi>, connector: Arc<dyn Connector>) -> Self {
        Self {
            options,
            api,
            connector,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight token fetches when `cancel` fires.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Open `session_id`, stopping at the token fetch if `cancel` fires.
    ///
    /// # Errors
    /// `MissingApiKey`, resolution, token or connection failures.
    pub async fn open_cancellable(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Fetch<OpenedSession>, OpenError> {
        let api_key = self.api_key().await?;
        let info = self
            .api
            .repl_by_id(session_id)
            .await?
            .ok_or_else(|| ResolveError::NotFound(session_id.to_string()))?;

        let Fetch::Completed(token) =
            resolve::fetch_token(self.api.as_ref(), &info.id, &api_key, cancel).await?
        else {
            tracing::debug!(session = %info.id, "Token fetch aborted");
            return Ok(Fetch::Aborted);
        };
        let transport = self.connector.connect(&info.id, &token).await?;

        tracing::info!(session = %info.id, name = %info.display_name(), "Session connected");
        Ok(Fetch::Completed(OpenedSession {
            transport,
            display_name: info.display_name(),
        }))
    }

    async fn api_key(&self) -> Result<String, OpenError> {
        self.options
            .get_str(API_KEY)
            .await
            .map_err(|e| OpenError::Options(e.to_string()))?
            .filter(|key| !key.trim().is_empty())
            .ok_or(OpenError::MissingApiKey)
    }
}

#[async_trait]
impl SessionOpener for TokenSessionOpener {
    async fn open(&self, session_id: &str) -> Result<OpenedSession, OpenError> {
        self.open_cancellable(session_id, &self.cancel)
            .await?
            .completed()
            .ok_or_else(|| OpenError::Aborted(session_id.to_string()))
    }
}

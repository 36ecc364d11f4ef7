//! User-facing commands: set the API key, open a repl, open a shell.

use std::sync::Arc;

use repl_bridge_core::ResourceId;
use repl_bridge_terminal::{TerminalBridge, TerminalEvents};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    opener::OpenError,
    options::{API_KEY, Options, OptionsError},
    resolve::{self, Fetch, INVALID_REFERENCE, ReplApi, ResolveError},
    router::MultiSessionRouter,
};

/// Command failure.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("API key is empty")]
    EmptyApiKey,
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Open(#[from] OpenError),
}

impl CommandError {
    /// Text to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyApiKey => "Please enter a non-empty API key".to_string(),
            Self::Resolve(ResolveError::NotFound(_))
            | Self::Open(OpenError::Resolve(ResolveError::NotFound(_))) => {
                "Repl not found".to_string()
            }
            Self::Resolve(ResolveError::InvalidReference) => INVALID_REFERENCE.to_string(),
            Self::Open(OpenError::MissingApiKey) => "Please set your API key first".to_string(),
            other => format!("Error: {other}"),
        }
    }
}

/// A folder to add to the host workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    /// Root of the session, e.g. `replit://<id>/`.
    pub uri: String,
    /// `@user/slug`.
    pub name: String,
}

/// Command surface exposed to the host.
pub struct Commands {
    router: Arc<MultiSessionRouter>,
    options: Options,
    api: Arc<dyn ReplApi>,
}

impl Commands {
    #[must_use]
    pub fn new(router: Arc<MultiSessionRouter>, options: Options, api: Arc<dyn ReplApi>) -> Self {
        Self {
            router,
            options,
            api,
        }
    }

    #[must_use]
    pub const fn router(&self) -> &Arc<MultiSessionRouter> {
        &self.router
    }

    /// Store the API key.
    ///
    /// # Errors
    /// `EmptyApiKey` for blank input, or an options write failure.
    pub async fn set_api_key(&self, key: &str) -> Result<(), CommandError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(CommandError::EmptyApiKey);
        }
        self.options.set_value(API_KEY, key).await?;
        tracing::info!("API key updated");
        Ok(())
    }

    /// Resolve `reference` and open its session.
    ///
    /// # Errors
    /// Resolution or session-open failures.
    pub async fn open_repl(
        &self,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<Fetch<WorkspaceFolder>, CommandError> {
        let Fetch::Completed(info) = resolve::resolve_repl(self.api.as_ref(), reference, cancel).await? else {
            tracing::debug!(reference, "Open repl aborted");
            return Ok(Fetch::Aborted);
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(session = %info.id, "Open repl aborted");
                return Ok(Fetch::Aborted);
            }
            opened = self.router.resolve(&info.id) => {
                opened?;
            }
        }

        let uri = ResourceId::root(info.id.as_str()).to_uri(&self.router.config().scheme);
        Ok(Fetch::Completed(WorkspaceFolder {
            uri,
            name: info.display_name(),
        }))
    }

    /// An unopened terminal over the shell of `session_id`, opening the
    /// session if needed.
    ///
    /// # Errors
    /// Session-open failures.
    pub async fn open_shell(&self, session_id: &str) -> Result<(TerminalBridge, TerminalEvents), CommandError> {
        let transport = self.router.transport(session_id).await?;
        Ok(TerminalBridge::new(session_id, transport))
    }
}

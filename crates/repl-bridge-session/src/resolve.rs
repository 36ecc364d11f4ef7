//! Turning user input into a repl and a connection token.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Shown when the input is neither an id nor a repl URL.
pub const INVALID_REFERENCE: &str =
    "Please input in the format of @username/replname or full url of the repl";

const REPL_BASE_URL: &str = "https://repl.it";

/// Identity of a repl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplInfo {
    pub id: String,
    pub user: String,
    pub slug: String,
}

impl ReplInfo {
    /// `@user/slug`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("@{}/{}", self.user, self.slug)
    }
}

/// Errors resolving a repl or fetching its token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("{}", INVALID_REFERENCE)]
    InvalidReference,
    #[error("Repl not found: {0}")]
    NotFound(String),
    #[error("Invalid token response for {repl}: {body}")]
    InvalidToken { repl: String, body: String },
    #[error("Request failed: {0}")]
    Request(String),
}

/// Outcome of a cancellable lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<T> {
    Completed(T),
    Aborted,
}

impl<T> Fetch<T> {
    /// The value, if not aborted.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Aborted => None,
        }
    }
}

/// What the user typed, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplReference {
    /// Opaque id (five dash-separated parts).
    Id(String),
    /// Normalized `https://repl.it/@user/slug`.
    Url(String),
}

fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?:https?://repl\.it/)?@(.+)/([^?\s#]+)").ok())
        .as_ref()
}

impl ReplReference {
    /// Classify `input`.
    ///
    /// # Errors
    /// Returns `InvalidReference` when `input` is neither form.
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let input = input.trim();
        if input.split('-').count() == 5 {
            return Ok(Self::Id(input.to_string()));
        }

        let captures = url_pattern()
            .and_then(|pattern| pattern.captures(input))
            .ok_or(ResolveError::InvalidReference)?;
        Ok(Self::Url(format!(
            "{REPL_BASE_URL}/@{}/{}",
            &captures[1], &captures[2]
        )))
    }
}

/// Account API used to look up repls and mint connection tokens.
#[async_trait]
pub trait ReplApi: Send + Sync {
    /// Look up a repl by id. `None` if it does not exist.
    async fn repl_by_id(&self, id: &str) -> Result<Option<ReplInfo>, ResolveError>;

    /// Look up a repl by normalized URL. `None` if it does not exist.
    async fn repl_by_url(&self, url: &str) -> Result<Option<ReplInfo>, ResolveError>;

    /// Request a connection token. Returns the raw response body.
    async fn request_token(&self, repl_id: &str, api_key: &str) -> Result<String, ResolveError>;
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, ResolveError>>,
) -> Result<Fetch<T>, ResolveError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Ok(Fetch::Aborted),
        result = work => result.map(Fetch::Completed),
    }
}

/// Resolve user input to a repl.
///
/// # Errors
/// `InvalidReference` for malformed input, `NotFound` if no such repl exists,
/// or whatever the API reports.
pub async fn resolve_repl(
    api: &dyn ReplApi,
    input: &str,
    cancel: &CancellationToken,
) -> Result<Fetch<ReplInfo>, ResolveError> {
    let reference = ReplReference::parse(input)?;
    let lookup = async {
        let info = match &reference {
            ReplReference::Id(id) => api.repl_by_id(id).await?,
            ReplReference::Url(url) => api.repl_by_url(url).await?,
        };
        info.ok_or_else(|| ResolveError::NotFound(input.trim().to_string()))
    };
    let fetched = cancellable(cancel, lookup).await?;
    if let Fetch::Completed(info) = &fetched {
        tracing::debug!(id = %info.id, name = %info.display_name(), "Resolved repl");
    }
    Ok(fetched)
}

/// Fetch a connection token for `repl_id`.
///
/// # Errors
/// `InvalidToken` if the body is not a JSON string, or whatever the API reports.
pub async fn fetch_token(
    api: &dyn ReplApi,
    repl_id: &str,
    api_key: &str,
    cancel: &CancellationToken,
) -> Result<Fetch<String>, ResolveError> {
    cancellable(cancel, async {
        let body = api.request_token(repl_id, api_key).await?;
        parse_token(repl_id, &body)
    })
    .await
}

/// Validate a token response body.
///
/// # Errors
/// `InvalidToken` unless `body` is a JSON string.
pub fn parse_token(repl_id: &str, body: &str) -> Result<String, ResolveError> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(token)) => Ok(token),
        _ => Err(ResolveError::InvalidToken {
            repl: repl_id.to_string(),
            body: body.to_string(),
        }),
    }
}

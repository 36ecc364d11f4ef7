//! Mapping between host-visible resource identifiers and remote store paths.
//!
//! A [`ResourceId`] names a file inside one remote session as the host sees it:
//! `replit://<session-id>/<path>`. The remote store addresses the same file
//! relative to its working directory, which is expressed by prefixing the
//! host path with [`REMOTE_PREFIX`].

use std::{fmt, str::FromStr};

use thiserror::Error;

/// URI scheme used for host-visible resources.
pub const DEFAULT_SCHEME: &str = "replit";

/// Prefix prepended to every host path to form a remote path.
pub const REMOTE_PREFIX: &str = ".";

/// Error returned when a resource URI cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Missing scheme separator in {0:?}")]
    MissingScheme(String),
    #[error("Missing session id in {0:?}")]
    MissingSession(String),
}

/// Host-visible identifier: a session id plus an absolute POSIX path.
///
/// The path always starts with `/` and never ends with `/` unless it is the
/// root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    session_id: String,
    path: String,
}

impl ResourceId {
    /// Create a resource id, normalizing the path.
    #[must_use]
    pub fn new(session_id: impl Into<String>, path: &str) -> Self {
        Self {
            session_id: session_id.into(),
            path: normalize(path),
        }
    }

    /// The root of a session.
    #[must_use]
    pub fn root(session_id: impl Into<String>) -> Self {
        Self::new(session_id, "/")
    }

    /// Session this resource belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Host path inside the session.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this resource is the session root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Translate to the path syntax of the remote store.
    #[must_use]
    pub fn to_remote(&self) -> RemotePath {
        RemotePath(format!("{REMOTE_PREFIX}{}", self.path))
    }

    /// Parent directory; the root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        let parent = match self.path.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &self.path[..idx],
        };
        Self {
            session_id: self.session_id.clone(),
            path: parent.to_string(),
        }
    }

    /// Child entry of this resource.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        let name = name.trim_matches('/');
        if self.is_root() {
            Self::new(self.session_id.clone(), &format!("/{name}"))
        } else {
            Self::new(self.session_id.clone(), &format!("{}/{name}", self.path))
        }
    }

    /// Render as a URI with the given scheme.
    #[must_use]
    pub fn to_uri(&self, scheme: &str) -> String {
        format!("{scheme}://{}{}", self.session_id, self.path)
    }

    /// Rewrite a [`DEFAULT_SCHEME`] URI at the start of `text` to `scheme`.
    /// Text in any other form is returned unchanged.
    #[must_use]
    pub fn rescheme(text: String, scheme: &str) -> String {
        match text.strip_prefix(DEFAULT_SCHEME).and_then(|rest| rest.strip_prefix("://")) {
            Some(rest) if scheme != DEFAULT_SCHEME => format!("{scheme}://{rest}"),
            _ => text,
        }
    }
}

/// Renders with [`DEFAULT_SCHEME`]. Use [`ResourceId::to_uri`] when the host
/// is configured with another scheme.
impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DEFAULT_SCHEME}://{}{}", self.session_id, self.path)
    }
}

impl FromStr for ResourceId {
    type Err = PathError;

    /// Parse `scheme://session-id/path`. The scheme itself is not checked.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, rest) = s
            .split_once("://")
            .ok_or_else(|| PathError::MissingScheme(s.to_string()))?;
        let (session_id, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, "/"),
        };
        if session_id.is_empty() {
            return Err(PathError::MissingSession(s.to_string()));
        }
        Ok(Self::new(session_id, path))
    }
}

/// Path in the remote store's syntax (e.g. `./src/main.rs`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_trailing_slash() {
        assert_eq!(ResourceId::new("s", "/dir/").path(), "/dir");
        assert_eq!(ResourceId::new("s", "").path(), "/");
        assert_eq!(ResourceId::new("s", "///").path(), "/");
        assert_eq!(ResourceId::new("s", "a/b").path(), "/a/b");
    }

    #[test]
    fn test_remote_path_prefix() {
        assert_eq!(ResourceId::new("s", "/src/main.rs").to_remote().as_str(), "./src/main.rs");
        assert_eq!(ResourceId::root("s").to_remote().as_str(), "./");
    }

    #[test]
    fn test_parent() {
        assert_eq!(ResourceId::new("s", "/a/b/c.txt").parent().path(), "/a/b");
        assert_eq!(ResourceId::new("s", "/a.txt").parent().path(), "/");
        assert!(ResourceId::root("s").parent().is_root());
    }

    #[test]
    fn test_join() {
        let root = ResourceId::root("s");
        assert_eq!(root.join("a.txt").path(), "/a.txt");
        assert_eq!(root.join("sub").join("b").path(), "/sub/b");
    }

    #[test]
    fn test_parse_uri() {
        let id: ResourceId = "replit://abc-123/src/lib.rs".parse().unwrap();
        assert_eq!(id.session_id(), "abc-123");
        assert_eq!(id.path(), "/src/lib.rs");
        assert_eq!(id.to_string(), "replit://abc-123/src/lib.rs");

        let root: ResourceId = "replit://abc-123".parse().unwrap();
        assert!(root.is_root());
    }

    #[test]
    fn test_display_uses_default_scheme() {
        let id = ResourceId::new("abc", "/a.txt");
        assert_eq!(id.to_string(), "replit://abc/a.txt");
        assert_eq!(id.to_uri("vscode-replit"), "vscode-replit://abc/a.txt");
    }

    #[test]
    fn test_rescheme() {
        let text = ResourceId::new("abc", "/a.txt").to_string();
        assert_eq!(ResourceId::rescheme(text.clone(), "custom"), "custom://abc/a.txt");
        assert_eq!(ResourceId::rescheme(text.clone(), DEFAULT_SCHEME), text);
        assert_eq!(ResourceId::rescheme("disk full".into(), "custom"), "disk full");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            "no-scheme".parse::<ResourceId>(),
            Err(PathError::MissingScheme("no-scheme".to_string()))
        );
        assert!(matches!(
            "replit:///path".parse::<ResourceId>(),
            Err(PathError::MissingSession(_))
        ));
    }
}

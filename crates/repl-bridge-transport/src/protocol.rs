//! Wire protocol spoken over a session channel.
//!
//! One [`Command`] is sent per call; the file service answers with a
//! [`Response`]. The shell service receives `input`/`resizeTerm` commands and
//! pushes `output` commands back. File contents travel base64 encoded.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Service a channel is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Files,
    Shell,
}

impl Service {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Shell => "shell",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message sent to (or pushed by) a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    Mkdir {
        path: String,
    },
    Readdir {
        path: String,
    },
    Read {
        path: String,
    },
    Write {
        path: String,
        #[serde(with = "base64_bytes")]
        content: Bytes,
    },
    Remove {
        path: String,
    },
    Move {
        #[serde(rename = "oldPath")]
        old_path: String,
        #[serde(rename = "newPath")]
        new_path: String,
    },
    Stat {
        path: String,
    },
    /// Keystrokes for the shell.
    Input(String),
    /// Terminal size change.
    ResizeTerm {
        cols: u16,
        rows: u16,
    },
    /// Shell output pushed by the server.
    Output(String),
}

impl Command {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mkdir { .. } => "mkdir",
            Self::Readdir { .. } => "readdir",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Remove { .. } => "remove",
            Self::Move { .. } => "move",
            Self::Stat { .. } => "stat",
            Self::Input(_) => "input",
            Self::ResizeTerm { .. } => "resizeTerm",
            Self::Output(_) => "output",
        }
    }
}

/// Entry type as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireFileType {
    #[default]
    File,
    Directory,
    #[serde(other)]
    Other,
}

/// One `readdir` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(rename = "type", default)]
    pub file_type: WireFileType,
}

/// `readdir` payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Option<Vec<FileEntry>>,
}

/// `read` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub path: String,
    #[serde(with = "base64_bytes", default)]
    pub content: Bytes,
}

/// `stat` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatResult {
    #[serde(default)]
    pub exists: bool,
    #[serde(rename = "type", default)]
    pub file_type: WireFileType,
    #[serde(default)]
    pub size: u64,
    /// Unix epoch seconds.
    #[serde(default)]
    pub mod_time: i64,
}

/// Response to a file service request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Application error reported by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The channel died before the request completed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub channel_closed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<FileList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat_res: Option<StatResult>,
}

impl Response {
    /// Empty success.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// Application error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Transport-level closure marker.
    #[must_use]
    pub fn channel_closed() -> Self {
        Self {
            channel_closed: true,
            ..Self::default()
        }
    }

    /// `stat` answer for an existing entry.
    #[must_use]
    pub fn stat(file_type: WireFileType, size: u64, mod_time: i64) -> Self {
        Self {
            stat_res: Some(StatResult {
                exists: true,
                file_type,
                size,
                mod_time,
            }),
            ..Self::default()
        }
    }

    /// `stat` answer for a missing entry.
    #[must_use]
    pub fn stat_missing() -> Self {
        Self {
            stat_res: Some(StatResult::default()),
            ..Self::default()
        }
    }

    /// `readdir` answer.
    #[must_use]
    pub fn listing(entries: Vec<FileEntry>) -> Self {
        Self {
            files: Some(FileList {
                files: Some(entries),
            }),
            ..Self::default()
        }
    }

    /// `read` answer.
    #[must_use]
    pub fn content(path: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file: Some(FileContent {
                path: path.into(),
                content: content.into(),
            }),
            ..Self::default()
        }
    }

    /// The application error, treating an empty string as none.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

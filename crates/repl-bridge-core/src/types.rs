//! Filesystem value types shared by the bridge.

use serde::{Deserialize, Serialize};

use crate::path::ResourceId;

/// Kind of a filesystem entry.
///
/// The remote store only distinguishes directories from everything else, so
/// there is no symlink variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Directory,
}

/// Metadata for a file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub kind: FileType,
    /// Size in bytes.
    pub size: u64,
    /// Last modification, Unix epoch milliseconds.
    pub modified_at: i64,
    /// The store has no creation time; always equal to `modified_at`.
    pub created_at: i64,
}

impl FileStat {
    /// Build a stat from the remote's seconds-resolution modification time.
    #[must_use]
    pub const fn from_remote(kind: FileType, size: u64, mod_time_secs: i64) -> Self {
        let millis = mod_time_secs.saturating_mul(1000);
        Self {
            kind,
            size,
            modified_at: millis,
            created_at: millis,
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Directory
    }
}

/// Directory listing entry: name relative to the listed directory plus kind.
pub type DirEntry = (String, FileType);

/// Options for `write_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Allow creating the file when it does not exist.
    pub create: bool,
    /// Allow replacing an existing file.
    pub overwrite: bool,
}

impl WriteOptions {
    #[must_use]
    pub const fn new(create: bool, overwrite: bool) -> Self {
        Self { create, overwrite }
    }
}

/// Options for `rename`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenameOptions {
    pub overwrite: bool,
}

/// Options for `delete`.
///
/// `recursive` is accepted for contract compatibility but never forwarded;
/// the remote `remove` recurses however the store decides to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteOptions {
    pub recursive: bool,
}

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

/// A change notification for the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub resource: ResourceId,
}

impl ChangeEvent {
    #[must_use]
    pub const fn created(resource: ResourceId) -> Self {
        Self {
            kind: ChangeKind::Created,
            resource,
        }
    }

    #[must_use]
    pub const fn changed(resource: ResourceId) -> Self {
        Self {
            kind: ChangeKind::Changed,
            resource,
        }
    }

    #[must_use]
    pub const fn deleted(resource: ResourceId) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            resource,
        }
    }
}

/// Handle returned by `watch`. Change notification is push-based, so there
/// is nothing to release.
#[derive(Debug, Default)]
pub struct WatchHandle;

impl WatchHandle {
    pub const fn dispose(self) {}
}

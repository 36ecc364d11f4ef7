//! Core types for bridging remote repl sessions into a host editor.
//!
//! This crate provides the pieces every other layer shares:
//! - `ResourceId` / `RemotePath` - host identifiers and their remote form
//! - `FsError` and the remote error phrase table
//! - `FileStat`, `ChangeEvent` and operation options
//! - `ChangeEmitter` - fan-in of change events from many sessions
//! - `logging` - tracing subscriber setup

pub mod error;
pub mod events;
pub mod logging;
pub mod path;
pub mod types;

pub use error::{FsError, FsErrorKind};
pub use events::{ChangeBatch, ChangeEmitter};
pub use path::{RemotePath, ResourceId};
pub use types::{
    ChangeEvent, ChangeKind, DeleteOptions, DirEntry, FileStat, FileType, RenameOptions,
    WatchHandle, WriteOptions,
};

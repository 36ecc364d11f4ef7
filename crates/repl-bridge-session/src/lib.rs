//! Multi-session filesystem bridge for remote repls.
//!
//! Provides:
//! - `FilesystemAdapter` - host filesystem semantics over one session's file service
//! - `MultiSessionRouter` - session table, open dedup and operation dispatch
//! - `SessionOpener` / `TokenSessionOpener` - connecting a session by id
//! - Repl reference parsing and token fetch (`resolve`)
//! - `Options` - persisted JSON options
//! - `Commands` - user-facing command surface

pub mod adapter;
pub mod commands;
pub mod opener;
pub mod options;
pub mod resolve;
pub mod router;

pub use adapter::FilesystemAdapter;
pub use commands::{CommandError, Commands, WorkspaceFolder};
pub use opener::{Connector, OpenError, OpenedSession, SessionOpener, TokenSessionOpener};
pub use options::{Options, OptionsError};
pub use resolve::{Fetch, ReplApi, ReplInfo, ReplReference, ResolveError};
pub use router::{MultiSessionRouter, RouterConfig, SessionInfo};

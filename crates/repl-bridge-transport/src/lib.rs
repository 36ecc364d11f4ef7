//! Session channel plumbing.
//!
//! Provides:
//! - Wire protocol for the file and shell services
//! - `Transport` / `Channel` seams to the session transport library
//! - `ChannelSession` - current-channel tracking across reconnects
//! - `RetryingRequestExecutor` - transparent resubmission after closures
//! - In-memory mock transport (feature: test-util)

pub mod channel;
pub mod executor;
pub mod protocol;
pub mod traits;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use channel::{Attempt, ChannelSession, ChannelStatus, Lease};
pub use executor::RetryingRequestExecutor;
pub use protocol::{Command, Response, Service};
pub use traits::{Channel, ChannelEvent, ChannelPublisher, ChannelSubscription, Transport};

//! Interactive shell bridge for remote repl sessions.
//!
//! Provides:
//! - `TerminalBridge` - host pseudoterminal backed by a session's shell channel
//! - `TerminalEvents` - host-side receiver for output and close notifications

pub mod bridge;

pub use bridge::{TerminalBridge, TerminalDimensions, TerminalEvent, TerminalEvents, TerminalState};

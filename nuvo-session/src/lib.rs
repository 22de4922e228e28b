//! Protocol session for nuvo-sdk
//!
//! Sits between the raw transport and everything else. The session owns the
//! single physical link and provides the two guarantees the rest of the stack
//! is built on:
//!
//! - **Serialized writes**: one outstanding command at a time; a new command
//!   is not written until the previous one resolved (acknowledged, retries
//!   exhausted, or the link died). Commands queue in submission order.
//! - **Push delivery**: the reader keeps draining while a command is pending,
//!   so unsolicited keypad status pushes are never lost and never mistaken
//!   for an acknowledgement they don't match.
//!
//! # Architecture
//!
//! ```text
//!            ┌────────────── SessionWorker (one task) ──────────────┐
//! command ──▶ mpsc ──▶ encode ──▶ Transport ──▶ amplifier           │
//!            │   ▲ resolve/timeout/retry            │               │
//!            │   └── PendingCommand ◀── match ◀── FrameCodec ◀──────┘
//!            └──────────────────────│──────────────────────────────┘
//!                                   └──▶ broadcast (acks + pushes)
//! ```

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use session::{Session, SessionEvent};

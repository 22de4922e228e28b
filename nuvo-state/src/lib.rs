//! Zone and source state management for nuvo-sdk
//!
//! A small, reactive state layer: one canonical record per zone and per
//! source, mutated exclusively by [`StateStore::apply`] in response to frames
//! the amplifier actually confirmed. Nothing here guesses - a command that was
//! merely sent changes no state until its acknowledgement (or a keypad push)
//! arrives.
//!
//! # Architecture
//!
//! ```text
//! confirmed Frames → StateStore::apply → field deltas → broadcast::Receiver
//!                        (reducer)                       (group engine, entities)
//! ```
//!
//! Reads are concurrent and lock-cheap; writes flow through the single
//! reducer path so change notifications preserve frame-arrival order.

pub mod change;
pub mod model;
pub mod store;

pub use change::StateChange;
pub use model::{SourceState, VolumeLimits, ZoneState};
pub use store::StateStore;

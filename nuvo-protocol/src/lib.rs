//! NuVo serial protocol frame codec
//!
//! Implements the ASCII control dialect spoken by NuVo Grand Concerto and
//! Essentia G multi-zone amplifiers: commands are `*`-prefixed, carriage-return
//! terminated lines; responses and unsolicited status pushes are `#`-prefixed
//! lines on the same stream.
//!
//! # Architecture
//!
//! ```text
//! raw bytes → FrameCodec::feed → Frame (typed, immutable)
//! Command  → Command::encode   → raw bytes
//! ```
//!
//! The codec is stateless apart from a partial-frame buffer: truncated frames
//! are retained until more bytes arrive, and unrecognized bytes are discarded
//! up to the next frame start marker. Value validation happens when a
//! [`Command`] is constructed (via the bounded newtypes in [`value`]), never
//! inside `encode` - encoding is a pure, total function.

pub mod codec;
pub mod command;
pub mod error;
pub mod frame;
pub mod id;
pub mod model;
pub mod value;

pub use codec::FrameCodec;
pub use command::{Command, KeypadButton};
pub use error::{ProtocolError, Result};
pub use frame::{
    Frame, SourceConfig, ZoneButton, ZoneConfig, ZoneEq, ZoneStatus, ZoneVolumeConfig,
};
pub use id::{SourceId, ZoneId};
pub use model::Model;
pub use value::{Balance, Bass, Gain, Treble, Volume};

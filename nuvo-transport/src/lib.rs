//! Transport layer for nuvo-sdk
//!
//! One abstraction over the two ways an amplifier is physically reachable: a
//! local serial device (`/dev/ttyUSB0`) or a serial-over-network bridge
//! (`tcp://bridge-host:4001`). The transport moves bytes and reports loss of
//! the link; it never retries or reconnects - that policy belongs to the
//! supervising layer.

pub mod endpoint;
pub mod error;
pub mod transport;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use transport::{Duplex, Transport};

use nuvo_transport::TransportError;
use thiserror::Error;

/// Command and session-level errors
///
/// Framing noise never surfaces here - the codec recovers silently. These are
/// the failures a command issuer can actually observe.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The command went unacknowledged through every retry
    #[error("command unacknowledged after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// The amplifier answered with its error report (`#?`)
    #[error("amplifier rejected the command")]
    Rejected,

    /// The link died; pending and queued commands all fail with this
    #[error("session disconnected: {0}")]
    Disconnected(String),

    /// The session worker has already stopped
    #[error("session closed")]
    Closed,

    /// Invalid session configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure while opening or using the transport
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Type alias for results that can return a SessionError
pub type Result<T> = std::result::Result<T, SessionError>;

use nuvo_protocol::{ProtocolError, ZoneId};
use nuvo_session::SessionError;
use nuvo_transport::TransportError;
use thiserror::Error;

/// Top-level SDK errors
#[derive(Debug, Error)]
pub enum SdkError {
    /// Command or session failure (timeout, rejection, disconnect)
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Transport failure while connecting
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid field value
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The zone is not known to the state store or is disabled
    #[error("unknown zone {0}")]
    UnknownZone(ZoneId),

    /// Group operation rejected before any command was issued: self-join,
    /// unknown member, or a conflicting controller/member role
    #[error("invalid group operation: {0}")]
    InvalidGroupOperation(String),

    /// A party or paging override is already active elsewhere
    #[error("conflicting override mode: {0}")]
    ConflictingMode(String),
}

/// Type alias for results that can return an SdkError
pub type Result<T> = std::result::Result<T, SdkError>;

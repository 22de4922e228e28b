use thiserror::Error;

/// Errors raised while constructing protocol values or commands
///
/// Framing noise on the inbound path is never an error: the codec recovers by
/// resynchronizing to the next start marker and the bad bytes are dropped.
/// This enum covers the outbound direction, where invalid field values must be
/// rejected before a command reaches the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A numeric field value is outside the range the amplifier accepts
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    /// A text field contains characters the wire format cannot carry
    #[error("invalid {field}: {reason}")]
    InvalidText {
        field: &'static str,
        reason: &'static str,
    },
}

/// Type alias for results that can return a ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

use thiserror::Error;

/// Transport-level errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint string matched no known scheme or was malformed
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// Opening the serial device or network connection failed
    #[error("failed to open {endpoint}: {source}")]
    Open {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The link dropped mid-session; all in-flight work must be failed
    #[error("transport disconnected: {0}")]
    Disconnected(String),
}

/// Type alias for results that can return a TransportError
pub type Result<T> = std::result::Result<T, TransportError>;

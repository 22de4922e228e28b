//! Session configuration

use crate::error::SessionError;
use std::time::Duration;

/// Configuration for a [`Session`](crate::Session)
///
/// Controls the dispatcher's timeout/retry policy and channel sizing.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait window for one command acknowledgement attempt
    /// Default: 1 second
    pub command_timeout: Duration,

    /// Retries with the same payload after the first attempt times out
    /// Default: 2 (three attempts total)
    pub command_retries: u32,

    /// Depth of the submission-ordered command queue
    /// Default: 32
    pub command_queue_size: usize,

    /// Buffer size for the broadcast channel carrying acks and pushes
    /// Default: 256
    pub event_buffer_size: usize,

    /// Transport read buffer size in bytes
    /// Default: 1024
    pub read_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(1),
            command_retries: 2,
            command_queue_size: 32,
            event_buffer_size: 256,
            read_buffer_size: 1024,
        }
    }
}

impl SessionConfig {
    /// Create a SessionConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset that gives up quickly, for interactive probing
    pub fn fast_fail() -> Self {
        Self {
            command_timeout: Duration::from_millis(250),
            command_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_command_retries(mut self, retries: u32) -> Self {
        self.command_retries = retries;
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.command_timeout == Duration::ZERO {
            return Err(SessionError::Configuration(
                "command timeout must be greater than 0".to_string(),
            ));
        }
        if self.command_queue_size == 0 {
            return Err(SessionError::Configuration(
                "command queue size must be greater than 0".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(SessionError::Configuration(
                "event buffer size must be greater than 0".to_string(),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(SessionError::Configuration(
                "read buffer size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.command_timeout, Duration::from_secs(1));
        assert_eq!(config.command_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fast_fail_preset() {
        let config = SessionConfig::fast_fail();
        assert_eq!(config.command_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let config = SessionConfig::new().with_command_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}

//! Zone and source identity types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a physical amplifier zone (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(u8);

impl ZoneId {
    /// Create a ZoneId from the amplifier's 1-based zone number
    ///
    /// Returns `None` for zone 0, which the protocol never uses.
    pub fn new(id: u8) -> Option<Self> {
        if id == 0 {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Get the raw zone number
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Z{}", self.0)
    }
}

/// Identifier of a selectable audio source input (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(u8);

impl SourceId {
    /// Create a SourceId from the amplifier's 1-based source number
    pub fn new(id: u8) -> Option<Self> {
        if id == 0 {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Get the raw source number
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

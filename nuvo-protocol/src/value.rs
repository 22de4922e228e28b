//! Bounded protocol value types
//!
//! Every numeric field the amplifier accepts has a hard range. These newtypes
//! do all range validation at construction so that command encoding never has
//! to clamp or reject - an out-of-range value cannot exist past this module.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zone volume as attenuation, `0` (loudest) to `79` (quietest)
///
/// The amplifier expresses volume as dB of attenuation, so lower numbers are
/// louder. UI layers usually invert this before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Volume(u8);

impl Volume {
    /// Maximum attenuation (quietest audible setting)
    pub const MAX_ATTENUATION: u8 = 79;

    /// Create a volume from raw attenuation
    pub fn new(attenuation: u8) -> Result<Self> {
        if attenuation > Self::MAX_ATTENUATION {
            return Err(ProtocolError::OutOfRange {
                field: "volume",
                value: attenuation as i32,
                min: 0,
                max: Self::MAX_ATTENUATION as i32,
            });
        }
        Ok(Self(attenuation))
    }

    /// Get the raw attenuation value
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bass EQ level, `-18` to `18` dB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bass(i8);

impl Bass {
    pub fn new(level: i8) -> Result<Self> {
        bounded("bass", level, -18, 18)?;
        Ok(Self(level))
    }

    pub fn get(self) -> i8 {
        self.0
    }
}

/// Treble EQ level, `-18` to `18` dB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Treble(i8);

impl Treble {
    pub fn new(level: i8) -> Result<Self> {
        bounded("treble", level, -18, 18)?;
        Ok(Self(level))
    }

    pub fn get(self) -> i8 {
        self.0
    }
}

/// Stereo balance, `-18` (full left) through `0` (center) to `18` (full right)
///
/// On the wire this is carried as a side letter plus magnitude (`BALL9`,
/// `BALC`, `BALR9`); the signed form is easier for callers to step through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Balance(i8);

impl Balance {
    pub fn new(position: i8) -> Result<Self> {
        bounded("balance", position, -18, 18)?;
        Ok(Self(position))
    }

    /// Centered balance
    pub fn center() -> Self {
        Self(0)
    }

    pub fn get(self) -> i8 {
        self.0
    }

    /// Render the wire form: side letter plus magnitude
    pub(crate) fn wire_form(self) -> String {
        match self.0 {
            0 => "C".to_string(),
            n if n < 0 => format!("L{}", -n),
            n => format!("R{}", n),
        }
    }

    /// Parse the wire form back into a signed position
    pub(crate) fn from_wire(s: &str) -> Option<Self> {
        match s.split_at_checked(1)? {
            ("C", "") => Some(Self(0)),
            ("L", mag) => mag.parse::<i8>().ok().and_then(|m| Self::new(-m).ok()),
            ("R", mag) => mag.parse::<i8>().ok().and_then(|m| Self::new(m).ok()),
            _ => None,
        }
    }
}

/// Source input gain, `0` to `14` dB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gain(u8);

impl Gain {
    pub fn new(level: u8) -> Result<Self> {
        bounded("gain", level as i8, 0, 14)?;
        Ok(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

fn bounded(field: &'static str, value: i8, min: i8, max: i8) -> Result<()> {
    if value < min || value > max {
        return Err(ProtocolError::OutOfRange {
            field,
            value: value as i32,
            min: min as i32,
            max: max as i32,
        });
    }
    Ok(())
}

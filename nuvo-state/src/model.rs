//! Canonical state records

use nuvo_protocol::{Balance, Bass, Gain, SourceId, Treble, Volume, ZoneId};
use serde::{Deserialize, Serialize};

/// Installer volume limits for one zone, reported as a unit by the amplifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeLimits {
    /// Loudest volume the zone may be set to
    pub max: Volume,
    /// Volume applied at power-on when reset is enabled
    pub initial: Volume,
    /// Volume forced during paging
    pub page: Volume,
    /// Volume forced during a native party
    pub party: Volume,
    /// Whether power-on resets the zone to the initial volume
    pub reset_on_power_on: bool,
}

/// Complete state of one amplifier zone
///
/// Created when the first frame mentioning the zone arrives (normally during
/// the full-state sweep at connection start), lives for the session. Fields
/// the amplifier has not reported yet are `None`; volume keeps its last
/// reported value across mute and power-off so overrides can be restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneState {
    pub zone: ZoneId,
    /// Installer name, from zone configuration
    pub name: Option<String>,
    /// Disabled zones exist physically but take no part in grouping or paging
    pub enabled: bool,
    pub power: bool,
    pub mute: bool,
    pub volume: Option<Volume>,
    pub source: Option<SourceId>,
    pub bass: Option<Bass>,
    pub treble: Option<Treble>,
    pub balance: Option<Balance>,
    pub loudness: Option<bool>,
    pub dnd: bool,
    pub lock: bool,
    pub limits: Option<VolumeLimits>,
}

impl ZoneState {
    /// Fresh record for a zone nothing has been heard from yet
    pub fn new(zone: ZoneId) -> Self {
        Self {
            zone,
            name: None,
            enabled: true,
            power: false,
            mute: false,
            volume: None,
            source: None,
            bass: None,
            treble: None,
            balance: None,
            loudness: None,
            dnd: false,
            lock: false,
            limits: None,
        }
    }

    /// Whether the zone is on and unmuted
    pub fn is_audible(&self) -> bool {
        self.power && !self.mute
    }
}

/// Complete state of one source input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    pub source: SourceId,
    pub name: Option<String>,
    pub enabled: bool,
    pub gain: Option<Gain>,
    /// Whether the source is a Nuvonet device on the proprietary control bus
    pub nuvonet: Option<bool>,
}

impl SourceState {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            name: None,
            enabled: true,
            gain: None,
            nuvonet: None,
        }
    }
}

//! Field-level state change notifications

use crate::model::VolumeLimits;
use nuvo_protocol::{Balance, Bass, SourceId, Treble, Volume, ZoneId};
use serde::{Deserialize, Serialize};

/// One actual state transition, emitted by the reducer
///
/// Re-confirmations of unchanged values emit nothing; subscribers only see
/// real deltas, carrying the old and new values where the old one was known.
/// Delivery order matches the arrival order of the confirming frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    /// First frame mentioning this zone arrived; its record now exists
    ZoneDiscovered { zone: ZoneId },

    /// First frame mentioning this source arrived
    SourceDiscovered { source: SourceId },

    PowerChanged {
        zone: ZoneId,
        old: bool,
        new: bool,
    },

    MuteChanged {
        zone: ZoneId,
        old: bool,
        new: bool,
    },

    VolumeChanged {
        zone: ZoneId,
        old: Option<Volume>,
        new: Volume,
    },

    SourceChanged {
        zone: ZoneId,
        old: Option<SourceId>,
        new: SourceId,
    },

    BassChanged {
        zone: ZoneId,
        old: Option<Bass>,
        new: Bass,
    },

    TrebleChanged {
        zone: ZoneId,
        old: Option<Treble>,
        new: Treble,
    },

    BalanceChanged {
        zone: ZoneId,
        old: Option<Balance>,
        new: Balance,
    },

    LoudnessChanged {
        zone: ZoneId,
        old: Option<bool>,
        new: bool,
    },

    VolumeLimitsChanged {
        zone: ZoneId,
        old: Option<VolumeLimits>,
        new: VolumeLimits,
    },

    /// Installer zone configuration (name, enabled, slaving) changed
    ZoneConfigChanged { zone: ZoneId },

    /// Source configuration (name, gain, nuvonet flag) changed
    SourceConfigChanged { source: SourceId },
}

impl StateChange {
    /// The zone this change belongs to, if it is zone-scoped
    pub fn zone(&self) -> Option<ZoneId> {
        match self {
            StateChange::ZoneDiscovered { zone }
            | StateChange::PowerChanged { zone, .. }
            | StateChange::MuteChanged { zone, .. }
            | StateChange::VolumeChanged { zone, .. }
            | StateChange::SourceChanged { zone, .. }
            | StateChange::BassChanged { zone, .. }
            | StateChange::TrebleChanged { zone, .. }
            | StateChange::BalanceChanged { zone, .. }
            | StateChange::LoudnessChanged { zone, .. }
            | StateChange::VolumeLimitsChanged { zone, .. }
            | StateChange::ZoneConfigChanged { zone } => Some(*zone),
            StateChange::SourceDiscovered { .. } | StateChange::SourceConfigChanged { .. } => None,
        }
    }

    /// Whether this change is one the group engine mirrors to members
    pub fn is_group_relevant(&self) -> bool {
        matches!(
            self,
            StateChange::PowerChanged { .. }
                | StateChange::MuteChanged { .. }
                | StateChange::VolumeChanged { .. }
                | StateChange::SourceChanged { .. }
        )
    }
}

//! Amplifier model catalog

use crate::id::{SourceId, ZoneId};
use serde::{Deserialize, Serialize};

/// Supported amplifier models
///
/// Both families speak the same control dialect; they differ only in how many
/// physical zones and sources exist, which bounds the full-state sweep at
/// connection start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    /// NV-I8G / NV-I8GM, 16 zones with expanders
    GrandConcerto,
    /// NV-E6G, 12 zones with expanders
    EssentiaG,
}

impl Model {
    /// Number of addressable zones, expanders included
    pub fn zone_count(self) -> u8 {
        match self {
            Model::GrandConcerto => 16,
            Model::EssentiaG => 12,
        }
    }

    /// Number of selectable source inputs
    pub fn source_count(self) -> u8 {
        6
    }

    /// Iterate every addressable zone id for this model
    pub fn zones(self) -> impl Iterator<Item = ZoneId> {
        // ZoneId::new only fails for 0, which the range excludes
        (1..=self.zone_count()).filter_map(ZoneId::new)
    }

    /// Iterate every source id for this model
    pub fn sources(self) -> impl Iterator<Item = SourceId> {
        (1..=self.source_count()).filter_map(SourceId::new)
    }
}

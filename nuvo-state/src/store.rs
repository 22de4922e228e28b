//! The state store and its reducer

use crate::change::StateChange;
use crate::model::{SourceState, VolumeLimits, ZoneState};
use nuvo_protocol::{Frame, SourceId, ZoneId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Canonical, session-lived zone and source state
///
/// Cloning shares the underlying maps and the change channel. Reads can come
/// from any task; mutation happens only through [`StateStore::apply`], which
/// the session event pump calls with every confirmed frame, so notification
/// order always matches frame-arrival order.
pub struct StateStore {
    zones: Arc<RwLock<HashMap<ZoneId, ZoneState>>>,
    sources: Arc<RwLock<HashMap<SourceId, SourceState>>>,
    changes_tx: broadcast::Sender<StateChange>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(1024);
        Self {
            zones: Arc::new(RwLock::new(HashMap::new())),
            sources: Arc::new(RwLock::new(HashMap::new())),
            changes_tx,
        }
    }

    /// Subscribe to every field-level state transition
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes_tx.subscribe()
    }

    /// Current state of one zone
    pub fn zone(&self, zone: ZoneId) -> Option<ZoneState> {
        self.zones.read().get(&zone).cloned()
    }

    /// All known zones, in zone-id order
    pub fn zones(&self) -> Vec<ZoneState> {
        let mut zones: Vec<ZoneState> = self.zones.read().values().cloned().collect();
        zones.sort_by_key(|z| z.zone);
        zones
    }

    /// Current state of one source
    pub fn source(&self, source: SourceId) -> Option<SourceState> {
        self.sources.read().get(&source).cloned()
    }

    /// All known sources, in source-id order
    pub fn sources(&self) -> Vec<SourceState> {
        let mut sources: Vec<SourceState> = self.sources.read().values().cloned().collect();
        sources.sort_by_key(|s| s.source);
        sources
    }

    /// Reduce one confirmed frame into the store
    ///
    /// Pure with respect to everything except the affected record: each field
    /// that actually changed produces one [`StateChange`], broadcast in order
    /// and also returned for the caller. Frames that carry no zone/source
    /// state (buttons, paging display, the error report) reduce to nothing.
    pub fn apply(&self, frame: &Frame) -> Vec<StateChange> {
        let changes = match frame {
            Frame::ZoneStatus(status) => self.with_zone(status.zone, |zone| {
                let id = zone.zone;
                let mut changes = Vec::new();
                delta_bool(&mut zone.power, status.power, |old, new| {
                    StateChange::PowerChanged { zone: id, old, new }
                }, &mut changes);

                if status.power {
                    if let Some(source) = status.source {
                        delta_opt(&mut zone.source, source, |old, new| {
                            StateChange::SourceChanged { zone: id, old, new }
                        }, &mut changes);
                    }
                    delta_bool(&mut zone.mute, status.mute, |old, new| {
                        StateChange::MuteChanged { zone: id, old, new }
                    }, &mut changes);
                    if let Some(volume) = status.volume {
                        delta_opt(&mut zone.volume, volume, |old, new| {
                            StateChange::VolumeChanged { zone: id, old, new }
                        }, &mut changes);
                    }
                }

                // Advisory flags, not worth a notification
                zone.dnd = status.dnd;
                zone.lock = status.lock;
                changes
            }),

            Frame::ZoneEq(eq) => self.with_zone(eq.zone, |zone| {
                let id = zone.zone;
                let mut changes = Vec::new();
                delta_opt(&mut zone.bass, eq.bass, |old, new| {
                    StateChange::BassChanged { zone: id, old, new }
                }, &mut changes);
                delta_opt(&mut zone.treble, eq.treble, |old, new| {
                    StateChange::TrebleChanged { zone: id, old, new }
                }, &mut changes);
                delta_opt(&mut zone.balance, eq.balance, |old, new| {
                    StateChange::BalanceChanged { zone: id, old, new }
                }, &mut changes);
                delta_opt(&mut zone.loudness, eq.loudness, |old, new| {
                    StateChange::LoudnessChanged { zone: id, old, new }
                }, &mut changes);
                changes
            }),

            Frame::ZoneVolumeConfig(cfg) => self.with_zone(cfg.zone, |zone| {
                let id = zone.zone;
                let limits = VolumeLimits {
                    max: cfg.max,
                    initial: cfg.initial,
                    page: cfg.page,
                    party: cfg.party,
                    reset_on_power_on: cfg.reset_on_power_on,
                };
                let mut changes = Vec::new();
                delta_opt(&mut zone.limits, limits, |old, new| {
                    StateChange::VolumeLimitsChanged { zone: id, old, new }
                }, &mut changes);
                changes
            }),

            Frame::ZoneConfig(cfg) => self.with_zone(cfg.zone, |zone| {
                let changed = zone.enabled != cfg.enabled
                    || zone.name.as_deref() != Some(cfg.name.as_str());
                zone.enabled = cfg.enabled;
                zone.name = Some(cfg.name.clone());
                if changed {
                    vec![StateChange::ZoneConfigChanged { zone: zone.zone }]
                } else {
                    Vec::new()
                }
            }),

            Frame::SourceConfig(cfg) => {
                let mut sources = self.sources.write();
                let mut changes = Vec::new();
                let entry = sources.entry(cfg.source).or_insert_with(|| {
                    changes.push(StateChange::SourceDiscovered { source: cfg.source });
                    SourceState::new(cfg.source)
                });
                let changed = entry.enabled != cfg.enabled
                    || entry.name.as_deref() != Some(cfg.name.as_str())
                    || entry.gain != Some(cfg.gain)
                    || entry.nuvonet != Some(cfg.nuvonet);
                entry.enabled = cfg.enabled;
                entry.name = Some(cfg.name.clone());
                entry.gain = Some(cfg.gain);
                entry.nuvonet = Some(cfg.nuvonet);
                if changed {
                    changes.push(StateChange::SourceConfigChanged { source: cfg.source });
                }
                changes
            }

            // The amplifier confirmed a global transition: reduce it onto
            // every known zone rather than waiting for per-zone echoes.
            Frame::AllOff => self.for_all_zones(|zone, changes| {
                let id = zone.zone;
                delta_bool(&mut zone.power, false, |old, new| {
                    StateChange::PowerChanged { zone: id, old, new }
                }, changes);
            }),

            Frame::MuteAll(muted) => {
                let muted = *muted;
                self.for_all_zones(|zone, changes| {
                    let id = zone.zone;
                    if zone.power {
                        delta_bool(&mut zone.mute, muted, |old, new| {
                            StateChange::MuteChanged { zone: id, old, new }
                        }, changes);
                    }
                })
            }

            Frame::ZoneButton(_) | Frame::Paging(_) | Frame::Error | Frame::Unknown(_) => {
                Vec::new()
            }
        };

        for change in &changes {
            debug!(?change, "state transition");
            let _ = self.changes_tx.send(change.clone());
        }
        changes
    }

    fn with_zone<F>(&self, zone: ZoneId, reduce: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut ZoneState) -> Vec<StateChange>,
    {
        let mut zones = self.zones.write();
        let mut discovered = Vec::new();
        let entry = zones.entry(zone).or_insert_with(|| {
            discovered.push(StateChange::ZoneDiscovered { zone });
            ZoneState::new(zone)
        });
        discovered.extend(reduce(entry));
        discovered
    }

    fn for_all_zones<F>(&self, mut reduce: F) -> Vec<StateChange>
    where
        F: FnMut(&mut ZoneState, &mut Vec<StateChange>),
    {
        let mut zones = self.zones.write();
        let mut ids: Vec<ZoneId> = zones.keys().copied().collect();
        ids.sort();
        let mut changes = Vec::new();
        for id in ids {
            if let Some(zone) = zones.get_mut(&id) {
                reduce(zone, &mut changes);
            }
        }
        changes
    }
}

/// Update a bool field, recording a change when the value flips
fn delta_bool<F>(field: &mut bool, new: bool, make: F, changes: &mut Vec<StateChange>)
where
    F: FnOnce(bool, bool) -> StateChange,
{
    if *field != new {
        let old = *field;
        *field = new;
        changes.push(make(old, new));
    }
}

/// Update an optional field, recording a change when the value differs
fn delta_opt<T, F>(field: &mut Option<T>, new: T, make: F, changes: &mut Vec<StateChange>)
where
    T: PartialEq + Copy,
    F: FnOnce(Option<T>, T) -> StateChange,
{
    if *field != Some(new) {
        let old = *field;
        *field = Some(new);
        changes.push(make(old, new));
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StateStore {
    fn clone(&self) -> Self {
        Self {
            zones: self.zones.clone(),
            sources: self.sources.clone(),
            changes_tx: self.changes_tx.clone(),
        }
    }
}

//! Party, paging and snapshot overrides
//!
//! Mutually-exclusive override modes layered over plain zone commands:
//!
//! - **Party**: one host zone's source plays on every powered-on zone.
//! - **Paging**: every zone is forced to the announcement source at its page
//!   volume, powered on if needed.
//!
//! Entering an override snapshots the affected zones first; leaving restores
//! them - unless a zone was powered off while overridden, in which case the
//! restore is skipped and the override flag simply cleared. Snapshots are one
//! level deep, last capture wins.

use crate::error::{Result, SdkError};
use crate::group::merge_status;
use crate::snapshot::{Snapshot, SnapshotStore};
use nuvo_protocol::{Command, SourceId, Volume, ZoneId};
use nuvo_session::Session;
use nuvo_state::{StateStore, ZoneState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A zone's current override status, exclusive per zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum OverrideMode {
    #[default]
    Normal,
    Paged,
    PartyHost,
    PartyMember,
}

/// Paging announcement configuration
///
/// Zones page at their installer-set page volume when the amplifier has
/// reported one; the fallback applies otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageConfig {
    pub source: SourceId,
    pub fallback_volume: Volume,
}

impl PageConfig {
    pub fn new(source: SourceId, fallback_volume: Volume) -> Self {
        Self {
            source,
            fallback_volume,
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            // Source 6 is the conventional page input on both families
            source: SourceId::new(6).expect("source 6 is valid"),
            fallback_volume: Volume::new(40).expect("volume 40 is in range"),
        }
    }
}

#[derive(Default)]
struct OverrideState {
    modes: HashMap<ZoneId, OverrideMode>,
    party_host: Option<ZoneId>,
    paging: bool,
}

/// Party/page/snapshot controller
///
/// All override bookkeeping lives under one lock so a party cannot race a
/// page. Zone forcing happens through the shared session queue like any
/// other command; a zone that fails to comply is reported and skipped, never
/// aborting the sweep.
#[derive(Clone)]
pub struct OverrideController {
    session: Session,
    store: StateStore,
    snapshots: SnapshotStore,
    page: PageConfig,
    state: Arc<Mutex<OverrideState>>,
}

impl OverrideController {
    pub(crate) fn new(
        session: Session,
        store: StateStore,
        snapshots: SnapshotStore,
        page: PageConfig,
    ) -> Self {
        Self {
            session,
            store,
            snapshots,
            page,
            state: Arc::new(Mutex::new(OverrideState::default())),
        }
    }

    /// A zone's current override mode
    pub async fn mode(&self, zone: ZoneId) -> OverrideMode {
        self.state
            .lock()
            .await
            .modes
            .get(&zone)
            .copied()
            .unwrap_or_default()
    }

    /// The zone currently hosting a party, if any
    pub async fn party_host(&self) -> Option<ZoneId> {
        self.state.lock().await.party_host
    }

    /// Whether a paging override is active
    pub async fn is_paging(&self) -> bool {
        self.state.lock().await.paging
    }

    /// Make `host` the party host: its source plays on every powered-on zone
    ///
    /// Only zones that are on when the party starts take part; each is
    /// snapshotted before its source is switched. Fails with
    /// [`SdkError::ConflictingMode`] if another zone already hosts a party or
    /// paging is active - checked before any snapshot is taken.
    pub async fn party_on(&self, host: ZoneId) -> Result<()> {
        let mut ov = self.state.lock().await;
        if ov.paging {
            return Err(SdkError::ConflictingMode("paging is active".to_string()));
        }
        match ov.party_host {
            Some(current) if current != host => {
                return Err(SdkError::ConflictingMode(format!(
                    "{current} is already the party host"
                )));
            }
            Some(_) => return Ok(()),
            None => {}
        }

        let mut host_state = self.known_zone(host)?;
        if !host_state.power {
            let ack = self
                .session
                .command(Command::SetPower {
                    zone: host,
                    on: true,
                })
                .await?;
            merge_status(&mut host_state, &ack);
        }
        let party_source = host_state.source.ok_or(SdkError::UnknownZone(host))?;

        for zone in self.store.zones() {
            if zone.zone == host || !zone.enabled || !zone.power {
                continue;
            }
            debug!(zone = %zone.zone, %party_source, "zone joins the party");
            self.snapshots.capture(zone.clone());
            self.issue_sweep(Command::SetSource {
                zone: zone.zone,
                source: party_source,
            })
            .await;
            ov.modes.insert(zone.zone, OverrideMode::PartyMember);
        }

        ov.modes.insert(host, OverrideMode::PartyHost);
        ov.party_host = Some(host);
        Ok(())
    }

    /// End the party hosted by `host` and restore every member
    ///
    /// A no-op when no party is active; rejected when a different zone hosts.
    pub async fn party_off(&self, host: ZoneId) -> Result<()> {
        let mut ov = self.state.lock().await;
        match ov.party_host {
            None => return Ok(()),
            Some(current) if current != host => {
                return Err(SdkError::ConflictingMode(format!(
                    "{current} is the party host"
                )));
            }
            Some(_) => {}
        }
        self.end_party(&mut ov).await;
        Ok(())
    }

    /// Force every zone to the announcement source at page volume
    ///
    /// Every enabled zone is snapshotted (off zones as off), powered on,
    /// unmuted and switched; an active party is exited first. The amplifier's
    /// native page flag is raised too so keypads show paging.
    pub async fn page_on(&self) -> Result<()> {
        let mut ov = self.state.lock().await;
        if ov.paging {
            return Err(SdkError::ConflictingMode(
                "paging is already active".to_string(),
            ));
        }
        if ov.party_host.is_some() {
            debug!("paging requested during a party, ending the party first");
            self.end_party(&mut ov).await;
        }

        self.issue_sweep(Command::Page(true)).await;

        for zone in self.store.zones() {
            if !zone.enabled {
                continue;
            }
            let volume = zone
                .limits
                .map(|l| l.page)
                .unwrap_or(self.page.fallback_volume);
            debug!(zone = %zone.zone, %volume, "forcing zone to page source");
            self.snapshots.capture(zone.clone());

            if !zone.power {
                self.issue_sweep(Command::SetPower {
                    zone: zone.zone,
                    on: true,
                })
                .await;
            }
            self.issue_sweep(Command::SetSource {
                zone: zone.zone,
                source: self.page.source,
            })
            .await;
            if zone.mute {
                self.issue_sweep(Command::SetMute {
                    zone: zone.zone,
                    mute: false,
                })
                .await;
            }
            self.issue_sweep(Command::SetVolume {
                zone: zone.zone,
                volume,
            })
            .await;
            ov.modes.insert(zone.zone, OverrideMode::Paged);
        }

        ov.paging = true;
        Ok(())
    }

    /// End paging and restore every zone to its pre-page state
    ///
    /// Zones that were off before paging return to off, discarding any
    /// power-on that happened during the page. A no-op when not paging.
    pub async fn page_off(&self) -> Result<()> {
        let mut ov = self.state.lock().await;
        if !ov.paging {
            return Ok(());
        }

        self.issue_sweep(Command::Page(false)).await;

        let mut paged: Vec<ZoneId> = ov
            .modes
            .iter()
            .filter(|(_, mode)| **mode == OverrideMode::Paged)
            .map(|(zone, _)| *zone)
            .collect();
        paged.sort();
        for zone in paged {
            self.restore_after_override(zone).await;
            ov.modes.remove(&zone);
        }

        ov.paging = false;
        Ok(())
    }

    /// Explicitly capture a zone's current state
    pub async fn snapshot(&self, zone: ZoneId) -> Result<()> {
        let state = self.known_zone(zone)?;
        self.snapshots.capture(state);
        Ok(())
    }

    /// Replay a zone's captured state
    ///
    /// Idempotent: the snapshot survives the restore, so repeating it
    /// reproduces the same target state. A zone with no snapshot is left
    /// untouched.
    pub async fn restore(&self, zone: ZoneId) -> Result<()> {
        if let Some(snapshot) = self.snapshots.get(zone) {
            self.replay(&snapshot).await?;
        }
        Ok(())
    }

    /// End an active party: restore members, clear all party flags.
    /// Must be called with the override lock held.
    async fn end_party(&self, ov: &mut OverrideState) {
        let mut members: Vec<ZoneId> = ov
            .modes
            .iter()
            .filter(|(_, mode)| **mode == OverrideMode::PartyMember)
            .map(|(zone, _)| *zone)
            .collect();
        members.sort();
        for zone in members {
            self.restore_after_override(zone).await;
            ov.modes.remove(&zone);
        }
        if let Some(host) = ov.party_host.take() {
            ov.modes.remove(&host);
        }
    }

    /// Restore one zone when its override ends
    ///
    /// The restore is skipped when the zone was powered off during the
    /// override; a zone whose snapshot says "off" is commanded back off.
    async fn restore_after_override(&self, zone: ZoneId) {
        let Some(snapshot) = self.snapshots.get(zone) else {
            return;
        };
        let currently_on = self.store.zone(zone).map(|z| z.power).unwrap_or(false);

        if snapshot.state.power {
            if currently_on {
                if let Err(e) = self.replay(&snapshot).await {
                    warn!(%zone, error = %e, "override restore failed");
                }
            } else {
                debug!(%zone, "zone powered off while overridden, restore skipped");
            }
        } else if currently_on {
            self.issue_sweep(Command::SetPower { zone, on: false }).await;
        }
    }

    /// Issue the commands that reproduce a snapshot's observable state
    async fn replay(&self, snapshot: &Snapshot) -> Result<()> {
        let zone = snapshot.zone;
        let state = &snapshot.state;

        if !state.power {
            self.session
                .command(Command::SetPower { zone, on: false })
                .await?;
            return Ok(());
        }

        self.session
            .command(Command::SetPower { zone, on: true })
            .await?;
        if let Some(source) = state.source {
            self.session
                .command(Command::SetSource { zone, source })
                .await?;
        }
        if state.mute {
            self.session
                .command(Command::SetMute { zone, mute: true })
                .await?;
        } else {
            self.session
                .command(Command::SetMute { zone, mute: false })
                .await?;
            if let Some(volume) = state.volume {
                self.session
                    .command(Command::SetVolume { zone, volume })
                    .await?;
            }
        }
        Ok(())
    }

    /// One command in an all-zones sweep: report failures, keep sweeping
    async fn issue_sweep(&self, command: Command) {
        if let Err(e) = self.session.command(command.clone()).await {
            warn!(?command, error = %e, "override sweep command failed");
        }
    }

    fn known_zone(&self, zone: ZoneId) -> Result<ZoneState> {
        self.store
            .zone(zone)
            .filter(|z| z.enabled)
            .ok_or(SdkError::UnknownZone(zone))
    }
}

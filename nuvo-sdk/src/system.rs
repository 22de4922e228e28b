//! System facade: connection, state bootstrap, and the full control surface

use crate::error::{Result, SdkError};
use crate::group::{GroupEngine, GroupMembership, GroupRole};
use crate::party::{OverrideController, OverrideMode, PageConfig};
use crate::snapshot::SnapshotStore;
use crate::zone::{Source, Zone};
use nuvo_protocol::{Command, Frame, KeypadButton, Model, SourceId, ZoneId};
use nuvo_session::{Session, SessionConfig, SessionError, SessionEvent};
use nuvo_state::{StateChange, StateStore};
use nuvo_transport::{Endpoint, Transport};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// A keypad transport button pressed at a physical zone keypad
///
/// Surfaced as its own stream (rather than through the state store) because a
/// button press is an event, not state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ButtonEvent {
    pub zone: ZoneId,
    pub source: SourceId,
    pub button: KeypadButton,
}

/// System-level configuration
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Dispatcher timeout/retry policy
    pub session: SessionConfig,
    /// Paging announcement source and fallback volume
    pub page: PageConfig,
    /// Attenuation steps taken by `volume_up` / `volume_down`
    /// Default: 2
    pub volume_step: u8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            page: PageConfig::default(),
            volume_step: 2,
        }
    }
}

impl SystemConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_page(mut self, page: PageConfig) -> Self {
        self.page = page;
        self
    }

    pub fn with_volume_step(mut self, step: u8) -> Self {
        self.volume_step = step;
        self
    }
}

/// Handle to one amplifier system
///
/// Owns nothing durable: all state is session-lived and rebuilt from the
/// full-state sweep at connection time. Cloning shares the session, store and
/// engines.
///
/// # Example
///
/// ```rust,ignore
/// use nuvo_sdk::{Model, NuvoSystem};
///
/// let system = NuvoSystem::connect("tcp://bridge:4001", Model::GrandConcerto).await?;
/// for state in system.zones() {
///     println!("{}: {}", state.zone, if state.power { "on" } else { "off" });
/// }
/// ```
#[derive(Clone)]
pub struct NuvoSystem {
    model: Model,
    session: Session,
    store: StateStore,
    groups: GroupEngine,
    overrides: OverrideController,
    buttons_tx: broadcast::Sender<ButtonEvent>,
    volume_step: u8,
}

impl NuvoSystem {
    /// Connect to an amplifier and run the full-state sweep
    ///
    /// `endpoint` is a serial device path or a `tcp://host:port` bridge
    /// address.
    pub async fn connect(endpoint: &str, model: Model) -> Result<Self> {
        Self::connect_with_config(endpoint, model, SystemConfig::default()).await
    }

    /// Connect with explicit configuration
    pub async fn connect_with_config(
        endpoint: &str,
        model: Model,
        config: SystemConfig,
    ) -> Result<Self> {
        let endpoint: Endpoint = endpoint.parse()?;
        let transport = Transport::connect(&endpoint).await?;
        info!(%endpoint, ?model, "connected to amplifier");

        let session = Session::open(transport, config.session.clone());
        let system = Self::attach(session, model, config);
        system.initial_sync().await?;
        Ok(system)
    }

    /// Build a system over an already-open session
    ///
    /// Starts the event pump and the group propagation task but does not run
    /// the full-state sweep; call [`initial_sync`](Self::initial_sync) to
    /// populate the store.
    pub fn attach(session: Session, model: Model, config: SystemConfig) -> Self {
        let store = StateStore::new();
        let groups = GroupEngine::new(session.clone(), store.clone());
        let overrides = OverrideController::new(
            session.clone(),
            store.clone(),
            SnapshotStore::new(),
            config.page,
        );
        let (buttons_tx, _) = broadcast::channel(64);

        let system = Self {
            model,
            session,
            store,
            groups,
            overrides,
            buttons_tx,
            volume_step: config.volume_step,
        };
        system.spawn_event_pump();
        system.groups.spawn_propagation();
        system
    }

    /// Query full state for every physical zone and source of the model
    ///
    /// Zones that never answer (absent expanders) are skipped after their
    /// status query times out; a dead link aborts the sweep.
    pub async fn initial_sync(&self) -> Result<()> {
        for zone in self.model.zones() {
            match self.session.command(Command::ZoneStatusQuery { zone }).await {
                Ok(_) => {}
                Err(SessionError::Timeout { .. }) => {
                    debug!(%zone, "zone absent, skipping remaining queries");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            for query in [
                Command::ZoneConfigQuery { zone },
                Command::ZoneEqQuery { zone },
                Command::ZoneVolumeConfigQuery { zone },
            ] {
                match self.session.command(query).await {
                    Ok(_) | Err(SessionError::Timeout { .. } | SessionError::Rejected) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        for source in self.model.sources() {
            match self.session.command(Command::SourceConfigQuery { source }).await {
                Ok(_) | Err(SessionError::Timeout { .. } | SessionError::Rejected) => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            zones = self.store.zones().len(),
            sources = self.store.sources().len(),
            "full-state sweep complete"
        );
        Ok(())
    }

    /// Route every confirmed frame into the store; keypad buttons get their
    /// own stream.
    fn spawn_event_pump(&self) {
        let mut events = self.session.subscribe();
        let store = self.store.clone();
        let buttons_tx = self.buttons_tx.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Frame { frame, .. }) => {
                        if let Frame::ZoneButton(button) = &frame {
                            let _ = buttons_tx.send(ButtonEvent {
                                zone: button.zone,
                                source: button.source,
                                button: button.button,
                            });
                        }
                        store.apply(&frame);
                    }
                    Ok(SessionEvent::Disconnected { reason }) => {
                        warn!(%reason, "event pump stopping, session lost");
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "event pump lagged behind session events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// The amplifier model this system was opened for
    pub fn model(&self) -> Model {
        self.model
    }

    /// The underlying protocol session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Command handle for one zone
    pub fn zone(&self, zone: ZoneId) -> Result<Zone> {
        self.store
            .zone(zone)
            .filter(|z| z.enabled)
            .ok_or(SdkError::UnknownZone(zone))?;
        Ok(Zone::new(
            zone,
            self.session.clone(),
            self.store.clone(),
            self.volume_step,
        ))
    }

    /// Command handle for one source
    pub fn source(&self, source: SourceId) -> Option<Source> {
        self.store.source(source)?;
        Some(Source::new(source, self.session.clone(), self.store.clone()))
    }

    /// Current state of every known zone, in zone-id order
    pub fn zones(&self) -> Vec<nuvo_state::ZoneState> {
        self.store.zones()
    }

    /// Current state of every known source, in source-id order
    pub fn sources(&self) -> Vec<nuvo_state::SourceState> {
        self.store.sources()
    }

    /// Current state of one zone
    pub fn zone_state(&self, zone: ZoneId) -> Option<nuvo_state::ZoneState> {
        self.store.zone(zone)
    }

    /// Subscribe to field-level state change notifications
    pub fn changes(&self) -> broadcast::Receiver<StateChange> {
        self.store.subscribe()
    }

    /// Subscribe to keypad button presses
    pub fn button_events(&self) -> broadcast::Receiver<ButtonEvent> {
        self.buttons_tx.subscribe()
    }

    // ========================================================================
    // Grouping
    // ========================================================================

    /// Make `controller` mirror its state to `members`
    pub async fn join(&self, controller: ZoneId, members: &[ZoneId]) -> Result<()> {
        self.groups.join(controller, members).await
    }

    /// Remove a zone from grouping (disbands the group if it controls one)
    pub async fn leave(&self, zone: ZoneId) -> Result<()> {
        self.groups.leave(zone).await
    }

    /// A zone's grouping role
    pub async fn group_role(&self, zone: ZoneId) -> GroupRole {
        self.groups.role(zone).await
    }

    /// The group a zone takes part in
    pub async fn group_membership(&self, zone: ZoneId) -> Option<GroupMembership> {
        self.groups.membership(zone).await
    }

    // ========================================================================
    // Overrides
    // ========================================================================

    /// Make `zone` the party host
    pub async fn party_on(&self, zone: ZoneId) -> Result<()> {
        self.overrides.party_on(zone).await
    }

    /// End the party hosted by `zone`
    pub async fn party_off(&self, zone: ZoneId) -> Result<()> {
        self.overrides.party_off(zone).await
    }

    /// Force all zones to the announcement source
    pub async fn page_on(&self) -> Result<()> {
        self.overrides.page_on().await
    }

    /// End paging and restore all zones
    pub async fn page_off(&self) -> Result<()> {
        self.overrides.page_off().await
    }

    /// Capture one zone's state for later restore
    pub async fn snapshot(&self, zone: ZoneId) -> Result<()> {
        self.overrides.snapshot(zone).await
    }

    /// Replay one zone's captured state
    pub async fn restore(&self, zone: ZoneId) -> Result<()> {
        self.overrides.restore(zone).await
    }

    /// A zone's current override mode
    pub async fn override_mode(&self, zone: ZoneId) -> OverrideMode {
        self.overrides.mode(zone).await
    }

    /// The current party host, if a party is active
    pub async fn party_host(&self) -> Option<ZoneId> {
        self.overrides.party_host().await
    }

    // ========================================================================
    // Globals
    // ========================================================================

    /// Switch every zone off
    pub async fn all_off(&self) -> Result<()> {
        self.session.command(Command::AllOff).await?;
        Ok(())
    }

    /// Mute or unmute every zone
    pub async fn mute_all(&self, mute: bool) -> Result<()> {
        self.session.command(Command::MuteAll(mute)).await?;
        Ok(())
    }
}

//! Zone command handle

use crate::error::Result;
use nuvo_protocol::{
    Balance, Bass, Command, Gain, KeypadButton, SourceId, Treble, Volume, ZoneId,
};
use nuvo_session::Session;
use nuvo_state::{StateStore, ZoneState};

/// Handle for issuing commands against one zone
///
/// Commands resolve when the amplifier acknowledges them; the zone's state in
/// the store changes only then, never optimistically. Reads come straight
/// from the store.
///
/// # Example
///
/// ```rust,ignore
/// let zone = system.zone(zone_id)?;
/// zone.set_power(true).await?;
/// zone.set_volume(Volume::new(30)?).await?;
/// if let Some(state) = zone.state() {
///     println!("{}: vol {:?}", state.zone, state.volume);
/// }
/// ```
#[derive(Clone)]
pub struct Zone {
    id: ZoneId,
    session: Session,
    store: StateStore,
    volume_step: u8,
}

impl Zone {
    pub(crate) fn new(id: ZoneId, session: Session, store: StateStore, volume_step: u8) -> Self {
        Self {
            id,
            session,
            store,
            volume_step,
        }
    }

    /// The zone this handle controls
    pub fn id(&self) -> ZoneId {
        self.id
    }

    /// Current state from the store, if the zone has reported yet
    pub fn state(&self) -> Option<ZoneState> {
        self.store.zone(self.id)
    }

    pub async fn set_power(&self, on: bool) -> Result<()> {
        self.session
            .command(Command::SetPower { zone: self.id, on })
            .await?;
        Ok(())
    }

    pub async fn set_mute(&self, mute: bool) -> Result<()> {
        self.session
            .command(Command::SetMute { zone: self.id, mute })
            .await?;
        Ok(())
    }

    pub async fn set_volume(&self, volume: Volume) -> Result<()> {
        self.session
            .command(Command::SetVolume {
                zone: self.id,
                volume,
            })
            .await?;
        Ok(())
    }

    /// Step the volume louder by the configured step
    ///
    /// Volume is attenuation, so stepping louder subtracts.
    pub async fn volume_up(&self) -> Result<()> {
        if let Some(current) = self.state().and_then(|s| s.volume) {
            let stepped = current.get().saturating_sub(self.volume_step);
            self.set_volume(Volume::new(stepped)?).await?;
        }
        Ok(())
    }

    /// Step the volume quieter by the configured step
    pub async fn volume_down(&self) -> Result<()> {
        if let Some(current) = self.state().and_then(|s| s.volume) {
            let stepped = current
                .get()
                .saturating_add(self.volume_step)
                .min(Volume::MAX_ATTENUATION);
            self.set_volume(Volume::new(stepped)?).await?;
        }
        Ok(())
    }

    pub async fn select_source(&self, source: SourceId) -> Result<()> {
        self.session
            .command(Command::SetSource {
                zone: self.id,
                source,
            })
            .await?;
        Ok(())
    }

    pub async fn set_bass(&self, bass: Bass) -> Result<()> {
        self.session
            .command(Command::SetBass { zone: self.id, bass })
            .await?;
        Ok(())
    }

    pub async fn set_treble(&self, treble: Treble) -> Result<()> {
        self.session
            .command(Command::SetTreble {
                zone: self.id,
                treble,
            })
            .await?;
        Ok(())
    }

    pub async fn set_balance(&self, balance: Balance) -> Result<()> {
        self.session
            .command(Command::SetBalance {
                zone: self.id,
                balance,
            })
            .await?;
        Ok(())
    }

    pub async fn set_loudness(&self, on: bool) -> Result<()> {
        self.session
            .command(Command::SetLoudness { zone: self.id, on })
            .await?;
        Ok(())
    }

    pub async fn set_max_volume(&self, volume: Volume) -> Result<()> {
        self.session
            .command(Command::SetMaxVolume {
                zone: self.id,
                volume,
            })
            .await?;
        Ok(())
    }

    pub async fn set_initial_volume(&self, volume: Volume) -> Result<()> {
        self.session
            .command(Command::SetInitialVolume {
                zone: self.id,
                volume,
            })
            .await?;
        Ok(())
    }

    pub async fn set_page_volume(&self, volume: Volume) -> Result<()> {
        self.session
            .command(Command::SetPageVolume {
                zone: self.id,
                volume,
            })
            .await?;
        Ok(())
    }

    pub async fn set_party_volume(&self, volume: Volume) -> Result<()> {
        self.session
            .command(Command::SetPartyVolume {
                zone: self.id,
                volume,
            })
            .await?;
        Ok(())
    }

    pub async fn set_volume_reset(&self, on: bool) -> Result<()> {
        self.session
            .command(Command::SetVolumeReset { zone: self.id, on })
            .await?;
        Ok(())
    }

    /// Simulate a keypad play/pause press
    pub async fn simulate_play_pause(&self) -> Result<()> {
        self.press(KeypadButton::PlayPause).await
    }

    /// Simulate a keypad previous-track press
    pub async fn simulate_prev(&self) -> Result<()> {
        self.press(KeypadButton::Prev).await
    }

    /// Simulate a keypad next-track press
    pub async fn simulate_next(&self) -> Result<()> {
        self.press(KeypadButton::Next).await
    }

    async fn press(&self, button: KeypadButton) -> Result<()> {
        self.session
            .command(Command::PressButton {
                zone: self.id,
                button,
            })
            .await?;
        Ok(())
    }
}

/// Source gain and Nuvonet commands, kept alongside the zone surface
#[derive(Clone)]
pub struct Source {
    id: SourceId,
    session: Session,
    store: StateStore,
}

impl Source {
    pub(crate) fn new(id: SourceId, session: Session, store: StateStore) -> Self {
        Self { id, session, store }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn state(&self) -> Option<nuvo_state::SourceState> {
        self.store.source(self.id)
    }

    pub async fn set_gain(&self, gain: Gain) -> Result<()> {
        self.session
            .command(Command::SetSourceGain {
                source: self.id,
                gain,
            })
            .await?;
        Ok(())
    }

    pub async fn set_nuvonet(&self, nuvonet: bool) -> Result<()> {
        self.session
            .command(Command::SetSourceNuvonet {
                source: self.id,
                nuvonet,
            })
            .await?;
        Ok(())
    }
}

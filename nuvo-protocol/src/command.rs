//! Outbound command catalog
//!
//! One variant per operation the amplifier accepts. All field values are
//! carried as the bounded newtypes from [`crate::value`], so a `Command` that
//! exists is encodable - [`Command::encode`] is pure and total.

use crate::frame::Frame;
use crate::id::{SourceId, ZoneId};
use crate::value::{Balance, Bass, Gain, Treble, Volume};
use serde::{Deserialize, Serialize};

/// Keypad transport buttons that can be pressed physically or simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeypadButton {
    PlayPause,
    Prev,
    Next,
}

impl KeypadButton {
    fn wire_form(self) -> &'static str {
        match self {
            KeypadButton::PlayPause => "PLAYPAUSE",
            KeypadButton::Prev => "PREV",
            KeypadButton::Next => "NEXT",
        }
    }
}

/// An outbound amplifier command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    SetPower { zone: ZoneId, on: bool },
    SetMute { zone: ZoneId, mute: bool },
    SetVolume { zone: ZoneId, volume: Volume },
    SetSource { zone: ZoneId, source: SourceId },
    SetBass { zone: ZoneId, bass: Bass },
    SetTreble { zone: ZoneId, treble: Treble },
    SetBalance { zone: ZoneId, balance: Balance },
    SetLoudness { zone: ZoneId, on: bool },
    SetMaxVolume { zone: ZoneId, volume: Volume },
    SetInitialVolume { zone: ZoneId, volume: Volume },
    SetPageVolume { zone: ZoneId, volume: Volume },
    SetPartyVolume { zone: ZoneId, volume: Volume },
    SetVolumeReset { zone: ZoneId, on: bool },
    SetSourceGain { source: SourceId, gain: Gain },
    SetSourceNuvonet { source: SourceId, nuvonet: bool },
    /// Simulate a keypad transport button press
    PressButton { zone: ZoneId, button: KeypadButton },
    /// Switch every zone off
    AllOff,
    /// Mute or unmute every zone
    MuteAll(bool),
    /// Enter or leave paging mode on the amplifier's keypads
    Page(bool),
    ZoneStatusQuery { zone: ZoneId },
    ZoneEqQuery { zone: ZoneId },
    ZoneVolumeConfigQuery { zone: ZoneId },
    ZoneConfigQuery { zone: ZoneId },
    SourceConfigQuery { source: SourceId },
}

impl Command {
    /// Render this command into its on-wire byte form, CR terminator included
    pub fn encode(&self) -> Vec<u8> {
        let mut line = String::with_capacity(16);
        line.push('*');
        self.write_body(&mut line);
        line.push('\r');
        line.into_bytes()
    }

    fn write_body(&self, out: &mut String) {
        use std::fmt::Write;

        // Infallible for String targets
        let _ = match self {
            Command::SetPower { zone, on } => {
                write!(out, "{zone}{}", if *on { "ON" } else { "OFF" })
            }
            Command::SetMute { zone, mute } => {
                write!(out, "{zone}MUTE{}", if *mute { "ON" } else { "OFF" })
            }
            Command::SetVolume { zone, volume } => write!(out, "{zone}VOL{volume}"),
            Command::SetSource { zone, source } => write!(out, "{zone}SRC{}", source.get()),
            Command::SetBass { zone, bass } => write!(out, "{zone}BASS{}", bass.get()),
            Command::SetTreble { zone, treble } => write!(out, "{zone}TREB{}", treble.get()),
            Command::SetBalance { zone, balance } => {
                write!(out, "{zone}BAL{}", balance.wire_form())
            }
            Command::SetLoudness { zone, on } => write!(out, "{zone}LOUDCMP{}", flag(*on)),
            Command::SetMaxVolume { zone, volume } => write!(out, "{zone}MAXVOL{volume}"),
            Command::SetInitialVolume { zone, volume } => write!(out, "{zone}INIVOL{volume}"),
            Command::SetPageVolume { zone, volume } => write!(out, "{zone}PAGEVOL{volume}"),
            Command::SetPartyVolume { zone, volume } => write!(out, "{zone}PARTYVOL{volume}"),
            Command::SetVolumeReset { zone, on } => write!(out, "{zone}VOLRST{}", flag(*on)),
            Command::SetSourceGain { source, gain } => {
                write!(out, "{source}GAIN{}", gain.get())
            }
            Command::SetSourceNuvonet { source, nuvonet } => {
                write!(out, "{source}NUVONET{}", flag(*nuvonet))
            }
            Command::PressButton { zone, button } => write!(out, "{zone}{}", button.wire_form()),
            Command::AllOff => write!(out, "ALLOFF"),
            Command::MuteAll(on) => write!(out, "MUTEALL{}", flag(*on)),
            Command::Page(on) => write!(out, "PAGE{}", flag(*on)),
            Command::ZoneStatusQuery { zone } => write!(out, "{zone}STATUS?"),
            Command::ZoneEqQuery { zone } => write!(out, "{zone}EQ?"),
            Command::ZoneVolumeConfigQuery { zone } => write!(out, "{zone}VOLSET?"),
            Command::ZoneConfigQuery { zone } => write!(out, "{zone}ZONESET?"),
            Command::SourceConfigQuery { source } => write!(out, "{source}SRCSET?"),
        };
    }

    /// Test whether a frame acknowledges this command
    ///
    /// The amplifier answers every zone mutation with a fresh status line for
    /// the affected zone, so matching is by frame kind and target id, not by
    /// echoed field value - the acknowledged value may legally differ from the
    /// requested one (limits, already-at-bound, etc). `Frame::Error` matches
    /// any command: it is the amplifier's rejection of the most recent write.
    pub fn ack_matches(&self, frame: &Frame) -> bool {
        if matches!(frame, Frame::Error) {
            return true;
        }
        match self {
            Command::SetPower { zone, .. }
            | Command::SetMute { zone, .. }
            | Command::SetVolume { zone, .. }
            | Command::SetSource { zone, .. }
            | Command::ZoneStatusQuery { zone } => {
                matches!(frame, Frame::ZoneStatus(s) if s.zone == *zone)
            }
            Command::SetBass { zone, .. }
            | Command::SetTreble { zone, .. }
            | Command::SetBalance { zone, .. }
            | Command::SetLoudness { zone, .. }
            | Command::ZoneEqQuery { zone } => {
                matches!(frame, Frame::ZoneEq(eq) if eq.zone == *zone)
            }
            Command::SetMaxVolume { zone, .. }
            | Command::SetInitialVolume { zone, .. }
            | Command::SetPageVolume { zone, .. }
            | Command::SetPartyVolume { zone, .. }
            | Command::SetVolumeReset { zone, .. }
            | Command::ZoneVolumeConfigQuery { zone } => {
                matches!(frame, Frame::ZoneVolumeConfig(v) if v.zone == *zone)
            }
            Command::ZoneConfigQuery { zone } => {
                matches!(frame, Frame::ZoneConfig(c) if c.zone == *zone)
            }
            Command::SetSourceGain { source, .. }
            | Command::SetSourceNuvonet { source, .. }
            | Command::SourceConfigQuery { source } => {
                matches!(frame, Frame::SourceConfig(c) if c.source == *source)
            }
            Command::PressButton { zone, button } => {
                matches!(frame, Frame::ZoneButton(b) if b.zone == *zone && b.button == *button)
            }
            Command::AllOff => matches!(frame, Frame::AllOff),
            Command::MuteAll(on) => matches!(frame, Frame::MuteAll(f) if f == on),
            Command::Page(on) => matches!(frame, Frame::Paging(f) if f == on),
        }
    }
}

fn flag(on: bool) -> char {
    if on {
        '1'
    } else {
        '0'
    }
}

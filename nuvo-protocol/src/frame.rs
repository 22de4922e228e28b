//! Decoded protocol frames
//!
//! A [`Frame`] is one fully-decoded `#`-prefixed line from the amplifier.
//! Command acknowledgements and unsolicited keypad pushes share the same wire
//! shape; nothing in the frame itself says which it is - that classification
//! happens in the dispatcher by matching against the pending command.

use crate::command::KeypadButton;
use crate::id::{SourceId, ZoneId};
use crate::value::{Balance, Bass, Gain, Treble, Volume};
use serde::{Deserialize, Serialize};

/// Zone power/source/volume/mute status line
///
/// `#Z5,ON,SRC3,VOL40,DND0,LOCK0`, `#Z5,ON,SRC3,MUTE,DND0,LOCK0` or `#Z5,OFF`.
/// Source and volume are absent while the zone is off; volume is absent while
/// muted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStatus {
    pub zone: ZoneId,
    pub power: bool,
    pub source: Option<SourceId>,
    pub volume: Option<Volume>,
    pub mute: bool,
    pub dnd: bool,
    pub lock: bool,
}

impl ZoneStatus {
    /// Status line for a powered-off zone
    pub fn off(zone: ZoneId) -> Self {
        Self {
            zone,
            power: false,
            source: None,
            volume: None,
            mute: false,
            dnd: false,
            lock: false,
        }
    }
}

/// Zone EQ status line: `#ZCFG5,BASS-8,TREB0,BALC,LOUDCMP1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneEq {
    pub zone: ZoneId,
    pub bass: Bass,
    pub treble: Treble,
    pub balance: Balance,
    pub loudness: bool,
}

/// Zone volume limit configuration: `#ZVOL5,MAXVOL20,INIVOL50,PAGEVOL40,PARTYVOL30,VOLRST0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneVolumeConfig {
    pub zone: ZoneId,
    pub max: Volume,
    pub initial: Volume,
    pub page: Volume,
    pub party: Volume,
    pub reset_on_power_on: bool,
}

/// Zone installer configuration: `#ZCFG5,ENABLE1,NAME"Kitchen",SLAVETO0,GROUP0,SOURCES63`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub zone: ZoneId,
    pub enabled: bool,
    pub name: String,
    /// Zone this zone's keypad is slaved to, if any
    pub slave_to: Option<ZoneId>,
    /// Native amplifier group number; unused by the SDK's software grouping
    pub group: Option<u8>,
    /// Bitmask of sources selectable at this zone's keypad (bit 0 = source 1)
    pub source_mask: u8,
}

/// Source configuration: `#SCFG3,ENABLE1,NAME"Turntable",GAIN4,NUVONET0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source: SourceId,
    pub enabled: bool,
    pub name: String,
    pub gain: Gain,
    pub nuvonet: bool,
}

/// Keypad transport button push: `#Z5S3PLAYPAUSE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneButton {
    pub zone: ZoneId,
    pub source: SourceId,
    pub button: KeypadButton,
}

/// A fully-decoded protocol message, immutable once constructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    ZoneStatus(ZoneStatus),
    ZoneEq(ZoneEq),
    ZoneVolumeConfig(ZoneVolumeConfig),
    ZoneConfig(ZoneConfig),
    SourceConfig(SourceConfig),
    ZoneButton(ZoneButton),
    /// Paging state acknowledgement: `#PAGE1` / `#PAGE0`
    Paging(bool),
    /// Global all-off acknowledgement: `#ALLOFF`
    AllOff,
    /// Global mute acknowledgement: `#MUTEALL1` / `#MUTEALL0`
    MuteAll(bool),
    /// The amplifier rejected the last command: `#?`
    Error,
    /// Correctly framed line the decoder has no grammar for; raw body retained
    Unknown(String),
}

impl Frame {
    /// Parse one frame body (the text between `#` and CR)
    ///
    /// Never fails: bodies that don't match any known grammar come back as
    /// [`Frame::Unknown`] so the stream keeps flowing.
    pub fn parse(body: &str) -> Frame {
        match parse_known(body) {
            Some(frame) => frame,
            None => Frame::Unknown(body.to_string()),
        }
    }

    /// The zone this frame refers to, if it is zone-scoped
    pub fn zone(&self) -> Option<ZoneId> {
        match self {
            Frame::ZoneStatus(s) => Some(s.zone),
            Frame::ZoneEq(eq) => Some(eq.zone),
            Frame::ZoneVolumeConfig(v) => Some(v.zone),
            Frame::ZoneConfig(c) => Some(c.zone),
            Frame::ZoneButton(b) => Some(b.zone),
            _ => None,
        }
    }

    /// The source this frame refers to, if it is source-scoped
    pub fn source(&self) -> Option<SourceId> {
        match self {
            Frame::SourceConfig(c) => Some(c.source),
            _ => None,
        }
    }
}

fn parse_known(body: &str) -> Option<Frame> {
    if body == "?" {
        return Some(Frame::Error);
    }
    if body == "ALLOFF" {
        return Some(Frame::AllOff);
    }
    if let Some(flag) = body.strip_prefix("MUTEALL") {
        return Some(Frame::MuteAll(parse_flag(flag)?));
    }
    if let Some(flag) = body.strip_prefix("PAGE") {
        return Some(Frame::Paging(parse_flag(flag)?));
    }
    if let Some(rest) = body.strip_prefix("ZCFG") {
        return parse_zcfg(rest);
    }
    if let Some(rest) = body.strip_prefix("ZVOL") {
        return parse_zvol(rest);
    }
    if let Some(rest) = body.strip_prefix("SCFG") {
        return parse_scfg(rest);
    }
    if let Some(rest) = body.strip_prefix('Z') {
        return parse_zone_line(rest);
    }
    None
}

/// `5,ON,SRC3,VOL40,DND0,LOCK0` | `5,OFF` | `5S3PLAYPAUSE`
fn parse_zone_line(rest: &str) -> Option<Frame> {
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let zone = ZoneId::new(rest[..digits].parse().ok()?)?;
    let tail = &rest[digits..];

    if let Some(tail) = tail.strip_prefix('S') {
        return parse_button(zone, tail);
    }

    let mut fields = split_fields(tail.strip_prefix(',')?);
    match fields.next()? {
        "OFF" => Some(Frame::ZoneStatus(ZoneStatus::off(zone))),
        "ON" => {
            let source = SourceId::new(number_field(fields.next()?, "SRC")?)?;
            let (volume, mute) = match fields.next()? {
                "MUTE" => (None, true),
                field => (Some(Volume::new(number_field(field, "VOL")?).ok()?), false),
            };
            // Trailing DND/LOCK flags are optional on some firmware revisions
            let dnd = fields.next().and_then(|f| flag_field(f, "DND")).unwrap_or(false);
            let lock = fields.next().and_then(|f| flag_field(f, "LOCK")).unwrap_or(false);
            Some(Frame::ZoneStatus(ZoneStatus {
                zone,
                power: true,
                source: Some(source),
                volume,
                mute,
                dnd,
                lock,
            }))
        }
        _ => None,
    }
}

/// `3PLAYPAUSE` after `#Z5S` has been consumed
fn parse_button(zone: ZoneId, tail: &str) -> Option<Frame> {
    let digits = tail.len() - tail.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let source = SourceId::new(tail[..digits].parse().ok()?)?;
    let button = match &tail[digits..] {
        "PLAYPAUSE" => KeypadButton::PlayPause,
        "PREV" => KeypadButton::Prev,
        "NEXT" => KeypadButton::Next,
        _ => return None,
    };
    Some(Frame::ZoneButton(ZoneButton { zone, source, button }))
}

/// `ZCFG` carries both EQ and installer-config lines; the first field decides
fn parse_zcfg(rest: &str) -> Option<Frame> {
    let (zone, tail) = id_and_tail(rest)?;
    let zone = ZoneId::new(zone)?;
    let mut fields = split_fields(tail);
    let first = fields.next()?;

    if let Some(bass) = number_field_i8(first, "BASS") {
        let treble = number_field_i8(fields.next()?, "TREB")?;
        let balance = Balance::from_wire(fields.next()?.strip_prefix("BAL")?)?;
        let loudness = flag_field(fields.next()?, "LOUDCMP")?;
        return Some(Frame::ZoneEq(ZoneEq {
            zone,
            bass: Bass::new(bass).ok()?,
            treble: Treble::new(treble).ok()?,
            balance,
            loudness,
        }));
    }

    let enabled = flag_field(first, "ENABLE")?;
    let name = quoted_field(fields.next()?, "NAME")?;
    let slave_to = ZoneId::new(number_field(fields.next()?, "SLAVETO")?);
    let group = match number_field(fields.next()?, "GROUP")? {
        0 => None,
        g => Some(g),
    };
    let source_mask = number_field(fields.next()?, "SOURCES")?;
    Some(Frame::ZoneConfig(ZoneConfig {
        zone,
        enabled,
        name,
        slave_to,
        group,
        source_mask,
    }))
}

fn parse_zvol(rest: &str) -> Option<Frame> {
    let (zone, tail) = id_and_tail(rest)?;
    let zone = ZoneId::new(zone)?;
    let mut fields = split_fields(tail);
    let max = Volume::new(number_field(fields.next()?, "MAXVOL")?).ok()?;
    let initial = Volume::new(number_field(fields.next()?, "INIVOL")?).ok()?;
    let page = Volume::new(number_field(fields.next()?, "PAGEVOL")?).ok()?;
    let party = Volume::new(number_field(fields.next()?, "PARTYVOL")?).ok()?;
    let reset = flag_field(fields.next()?, "VOLRST")?;
    Some(Frame::ZoneVolumeConfig(ZoneVolumeConfig {
        zone,
        max,
        initial,
        page,
        party,
        reset_on_power_on: reset,
    }))
}

fn parse_scfg(rest: &str) -> Option<Frame> {
    let (source, tail) = id_and_tail(rest)?;
    let source = SourceId::new(source)?;
    let mut fields = split_fields(tail);
    let enabled = flag_field(fields.next()?, "ENABLE")?;
    let name = quoted_field(fields.next()?, "NAME")?;
    let gain = Gain::new(number_field(fields.next()?, "GAIN")?).ok()?;
    let nuvonet = flag_field(fields.next()?, "NUVONET")?;
    Some(Frame::SourceConfig(SourceConfig {
        source,
        enabled,
        name,
        gain,
        nuvonet,
    }))
}

/// Split `5,ENABLE1,...` into the leading id and the remaining fields
fn id_and_tail(rest: &str) -> Option<(u8, &str)> {
    let (id, tail) = rest.split_once(',')?;
    Some((id.parse().ok()?, tail))
}

/// Split a frame body on commas, but never inside a quoted name
fn split_fields(body: &str) -> impl Iterator<Item = &str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, b) in body.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                fields.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&body[start..]);
    fields.into_iter()
}

fn number_field(field: &str, key: &str) -> Option<u8> {
    field.strip_prefix(key)?.parse().ok()
}

fn number_field_i8(field: &str, key: &str) -> Option<i8> {
    field.strip_prefix(key)?.parse().ok()
}

fn flag_field(field: &str, key: &str) -> Option<bool> {
    parse_flag(field.strip_prefix(key)?)
}

fn parse_flag(s: &str) -> Option<bool> {
    match s {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

fn quoted_field(field: &str, key: &str) -> Option<String> {
    let inner = field.strip_prefix(key)?;
    Some(inner.strip_prefix('"')?.strip_suffix('"')?.to_string())
}

//! In-memory amplifier for integration tests
//!
//! Speaks the wire dialect over a duplex pipe: acknowledges every command
//! with the frame a real amplifier would send, records the command log, and
//! can inject unsolicited pushes (simulated keypad activity).

// Each test binary uses a different slice of this harness
#![allow(dead_code)]

use nuvo_sdk::{Model, NuvoSystem, Session, SessionConfig, SystemConfig, Transport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Clone)]
struct AmpZone {
    power: bool,
    source: u8,
    volume: u8,
    mute: bool,
    bass: i8,
    treble: i8,
    balance: String,
    loudness: bool,
}

impl Default for AmpZone {
    fn default() -> Self {
        Self {
            power: false,
            source: 1,
            volume: 60,
            mute: false,
            bass: 0,
            treble: 0,
            balance: "C".to_string(),
            loudness: false,
        }
    }
}

/// Handle to the simulated amplifier
pub struct MockAmp {
    log: Arc<Mutex<Vec<String>>>,
    push_tx: mpsc::UnboundedSender<String>,
}

impl MockAmp {
    /// Commands received so far, `*` and CR stripped
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Forget everything received so far
    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Whether a command body (e.g. `Z2VOL30`) has been received
    pub fn received(&self, body: &str) -> bool {
        self.log.lock().unwrap().iter().any(|c| c == body)
    }

    /// Inject an unsolicited push, e.g. `#Z1,OFF`
    pub fn push(&self, frame: &str) {
        self.push_tx.send(format!("{frame}\r")).unwrap();
    }
}

/// Build a connected system over a mock amplifier with every zone answering
pub async fn mock_system() -> (NuvoSystem, MockAmp) {
    let (near, far) = tokio::io::duplex(16384);
    let session = Session::open(Transport::from_stream(near, "mock"), SessionConfig::default());
    let amp = spawn_amp(far);
    let system = NuvoSystem::attach(session, Model::GrandConcerto, SystemConfig::default());
    system.initial_sync().await.expect("initial sweep");

    // The sweep's acknowledgements reach the store through the event pump;
    // wait until every zone and source has landed.
    for _ in 0..200 {
        if system.zones().len() >= 16 && system.sources().len() >= 6 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(system.zones().len(), 16, "sweep populated every zone");
    (system, amp)
}

/// Poll until a condition holds; panics after two seconds
pub async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Poll until a zone's stored state satisfies a predicate
///
/// Acknowledgements reach the store through the event pump, so a test that
/// just awaited a command must wait here before reading state back.
pub async fn wait_zone<F>(system: &NuvoSystem, zone: nuvo_sdk::ZoneId, what: &str, condition: F)
where
    F: Fn(&nuvo_sdk::ZoneState) -> bool,
{
    for _ in 0..200 {
        if system.zone_state(zone).as_ref().is_some_and(&condition) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Give background propagation a moment, then assert nothing else happened
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

fn spawn_amp(mut far: tokio::io::DuplexStream) -> MockAmp {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();

    let task_log = Arc::clone(&log);
    tokio::spawn(async move {
        let mut zones: HashMap<u8, AmpZone> = (1..=16).map(|z| (z, AmpZone::default())).collect();
        let mut pending = Vec::new();
        let mut read_buf = [0u8; 1024];
        loop {
            tokio::select! {
                read = far.read(&mut read_buf) => {
                    let Ok(n) = read else { break };
                    if n == 0 {
                        break;
                    }
                    pending.extend_from_slice(&read_buf[..n]);
                    while let Some(pos) = pending.iter().position(|&b| b == b'\r') {
                        let line: Vec<u8> = pending.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line[..line.len() - 1]).to_string();
                        if let Some(body) = line.strip_prefix('*') {
                            task_log.lock().unwrap().push(body.to_string());
                            if let Some(reply) = respond(&mut zones, body) {
                                if far.write_all(reply.as_bytes()).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                Some(push) = push_rx.recv() => {
                    if far.write_all(push.as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    MockAmp { log, push_tx }
}

fn status_line(id: u8, zone: &AmpZone) -> String {
    if !zone.power {
        format!("#Z{id},OFF\r")
    } else if zone.mute {
        format!("#Z{id},ON,SRC{},MUTE,DND0,LOCK0\r", zone.source)
    } else {
        format!("#Z{id},ON,SRC{},VOL{},DND0,LOCK0\r", zone.source, zone.volume)
    }
}

fn eq_line(id: u8, zone: &AmpZone) -> String {
    format!(
        "#ZCFG{id},BASS{},TREB{},BAL{},LOUDCMP{}\r",
        zone.bass,
        zone.treble,
        zone.balance,
        if zone.loudness { 1 } else { 0 }
    )
}

fn respond(zones: &mut HashMap<u8, AmpZone>, body: &str) -> Option<String> {
    match body {
        "ALLOFF" => {
            for zone in zones.values_mut() {
                zone.power = false;
            }
            return Some("#ALLOFF\r".to_string());
        }
        "MUTEALL0" => return Some("#MUTEALL0\r".to_string()),
        "MUTEALL1" => return Some("#MUTEALL1\r".to_string()),
        "PAGE0" => return Some("#PAGE0\r".to_string()),
        "PAGE1" => return Some("#PAGE1\r".to_string()),
        _ => {}
    }

    if let Some(rest) = body.strip_prefix('S') {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let id: u8 = digits.parse().ok()?;
        if id > 6 {
            return None;
        }
        // All source commands ack with the configuration line
        return Some(format!(
            "#SCFG{id},ENABLE1,NAME\"Source {id}\",GAIN0,NUVONET0\r"
        ));
    }

    let rest = body.strip_prefix('Z')?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let id: u8 = digits.parse().ok()?;
    let tail = &rest[digits.len()..];
    let zone = zones.get_mut(&id)?;

    let reply = match tail {
        "ON" => {
            zone.power = true;
            status_line(id, zone)
        }
        "OFF" => {
            zone.power = false;
            status_line(id, zone)
        }
        "STATUS?" => status_line(id, zone),
        "MUTEON" => {
            zone.mute = true;
            status_line(id, zone)
        }
        "MUTEOFF" => {
            zone.mute = false;
            status_line(id, zone)
        }
        "EQ?" => eq_line(id, zone),
        "ZONESET?" => {
            format!("#ZCFG{id},ENABLE1,NAME\"Zone {id}\",SLAVETO0,GROUP0,SOURCES63\r")
        }
        "VOLSET?" => {
            format!("#ZVOL{id},MAXVOL20,INIVOL50,PAGEVOL40,PARTYVOL30,VOLRST0\r")
        }
        "PLAYPAUSE" | "PREV" | "NEXT" => {
            format!("#Z{id}S{}{tail}\r", zone.source)
        }
        _ => {
            if let Some(v) = tail.strip_prefix("VOLRST") {
                format!("#ZVOL{id},MAXVOL20,INIVOL50,PAGEVOL40,PARTYVOL30,VOLRST{v}\r")
            } else if tail.starts_with("MAXVOL")
                || tail.starts_with("INIVOL")
                || tail.starts_with("PAGEVOL")
                || tail.starts_with("PARTYVOL")
            {
                format!("#ZVOL{id},MAXVOL20,INIVOL50,PAGEVOL40,PARTYVOL30,VOLRST0\r")
            } else if let Some(v) = tail.strip_prefix("VOL") {
                zone.volume = v.parse().ok()?;
                status_line(id, zone)
            } else if let Some(s) = tail.strip_prefix("SRC") {
                zone.source = s.parse().ok()?;
                status_line(id, zone)
            } else if let Some(b) = tail.strip_prefix("BASS") {
                zone.bass = b.parse().ok()?;
                eq_line(id, zone)
            } else if let Some(t) = tail.strip_prefix("TREB") {
                zone.treble = t.parse().ok()?;
                eq_line(id, zone)
            } else if let Some(b) = tail.strip_prefix("BAL") {
                zone.balance = b.to_string();
                eq_line(id, zone)
            } else if let Some(l) = tail.strip_prefix("LOUDCMP") {
                zone.loudness = l == "1";
                eq_line(id, zone)
            } else {
                return None;
            }
        }
    };
    Some(reply)
}

//! Dispatcher correlation properties over an in-memory link
//!
//! Exercises the guarantees the higher layers depend on: at most one frame
//! resolves a command, every other frame is delivered as a push exactly once,
//! and delivery preserves arrival order.

use nuvo_protocol::{Command, Frame, Volume, ZoneId};
use nuvo_session::{Session, SessionConfig, SessionEvent};
use nuvo_transport::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

fn zone(id: u8) -> ZoneId {
    ZoneId::new(id).unwrap()
}

fn session_pair() -> (Session, DuplexStream) {
    let (near, far) = tokio::io::duplex(8192);
    let session = Session::open(Transport::from_stream(near, "test"), SessionConfig::default());
    (session, far)
}

#[tokio::test]
async fn push_storm_while_command_pending() {
    let (session, mut amp) = session_pair();
    let mut events = session.subscribe();

    let issue = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .command(Command::SetVolume {
                    zone: zone(3),
                    volume: Volume::new(30).unwrap(),
                })
                .await
        }
    });

    let mut buf = [0u8; 64];
    amp.read(&mut buf).await.unwrap();

    // Ten keypad pushes for other zones land before the ack, plus one
    // same-kind frame for a *different* zone which must not match either.
    let mut storm = String::new();
    for z in 4..=13 {
        storm.push_str(&format!("#Z{z},ON,SRC1,VOL{z},DND0,LOCK0\r"));
    }
    storm.push_str("#Z3,ON,SRC1,VOL30,DND0,LOCK0\r");
    amp.write_all(storm.as_bytes()).await.unwrap();

    let ack = issue.await.unwrap().unwrap();
    assert_eq!(ack.zone(), Some(zone(3)));

    // Exactly 11 events: 10 pushes then the ack, in arrival order
    let mut seen = Vec::new();
    for _ in 0..11 {
        match events.recv().await.unwrap() {
            SessionEvent::Frame { frame, is_ack } => seen.push((frame, is_ack)),
            other => panic!("unexpected event {other:?}"),
        }
    }
    let acks: Vec<_> = seen.iter().filter(|(_, is_ack)| *is_ack).collect();
    assert_eq!(acks.len(), 1, "exactly one frame resolved the command");
    assert_eq!(acks[0].0.zone(), Some(zone(3)));

    let order: Vec<u8> = seen
        .iter()
        .filter_map(|(frame, _)| frame.zone().map(|z| z.get()))
        .collect();
    assert_eq!(order, vec![4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 3], "arrival order preserved");
}

#[tokio::test]
async fn every_non_matching_frame_reaches_subscribers_exactly_once() {
    let (session, mut amp) = session_pair();
    let mut events = session.subscribe();

    amp.write_all(b"#Z1,OFF\r#Z9S3NEXT\r#MUTEALL1\r").await.unwrap();

    let mut frames = Vec::new();
    for _ in 0..3 {
        if let SessionEvent::Frame { frame, is_ack } = events.recv().await.unwrap() {
            assert!(!is_ack, "nothing was pending");
            frames.push(frame);
        }
    }
    assert!(matches!(frames[0], Frame::ZoneStatus(_)));
    assert!(matches!(frames[1], Frame::ZoneButton(_)));
    assert!(matches!(frames[2], Frame::MuteAll(true)));
    assert!(events.try_recv().is_err(), "no duplicates");
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// For any interleaving of pushes around the acknowledgement, the
        /// command resolves to exactly one frame and every push reaches
        /// subscribers exactly once, in arrival order.
        #[test]
        fn prop_interleaved_pushes_never_misattributed(
            push_zones in proptest::collection::vec(4u8..=16, 0..12),
            split in 0usize..12,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let (session, mut amp) = session_pair();
                let mut events = session.subscribe();

                let issue = tokio::spawn({
                    let session = session.clone();
                    async move {
                        session
                            .command(Command::SetVolume {
                                zone: zone(3),
                                volume: Volume::new(30).unwrap(),
                            })
                            .await
                    }
                });

                let mut buf = [0u8; 64];
                amp.read(&mut buf).await.unwrap();

                let split = split.min(push_zones.len());
                let mut wire = String::new();
                for z in &push_zones[..split] {
                    wire.push_str(&format!("#Z{z},ON,SRC1,VOL11,DND0,LOCK0\r"));
                }
                wire.push_str("#Z3,ON,SRC1,VOL30,DND0,LOCK0\r");
                for z in &push_zones[split..] {
                    wire.push_str(&format!("#Z{z},ON,SRC1,VOL11,DND0,LOCK0\r"));
                }
                amp.write_all(wire.as_bytes()).await.unwrap();

                let ack = issue.await.unwrap().unwrap();
                assert_eq!(ack.zone(), Some(zone(3)));

                let mut ack_count = 0;
                let mut order = Vec::new();
                for _ in 0..push_zones.len() + 1 {
                    match events.recv().await.unwrap() {
                        SessionEvent::Frame { frame, is_ack } => {
                            if is_ack {
                                ack_count += 1;
                            }
                            order.push(frame.zone().map(|z| z.get()));
                        }
                        other => panic!("unexpected event {other:?}"),
                    }
                }
                assert_eq!(ack_count, 1, "exactly one frame resolved the command");

                let mut expected: Vec<Option<u8>> =
                    push_zones[..split].iter().map(|z| Some(*z)).collect();
                expected.push(Some(3));
                expected.extend(push_zones[split..].iter().map(|z| Some(*z)));
                assert_eq!(order, expected, "delivery preserves arrival order");
            });
        }
    }
}

#[tokio::test]
async fn resolved_command_does_not_steal_later_status_frames() {
    let (session, mut amp) = session_pair();
    let mut events = session.subscribe();

    let issue = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .command(Command::ZoneStatusQuery { zone: zone(2) })
                .await
        }
    });

    let mut buf = [0u8; 64];
    amp.read(&mut buf).await.unwrap();

    // Ack, then an identical-looking push right behind it
    amp.write_all(b"#Z2,OFF\r#Z2,OFF\r").await.unwrap();
    issue.await.unwrap().unwrap();

    let mut flags = Vec::new();
    for _ in 0..2 {
        if let SessionEvent::Frame { is_ack, .. } = events.recv().await.unwrap() {
            flags.push(is_ack);
        }
    }
    assert_eq!(flags, vec![true, false], "second frame is a push, not a second ack");
}

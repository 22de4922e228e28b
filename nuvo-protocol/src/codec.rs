//! Incremental byte-stream framer
//!
//! Turns an unreliable byte stream into [`Frame`]s. Inbound frames are
//! `#`-prefixed, CR-terminated lines; everything else is line noise. The codec
//! keeps a partial-frame buffer between calls so a frame split across reads
//! reassembles, and it resynchronizes on the next `#` marker after garbage
//! rather than failing.

use crate::frame::Frame;
use bytes::{Buf, BytesMut};
use tracing::warn;

/// Upper bound on a plausible frame; anything longer without a terminator is
/// treated as noise and dropped so the buffer cannot grow without limit.
const MAX_FRAME_LEN: usize = 256;

const START: u8 = b'#';
const TERMINATOR: u8 = b'\r';

/// Stateful decoder for the inbound half of the link
///
/// ```rust
/// use nuvo_protocol::{Frame, FrameCodec};
///
/// let mut codec = FrameCodec::new();
/// assert_eq!(codec.feed(b"#Z4,O").next(), None); // partial, buffered
/// let frames: Vec<Frame> = codec.feed(b"FF\r#ALLOFF\r").collect();
/// assert_eq!(frames.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct FrameCodec {
    buf: BytesMut,
}

impl FrameCodec {
    /// Create a codec with an empty reassembly buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes and iterate the frames now complete
    ///
    /// The returned iterator is lazy and finite; frames left incomplete at the
    /// end of `bytes` stay buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(bytes);
        Frames { codec: self }
    }

    /// Bytes currently held waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            self.discard_noise();

            let terminator = self.buf.iter().position(|&b| b == TERMINATOR);
            let restart = self.buf.iter().skip(1).position(|&b| b == START).map(|p| p + 1);

            match (terminator, restart) {
                // A new start marker before any terminator: the current frame
                // lost its terminator, resync at the marker.
                (t, Some(r)) if t.map_or(true, |t| r < t) => {
                    warn!(discarded = r, "unterminated frame, resyncing at next start marker");
                    self.buf.advance(r);
                }
                (Some(t), _) => {
                    let line = self.buf.split_to(t + 1);
                    let body = String::from_utf8_lossy(&line[1..line.len() - 1]);
                    return Some(Frame::parse(&body));
                }
                // No terminator and no later start marker: wait for more bytes
                (None, _) => {
                    if self.buf.len() > MAX_FRAME_LEN {
                        warn!(discarded = self.buf.len(), "oversized partial frame dropped");
                        self.buf.clear();
                    }
                    return None;
                }
            }
        }
    }

    /// Drop bytes preceding the next start marker. Bare line endings are
    /// expected padding on some firmware; anything else gets a warning.
    fn discard_noise(&mut self) {
        let skip = self
            .buf
            .iter()
            .position(|&b| b == START)
            .unwrap_or(self.buf.len());
        if skip == 0 {
            return;
        }
        let noise = &self.buf[..skip];
        if !noise.iter().all(|&b| b == b'\n' || b == TERMINATOR) {
            warn!(discarded = skip, "discarding bytes before start marker");
        }
        self.buf.advance(skip);
    }
}

/// Lazy iterator over frames completed by the most recent `feed`
pub struct Frames<'a> {
    codec: &'a mut FrameCodec,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.codec.next_frame()
    }
}

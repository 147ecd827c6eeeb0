//! Framing for the control connection.
//!
//! Requests go out as one line each. Responses come back as s-expressions that may be split
//! across reads or packed several to a read, so the decoder tracks nesting depth and string
//! state across calls and only yields once a top-level form is balanced.
//!
//! An event never spans a raw line break, since strings escape theirs. A line break inside a
//! pending form ends it as [Response::Unrecognized], so one truncated event cannot swallow
//! the events after it.
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::request::Request;
use crate::response::Response;

/// Default bound on bytes buffered for one event or stray line
pub const MAX_FRAME: usize = 64 * 1024;

/// Bytes of an oversized frame kept in its [Response::Unrecognized]
const PREVIEW: usize = 256;

/// Codec used by [crate::Connection]
#[derive(Debug)]
pub struct WireCodec {
    scan: Scan,
    max_frame: usize,
    /// Dropping the rest of an oversized line
    discarding: bool,
}

/// Progress through a partially received form
#[derive(Debug, Default)]
struct Scan {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

/// How a scanned form ended
#[derive(Debug, PartialEq)]
enum Scanned {
    /// Balanced form ending at offset
    Form(usize),
    /// Line break at offset before form closed
    Broken(usize),
}

impl Scan {
    fn is_idle(&self) -> bool {
        self.pos == 0
    }

    /// Advance over `buf` until the form closes or breaks off
    fn feed(&mut self, buf: &[u8]) -> Option<Scanned> {
        while self.pos < buf.len() {
            let b = buf[self.pos];
            self.pos += 1;
            if b == b'\n' {
                let end = self.pos - 1;
                *self = Scan::default();
                return Some(Scanned::Broken(end));
            }
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'(' => self.depth += 1,
                b')' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        let end = self.pos;
                        *self = Scan::default();
                        return Some(Scanned::Form(end));
                    }
                }
                _ => {}
            }
        }
        None
    }
}

impl WireCodec {
    /// Codec buffering at most `max_frame` bytes of any one event
    pub fn new(max_frame: usize) -> Self {
        Self {
            scan: Scan::default(),
            max_frame,
            discarding: false,
        }
    }

    /// Give up on buffered bytes and skip to the next line
    fn overflow(&mut self, src: &mut BytesMut) -> Response {
        self.scan = Scan::default();
        self.discarding = true;
        let raw = src.split();
        Response::unrecognized(
            &raw[..raw.len().min(PREVIEW)],
            format!("no line break within {} bytes", self.max_frame),
        )
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME)
    }
}

impl<'a> Encoder<&'a Request> for WireCodec {
    type Error = std::io::Error;

    fn encode(&mut self, req: &'a Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = req.to_string();
        dst.reserve(frame.len() + 1);
        dst.put(frame.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

impl Decoder for WireCodec {
    type Item = Response;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Response>, Self::Error> {
        if self.discarding {
            let line_end = src.iter().position(|b| *b == b'\n');
            match line_end {
                Some(end) => {
                    src.advance(end + 1);
                    self.discarding = false;
                }
                None => {
                    src.clear();
                    return Ok(None);
                }
            }
        }

        if self.scan.is_idle() {
            let ws = src.iter().take_while(|b| b.is_ascii_whitespace()).count();
            src.advance(ws);
            if src.is_empty() {
                return Ok(None);
            }
            if src[0] != b'(' {
                // Stray output: everything up to the next line or form is one bad event
                let stray_end = src.iter().position(|b| *b == b'\n' || *b == b'(');
                return Ok(match stray_end {
                    Some(end) => Some(Response::unrecognized(
                        &src.split_to(end),
                        "expected ( at start of event",
                    )),
                    None if src.len() > self.max_frame => Some(self.overflow(src)),
                    None => None,
                });
            }
        }

        Ok(match self.scan.feed(src) {
            Some(Scanned::Form(end)) => Some(Response::from_frame(&src.split_to(end))),
            Some(Scanned::Broken(end)) => Some(Response::unrecognized(
                &src.split_to(end),
                "line ended inside an event",
            )),
            None if src.len() > self.max_frame => Some(self.overflow(src)),
            None => None,
        })
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Response>, Self::Error> {
        if let Some(resp) = self.decode(src)? {
            return Ok(Some(resp));
        }
        if src.is_empty() {
            return Ok(None);
        }
        self.scan = Scan::default();
        let rest = src.split();
        Ok(Some(Response::unrecognized(
            &rest,
            "stream ended inside an event",
        )))
    }
}

//! Stream demultiplexer for Pattern B.
//!
//! The Router relays the dataset as raw bytes and terminates it in-band:
//!
//! ```text
//! <payload bytes>[\n]---STREAM_COMPLETE---[\n]{"t1_received": ..., ...}
//! ```
//!
//! [`StreamDemux`] is fed chunks as they arrive and hands back the bytes
//! that are definitely payload. It holds back just enough of the tail that a
//! marker split across chunk boundaries is never flushed as payload.

use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::Error;
use crate::models::RemoteTimestamps;

/// Literal completion marker.
pub const STREAM_MARKER: &[u8] = b"---STREAM_COMPLETE---";

/// Preferred marker form: preceded by a newline that is not payload.
const NL_MARKER: &[u8] = b"\n---STREAM_COMPLETE---";

/// Bytes held back while no marker has been seen. One short of the
/// newline-prefixed marker, so neither form can be partially flushed.
const HOLDBACK: usize = NL_MARKER.len() - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Still reading payload.
    Payload,
    /// Marker found; collecting the metadata document.
    Trailer,
    /// Nothing more to read.
    Done,
}

/// Metadata document after the marker. Timestamps may sit at the top level
/// or under a `timestamps` key.
#[derive(Debug, Deserialize)]
struct Trailer {
    #[serde(default)]
    timestamps: Option<RemoteTimestamps>,
    #[serde(flatten)]
    top_level: RemoteTimestamps,
}

/// Per-stream session state.
#[derive(Debug)]
pub struct StreamDemux {
    pending: BytesMut,
    phase: Phase,
    marker: bool,
    flushed: u64,
    metadata: Option<RemoteTimestamps>,
}

impl Default for StreamDemux {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDemux {
    pub fn new() -> Self {
        Self {
            pending: BytesMut::new(),
            phase: Phase::Payload,
            marker: false,
            flushed: 0,
            metadata: None,
        }
    }

    /// Feed one chunk, returning the payload bytes that can be flushed now.
    ///
    /// Empty chunks are ignored. Once the marker has been located no further
    /// payload is produced; later chunks only extend the metadata document.
    pub fn push(&mut self, chunk: &[u8]) -> Bytes {
        if chunk.is_empty() {
            return Bytes::new();
        }

        match self.phase {
            Phase::Payload => {
                self.pending.extend_from_slice(chunk);
                self.scan()
            }
            Phase::Trailer => {
                self.pending.extend_from_slice(chunk);
                self.try_parse_trailer(false);
                Bytes::new()
            }
            Phase::Done => Bytes::new(),
        }
    }

    /// The stream ended. Flushes any held-back payload (no marker case) and
    /// makes a last attempt at the metadata document.
    pub fn finish(&mut self) -> Bytes {
        match self.phase {
            Phase::Payload => {
                let rest = self.pending.split().freeze();
                self.flushed += rest.len() as u64;
                self.phase = Phase::Done;
                debug!(flushed = self.flushed, "stream ended without completion marker");
                rest
            }
            Phase::Trailer => {
                self.try_parse_trailer(true);
                Bytes::new()
            }
            Phase::Done => Bytes::new(),
        }
    }

    /// The completion marker has been located.
    pub fn marker_found(&self) -> bool {
        self.marker
    }

    /// Nothing left to read: metadata parsed, or the stream was finished.
    pub fn is_settled(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Total payload bytes handed out so far.
    pub fn flushed_bytes(&self) -> u64 {
        self.flushed
    }

    /// Timestamps recovered from the trailing metadata, if any.
    pub fn metadata(&self) -> Option<RemoteTimestamps> {
        self.metadata
    }

    fn scan(&mut self) -> Bytes {
        let found = find(&self.pending, NL_MARKER)
            .map(|pos| (pos, NL_MARKER.len()))
            .or_else(|| find(&self.pending, STREAM_MARKER).map(|pos| (pos, STREAM_MARKER.len())));

        if let Some((pos, marker_len)) = found {
            let payload = self.pending.split_to(pos).freeze();
            let _ = self.pending.split_to(marker_len);
            self.flushed += payload.len() as u64;
            self.marker = true;
            self.phase = Phase::Trailer;
            trace!(flushed = self.flushed, "completion marker located");
            self.try_parse_trailer(false);
            return payload;
        }

        let flushable = self.pending.len().saturating_sub(HOLDBACK);
        let payload = self.pending.split_to(flushable).freeze();
        self.flushed += payload.len() as u64;
        payload
    }

    /// Parse the bytes after the marker. Before the stream ends an empty or
    /// incomplete document just means more bytes may follow.
    fn try_parse_trailer(&mut self, at_end: bool) {
        let start = self
            .pending
            .iter()
            .position(|b| !matches!(b, b'\n' | b'\r'))
            .unwrap_or(self.pending.len());
        let document = &self.pending[start..];

        if document.is_empty() {
            if at_end {
                self.phase = Phase::Done;
            }
            return;
        }

        match parse_trailer(document) {
            Ok(timestamps) => {
                self.metadata = timestamps;
                self.phase = Phase::Done;
                self.pending.clear();
            }
            Err(e) if at_end => {
                debug!(error = %e, "discarding unparseable stream metadata");
                self.phase = Phase::Done;
                self.pending.clear();
            }
            Err(_) => {}
        }
    }
}

fn parse_trailer(document: &[u8]) -> Result<Option<RemoteTimestamps>, Error> {
    let trailer: Trailer =
        serde_json::from_slice(document).map_err(|e| Error::MetadataParse(e.to_string()))?;
    Ok(trailer
        .timestamps
        .and_then(RemoteTimestamps::non_empty)
        .or_else(|| trailer.top_level.non_empty()))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

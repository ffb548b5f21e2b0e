//! # SSE Event Codec
//!
//! Encodes a single event into the `text/event-stream` wire form.
//!
//! ## SSE Format
//!
//! Fields are emitted in a fixed order, each line terminated by `\n`:
//!
//! ```text
//! :comment
//! id:last-event-id
//! event:type
//! timestamp:1234567890
//! data:payload
//!
//! ```
//!
//! The trailing blank line that terminates the event is written only when
//! the `FIN` flag is set; a fragment with `INIT` but not `FIN` leaves the
//! event open so later fragments continuation-append to it. Data bytes are
//! passed through untouched; CR/LF handling inside payloads is the
//! producer's responsibility.
//!
//! The `timestamp:` line is an extension negotiated via
//! `accept: text/event-stream;ext=timestamp` and is emitted only for
//! non-zero timestamps, as ASCII-decimal milliseconds since epoch.

use crate::frame::flags;

/// Maximum event id length the overhead constant reserves space for.
pub const EVENT_ID_MAX: usize = 255;

/// Maximum event type length the overhead constant reserves space for.
pub const EVENT_TYPE_MAX: usize = 16;

/// Upper bound on per-event framing overhead, charged as padding when
/// granting window toward the application.
pub const MAX_EVENT_HEADER_SIZE: usize = 5 + // data:
    3 + // id:
    EVENT_ID_MAX + // id bytes
    6 + // event:
    EVENT_TYPE_MAX + // type bytes
    3; // \n for data:, id:, event:

/// One SSE event to encode. Borrowed fields keep the encoder free of
/// copies; absent fields are skipped entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseEvent<'a> {
    pub flags: u8,
    pub id: Option<&'a [u8]>,
    pub event_type: Option<&'a [u8]>,
    /// Milliseconds since epoch; zero suppresses the `timestamp:` line.
    pub timestamp: i64,
    pub data: Option<&'a [u8]>,
    pub comment: Option<&'a [u8]>,
}

/// Append the wire form of `event` to `out`, returning the number of bytes
/// written.
pub fn encode_event(event: &SseEvent<'_>, out: &mut Vec<u8>) -> usize {
    let start = out.len();

    if let Some(comment) = event.comment {
        out.push(b':');
        out.extend_from_slice(comment);
        out.push(b'\n');
    }

    if let Some(id) = event.id {
        if !id.is_empty() {
            debug_assert!(id.len() <= EVENT_ID_MAX, "event id exceeds reserved overhead");
            out.extend_from_slice(b"id:");
            out.extend_from_slice(id);
            out.push(b'\n');
        }
    }

    if let Some(event_type) = event.event_type {
        debug_assert!(
            event_type.len() <= EVENT_TYPE_MAX,
            "event type exceeds reserved overhead"
        );
        out.extend_from_slice(b"event:");
        out.extend_from_slice(event_type);
        out.push(b'\n');
    }

    if event.timestamp != 0 {
        out.extend_from_slice(b"timestamp:");
        out.extend_from_slice(event.timestamp.to_string().as_bytes());
        out.push(b'\n');
    }

    if let Some(data) = event.data {
        out.extend_from_slice(b"data:");
        out.extend_from_slice(data);
        out.push(b'\n');
    }

    if event.flags & flags::FIN != 0 {
        out.push(b'\n');
    }

    out.len() - start
}

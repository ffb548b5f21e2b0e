use may::sync::mpsc;

use super::ext::{BeginEx, HttpChallengeEx, SseDataEx, SseEndEx};

/// Fragment flags carried on DATA frames and SSE events.
///
/// The two bits are independent: `INIT` marks the first fragment of a
/// logical event, `FIN` the last. A single-fragment event sets both.
pub mod flags {
    /// First fragment of a logical event.
    pub const INIT: u8 = 0x01;
    /// Final fragment of a logical event.
    pub const FIN: u8 = 0x02;
}

/// Peer capabilities announced in the capabilities mask of WINDOW frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Capability {
    /// The sender of the WINDOW can receive CHALLENGE frames.
    Challenge = 0,
}

/// Capabilities mask bit asserting the CHALLENGE capability.
pub const CHALLENGE_CAPABILITIES_MASK: u32 = 1 << Capability::Challenge as u32;

/// Identifiers common to every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameHeader {
    pub route_id: u64,
    pub stream_id: u64,
    pub trace_id: u64,
    pub authorization: u64,
}

/// Opens a stream. Carries an optional typed extension describing the
/// request (HTTP boundary) or the subscription (application boundary).
#[derive(Debug, Clone, PartialEq)]
pub struct BeginFrame {
    pub header: FrameHeader,
    pub extension: Option<BeginEx>,
}

/// A payload fragment. `padding` is the per-frame overhead the receiver
/// charges against the sender's window in addition to the payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub header: FrameHeader,
    pub flags: u8,
    pub padding: i32,
    pub payload: Option<Vec<u8>>,
    pub extension: Option<SseDataEx>,
}

/// Graceful close of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct EndFrame {
    pub header: FrameHeader,
    pub extension: Option<SseEndEx>,
}

/// Abrupt close of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortFrame {
    pub header: FrameHeader,
}

/// Grants `credit` bytes of window to the peer. `padding` is the per-frame
/// overhead the grantor will charge; `capabilities` advertises optional
/// frame kinds the grantor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFrame {
    pub header: FrameHeader,
    pub credit: i32,
    pub padding: i32,
    pub group_id: u64,
    pub capabilities: u32,
}

/// Rejects a stream in the throttle direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetFrame {
    pub header: FrameHeader,
}

/// Asynchronous re-authentication prompt arriving in the throttle
/// direction, surfaced to SSE clients as a synthetic event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeFrame {
    pub header: FrameHeader,
    pub extension: Option<HttpChallengeEx>,
}

/// A frame on either boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Begin(BeginFrame),
    Data(DataFrame),
    End(EndFrame),
    Abort(AbortFrame),
    Window(WindowFrame),
    Reset(ResetFrame),
    Challenge(ChallengeFrame),
}

impl Frame {
    #[inline]
    #[must_use]
    pub fn header(&self) -> &FrameHeader {
        match self {
            Frame::Begin(f) => &f.header,
            Frame::Data(f) => &f.header,
            Frame::End(f) => &f.header,
            Frame::Abort(f) => &f.header,
            Frame::Window(f) => &f.header,
            Frame::Reset(f) => &f.header,
            Frame::Challenge(f) => &f.header,
        }
    }

    #[inline]
    #[must_use]
    pub fn stream_id(&self) -> u64 {
        self.header().stream_id
    }
}

/// Short frame-kind label used in logs.
#[must_use]
pub fn frame_kind_name(frame: &Frame) -> &'static str {
    match frame {
        Frame::Begin(_) => "BEGIN",
        Frame::Data(_) => "DATA",
        Frame::End(_) => "END",
        Frame::Abort(_) => "ABORT",
        Frame::Window(_) => "WINDOW",
        Frame::Reset(_) => "RESET",
        Frame::Challenge(_) => "CHALLENGE",
    }
}

/// Channel sender a peer exposes to receive frames.
pub type FrameSink = mpsc::Sender<Frame>;

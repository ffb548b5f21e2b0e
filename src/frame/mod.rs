//! # Frame Module
//!
//! Typed frames exchanged between the gateway and its peers on both the
//! network (HTTP) boundary and the application boundary.
//!
//! ## Overview
//!
//! Both boundaries speak the same eight frame kinds:
//!
//! - **Stream direction**: `BEGIN`, `DATA`, `END`, `ABORT`
//! - **Throttle direction**: `WINDOW`, `RESET`, `CHALLENGE`
//!
//! Every frame carries a [`FrameHeader`] with route, stream, trace, and
//! authorization identifiers. Stream identifiers encode direction in their
//! low bit: odd ids travel in the direction the stream was opened (initial),
//! even ids flow back (reply).
//!
//! ## Extensions
//!
//! `BEGIN`, `DATA`, `END`, and `CHALLENGE` frames may carry a typed
//! extension envelope. The HTTP boundary uses ordered header lists; the
//! application boundary uses SSE-specific records (`path_info` /
//! `last_event_id` on BEGIN, event `id` / `type` / `timestamp` on DATA,
//! terminal `id` on END).
//!
//! ## Delivery
//!
//! Frames are delivered over `may` channels. [`FrameSink`] is the sender
//! half a peer exposes; emitting a frame is a non-blocking `send`.

mod core;
mod ext;

pub use core::{
    flags, frame_kind_name, Capability, Frame, FrameHeader, FrameSink, AbortFrame, BeginFrame,
    ChallengeFrame, DataFrame, EndFrame, ResetFrame, WindowFrame, CHALLENGE_CAPABILITIES_MASK,
};
pub use ext::{
    BeginEx, HeaderVec, HttpBeginEx, HttpChallengeEx, HttpHeader, SseBeginEx, SseDataEx, SseEndEx,
    MAX_INLINE_HEADERS,
};

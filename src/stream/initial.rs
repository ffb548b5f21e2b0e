use tracing::debug;

use crate::frame::{
    AbortFrame, EndFrame, Frame, FrameHeader, FrameSink, ResetFrame, WindowFrame,
    CHALLENGE_CAPABILITIES_MASK,
};
use crate::ids::TraceIdSupplier;

/// Outcome of delivering a stream frame to the initial half.
pub(crate) enum InitialOutcome {
    Open,
    Ended,
    Aborted,
}

/// Network → application half of a stream pair.
///
/// Carries no mutable state: it forwards terminal frames toward the
/// application and relays the application's throttle signals back to the
/// HTTP peer.
#[derive(Clone)]
pub(crate) struct InitialStream {
    accept_reply: FrameSink,
    accept_route_id: u64,
    accept_initial_id: u64,
    accept_reply_id: u64,
    connect_initial: FrameSink,
    connect_route_id: u64,
    connect_initial_id: u64,
}

impl InitialStream {
    pub(crate) fn new(
        accept_reply: FrameSink,
        accept_route_id: u64,
        accept_initial_id: u64,
        accept_reply_id: u64,
        connect_initial: FrameSink,
        connect_route_id: u64,
        connect_initial_id: u64,
    ) -> Self {
        Self {
            accept_reply,
            accept_route_id,
            accept_initial_id,
            accept_reply_id,
            connect_initial,
            connect_route_id,
            connect_initial_id,
        }
    }

    pub(crate) fn accept_reply_id(&self) -> u64 {
        self.accept_reply_id
    }

    pub(crate) fn connect_initial_id(&self) -> u64 {
        self.connect_initial_id
    }

    pub(crate) fn handle_stream(
        &self,
        frame: &Frame,
        trace_ids: &mut TraceIdSupplier,
    ) -> InitialOutcome {
        match frame {
            // Already processed by the factory at classification time.
            Frame::Begin(_) => InitialOutcome::Open,
            Frame::End(end) => {
                debug!(
                    stream_id = self.connect_initial_id,
                    "Request stream ended, closing application half"
                );
                let _ = self.connect_initial.send(Frame::End(EndFrame {
                    header: FrameHeader {
                        route_id: self.connect_route_id,
                        stream_id: self.connect_initial_id,
                        trace_id: end.header.trace_id,
                        authorization: end.header.authorization,
                    },
                    extension: None,
                }));
                InitialOutcome::Ended
            }
            Frame::Abort(abort) => {
                debug!(
                    stream_id = self.connect_initial_id,
                    "Request stream aborted, aborting application half"
                );
                let _ = self.connect_initial.send(Frame::Abort(AbortFrame {
                    header: FrameHeader {
                        route_id: self.connect_route_id,
                        stream_id: self.connect_initial_id,
                        trace_id: abort.header.trace_id,
                        authorization: abort.header.authorization,
                    },
                }));
                InitialOutcome::Aborted
            }
            _ => {
                let _ = self.accept_reply.send(Frame::Reset(ResetFrame {
                    header: FrameHeader {
                        route_id: self.accept_route_id,
                        stream_id: self.accept_initial_id,
                        trace_id: trace_ids.next_trace_id(),
                        authorization: 0,
                    },
                }));
                InitialOutcome::Open
            }
        }
    }

    pub(crate) fn handle_throttle(&self, frame: &Frame) {
        match frame {
            Frame::Window(window) => {
                // Announce that the gateway accepts challenges on top of
                // whatever the application advertised.
                let _ = self.accept_reply.send(Frame::Window(WindowFrame {
                    header: FrameHeader {
                        route_id: self.accept_route_id,
                        stream_id: self.accept_initial_id,
                        trace_id: window.header.trace_id,
                        authorization: window.header.authorization,
                    },
                    credit: window.credit,
                    padding: window.padding,
                    group_id: window.group_id,
                    capabilities: window.capabilities | CHALLENGE_CAPABILITIES_MASK,
                }));
            }
            Frame::Reset(reset) => {
                let _ = self.accept_reply.send(Frame::Reset(ResetFrame {
                    header: FrameHeader {
                        route_id: self.accept_route_id,
                        stream_id: self.accept_initial_id,
                        trace_id: reset.header.trace_id,
                        authorization: 0,
                    },
                }));
            }
            _ => {} // ignore
        }
    }
}

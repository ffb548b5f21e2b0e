use serde_json::Value;
use tracing::{debug, info, warn};

use crate::buffer_pool::SlotId;
use crate::codec::{encode_event, SseEvent, MAX_EVENT_HEADER_SIZE};
use crate::frame::{
    flags, AbortFrame, BeginEx, BeginFrame, ChallengeFrame, DataFrame, EndFrame, Frame,
    FrameHeader, FrameSink, HttpBeginEx, ResetFrame, WindowFrame,
};

use super::StreamContext;

const HEADER_NAME_METHOD: &str = ":method";
const METHOD_PROPERTY: &str = "method";
const HEADERS_PROPERTY: &str = "headers";

const CONTENT_TYPE_EVENT_STREAM: &str = "text/event-stream";
const CONTENT_TYPE_EVENT_STREAM_TIMESTAMP: &str = "text/event-stream;ext=timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    BeforeBegin,
    AfterBeginOrData,
    Closed,
}

/// Application → network half of a stream pair.
///
/// Owns the credit arithmetic on both boundaries. The network side is
/// charged `payload + padding` per emitted frame; the application side is
/// granted whatever network budget is not yet promised, with padding
/// inflated by the worst-case per-event framing overhead so that any event
/// the application can afford is also affordable on the wire.
pub(crate) struct ReplyStream {
    application_reply: FrameSink,
    application_route_id: u64,
    application_reply_id: u64,

    network_reply: FrameSink,
    network_route_id: u64,
    network_reply_id: u64,

    timestamp_requested: bool,

    state: StreamState,

    network_slot: Option<SlotId>,
    network_slot_offset: usize,
    deferred_end: bool,
    // Frame metadata for the bytes parked in the slot.
    slot_trace_id: u64,
    slot_authorization: u64,
    slot_padding: i32,

    /// Sentinel -1 until the first WINDOW; then the full initial window
    /// that must accumulate before application credit is granted.
    minimum_network_reply_budget: i32,
    network_reply_budget: i32,
    network_reply_padding: i32,

    application_reply_budget: i32,
}

impl ReplyStream {
    pub(crate) fn new(
        application_reply: FrameSink,
        application_route_id: u64,
        application_reply_id: u64,
        network_reply: FrameSink,
        network_route_id: u64,
        network_reply_id: u64,
        timestamp_requested: bool,
    ) -> Self {
        Self {
            application_reply,
            application_route_id,
            application_reply_id,
            network_reply,
            network_route_id,
            network_reply_id,
            timestamp_requested,
            state: StreamState::BeforeBegin,
            network_slot: None,
            network_slot_offset: 0,
            deferred_end: false,
            slot_trace_id: 0,
            slot_authorization: 0,
            slot_padding: 0,
            minimum_network_reply_budget: -1,
            network_reply_budget: 0,
            network_reply_padding: 0,
            application_reply_budget: 0,
        }
    }

    pub(crate) fn application_reply_id(&self) -> u64 {
        self.application_reply_id
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// Deliver a stream-direction frame from the application.
    pub(crate) fn handle_stream(&mut self, frame: Frame, cx: &mut StreamContext) {
        match self.state {
            StreamState::BeforeBegin => match frame {
                Frame::Begin(begin) => self.handle_begin(&begin),
                _ => {
                    // Nothing is legal before the reply BEGIN; the pair is
                    // not yet active so only the offender is reset.
                    self.do_application_reset(cx.trace_ids.next_trace_id());
                    self.state = StreamState::Closed;
                }
            },
            StreamState::AfterBeginOrData => match frame {
                Frame::Data(data) => self.handle_data(data, cx),
                Frame::End(end) => self.handle_end(end, cx),
                Frame::Abort(abort) => self.handle_abort(&abort, cx),
                _ => {
                    self.do_application_reset(cx.trace_ids.next_trace_id());
                    self.do_network_abort(cx.trace_ids.next_trace_id(), 0);
                    self.release_slot(cx);
                    self.state = StreamState::Closed;
                }
            },
            StreamState::Closed => {}
        }
    }

    /// Deliver a throttle-direction frame from the network peer.
    pub(crate) fn handle_throttle(&mut self, frame: Frame, cx: &mut StreamContext) {
        match frame {
            Frame::Window(window) => self.handle_window(&window, cx),
            Frame::Reset(reset) => {
                self.do_application_reset(reset.header.trace_id);
                self.release_slot(cx);
                self.state = StreamState::Closed;
            }
            Frame::Challenge(challenge) => self.handle_challenge(&challenge, cx),
            _ => {} // ignore
        }
    }

    fn handle_begin(&mut self, begin: &BeginFrame) {
        let content_type = if self.timestamp_requested {
            CONTENT_TYPE_EVENT_STREAM_TIMESTAMP
        } else {
            CONTENT_TYPE_EVENT_STREAM
        };

        info!(
            stream_id = self.network_reply_id,
            content_type = content_type,
            "SSE response stream opened"
        );

        let _ = self.network_reply.send(Frame::Begin(BeginFrame {
            header: FrameHeader {
                route_id: self.network_route_id,
                stream_id: self.network_reply_id,
                trace_id: begin.header.trace_id,
                authorization: begin.header.authorization,
            },
            extension: Some(BeginEx::Http(HttpBeginEx::from_pairs([
                (":status", "200"),
                ("content-type", content_type),
            ]))),
        }));

        self.state = StreamState::AfterBeginOrData;
    }

    fn handle_data(&mut self, data: DataFrame, cx: &mut StreamContext) {
        let data_length = data.payload.as_ref().map_or(0, |p| p.len()) as i32;

        self.application_reply_budget -= data_length + data.padding;

        if self.application_reply_budget < 0 {
            warn!(
                stream_id = self.application_reply_id,
                budget = self.application_reply_budget,
                "Application overran its reply budget"
            );
            self.do_application_reset(cx.trace_ids.next_trace_id());
            self.do_network_abort(cx.trace_ids.next_trace_id(), data.header.authorization);
            self.release_slot(cx);
            self.state = StreamState::Closed;
            return;
        }

        let mut id: Option<&[u8]> = None;
        let mut event_type: Option<&[u8]> = None;
        let mut timestamp = 0i64;
        if let Some(ext) = &data.extension {
            id = ext.id.as_deref();
            event_type = ext.event_type.as_deref();
            if self.timestamp_requested {
                timestamp = ext.timestamp;
            }
        }

        let bytes_written = self.do_http_data(
            cx,
            data.header.trace_id,
            data.header.authorization,
            data.flags,
            data.payload.as_deref(),
            id,
            event_type,
            timestamp,
            None,
        );

        self.network_reply_budget -= bytes_written + self.network_reply_padding;
    }

    fn handle_end(&mut self, end: EndFrame, cx: &mut StreamContext) {
        let trace_id = end.header.trace_id;
        let authorization = end.header.authorization;

        match &end.extension {
            Some(ext) => {
                let event_flags = flags::INIT | flags::FIN;

                cx.write_buf.clear();
                let event_len = encode_event(
                    &SseEvent {
                        flags: event_flags,
                        id: ext.id.as_deref(),
                        ..SseEvent::default()
                    },
                    &mut cx.write_buf,
                );

                if self.network_reply_budget >= event_len as i32 + self.network_reply_padding {
                    let _ = self.network_reply.send(Frame::Data(DataFrame {
                        header: FrameHeader {
                            route_id: self.network_route_id,
                            stream_id: self.network_reply_id,
                            trace_id,
                            authorization,
                        },
                        flags: event_flags,
                        padding: self.network_reply_padding,
                        payload: Some(cx.write_buf.clone()),
                        extension: None,
                    }));
                    self.do_http_end(trace_id, authorization);
                    self.state = StreamState::Closed;
                } else {
                    // Rare condition: insufficient window to write the
                    // final id: event. Park it until the next WINDOW.
                    match cx.pool.acquire(self.network_reply_id) {
                        Some(slot) => {
                            let buffer = cx.pool.buffer_mut(slot);
                            buffer.clear();
                            buffer.extend_from_slice(&cx.write_buf);
                            self.network_slot = Some(slot);
                            self.network_slot_offset = event_len;
                            self.slot_trace_id = trace_id;
                            self.slot_authorization = authorization;
                            self.slot_padding = self.network_reply_padding;
                            self.deferred_end = true;
                            debug!(
                                stream_id = self.network_reply_id,
                                event_len = event_len,
                                budget = self.network_reply_budget,
                                "Final id: event deferred until next WINDOW"
                            );
                        }
                        None => {
                            // No slot left to defer into: close without the
                            // terminal id rather than stall the stream.
                            warn!(
                                stream_id = self.network_reply_id,
                                "Dropping final id: event, buffer pool exhausted"
                            );
                            self.do_http_end(trace_id, authorization);
                            self.state = StreamState::Closed;
                        }
                    }
                }
            }
            None => {
                self.do_http_end(trace_id, authorization);
                self.state = StreamState::Closed;
            }
        }
    }

    fn handle_abort(&mut self, abort: &AbortFrame, cx: &mut StreamContext) {
        self.do_network_abort(abort.header.trace_id, abort.header.authorization);
        self.release_slot(cx);
        self.state = StreamState::Closed;
    }

    fn handle_window(&mut self, window: &WindowFrame, cx: &mut StreamContext) {
        self.network_reply_budget += window.credit;
        self.network_reply_padding = window.padding;

        if self.minimum_network_reply_budget == -1 {
            self.minimum_network_reply_budget = window.credit;

            if let Some(comment) = cx.initial_comment.clone() {
                let trace_id = cx.trace_ids.next_trace_id();
                let bytes_written = self.do_http_data(
                    cx,
                    trace_id,
                    0,
                    flags::INIT | flags::FIN,
                    None,
                    None,
                    None,
                    0,
                    Some(&comment),
                );
                self.network_reply_budget -= bytes_written + self.network_reply_padding;
                debug_assert!(self.network_reply_budget >= 0);
            }
        }

        if self.network_reply_budget < self.minimum_network_reply_budget {
            // Group budgeting expects the full initial window the first
            // time; wait until it builds up before granting the
            // application anything.
            return;
        }
        self.minimum_network_reply_budget = 0;

        if let Some(slot) = self.network_slot {
            let debit = self.network_slot_offset as i32 + self.slot_padding;
            if self.network_reply_budget >= debit {
                let payload = cx.pool.buffer_mut(slot).clone();
                let _ = self.network_reply.send(Frame::Data(DataFrame {
                    header: FrameHeader {
                        route_id: self.network_route_id,
                        stream_id: self.network_reply_id,
                        trace_id: self.slot_trace_id,
                        authorization: self.slot_authorization,
                    },
                    flags: flags::INIT | flags::FIN,
                    padding: self.slot_padding,
                    payload: Some(payload),
                    extension: None,
                }));
                self.network_reply_budget -= debit;
                self.network_slot_offset = 0;
                cx.pool.release(slot);
                self.network_slot = None;
                debug!(stream_id = self.network_reply_id, "Deferred frame drained");

                if self.deferred_end {
                    self.do_http_end(self.slot_trace_id, self.slot_authorization);
                    self.deferred_end = false;
                    self.state = StreamState::Closed;
                }
            }
        }

        let application_reply_padding = self.network_reply_padding + MAX_EVENT_HEADER_SIZE as i32;
        let application_reply_credit = self.network_reply_budget - self.application_reply_budget;
        if application_reply_credit > 0 {
            let _ = self.application_reply.send(Frame::Window(WindowFrame {
                header: FrameHeader {
                    route_id: self.application_route_id,
                    stream_id: self.application_reply_id,
                    trace_id: window.header.trace_id,
                    authorization: window.header.authorization,
                },
                credit: application_reply_credit,
                padding: application_reply_padding,
                group_id: window.group_id,
                capabilities: 0,
            }));
            self.application_reply_budget += application_reply_credit;
        }
    }

    fn handle_challenge(&mut self, challenge: &ChallengeFrame, cx: &mut StreamContext) {
        let ext = match &challenge.extension {
            Some(ext) => ext,
            None => return,
        };

        let mut object = serde_json::Map::new();
        let mut headers = serde_json::Map::new();
        for header in &ext.headers {
            if !header.name.is_empty() && !header.name.starts_with(':') {
                headers.insert(header.name.clone(), Value::String(header.value.clone()));
            } else if header.name == HEADER_NAME_METHOD {
                object.insert(
                    METHOD_PROPERTY.to_string(),
                    Value::String(header.value.clone()),
                );
            }
        }
        object.insert(HEADERS_PROPERTY.to_string(), Value::Object(headers));

        cx.challenge_buf.clear();
        if serde_json::to_writer(&mut cx.challenge_buf, &Value::Object(object)).is_err() {
            return;
        }

        cx.write_buf.clear();
        let event_len = encode_event(
            &SseEvent {
                flags: flags::INIT | flags::FIN,
                event_type: Some(cx.challenge_event_type.as_bytes()),
                data: Some(&cx.challenge_buf),
                ..SseEvent::default()
            },
            &mut cx.write_buf,
        );

        let debit = event_len as i32 + self.network_reply_padding;
        if self.network_reply_budget > debit {
            self.network_reply_budget -= debit;

            info!(
                stream_id = self.network_reply_id,
                event_type = %cx.challenge_event_type,
                "Challenge event injected"
            );
            let _ = self.network_reply.send(Frame::Data(DataFrame {
                header: FrameHeader {
                    route_id: self.network_route_id,
                    stream_id: self.network_reply_id,
                    trace_id: challenge.header.trace_id,
                    authorization: 0,
                },
                flags: flags::INIT | flags::FIN,
                padding: self.network_reply_padding,
                payload: Some(cx.write_buf.clone()),
                extension: None,
            }));
        } else {
            let slot = match self.network_slot {
                Some(slot) => slot,
                None => match cx.pool.acquire(self.network_reply_id) {
                    Some(slot) => {
                        cx.pool.buffer_mut(slot).clear();
                        self.network_slot = Some(slot);
                        self.slot_trace_id = challenge.header.trace_id;
                        self.slot_authorization = 0;
                        self.slot_padding = self.network_reply_padding;
                        slot
                    }
                    None => {
                        // The protocol has no back-channel to report this;
                        // the challenge is dropped.
                        warn!(
                            stream_id = self.network_reply_id,
                            "Dropping challenge event, buffer pool exhausted"
                        );
                        return;
                    }
                },
            };

            cx.pool.buffer_mut(slot).extend_from_slice(&cx.write_buf);
            self.network_slot_offset += event_len;
            debug!(
                stream_id = self.network_reply_id,
                pending = self.network_slot_offset,
                "Challenge event deferred until next WINDOW"
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn do_http_data(
        &mut self,
        cx: &mut StreamContext,
        trace_id: u64,
        authorization: u64,
        event_flags: u8,
        payload: Option<&[u8]>,
        id: Option<&[u8]>,
        event_type: Option<&[u8]>,
        timestamp: i64,
        comment: Option<&[u8]>,
    ) -> i32 {
        cx.write_buf.clear();
        let event_len = encode_event(
            &SseEvent {
                flags: event_flags,
                id,
                event_type,
                timestamp,
                data: payload,
                comment,
            },
            &mut cx.write_buf,
        );

        let _ = self.network_reply.send(Frame::Data(DataFrame {
            header: FrameHeader {
                route_id: self.network_route_id,
                stream_id: self.network_reply_id,
                trace_id,
                authorization,
            },
            flags: event_flags,
            padding: self.network_reply_padding,
            payload: Some(cx.write_buf.clone()),
            extension: None,
        }));

        event_len as i32
    }

    fn do_http_end(&self, trace_id: u64, authorization: u64) {
        let _ = self.network_reply.send(Frame::End(EndFrame {
            header: FrameHeader {
                route_id: self.network_route_id,
                stream_id: self.network_reply_id,
                trace_id,
                authorization,
            },
            extension: None,
        }));
    }

    fn do_network_abort(&self, trace_id: u64, authorization: u64) {
        let _ = self.network_reply.send(Frame::Abort(AbortFrame {
            header: FrameHeader {
                route_id: self.network_route_id,
                stream_id: self.network_reply_id,
                trace_id,
                authorization,
            },
        }));
    }

    fn do_application_reset(&self, trace_id: u64) {
        let _ = self.application_reply.send(Frame::Reset(ResetFrame {
            header: FrameHeader {
                route_id: self.application_route_id,
                stream_id: self.application_reply_id,
                trace_id,
                authorization: 0,
            },
        }));
    }

    fn release_slot(&mut self, cx: &mut StreamContext) {
        if let Some(slot) = self.network_slot.take() {
            cx.pool.release(slot);
            self.network_slot_offset = 0;
            self.deferred_end = false;
        }
    }
}

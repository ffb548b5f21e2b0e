use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::buffer_pool::BufferPool;
use crate::config::{ConfigError, SseConfig};
use crate::frame::{
    frame_kind_name, BeginEx, BeginFrame, EndFrame, Frame, FrameHeader, FrameSink, HttpBeginEx,
    SseBeginEx, WindowFrame,
};
use crate::ids::{self, StreamIdSupplier};
use crate::request::{self, RequestParser};
use crate::route::{Route, RouteManager};

use super::initial::{InitialOutcome, InitialStream};
use super::reply::ReplyStream;
use super::StreamContext;

/// Stream-direction dispatch target for one registered stream id.
#[derive(Clone)]
enum StreamHandler {
    Initial(InitialStream),
    Reply { reply_key: u64 },
    /// Registered for short-circuited requests (CORS preflight, 405) so
    /// that subsequent frames on the stream are swallowed.
    Discard,
}

/// Throttle-direction dispatch target for one registered stream id.
#[derive(Clone)]
enum ThrottleHandler {
    Initial(InitialStream),
    Reply { reply_key: u64 },
}

/// Factory and dispatcher for SSE stream pairs.
///
/// Classifies incoming HTTP BEGIN frames, answers CORS preflights and
/// unsupported methods directly, resolves SSE subscriptions to application
/// routes, and owns the resulting half-stream handlers together with the
/// correlation map that pairs the application's reply stream back to its
/// subscription.
///
/// Dispatch is by stream id: frames in the stream direction enter through
/// [`SseStreamFactory::on_stream`], throttle signals (WINDOW, RESET,
/// CHALLENGE) through [`SseStreamFactory::on_throttle`]. All deliveries for
/// one factory happen on one logical executor; handlers never block.
pub struct SseStreamFactory<R: RouteManager> {
    router: R,
    parser: RequestParser,
    stream_ids: StreamIdSupplier,
    cx: StreamContext,
    /// connect reply id → reply handler key, until the reply BEGIN fires.
    correlations: HashMap<u64, u64>,
    replies: HashMap<u64, ReplyStream>,
    streams: HashMap<u64, StreamHandler>,
    throttles: HashMap<u64, ThrottleHandler>,
}

impl<R: RouteManager> SseStreamFactory<R> {
    /// Create a factory with the given configuration and route manager.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration violates the
    /// protocol budgets (see [`SseConfig::validate`]).
    pub fn new(config: SseConfig, router: R) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            router,
            parser: RequestParser::new(),
            stream_ids: StreamIdSupplier::new(),
            cx: StreamContext {
                write_buf: Vec::with_capacity(config.frame_buffer_size),
                challenge_buf: Vec::with_capacity(config.frame_buffer_size),
                pool: BufferPool::new(config.pool_slots, config.frame_buffer_size),
                trace_ids: Default::default(),
                initial_comment: config.initial_comment,
                challenge_event_type: config.challenge_event_type,
            },
            correlations: HashMap::new(),
            replies: HashMap::new(),
            streams: HashMap::new(),
            throttles: HashMap::new(),
        })
    }

    /// Entry point for a BEGIN on a stream this factory has not seen.
    ///
    /// Odd (initial) stream ids are classified as CORS preflight, invalid
    /// method, or SSE subscription; even (reply) ids are matched against
    /// the correlation map, and the BEGIN is delivered to the matched
    /// handler (opening the HTTP response). `throttle` is the sink toward
    /// whoever opened the stream: WINDOW/RESET acknowledgements for the
    /// incoming stream and the HTTP response frames are both emitted there.
    ///
    /// # Returns
    ///
    /// `true` when the stream was accepted and registered (including
    /// short-circuited CORS/405 streams), `false` when no handler was
    /// produced (non-BEGIN frame, unresolved route, unknown correlation).
    pub fn new_stream(&mut self, frame: &Frame, throttle: &FrameSink) -> bool {
        let begin = match frame {
            Frame::Begin(begin) => begin,
            _ => return false,
        };

        if ids::is_initial(begin.header.stream_id) {
            self.new_initial_stream(begin, throttle)
        } else {
            self.new_reply_stream(begin)
        }
    }

    /// Dispatch a stream-direction frame to its registered handler.
    pub fn on_stream(&mut self, frame: Frame) {
        let stream_id = frame.stream_id();
        let handler = match self.streams.get(&stream_id) {
            Some(handler) => handler.clone(),
            None => {
                debug!(
                    stream_id = stream_id,
                    kind = frame_kind_name(&frame),
                    "Frame on unknown stream"
                );
                return;
            }
        };

        match handler {
            StreamHandler::Discard => {
                if matches!(frame, Frame::End(_) | Frame::Abort(_)) {
                    self.streams.remove(&stream_id);
                }
            }
            StreamHandler::Initial(initial) => {
                match initial.handle_stream(&frame, &mut self.cx.trace_ids) {
                    InitialOutcome::Open => {}
                    InitialOutcome::Ended => {
                        self.streams.remove(&stream_id);
                    }
                    InitialOutcome::Aborted => {
                        self.streams.remove(&stream_id);
                        self.throttles.remove(&initial.connect_initial_id());
                        self.cleanup_correlation(initial.accept_reply_id());
                    }
                }
            }
            StreamHandler::Reply { reply_key } => {
                if let Some(reply) = self.replies.get_mut(&reply_key) {
                    reply.handle_stream(frame, &mut self.cx);
                    if reply.is_closed() {
                        self.remove_reply(reply_key);
                    }
                }
            }
        }
    }

    /// Dispatch a throttle-direction frame (WINDOW, RESET, CHALLENGE) to
    /// its registered handler.
    pub fn on_throttle(&mut self, frame: Frame) {
        let stream_id = frame.stream_id();
        let handler = match self.throttles.get(&stream_id) {
            Some(handler) => handler.clone(),
            None => {
                debug!(
                    stream_id = stream_id,
                    kind = frame_kind_name(&frame),
                    "Throttle signal on unknown stream"
                );
                return;
            }
        };

        match handler {
            ThrottleHandler::Initial(initial) => initial.handle_throttle(&frame),
            ThrottleHandler::Reply { reply_key } => {
                if let Some(reply) = self.replies.get_mut(&reply_key) {
                    reply.handle_throttle(frame, &mut self.cx);
                    if reply.is_closed() {
                        self.remove_reply(reply_key);
                    }
                }
            }
        }
    }

    fn new_initial_stream(&mut self, begin: &BeginFrame, throttle: &FrameSink) -> bool {
        let http_begin = match &begin.extension {
            Some(BeginEx::Http(ex)) => Some(ex),
            _ => None,
        };

        match http_begin {
            Some(ex) if request::is_cors_preflight(Some(ex)) => {
                info!(
                    stream_id = begin.header.stream_id,
                    "CORS preflight answered"
                );
                self.answer_immediately(
                    begin,
                    throttle,
                    [
                        (":status", "204"),
                        ("access-control-allow-methods", "GET"),
                    ],
                );
                self.streams
                    .insert(begin.header.stream_id, StreamHandler::Discard);
                true
            }
            Some(ex) if request::is_sse_request_method(Some(ex)) => {
                self.new_initial_sse_stream(begin, throttle, ex)
            }
            _ => {
                warn!(
                    stream_id = begin.header.stream_id,
                    "Method not allowed on SSE endpoint"
                );
                self.answer_immediately(begin, throttle, [(":status", "405")]);
                self.streams
                    .insert(begin.header.stream_id, StreamHandler::Discard);
                true
            }
        }
    }

    fn new_initial_sse_stream(
        &mut self,
        begin: &BeginFrame,
        throttle: &FrameSink,
        http_begin: &HttpBeginEx,
    ) -> bool {
        let accept_route_id = begin.header.route_id;
        let accept_initial_id = begin.header.stream_id;
        let trace_id = begin.header.trace_id;
        let authorization = begin.header.authorization;

        let subscription = self.parser.parse(&http_begin.headers);
        let path_info = subscription.path_info;
        let last_event_id = subscription.last_event_id;

        let filter = |route: &Route| match &route.path_info {
            Some(prefix) => path_info
                .as_deref()
                .map_or(false, |path| path.starts_with(prefix.as_str())),
            None => true,
        };

        let route = match self.router.resolve(accept_route_id, authorization, &filter) {
            Some(route) => route,
            None => {
                warn!(
                    route_id = accept_route_id,
                    path = path_info.as_deref().unwrap_or(""),
                    "SSE subscription dropped, no route"
                );
                return false;
            }
        };

        let connect_route_id = route.correlation_id;
        let connect_initial_id = self.stream_ids.next_initial_id(connect_route_id);
        let connect_reply_id = ids::reply_id(connect_initial_id);
        let connect_initial = self.router.receiver(connect_initial_id);

        let accept_reply_id = ids::reply_id(accept_initial_id);

        let timestamp_requested = request::timestamp_requested(http_begin);

        let initial = InitialStream::new(
            throttle.clone(),
            accept_route_id,
            accept_initial_id,
            accept_reply_id,
            connect_initial.clone(),
            connect_route_id,
            connect_initial_id,
        );

        let reply = ReplyStream::new(
            connect_initial.clone(),
            connect_route_id,
            connect_reply_id,
            throttle.clone(),
            accept_route_id,
            accept_reply_id,
            timestamp_requested,
        );

        self.correlations.insert(connect_reply_id, accept_reply_id);
        self.replies.insert(accept_reply_id, reply);
        self.streams
            .insert(accept_initial_id, StreamHandler::Initial(initial.clone()));
        self.throttles
            .insert(connect_initial_id, ThrottleHandler::Initial(initial));
        self.throttles.insert(
            accept_reply_id,
            ThrottleHandler::Reply {
                reply_key: accept_reply_id,
            },
        );

        info!(
            stream_id = accept_initial_id,
            connect_initial_id = connect_initial_id,
            path = path_info.as_deref().unwrap_or(""),
            last_event_id = last_event_id.as_deref().unwrap_or(""),
            timestamp_requested = timestamp_requested,
            "SSE subscription accepted"
        );

        let _ = connect_initial.send(Frame::Begin(BeginFrame {
            header: FrameHeader {
                route_id: connect_route_id,
                stream_id: connect_initial_id,
                trace_id,
                authorization,
            },
            extension: Some(BeginEx::Sse(SseBeginEx {
                path_info,
                last_event_id,
            })),
        }));

        true
    }

    fn new_reply_stream(&mut self, begin: &BeginFrame) -> bool {
        let connect_reply_id = begin.header.stream_id;

        let reply_key = match self.correlations.remove(&connect_reply_id) {
            Some(key) => key,
            None => {
                debug!(
                    stream_id = connect_reply_id,
                    "Reply BEGIN without correlation"
                );
                return false;
            }
        };

        self.streams
            .insert(connect_reply_id, StreamHandler::Reply { reply_key });

        if let Some(reply) = self.replies.get_mut(&reply_key) {
            reply.handle_stream(Frame::Begin(begin.clone()), &mut self.cx);
            if reply.is_closed() {
                self.remove_reply(reply_key);
            }
        }

        true
    }

    /// Acknowledge the incoming stream with a zero-credit WINDOW, then
    /// answer it with the given response headers and an immediate END.
    fn answer_immediately<'a>(
        &mut self,
        begin: &BeginFrame,
        throttle: &FrameSink,
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let accept_route_id = begin.header.route_id;
        let accept_initial_id = begin.header.stream_id;
        let accept_reply_id = ids::reply_id(accept_initial_id);
        let trace_id = self.cx.trace_ids.next_trace_id();

        let _ = throttle.send(Frame::Window(WindowFrame {
            header: FrameHeader {
                route_id: accept_route_id,
                stream_id: accept_initial_id,
                trace_id,
                authorization: 0,
            },
            credit: 0,
            padding: 0,
            group_id: 0,
            capabilities: 0,
        }));

        let _ = throttle.send(Frame::Begin(BeginFrame {
            header: FrameHeader {
                route_id: accept_route_id,
                stream_id: accept_reply_id,
                trace_id,
                authorization: 0,
            },
            extension: Some(BeginEx::Http(HttpBeginEx::from_pairs(headers))),
        }));

        let _ = throttle.send(Frame::End(EndFrame {
            header: FrameHeader {
                route_id: accept_route_id,
                stream_id: accept_reply_id,
                trace_id,
                authorization: 0,
            },
            extension: None,
        }));
    }

    fn cleanup_correlation(&mut self, accept_reply_id: u64) {
        if self.correlations.remove(&accept_reply_id).is_some() {
            self.throttles.remove(&accept_reply_id);
            self.replies.remove(&accept_reply_id);
        }
    }

    fn remove_reply(&mut self, reply_key: u64) {
        if let Some(reply) = self.replies.remove(&reply_key) {
            self.throttles.remove(&reply_key);
            self.streams.remove(&reply.application_reply_id());
            self.correlations.remove(&reply.application_reply_id());
        }
    }
}

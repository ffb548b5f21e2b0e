#![allow(dead_code)]

use may::sync::mpsc;
use ssegate::frame::{
    AbortFrame, BeginEx, BeginFrame, ChallengeFrame, DataFrame, EndFrame, Frame, FrameHeader,
    FrameSink, HttpBeginEx, HttpChallengeEx, ResetFrame, SseBeginEx, SseDataEx, SseEndEx,
    WindowFrame,
};
use ssegate::{Route, SseConfig, SseStreamFactory, StaticRouteTable};
use std::sync::Once;

pub const ACCEPT_ROUTE_ID: u64 = 0x11;
pub const CONNECT_ROUTE_ID: u64 = 0x22;
pub const ACCEPT_INITIAL_ID: u64 = 0x101; // odd: client-originated

static TRACING_INIT: Once = Once::new();

pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Stream ids of one established subscription pair.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub accept_initial_id: u64,
    pub accept_reply_id: u64,
    pub connect_initial_id: u64,
    pub connect_reply_id: u64,
    pub sse_begin: SseBeginEx,
}

/// A gateway wired to in-memory channels: `network` collects frames the
/// gateway emits toward the HTTP peer, `app` collects frames toward the
/// application.
pub struct TestGateway {
    pub factory: SseStreamFactory<StaticRouteTable>,
    pub network_tx: FrameSink,
    pub app_tx: FrameSink,
    network_rx: mpsc::Receiver<Frame>,
    app_rx: mpsc::Receiver<Frame>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_config(SseConfig::default())
    }

    pub fn with_config(config: SseConfig) -> Self {
        Self::with_config_and_routes(
            config,
            vec![Route {
                route_id: ACCEPT_ROUTE_ID,
                correlation_id: CONNECT_ROUTE_ID,
                path_info: None,
                authorization: 0,
            }],
        )
    }

    pub fn with_config_and_routes(config: SseConfig, routes: Vec<Route>) -> Self {
        init_tracing();
        let (network_tx, network_rx) = mpsc::channel();
        let (app_tx, app_rx) = mpsc::channel();
        let table = StaticRouteTable::new(routes, app_tx.clone());
        let factory = SseStreamFactory::new(config, table).expect("invalid test config");
        Self {
            factory,
            network_tx,
            app_tx,
            network_rx,
            app_rx,
        }
    }

    pub fn drain_network(&self) -> Vec<Frame> {
        drain(&self.network_rx)
    }

    pub fn drain_app(&self) -> Vec<Frame> {
        drain(&self.app_rx)
    }

    /// Open an SSE subscription with the given request headers and return
    /// the stream ids of the resulting pair.
    pub fn subscribe(&mut self, headers: &[(&str, &str)]) -> Subscription {
        let begin = http_begin(ACCEPT_ROUTE_ID, ACCEPT_INITIAL_ID, headers);
        let throttle = self.network_tx.clone();
        assert!(
            self.factory.new_stream(&begin, &throttle),
            "subscription BEGIN not accepted"
        );

        let frames = self.drain_app();
        let begin = match frames.last() {
            Some(Frame::Begin(begin)) => begin.clone(),
            other => panic!("expected SSE BEGIN toward application, got {other:?}"),
        };
        let sse_begin = match begin.extension {
            Some(BeginEx::Sse(ext)) => ext,
            other => panic!("expected SSE BEGIN extension, got {other:?}"),
        };

        let connect_initial_id = begin.header.stream_id;
        Subscription {
            accept_initial_id: ACCEPT_INITIAL_ID,
            accept_reply_id: ACCEPT_INITIAL_ID ^ 1,
            connect_initial_id,
            connect_reply_id: connect_initial_id ^ 1,
            sse_begin,
        }
    }

    /// Deliver the application's reply BEGIN; the gateway answers with the
    /// HTTP response BEGIN, returned for inspection.
    pub fn begin_reply(&mut self, sub: &Subscription) -> Vec<Frame> {
        let begin = Frame::Begin(BeginFrame {
            header: FrameHeader {
                route_id: CONNECT_ROUTE_ID,
                stream_id: sub.connect_reply_id,
                trace_id: 0,
                authorization: 0,
            },
            extension: None,
        });
        let throttle = self.app_tx.clone();
        assert!(
            self.factory.new_stream(&begin, &throttle),
            "reply BEGIN not accepted"
        );
        self.drain_network()
    }

    /// WINDOW from the HTTP peer for the response stream.
    pub fn grant_network_window(&mut self, sub: &Subscription, credit: i32, padding: i32) {
        self.factory.on_throttle(window(
            ACCEPT_ROUTE_ID,
            sub.accept_reply_id,
            credit,
            padding,
        ));
    }
}

pub fn drain(rx: &mpsc::Receiver<Frame>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

pub fn http_begin(route_id: u64, stream_id: u64, headers: &[(&str, &str)]) -> Frame {
    Frame::Begin(BeginFrame {
        header: FrameHeader {
            route_id,
            stream_id,
            trace_id: 0,
            authorization: 0,
        },
        extension: Some(BeginEx::Http(HttpBeginEx::from_pairs(
            headers.iter().copied(),
        ))),
    })
}

pub fn app_data(sub: &Subscription, payload: &[u8], padding: i32, ext: Option<SseDataEx>) -> Frame {
    Frame::Data(DataFrame {
        header: FrameHeader {
            route_id: CONNECT_ROUTE_ID,
            stream_id: sub.connect_reply_id,
            trace_id: 0,
            authorization: 0,
        },
        flags: ssegate::frame::flags::INIT | ssegate::frame::flags::FIN,
        padding,
        payload: Some(payload.to_vec()),
        extension: ext,
    })
}

pub fn app_end(sub: &Subscription, id: Option<&[u8]>) -> Frame {
    Frame::End(EndFrame {
        header: FrameHeader {
            route_id: CONNECT_ROUTE_ID,
            stream_id: sub.connect_reply_id,
            trace_id: 0,
            authorization: 0,
        },
        extension: id.map(|id| SseEndEx {
            id: Some(id.to_vec()),
        }),
    })
}

pub fn app_abort(sub: &Subscription) -> Frame {
    Frame::Abort(AbortFrame {
        header: FrameHeader {
            route_id: CONNECT_ROUTE_ID,
            stream_id: sub.connect_reply_id,
            trace_id: 0,
            authorization: 0,
        },
    })
}

pub fn window(route_id: u64, stream_id: u64, credit: i32, padding: i32) -> Frame {
    Frame::Window(WindowFrame {
        header: FrameHeader {
            route_id,
            stream_id,
            trace_id: 0,
            authorization: 0,
        },
        credit,
        padding,
        group_id: 0,
        capabilities: 0,
    })
}

pub fn reset(route_id: u64, stream_id: u64) -> Frame {
    Frame::Reset(ResetFrame {
        header: FrameHeader {
            route_id,
            stream_id,
            trace_id: 0,
            authorization: 0,
        },
    })
}

pub fn end(route_id: u64, stream_id: u64) -> Frame {
    Frame::End(EndFrame {
        header: FrameHeader {
            route_id,
            stream_id,
            trace_id: 0,
            authorization: 0,
        },
        extension: None,
    })
}

pub fn abort(route_id: u64, stream_id: u64) -> Frame {
    Frame::Abort(AbortFrame {
        header: FrameHeader {
            route_id,
            stream_id,
            trace_id: 0,
            authorization: 0,
        },
    })
}

pub fn challenge(route_id: u64, stream_id: u64, headers: &[(&str, &str)]) -> Frame {
    Frame::Challenge(ChallengeFrame {
        header: FrameHeader {
            route_id,
            stream_id,
            trace_id: 0,
            authorization: 0,
        },
        extension: Some(HttpChallengeEx::from_pairs(headers.iter().copied())),
    })
}

/// Headers of an HTTP BEGIN as `(name, value)` pairs.
pub fn begin_headers(frame: &Frame) -> Vec<(String, String)> {
    match frame {
        Frame::Begin(BeginFrame {
            extension: Some(BeginEx::Http(ext)),
            ..
        }) => ext
            .headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect(),
        other => panic!("expected HTTP BEGIN, got {other:?}"),
    }
}

/// Payload bytes of an emitted DATA frame.
pub fn data_payload(frame: &Frame) -> &[u8] {
    match frame {
        Frame::Data(DataFrame {
            payload: Some(payload),
            ..
        }) => payload,
        other => panic!("expected DATA with payload, got {other:?}"),
    }
}

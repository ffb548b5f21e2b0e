mod common;

use common::*;
use ssegate::frame::{ChallengeFrame, Frame, FrameHeader};
use ssegate::SseConfig;

fn established(gw: &mut TestGateway) -> Subscription {
    let sub = gw.subscribe(&[(":method", "GET"), (":path", "/events")]);
    gw.begin_reply(&sub);
    sub
}

#[test]
fn test_challenge_injected_as_sse_event() {
    let mut gw = TestGateway::new();
    let sub = established(&mut gw);

    gw.grant_network_window(&sub, 4096, 0);
    gw.drain_app();

    gw.factory.on_throttle(challenge(
        ACCEPT_ROUTE_ID,
        sub.accept_reply_id,
        &[(":method", "GET"), ("www-authenticate", "Bearer")],
    ));

    let frames = gw.drain_network();
    assert_eq!(frames.len(), 1);
    assert_eq!(
        data_payload(&frames[0]),
        b"event:challenge\ndata:{\"method\":\"GET\",\"headers\":{\"www-authenticate\":\"Bearer\"}}\n\n"
            .as_slice()
    );
}

#[test]
fn test_challenge_filters_pseudo_headers() {
    let mut gw = TestGateway::new();
    let sub = established(&mut gw);

    gw.grant_network_window(&sub, 4096, 0);
    gw.drain_app();

    gw.factory.on_throttle(challenge(
        ACCEPT_ROUTE_ID,
        sub.accept_reply_id,
        &[
            (":method", "GET"),
            (":path", "/x"),
            ("www-authenticate", "Bearer"),
            ("x-custom", "y"),
        ],
    ));

    let frames = gw.drain_network();
    let expected = b"event:challenge\ndata:{\"method\":\"GET\",\"headers\":{\"www-authenticate\":\"Bearer\",\"x-custom\":\"y\"}}\n\n";
    assert_eq!(data_payload(&frames[0]), expected.as_slice());
}

#[test]
fn test_challenge_without_method_has_no_method_property() {
    let mut gw = TestGateway::new();
    let sub = established(&mut gw);

    gw.grant_network_window(&sub, 4096, 0);
    gw.drain_app();

    gw.factory.on_throttle(challenge(
        ACCEPT_ROUTE_ID,
        sub.accept_reply_id,
        &[("www-authenticate", "Bearer")],
    ));

    let frames = gw.drain_network();
    assert_eq!(
        data_payload(&frames[0]),
        b"event:challenge\ndata:{\"headers\":{\"www-authenticate\":\"Bearer\"}}\n\n".as_slice()
    );
}

#[test]
fn test_configured_challenge_event_type() {
    let config = SseConfig {
        challenge_event_type: "auth-needed".to_string(),
        ..SseConfig::default()
    };
    let mut gw = TestGateway::with_config(config);
    let sub = established(&mut gw);

    gw.grant_network_window(&sub, 4096, 0);
    gw.drain_app();

    gw.factory.on_throttle(challenge(
        ACCEPT_ROUTE_ID,
        sub.accept_reply_id,
        &[(":method", "GET")],
    ));

    let frames = gw.drain_network();
    assert_eq!(
        data_payload(&frames[0]),
        b"event:auth-needed\ndata:{\"method\":\"GET\",\"headers\":{}}\n\n".as_slice()
    );
}

#[test]
fn test_challenge_requires_strictly_more_budget_than_debit() {
    let mut gw = TestGateway::new();
    let sub = established(&mut gw);

    let event = b"event:challenge\ndata:{\"method\":\"GET\",\"headers\":{}}\n\n";

    // Budget exactly equal to the debit is not enough.
    gw.grant_network_window(&sub, event.len() as i32, 0);
    gw.drain_app();

    gw.factory.on_throttle(challenge(
        ACCEPT_ROUTE_ID,
        sub.accept_reply_id,
        &[(":method", "GET")],
    ));
    assert!(gw.drain_network().is_empty(), "challenge must be deferred");

    // The next WINDOW flushes the parked event.
    gw.grant_network_window(&sub, 1, 0);
    let frames = gw.drain_network();
    assert_eq!(frames.len(), 1);
    assert_eq!(data_payload(&frames[0]), event.as_slice());
}

#[test]
fn test_deferred_challenge_extends_pending_end_slot() {
    let mut gw = TestGateway::new();
    let sub = established(&mut gw);

    gw.grant_network_window(&sub, 109, 100);
    gw.drain_app();

    gw.factory.on_stream(app_data(&sub, b"hi", 0, None));
    gw.drain_network();

    // Budget is exhausted: the final id: event parks in the slot.
    gw.factory.on_stream(app_end(&sub, Some(b"xy")));
    assert!(gw.drain_network().is_empty());

    // The challenge cannot be emitted either and extends the same slot.
    gw.factory.on_throttle(challenge(
        ACCEPT_ROUTE_ID,
        sub.accept_reply_id,
        &[(":method", "GET")],
    ));
    assert!(gw.drain_network().is_empty());

    // Draining the slot emits both events in one frame, then the END.
    let combined = b"id:xy\n\nevent:challenge\ndata:{\"method\":\"GET\",\"headers\":{}}\n\n";
    gw.grant_network_window(&sub, combined.len() as i32 + 100, 100);
    let frames = gw.drain_network();
    assert_eq!(frames.len(), 2);
    assert_eq!(data_payload(&frames[0]), combined.as_slice());
    assert!(matches!(frames[1], Frame::End(_)));
}

#[test]
fn test_challenge_dropped_when_pool_exhausted() {
    let config = SseConfig {
        pool_slots: 0,
        ..SseConfig::default()
    };
    let mut gw = TestGateway::with_config(config);
    let sub = established(&mut gw);

    // No window has been granted, so the challenge cannot be emitted and
    // there is no slot to park it in.
    gw.factory.on_throttle(challenge(
        ACCEPT_ROUTE_ID,
        sub.accept_reply_id,
        &[(":method", "GET")],
    ));
    assert!(gw.drain_network().is_empty());
    assert!(gw.drain_app().is_empty());
}

#[test]
fn test_challenge_without_extension_ignored() {
    let mut gw = TestGateway::new();
    let sub = established(&mut gw);

    gw.grant_network_window(&sub, 4096, 0);
    gw.drain_app();

    gw.factory.on_throttle(Frame::Challenge(ChallengeFrame {
        header: FrameHeader {
            route_id: ACCEPT_ROUTE_ID,
            stream_id: sub.accept_reply_id,
            trace_id: 0,
            authorization: 0,
        },
        extension: None,
    }));
    assert!(gw.drain_network().is_empty());
}

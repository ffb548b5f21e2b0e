//! HTTP request classification and subscription parsing.
//!
//! Works on the header list carried by an HTTP BEGIN extension: decides
//! whether the request is a CORS preflight, a valid SSE subscription
//! (`GET`), or neither, and extracts `(path_info, last_event_id)` for the
//! subscription handed to the application. A `lastEventId` query parameter
//! doubles as a fallback for a missing `Last-Event-ID` header and is
//! scrubbed from the forwarded path.

use http::Method;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::HashMap;

use crate::frame::{HttpBeginEx, HttpHeader};

const HEADER_NAME_METHOD: &str = ":method";
const HEADER_NAME_PATH: &str = ":path";
const HEADER_NAME_LAST_EVENT_ID: &str = "last-event-id";
const HEADER_NAME_ACCEPT: &str = "accept";
const HEADER_NAME_ACCESS_CONTROL_REQUEST_METHOD: &str = "access-control-request-method";
const HEADER_NAME_ACCESS_CONTROL_REQUEST_HEADERS: &str = "access-control-request-headers";

const TIMESTAMP_EXTENSION_TOKEN: &str = "ext=timestamp";

/// Subscription parameters extracted from an SSE request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseRequest {
    /// Request path with any `lastEventId` query parameter removed.
    pub path_info: Option<String>,
    /// `Last-Event-ID` header value, or the decoded `lastEventId` query
    /// parameter when the header is absent.
    pub last_event_id: Option<String>,
}

/// Parses SSE subscription requests. Holds the compiled query patterns.
pub struct RequestParser {
    query_pattern: Regex,
    last_event_id_pattern: Regex,
}

impl RequestParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            query_pattern: Regex::new(r"^(?P<path>[^?]*)(?P<query>\?.*)$")
                .expect("Failed to compile query params regex"),
            last_event_id_pattern: Regex::new(r"(\?|&)lastEventId=(?P<lastEventId>[^&]*)(&|$)")
                .expect("Failed to compile lastEventId regex"),
        }
    }

    /// Produce `(path_info, last_event_id)` from a request header list.
    ///
    /// Duplicate-named headers are folded into one value joined by `", "`.
    /// Every `lastEventId` query parameter occurrence is removed from the
    /// forwarded path; the first occurrence is percent-decoded and used as
    /// `last_event_id` when the `Last-Event-ID` header is absent.
    #[must_use]
    pub fn parse(&self, headers: &[HttpHeader]) -> SseRequest {
        let folded = fold_headers(headers);

        let mut path_info = folded.get(HEADER_NAME_PATH).cloned();
        let mut last_event_id = folded.get(HEADER_NAME_LAST_EVENT_ID).cloned();

        if let Some(path) = path_info.take() {
            path_info = Some(match self.scrub_last_event_id(&path, &mut last_event_id) {
                Some(scrubbed) => scrubbed,
                None => path,
            });
        }

        SseRequest {
            path_info,
            last_event_id,
        }
    }

    /// Remove every `lastEventId` parameter from the query portion of
    /// `path`, filling `last_event_id` from the first occurrence when it is
    /// still unset. Returns `None` when the path carries no query.
    fn scrub_last_event_id(
        &self,
        path: &str,
        last_event_id: &mut Option<String>,
    ) -> Option<String> {
        let caps = self.query_pattern.captures(path)?;
        let base = &caps["path"];
        let query = &caps["query"];

        let mut rebuilt = String::with_capacity(path.len());
        rebuilt.push_str(base);

        let mut tail = 0;
        for caps in self.last_event_id_pattern.captures_iter(query) {
            let matched = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };

            if last_event_id.is_none() {
                *last_event_id = Some(decode_last_event_id(&caps["lastEventId"]));
            }

            rebuilt.push_str(&query[tail..matched.start()]);
            // Parameter at end of query: drop the leading separator with
            // it. Otherwise keep the leading separator and let the trailing
            // one be consumed by the match.
            let trailing = caps.get(3).map_or("", |g| g.as_str());
            if !trailing.is_empty() {
                if let Some(leading) = caps.get(1) {
                    rebuilt.push_str(leading.as_str());
                }
            }
            tail = matched.end();
        }
        rebuilt.push_str(&query[tail..]);

        Some(rebuilt)
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold duplicate-named headers into a single value joined by `", "`,
/// preserving first-insertion value order.
#[must_use]
pub fn fold_headers(headers: &[HttpHeader]) -> HashMap<String, String> {
    let mut folded: HashMap<String, String> = HashMap::with_capacity(headers.len());
    for header in headers {
        folded
            .entry(header.name.clone())
            .and_modify(|v| {
                v.push_str(", ");
                v.push_str(&header.value);
            })
            .or_insert_with(|| header.value.clone());
    }
    folded
}

/// True when the request is a CORS preflight: method `OPTIONS` with at
/// least one `access-control-request-*` header present.
#[must_use]
pub fn is_cors_preflight(http_begin: Option<&HttpBeginEx>) -> bool {
    match http_begin {
        Some(ex) => {
            has_header_value(ex, HEADER_NAME_METHOD, Method::OPTIONS.as_str())
                && ex.headers.iter().any(|h| {
                    h.name == HEADER_NAME_ACCESS_CONTROL_REQUEST_METHOD
                        || h.name == HEADER_NAME_ACCESS_CONTROL_REQUEST_HEADERS
                })
        }
        None => false,
    }
}

/// True when the request method is the one SSE subscriptions use (`GET`).
#[must_use]
pub fn is_sse_request_method(http_begin: Option<&HttpBeginEx>) -> bool {
    match http_begin {
        Some(ex) => has_header_value(ex, HEADER_NAME_METHOD, Method::GET.as_str()),
        None => false,
    }
}

/// True when the client negotiated the timestamp extension via
/// `accept: text/event-stream;ext=timestamp`.
#[must_use]
pub fn timestamp_requested(http_begin: &HttpBeginEx) -> bool {
    http_begin
        .headers
        .iter()
        .any(|h| h.name == HEADER_NAME_ACCEPT && h.value.contains(TIMESTAMP_EXTENSION_TOKEN))
}

fn has_header_value(http_begin: &HttpBeginEx, name: &str, value: &str) -> bool {
    http_begin
        .headers
        .iter()
        .any(|h| h.name == name && h.value == value)
}

fn decode_last_event_id(raw: &str) -> String {
    if raw.contains('%') {
        percent_decode_str(raw).decode_utf8_lossy().into_owned()
    } else {
        raw.to_string()
    }
}

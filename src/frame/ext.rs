use smallvec::SmallVec;

/// Maximum number of headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header list for typical request sizes.
pub type HeaderVec = SmallVec<[HttpHeader; MAX_INLINE_HEADERS]>;

/// A single `(name, value)` header pair. Pseudo-header names (`:method`,
/// `:path`, `:status`, ...) begin with ASCII colon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// HTTP request description attached to a BEGIN on the network boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpBeginEx {
    /// Ordered list of header pairs, pseudo-headers included.
    pub headers: HeaderVec,
}

impl HttpBeginEx {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            headers: pairs
                .into_iter()
                .map(|(n, v)| HttpHeader::new(n, v))
                .collect(),
        }
    }

    /// Value of the first header with the given name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }
}

/// Subscription description attached to a BEGIN on the application boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseBeginEx {
    pub path_info: Option<String>,
    pub last_event_id: Option<String>,
}

/// Event metadata attached to a DATA on the application boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseDataEx {
    /// Milliseconds since epoch; zero means unset.
    pub timestamp: i64,
    pub id: Option<Vec<u8>>,
    pub event_type: Option<Vec<u8>>,
}

/// Terminal event id attached to an END on the application boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEndEx {
    pub id: Option<Vec<u8>>,
}

/// Header pairs attached to a CHALLENGE on the network boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpChallengeEx {
    pub headers: HeaderVec,
}

impl HttpChallengeEx {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            headers: pairs
                .into_iter()
                .map(|(n, v)| HttpHeader::new(n, v))
                .collect(),
        }
    }
}

/// Typed BEGIN extension envelope, keyed by boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum BeginEx {
    Http(HttpBeginEx),
    Sse(SseBeginEx),
}

//! # Gateway Configuration
//!
//! Environment variable-based configuration for the SSE gateway.
//!
//! ## Environment Variables
//!
//! ### `SSEGATE_INITIAL_COMMENT`
//!
//! Optional comment text emitted as the first SSE frame once the network
//! peer grants its initial window. Useful to defeat buffering middleboxes
//! that hold back responses until the first byte arrives. Unset by default.
//!
//! ### `SSEGATE_CHALLENGE_EVENT_TYPE`
//!
//! SSE `event:` type name used for injected challenge events.
//! Default: `challenge`. At most 16 bytes, the budget the per-event
//! overhead constant reserves for event types.
//!
//! ### `SSEGATE_FRAME_BUFFER_SIZE`
//!
//! Capacity of the frame marshalling buffers in bytes. Accepts decimal
//! (`65536`) or hexadecimal (`0x10000`). Default: `0x10000` (64 KB). Must
//! be large enough for one maximum-sized frame.
//!
//! ### `SSEGATE_POOL_SLOTS`
//!
//! Number of deferred-frame slots in the buffer pool, one of which a
//! stream pair may hold at a time. Default: `64`.

use std::env;
use std::fmt;

use crate::codec::EVENT_TYPE_MAX;

const DEFAULT_CHALLENGE_EVENT_TYPE: &str = "challenge";
const DEFAULT_FRAME_BUFFER_SIZE: usize = 0x10000;
const DEFAULT_POOL_SLOTS: usize = 64;

/// Configuration error
///
/// Returned by [`SseConfig::validate`] (and therefore factory
/// construction) when a setting violates the protocol budgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The challenge event type must be non-empty
    EmptyChallengeEventType,
    /// The challenge event type exceeds the reserved event-type budget
    ChallengeEventTypeTooLong {
        /// The offending value
        value: String,
    },
    /// The initial comment cannot fit the frame buffer
    InitialCommentTooLarge {
        /// Comment length in bytes
        len: usize,
        /// Configured frame buffer capacity
        capacity: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyChallengeEventType => {
                write!(f, "Configuration error: challenge event type must not be empty")
            }
            ConfigError::ChallengeEventTypeTooLong { value } => {
                write!(
                    f,
                    "Configuration error: challenge event type '{}' exceeds {} bytes",
                    value, EVENT_TYPE_MAX
                )
            }
            ConfigError::InitialCommentTooLarge { len, capacity } => {
                write!(
                    f,
                    "Configuration error: initial comment of {} bytes does not fit the \
                    {}-byte frame buffer",
                    len, capacity
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Gateway configuration consumed at factory construction.
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Comment bytes emitted as the first SSE frame after the first
    /// WINDOW, or `None` to skip the comment entirely.
    pub initial_comment: Option<Vec<u8>>,
    /// SSE `event:` type name for injected challenge events.
    pub challenge_event_type: String,
    /// Capacity of the frame marshalling buffers.
    pub frame_buffer_size: usize,
    /// Number of deferred-frame slots in the buffer pool.
    pub pool_slots: usize,
}

impl SseConfig {
    /// Load configuration from `SSEGATE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let initial_comment = env::var("SSEGATE_INITIAL_COMMENT")
            .ok()
            .map(String::into_bytes);

        let challenge_event_type = env::var("SSEGATE_CHALLENGE_EVENT_TYPE")
            .unwrap_or_else(|_| DEFAULT_CHALLENGE_EVENT_TYPE.to_string());

        let frame_buffer_size = env::var("SSEGATE_FRAME_BUFFER_SIZE")
            .ok()
            .and_then(|s| parse_size(&s))
            .unwrap_or(DEFAULT_FRAME_BUFFER_SIZE);

        let pool_slots = env::var("SSEGATE_POOL_SLOTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POOL_SLOTS);

        let config = Self {
            initial_comment,
            challenge_event_type,
            frame_buffer_size,
            pool_slots,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration against the protocol budgets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.challenge_event_type.is_empty() {
            return Err(ConfigError::EmptyChallengeEventType);
        }
        if self.challenge_event_type.len() > EVENT_TYPE_MAX {
            return Err(ConfigError::ChallengeEventTypeTooLong {
                value: self.challenge_event_type.clone(),
            });
        }
        if let Some(comment) = &self.initial_comment {
            // ':' prefix plus the two newlines closing a FIN comment frame.
            if comment.len() + 3 > self.frame_buffer_size {
                return Err(ConfigError::InitialCommentTooLarge {
                    len: comment.len(),
                    capacity: self.frame_buffer_size,
                });
            }
        }
        Ok(())
    }
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            initial_comment: None,
            challenge_event_type: DEFAULT_CHALLENGE_EVENT_TYPE.to_string(),
            frame_buffer_size: DEFAULT_FRAME_BUFFER_SIZE,
            pool_slots: DEFAULT_POOL_SLOTS,
        }
    }
}

fn parse_size(value: &str) -> Option<usize> {
    if let Some(hex) = value.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

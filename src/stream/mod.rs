//! # Stream Module
//!
//! The bidirectional stream-pair engine at the heart of the gateway.
//!
//! ## Overview
//!
//! A BEGIN arriving on an odd (initial) stream id is classified by the
//! [`SseStreamFactory`]: CORS preflights and non-GET requests are answered
//! immediately; SSE subscriptions are resolved to an application route and
//! instantiate a pair of half-stream handlers:
//!
//! - **Initial half** (network → application): forwards END/ABORT to the
//!   application and relays the application's WINDOW/RESET back to the
//!   HTTP peer, asserting the CHALLENGE capability.
//! - **Reply half** (application → network): converts application DATA
//!   into SSE event frames under a credit-based window, defers a trailing
//!   `id:` event into a pooled slot when short on credit, and injects
//!   challenge events into the outbound stream.
//!
//! ## Flow control
//!
//! Neither side may emit more bytes than the peer has granted via WINDOW.
//! Every emitted frame is charged `payload + padding` against the budget.
//! Credit granted toward the application is the network budget not yet
//! promised, with padding inflated by the worst-case per-event overhead,
//! and is withheld until the full initial network window has accumulated.

mod factory;
mod initial;
mod reply;

pub use factory::SseStreamFactory;

use crate::buffer_pool::BufferPool;
use crate::ids::TraceIdSupplier;

/// Shared emission resources owned by the factory and lent to the
/// half-stream handlers for the duration of one frame delivery.
pub(crate) struct StreamContext {
    /// Arena for marshalling outbound SSE event payloads.
    pub(crate) write_buf: Vec<u8>,
    /// Arena reserved for challenge JSON serialisation.
    pub(crate) challenge_buf: Vec<u8>,
    pub(crate) pool: BufferPool,
    pub(crate) trace_ids: TraceIdSupplier,
    pub(crate) initial_comment: Option<Vec<u8>>,
    pub(crate) challenge_event_type: String,
}

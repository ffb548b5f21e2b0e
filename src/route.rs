//! Route resolution for SSE subscriptions.
//!
//! The gateway resolves each accepted subscription to an application route
//! through the [`RouteManager`] seam. Embedders usually plug in their
//! control-plane-backed manager; [`StaticRouteTable`] is a fixed table
//! suitable for embedding and tests, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::frame::FrameSink;

/// A route binding between the network-facing route id and the
/// application-side route the subscription connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Route id subscriptions arrive on (the accept side).
    pub route_id: u64,
    /// Route id the application half of the pair is opened on.
    pub correlation_id: u64,
    /// Path prefix this route serves; `None` matches any path.
    #[serde(default)]
    pub path_info: Option<String>,
    /// Authorization required to use this route; zero admits any bearer.
    #[serde(default)]
    pub authorization: u64,
}

/// Resolution and receiver supply consumed by the stream factory.
pub trait RouteManager {
    /// Resolve the first route bound to `route_id` that admits
    /// `authorization` and satisfies `filter`.
    fn resolve(
        &mut self,
        route_id: u64,
        authorization: u64,
        filter: &dyn Fn(&Route) -> bool,
    ) -> Option<Route>;

    /// Frame sink for the given application stream id.
    fn receiver(&mut self, stream_id: u64) -> FrameSink;
}

/// Fixed route table with per-correlation receivers.
pub struct StaticRouteTable {
    routes: Vec<Route>,
    receivers: HashMap<u64, FrameSink>,
    default_receiver: FrameSink,
}

impl StaticRouteTable {
    #[must_use]
    pub fn new(routes: Vec<Route>, default_receiver: FrameSink) -> Self {
        Self {
            routes,
            receivers: HashMap::new(),
            default_receiver,
        }
    }

    /// Load the route list from its JSON representation.
    pub fn from_json(json: &str, default_receiver: FrameSink) -> anyhow::Result<Self> {
        let routes: Vec<Route> = serde_json::from_str(json)?;
        Ok(Self::new(routes, default_receiver))
    }

    /// Register a dedicated receiver for one application stream id.
    pub fn set_receiver(&mut self, stream_id: u64, receiver: FrameSink) {
        self.receivers.insert(stream_id, receiver);
    }
}

impl RouteManager for StaticRouteTable {
    fn resolve(
        &mut self,
        route_id: u64,
        authorization: u64,
        filter: &dyn Fn(&Route) -> bool,
    ) -> Option<Route> {
        let resolved = self
            .routes
            .iter()
            .find(|r| {
                r.route_id == route_id
                    && (r.authorization == 0 || r.authorization == authorization)
                    && filter(r)
            })
            .cloned();

        match &resolved {
            Some(route) => debug!(
                route_id = route_id,
                correlation_id = route.correlation_id,
                "Route resolved"
            ),
            None => warn!(route_id = route_id, "No route matched"),
        }

        resolved
    }

    fn receiver(&mut self, stream_id: u64) -> FrameSink {
        self.receivers
            .get(&stream_id)
            .unwrap_or(&self.default_receiver)
            .clone()
    }
}

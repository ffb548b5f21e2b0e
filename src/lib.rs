pub mod buffer_pool;
pub mod codec;
pub mod config;
pub mod frame;
pub mod ids;
pub mod request;
pub mod route;
pub mod stream;

pub use config::{ConfigError, SseConfig};
pub use frame::{Frame, FrameHeader, FrameSink};
pub use route::{Route, RouteManager, StaticRouteTable};
pub use stream::SseStreamFactory;

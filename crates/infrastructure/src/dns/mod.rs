pub mod backends;
pub mod chain;
pub mod codec;
pub mod handlers;
pub mod metrics;
pub mod proxy;
pub mod reply;
pub mod server;
pub mod singleflight;

pub use chain::{ChainHandler, RouterTable, ServeOutcome, ZoneChain, ZoneRouter};
pub use metrics::ServerMetrics;
pub use server::QueryService;
pub use singleflight::Group;

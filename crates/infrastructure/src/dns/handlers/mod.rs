mod backend;
mod cache;
mod forward;

pub use backend::BackendHandler;
pub use cache::{CacheHandler, CacheOptions};
pub use forward::ForwardHandler;

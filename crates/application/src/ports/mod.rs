mod backend;
mod kv_store;
mod upstream;

pub use backend::ServiceBackend;
pub use kv_store::{KvNode, KvStore};
pub use upstream::UpstreamLookup;

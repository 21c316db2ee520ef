mod resolve;

pub use resolve::{Resolution, ServiceResolver};

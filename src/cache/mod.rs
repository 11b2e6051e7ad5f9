//! In-memory expiring key/value cache.

mod store;
mod sweeper;

pub use store::{Cache, DEFAULT_SWEEP_INTERVAL};

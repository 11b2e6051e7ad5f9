//! HTTP integration: rate limit middleware, routes and server.

mod client_ip;
pub mod headers;
mod layer;
mod routes;
mod server;

pub use client_ip::{client_ip, UNKNOWN_CLIENT};
pub use layer::{too_many_requests, BlockedHandler, KeyFn, RateLimitLayer, RateLimitMiddleware};
pub use routes::{router, AppState};
pub use server::HttpServer;

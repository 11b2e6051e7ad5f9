//! Default rate limit key: the client IP address.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

/// Key used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the client IP for a request.
///
/// Proxy headers are checked first: `X-Real-Ip` (nginx), `CF-Connecting-IP`
/// (Cloudflare), then the left-most `X-Forwarded-For` entry. Without any of
/// them the peer address from `ConnectInfo` is used, which requires serving
/// the router with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn client_ip<B>(req: &Request<B>) -> String {
    let headers = req.headers();

    header_value(headers, "x-real-ip")
        .or_else(|| header_value(headers, "cf-connecting-ip"))
        .or_else(|| {
            header_value(headers, "x-forwarded-for")
                .and_then(|list| list.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .map(String::from)
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

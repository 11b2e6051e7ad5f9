//! Rate limit middleware layer.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::{self, BoxFuture};
use tower::{Layer, Service};
use tracing::debug;

use super::client_ip::client_ip;
use super::headers;
use crate::config::RateLimitConfig;
use crate::ratelimit::{Admission, RateLimitRejection, RateLimiter};

/// Derives the rate limit key from an inbound request.
pub type KeyFn = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// Builds the response for a blacklisted or over-limit request.
pub type BlockedHandler = Arc<dyn Fn(&Request, &RateLimitRejection) -> Response + Send + Sync>;

/// Default blocked handler: `429 Too Many Requests` with an empty body.
pub fn too_many_requests(_req: &Request, _rejection: &RateLimitRejection) -> Response {
    StatusCode::TOO_MANY_REQUESTS.into_response()
}

/// Rate limit layer.
///
/// Wraps a service so that each request is admitted or blocked by a shared
/// [`RateLimiter`] before the inner service sees it.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
    show_headers: bool,
    key_fn: KeyFn,
    blocked_handler: BlockedHandler,
}

impl RateLimitLayer {
    /// Create a layer with its own limiter, keyed by client IP.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config)),
            show_headers: config.show_headers,
            key_fn: Arc::new(client_ip::<Body>),
            blocked_handler: Arc::new(too_many_requests),
        }
    }

    /// Share an existing limiter instead of the one built from configuration.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(key_fn);
        self
    }

    pub fn with_blocked_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request, &RateLimitRejection) -> Response + Send + Sync + 'static,
    {
        self.blocked_handler = Arc::new(handler);
        self
    }

    pub fn with_show_headers(mut self, show_headers: bool) -> Self {
        self.show_headers = show_headers;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            limiter: self.limiter.clone(),
            show_headers: self.show_headers,
            key_fn: self.key_fn.clone(),
            blocked_handler: self.blocked_handler.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
    show_headers: bool,
    key_fn: KeyFn,
    blocked_handler: BlockedHandler,
}

impl<S> Service<Request> for RateLimitMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let key = (self.key_fn)(&req);

        let rejection = match self.limiter.check(&key) {
            Ok(Admission::Whitelisted) => return Box::pin(self.inner.call(req)),
            Ok(Admission::Counted(info)) => {
                // Take the service that was driven to readiness
                let clone = self.inner.clone();
                let mut inner = std::mem::replace(&mut self.inner, clone);
                let show_headers = self.show_headers;

                return Box::pin(async move {
                    let mut response = inner.call(req).await?;
                    if show_headers {
                        headers::insert_quota(response.headers_mut(), &info);
                    }
                    Ok(response)
                });
            }
            Err(rejection) => rejection,
        };

        let mut response = (self.blocked_handler)(&req, &rejection);
        if self.show_headers {
            match &rejection {
                RateLimitRejection::Blacklisted { .. } => {
                    headers::insert_blocked(response.headers_mut());
                }
                RateLimitRejection::LimitExceeded { info, .. } => {
                    headers::insert_quota(response.headers_mut(), info);
                }
            }
        }

        debug!(
            key = %rejection.key(),
            reason = %rejection,
            status = %response.status(),
            "Request blocked"
        );

        Box::pin(future::ready(Ok(response)))
    }
}

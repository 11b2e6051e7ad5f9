//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{Result, TollgateError};

/// HTTP server hosting the rate-limited router.
pub struct HttpServer {
    /// Bound listener
    listener: TcpListener,
    /// The application router
    router: Router,
}

impl HttpServer {
    /// Bind the server to `addr`. Port 0 picks a free port.
    pub async fn bind(addr: SocketAddr, router: Router) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, router })
    }

    /// The address the server is actually listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    /// Connection info is attached to every request so that the default
    /// rate limit key can fall back to the peer address.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %self.local_addr()?, "Starting HTTP server");

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            TollgateError::Io(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::http::{router, AppState, RateLimitLayer};
    use crate::cache::Cache;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn raw_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_server_limits_by_peer_address() {
        let names = Arc::new(Cache::new(Duration::from_secs(1)));
        let layer = RateLimitLayer::new(&RateLimitConfig::new(2, Duration::from_secs(60)));
        let app = router(AppState::new(names, Duration::from_secs(5)), layer);

        let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), app)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_shutdown(async {
            let _ = shutdown_rx.await;
        }));

        let first = raw_get(addr, "/hello").await;
        let second = raw_get(addr, "/hello").await;
        let third = raw_get(addr, "/hello").await;

        assert!(first.starts_with("HTTP/1.1 200"));
        assert!(first.to_ascii_lowercase().contains("x-ratelimit-remaining: 1"));
        assert!(second.starts_with("HTTP/1.1 200"));
        assert!(third.starts_with("HTTP/1.1 429"));
        assert!(third.to_ascii_lowercase().contains("x-ratelimit-remaining: 0"));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}

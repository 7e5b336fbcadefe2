//! Request executors.
//!
//! A [`RequestExecutor`] takes a fully buffered request and returns a fully
//! buffered response. Two implementations are chosen at construction time:
//!
//! - [`InProcessExecutor`] calls the router directly. No socket is opened and
//!   whatever the router produces (including error and panic responses) comes
//!   back as the response.
//! - [`SocketExecutor`] sends the request over a real TCP connection using a
//!   one-shot HTTP/1.1 client connection.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::header::{HOST, InvalidHeaderValue};
use axum::http::{HeaderValue, Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower::ServiceExt;

/// Executes one request and buffers the whole response.
pub trait RequestExecutor: Send + Sync {
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, TransportError>> + Send;
}

/// Serves requests by invoking the router in memory.
#[derive(Clone)]
pub struct InProcessExecutor {
    router: Router,
}

impl InProcessExecutor {
    #[must_use]
    pub const fn new(router: Router) -> Self {
        Self { router }
    }
}

impl RequestExecutor for InProcessExecutor {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let response = self
            .router
            .clone()
            .oneshot(request.map(Body::from))
            .await
            .unwrap_or_else(|never| match never {});

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(TransportError::Body)?;
        Ok(Response::from_parts(parts, body))
    }
}

/// Sends requests to a listening server, one connection per request.
#[derive(Debug, Clone, Copy)]
pub struct SocketExecutor {
    addr: SocketAddr,
}

impl SocketExecutor {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl RequestExecutor for SocketExecutor {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(TransportError::Connect)?;
        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(TransportError::Http)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!("client connection closed with error: {e}");
            }
        });

        let (mut parts, body) = request.into_parts();
        if !parts.headers.contains_key(HOST) {
            let host = HeaderValue::try_from(self.addr.to_string())
                .map_err(TransportError::InvalidHeader)?;
            parts.headers.insert(HOST, host);
        }

        let response = sender
            .send_request(Request::from_parts(parts, Full::new(body)))
            .await
            .map_err(TransportError::Http)?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await.map_err(TransportError::Http)?.to_bytes();
        Ok(Response::from_parts(parts, body))
    }
}

/// Errors from moving a request and its response, never from the handler.
#[derive(Debug)]
pub enum TransportError {
    Connect(io::Error),
    Http(hyper::Error),
    Body(axum::Error),
    InvalidHeader(InvalidHeaderValue),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "failed to connect: {e}"),
            Self::Http(e) => write!(f, "http error: {e}"),
            Self::Body(e) => write!(f, "failed reading response body: {e}"),
            Self::InvalidHeader(e) => write!(f, "invalid header value: {e}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) => Some(e),
            Self::Http(e) => Some(e),
            Self::Body(e) => Some(e),
            Self::InvalidHeader(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode, header::CONTENT_TYPE};
    use axum::routing::get;

    use super::*;
    use crate::testing::TestServer;

    fn ok_router() -> Router {
        Router::new().route(
            "/ok",
            get(|| async { ([(CONTENT_TYPE, "application/json")], r#"{"ok":true}"#) }),
        )
    }

    fn get_request(path: &str) -> Request<Bytes> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Bytes::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_in_process_matches_socket() {
        let server = TestServer::start(ok_router()).await.unwrap();

        let in_process = InProcessExecutor::new(ok_router())
            .execute(get_request("/ok"))
            .await
            .unwrap();
        let over_socket = SocketExecutor::new(server.addr())
            .execute(get_request("/ok"))
            .await
            .unwrap();

        assert_eq!(in_process.status(), StatusCode::OK);
        assert_eq!(in_process.status(), over_socket.status());
        assert_eq!(in_process.body(), over_socket.body());
        assert_eq!(in_process.body().as_ref(), br#"{"ok":true}"#);
        assert_eq!(
            in_process.headers().get(CONTENT_TYPE),
            over_socket.headers().get(CONTENT_TYPE)
        );
    }

    #[tokio::test]
    async fn test_unrouted_path_is_a_response_not_an_error() {
        let response = InProcessExecutor::new(ok_router())
            .execute(get_request("/missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_socket_connect_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = SocketExecutor::new(addr)
            .execute(get_request("/ok"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}

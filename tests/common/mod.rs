//! Shared utilities for integration tests.
//!
//! Every backend binds `127.0.0.1:0` and counts the requests it receives.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, Response as HttpResponse, StatusCode};
use axum::response::Response;
use axum::Router;
use galf::auth::source::OAuthSettings;
use galf::OAuthTokenSource;
use url::Url;

/// Headers the echo backend does not reflect.
const HOP_HEADERS: [&str; 5] = ["host", "content-length", "transfer-encoding", "connection", "content-type"];

/// A running mock backend.
pub struct TestServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn text_response(status: u16, body: String) -> Response {
    HttpResponse::builder()
        .status(StatusCode::from_u16(status).unwrap())
        .body(Body::from(body))
        .unwrap()
}

/// Backend whose answer to the n-th request (0-based) is `f(n)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> TestServer
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);
    let counter = Arc::clone(&hits);
    let router = Router::new().fallback(move || {
        let f = Arc::clone(&f);
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            let (status, body) = f(n).await;
            text_response(status, body)
        }
    });

    TestServer {
        addr: serve(router).await,
        hits,
    }
}

/// Backend answering every request with `status`.
pub async fn start_status_backend(status: u16) -> TestServer {
    start_programmable_backend(move |_| async move { (status, String::new()) }).await
}

/// Backend that sleeps `delay` before answering 200.
pub async fn start_slow_backend(delay: Duration) -> TestServer {
    start_programmable_backend(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, "slow".to_string())
    })
    .await
}

/// Backend that answers `{"method": "<METHOD>"}`, 201 for POST and 200
/// otherwise.
///
/// Request headers are reflected as response headers, the content type
/// with `; charset=utf-8` appended, and the body size in `x-body-length`.
pub async fn start_echo_backend() -> TestServer {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().fallback(move |method: Method, headers: HeaderMap, body: Bytes| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            let status = if method == Method::POST {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();

            let mut builder = HttpResponse::builder()
                .status(status)
                .header(CONTENT_TYPE, format!("{content_type}; charset=utf-8"))
                .header("x-body-length", body.len().to_string());
            for (name, value) in &headers {
                if !HOP_HEADERS.contains(&name.as_str()) {
                    builder = builder.header(name, value);
                }
            }
            builder
                .body(Body::from(
                    serde_json::json!({ "method": method.as_str() }).to_string(),
                ))
                .unwrap()
        }
    });

    TestServer {
        addr: serve(router).await,
        hits,
    }
}

/// Client-credentials token endpoint at `/token` issuing `token-1`,
/// `token-2`, ... after `delay`.
///
/// Requests without basic auth or without the client-credentials grant are
/// answered 400. Answers 500 when `fail` is set.
pub async fn start_token_server(delay: Duration, fail: bool) -> TestServer {
    issue_tokens(delay, fail, 3600).await
}

/// Token endpoint like [`start_token_server`] whose tokens carry
/// `expires_in` seconds.
pub async fn start_token_server_with_lifetime(expires_in: u64) -> TestServer {
    issue_tokens(Duration::ZERO, false, expires_in).await
}

async fn issue_tokens(delay: Duration, fail: bool, expires_in: u64) -> TestServer {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().route(
        "/token",
        axum::routing::post(move |headers: HeaderMap, body: String| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                tokio::time::sleep(delay).await;
                let basic = headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.starts_with("Basic "));
                if !basic || !body.contains("grant_type=client_credentials") {
                    return text_response(400, "invalid_request".to_string());
                }
                if fail {
                    return text_response(500, "token service down".to_string());
                }
                text_response(
                    200,
                    serde_json::json!({
                        "access_token": format!("token-{n}"),
                        "token_type": "bearer",
                        "expires_in": expires_in,
                    })
                    .to_string(),
                )
            }
        }),
    );

    TestServer {
        addr: serve(router).await,
        hits,
    }
}

/// Backend answering 200 with the received `Authorization` header as body
/// when `accept` approves it, 401 otherwise.
pub async fn start_protected_backend<F>(accept: F) -> TestServer
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let accept = Arc::new(accept);
    let router = Router::new().fallback(move |headers: HeaderMap| {
        counter.fetch_add(1, Ordering::SeqCst);
        let accept = Arc::clone(&accept);
        async move {
            let authorization = headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if accept(&authorization) {
                text_response(200, authorization)
            } else {
                text_response(401, "unauthorized".to_string())
            }
        }
    });

    TestServer {
        addr: serve(router).await,
        hits,
    }
}

/// Token source pointed at `server`'s `/token`.
pub fn oauth_source(server: &TestServer) -> Arc<OAuthTokenSource> {
    let settings = OAuthSettings {
        token_url: Url::parse(&server.url("/token")).unwrap(),
        client_id: "svc".to_string(),
        client_secret: "s3cret".to_string(),
        scope: Some("orders:read".to_string()),
        timeout: Duration::from_secs(2),
        refresh_margin: Duration::from_secs(30),
    };
    Arc::new(OAuthTokenSource::new(settings).unwrap())
}

/// Address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

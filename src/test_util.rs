//! Minimal HTTP server for tests, standing in for the search endpoint, OAuth
//! token endpoints and the metadata server.

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::{
    HeaderMap, Method, Request, Response, StatusCode, Uri,
    body::Incoming,
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, task::JoinHandle};


/// A request as seen by the stub server.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn form_params(&self) -> Vec<(String, String)> {
        form_urlencoded::parse(&self.body).into_owned().collect()
    }
}

/// Replies to every request with the same status and body and records all
/// requests. Stops when dropped.
pub(crate) struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub(crate) async fn start(status: StatusCode, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await
            .expect("failed to bind stub server");
        let addr = listener.local_addr().expect("no local address");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { continue };
                let recorded = Arc::clone(&recorded);
                let service = service_fn(move |req| {
                    let recorded = Arc::clone(&recorded);
                    async move { handle(req, &recorded, status, body).await }
                });
                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, requests, task }
    }

    /// Full URL of `path` on this server.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Only scheme and authority, e.g. for `HttpHost` configs.
    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("poisoned lock").clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(
    req: Request<Incoming>,
    recorded: &Mutex<Vec<RecordedRequest>>,
    status: StatusCode,
    body: &'static str,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, req_body) = req.into_parts();
    let req_body = req_body.collect().await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    recorded.lock().expect("poisoned lock").push(RecordedRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body: req_body,
    });

    let response = Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .expect("failed to build stub response");
    Ok(response)
}

/// Returns an URL on the loopback interface where (most likely) nothing
/// listens, for simulating connection failures.
pub(crate) async fn unreachable_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local address");
    drop(listener);
    format!("http://{addr}{path}")
}

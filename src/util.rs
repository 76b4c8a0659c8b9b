use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client as HyperClient, connect::HttpConnector};

use crate::prelude::*;


/// Request body used for everything we send: the query, token requests and
/// bodyless metadata requests (`Full::default()`).
pub type HttpBody = Full<Bytes>;

/// HTTP client shared by the probe and the credential providers.
pub type HttpClient = HyperClient<HttpsConnector<HttpConnector>, HttpBody>;

pub fn http_client() -> Result<HttpClient> {
    let builder = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            warn!("failed to load native certificate roots ({e}), using bundled webpki roots");
            HttpsConnectorBuilder::new().with_webpki_roots()
        }
    };
    let https = builder
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();
    let out = HyperClient::builder(hyper_util::rt::TokioExecutor::new()).build(https);
    Ok(out)
}

/// Reads the whole body of a response into memory.
pub async fn collect_body(response: hyper::Response<hyper::body::Incoming>) -> Result<Bytes, hyper::Error> {
    Ok(response.into_body().collect().await?.to_bytes())
}

/// Formats an error with all its causes, e.g. "client error (Connect), caused
/// by tcp connect error, caused by Connection refused".
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    anyhow::Chain::new(err)
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", caused by ")
}

/// Lossy, length-limited excerpt of a response body for error messages.
pub fn body_excerpt(body: &[u8]) -> String {
    const MAX_CHARS: usize = 200;

    let s = String::from_utf8_lossy(body);
    let s = s.trim();
    if s.chars().count() <= MAX_CHARS {
        s.to_owned()
    } else {
        let mut out = s.chars().take(MAX_CHARS).collect::<String>();
        out.push('…');
        out
    }
}

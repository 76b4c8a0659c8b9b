//! Talking to OAuth2 token endpoints (RFC 6749, section 5).

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Uri, header};
use serde::Deserialize;

use super::{AccessToken, AuthError};
use crate::{prelude::*, util::{self, HttpBody, HttpClient}};


/// Successful token response. Other fields (`scope`, `id_token`, ...) are
/// ignored.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

/// Sends a form-encoded token request, e.g. a refresh token or JWT bearer
/// grant, and returns the access token from the response.
pub(super) async fn request_token(
    client: &HttpClient,
    token_uri: &Uri,
    params: &[(&str, &str)],
) -> Result<AccessToken, AuthError> {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();

    let req = Request::post(token_uri.clone())
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::ACCEPT, "application/json")
        .body(Full::new(Bytes::from(body)))
        // Method, valid URI and static headers: building cannot fail.
        .expect("failed to build token request");

    trace!(uri = %token_uri, "requesting access token");
    fetch(client, req).await
}

/// Sends `req` and interprets the response as token response.
pub(super) async fn fetch(
    client: &HttpClient,
    req: Request<HttpBody>,
) -> Result<AccessToken, AuthError> {
    let response = client.request(req).await
        .map_err(|e| AuthError::Transport(util::error_chain(&e)))?;

    let status = response.status();
    let body = util::collect_body(response).await
        .map_err(|e| AuthError::Transport(util::error_chain(&e)))?;

    if !status.is_success() {
        debug!(%status, "token endpoint rejected request");
        return Err(AuthError::TokenEndpoint {
            status,
            body: util::body_excerpt(&body),
        });
    }

    parse_response(&body)
}

fn parse_response(body: &[u8]) -> Result<AccessToken, AuthError> {
    let response: TokenResponse = serde_json::from_slice(body)
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

    if let Some(token_type) = &response.token_type {
        if !token_type.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::InvalidResponse(
                format!("unsupported token type '{token_type}'"),
            ));
        }
    }

    trace!(expires_in = response.expires_in, "received access token");
    AccessToken::new(&response.access_token)
        .ok_or_else(|| AuthError::InvalidResponse("empty or malformed access token".into()))
}

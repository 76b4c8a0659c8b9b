use std::time::Duration;

use http::uri::PathAndQuery;
use hyper::{Request, header};

use super::{AccessToken, AuthError, token_endpoint};
use crate::{config::HttpHost, prelude::*, util::{HttpBody, HttpClient}};


const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Outside of a cloud environment, the metadata host usually does not resolve
/// or connect at all. But some networks swallow packets, so we give up after
/// this time.
const TIMEOUT: Duration = Duration::from_secs(3);


/// Asks the metadata server for an access token of the instance's default
/// service account.
pub(super) async fn access_token(
    client: &HttpClient,
    host: &HttpHost,
    scopes: &[String],
) -> Result<AccessToken, AuthError> {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("scopes", &scopes.join(","))
        .finish();
    let pq = PathAndQuery::try_from(format!("{TOKEN_PATH}?{query}"))
        // The path is static and the query is percent-encoded.
        .expect("invalid metadata path");
    let uri = host.with_path_and_query(pq);

    let req = Request::get(uri)
        .header("Metadata-Flavor", "Google")
        .header(header::ACCEPT, "application/json")
        .body(HttpBody::default())
        .expect("failed to build metadata request");

    trace!(uri = %req.uri(), "asking metadata server for access token");
    tokio::select! {
        res = token_endpoint::fetch(client, req) => res,
        _ = tokio::time::sleep(TIMEOUT) => {
            debug!("timeout waiting for metadata server");
            Err(AuthError::Transport("timeout waiting for metadata server".into()))
        }
    }
}

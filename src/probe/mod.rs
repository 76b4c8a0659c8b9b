use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, StatusCode, header};
use tokio::sync::OnceCell;

use crate::{
    auth::{self, AccessToken, AuthError, CredentialProvider},
    config::{Config, HttpUrl},
    prelude::*,
    util::{self, HttpClient},
};

mod config;
mod query;

pub use self::{config::ProbeConfig, query::QueryRequest};


/// The only status code the probe accepts.
pub const EXPECTED_STATUS: StatusCode = StatusCode::OK;


/// Ways a probe run can fail. Each one fails the run as a whole; nothing is
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// No access token, so no query was sent.
    #[error("failed to obtain access token")]
    Auth(#[from] AuthError),

    /// The query could not be sent or no response arrived.
    #[error("failed to send query: {0}")]
    Network(String),

    /// The search service replied, but not with `EXPECTED_STATUS`.
    #[error("query endpoint replied with {status}, expected {}", EXPECTED_STATUS)]
    UnexpectedStatus {
        status: StatusCode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// No token requested yet.
    Uninitialized,
    /// Token obtained, queries can be sent.
    Ready,
    /// Obtaining the token failed. Terminal: the provider is not asked again.
    Failed,
}

/// Sends the fixed query to one endpoint. Owns the access token: it is
/// requested on first use and then kept for the lifetime of this value.
pub struct Probe {
    endpoint: HttpUrl,
    credentials: Box<dyn CredentialProvider>,
    client: HttpClient,
    token: OnceCell<Result<AccessToken, AuthError>>,
}

impl Probe {
    pub fn new(
        endpoint: HttpUrl,
        credentials: Box<dyn CredentialProvider>,
        client: HttpClient,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            client,
            token: OnceCell::new(),
        }
    }

    /// Creates the probe with the credential provider selected by the config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = util::http_client()?;
        let credentials = auth::provider(&config.auth, client.clone());
        Ok(Self::new(config.probe.endpoint.clone(), credentials, client))
    }

    pub fn endpoint(&self) -> &HttpUrl {
        &self.endpoint
    }

    pub fn state(&self) -> ProbeState {
        match self.token.get() {
            None => ProbeState::Uninitialized,
            Some(Ok(_)) => ProbeState::Ready,
            Some(Err(_)) => ProbeState::Failed,
        }
    }

    /// Obtains the access token from the credential provider. Only the first
    /// call (or the first of concurrent calls) asks the provider; all others
    /// get the same outcome, be it the token or the error.
    pub async fn initialize(&self) -> Result<&AccessToken, AuthError> {
        let outcome = self.token.get_or_init(|| async {
            debug!("requesting access token");
            let outcome = self.credentials.access_token().await;
            match &outcome {
                Ok(_) => info!("obtained access token"),
                Err(e) => warn!("failed to obtain access token: {e}"),
            }
            outcome
        }).await;

        outcome.as_ref().map_err(Clone::clone)
    }

    /// Sends the query (obtaining the token first if necessary) and returns
    /// the response status, which is always `EXPECTED_STATUS` on success.
    pub async fn run(&self) -> Result<StatusCode, ProbeError> {
        let token = self.initialize().await?;

        let req = Request::post(self.endpoint.uri().clone())
            .header(header::AUTHORIZATION, token.authorization_header())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(Full::new(Bytes::from(QueryRequest::PROBE.to_json())))
            // The URI is validated and all headers are valid values.
            .expect("failed to build query request");

        trace!(endpoint = %self.endpoint, "sending query");
        let response = self.client.request(req).await.map_err(|e| {
            debug!("error sending query: {e:?}");
            ProbeError::Network(util::error_chain(&e))
        })?;

        let status = response.status();
        trace!(%status, "query endpoint replied");

        // The body is irrelevant, we only read it to let the connection finish
        // cleanly.
        if let Err(e) = util::collect_body(response).await {
            debug!("failed to read query response body: {e}");
        }

        if status != EXPECTED_STATUS {
            return Err(ProbeError::UnexpectedStatus { status });
        }

        Ok(status)
    }
}

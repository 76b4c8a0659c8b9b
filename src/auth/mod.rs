//! Obtaining the OAuth2 access token sent as bearer token with the query.

use std::{fmt, path::PathBuf};

use async_trait::async_trait;
use hyper::{StatusCode, header::HeaderValue};

use crate::{prelude::*, util::HttpClient};

mod application_default;
mod config;
mod key_file;
mod metadata;
mod token_endpoint;

pub use self::config::{AuthConfig, CredentialSource};
use self::{application_default::ApplicationDefault, key_file::KeyFileCredentials};


/// An OAuth2 access token, stored as ready-to-send `Authorization` header
/// value. Never empty. `Debug` does not print the token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    header: HeaderValue,
}

impl AccessToken {
    const PREFIX: &'static str = "Bearer ";

    /// Returns `None` if `token` is empty or contains anything but visible
    /// ASCII characters. Surrounding whitespace is ignored.
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_graphic()) {
            return None;
        }

        let mut header = HeaderValue::try_from(format!("{}{token}", Self::PREFIX)).ok()?;
        header.set_sensitive(true);
        Some(Self { header })
    }

    /// Value for the `Authorization` header, i.e. `Bearer <token>`.
    pub fn authorization_header(&self) -> HeaderValue {
        self.header.clone()
    }

    pub fn secret(&self) -> &str {
        // The header only contains visible ASCII (checked in `new`), so this
        // cannot fail.
        self.header.to_str()
            .ok()
            .and_then(|s| s.strip_prefix(Self::PREFIX))
            .unwrap_or_default()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} chars redacted>)", self.secret().len())
    }
}

/// Reasons why no access token could be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No credentials found at all.
    #[error("no credentials available: {0}")]
    Unavailable(String),

    /// A credentials file exists but cannot be read or understood.
    #[error("invalid credentials file '{}': {reason}", .path.display())]
    CredentialsFile {
        path: PathBuf,
        reason: String,
    },

    /// Could not talk to the token endpoint at all.
    #[error("failed to reach token endpoint: {0}")]
    Transport(String),

    /// The token endpoint replied with a non-2xx status.
    #[error("token endpoint replied with {status}: {body}")]
    TokenEndpoint {
        status: StatusCode,
        body: String,
    },

    /// The token endpoint replied 2xx, but not with a usable token.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    /// The JWT assertion of a service account could not be signed.
    #[error("failed to sign service account assertion: {0}")]
    Signing(String),
}

/// Something that can hand out access tokens. The probe asks only once per
/// lifetime, so implementations do not need to cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, AuthError>;
}

/// Creates the provider configured by `config.credentials`.
pub fn provider(config: &AuthConfig, client: HttpClient) -> Box<dyn CredentialProvider> {
    match &config.credentials {
        CredentialSource::ApplicationDefault => {
            Box::new(ApplicationDefault::from_env(config, client))
        }
        CredentialSource::Env { name } => Box::new(EnvToken { name: name.clone() }),
        CredentialSource::KeyFile { path } => Box::new(KeyFileCredentials {
            path: path.clone(),
            scopes: config.scopes.clone(),
            client,
        }),
    }
}


/// Pre-issued token from an env variable.
pub struct EnvToken {
    pub name: String,
}

#[async_trait]
impl CredentialProvider for EnvToken {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        let value = std::env::var(&self.name).map_err(|e| {
            AuthError::Unavailable(format!("env variable `{}`: {e}", self.name))
        })?;

        trace!(name = %self.name, "read access token from env");
        AccessToken::new(&value).ok_or_else(|| AuthError::Unavailable(
            format!("env variable `{}` is empty or not a valid token", self.name),
        ))
    }
}

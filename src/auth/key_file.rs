//! Credentials files as written by `gcloud auth application-default login`
//! (`authorized_user`) or downloaded for service accounts (`service_account`).

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use aws_lc_rs::{rand::SystemRandom, signature::{RSA_PKCS1_SHA256, RsaKeyPair}};
use base64::Engine as _;
use hyper::Uri;
use serde::Deserialize;

use super::{AccessToken, AuthError, CredentialProvider, token_endpoint};
use crate::{prelude::*, util::HttpClient};


const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for service account tokens. This is the maximum Google
/// allows.
const ASSERTION_LIFETIME: Duration = Duration::from_secs(60 * 60);

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";


#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum KeyFile {
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default = "default_token_uri")]
        token_uri: TokenUri,
    },
    ServiceAccount {
        client_email: String,
        private_key: String,
        private_key_id: Option<String>,
        #[serde(default = "default_token_uri")]
        token_uri: TokenUri,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub(super) struct TokenUri(Uri);

impl TryFrom<String> for TokenUri {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let uri: Uri = s.parse().map_err(|e| format!("invalid `token_uri`: {e}"))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err("`token_uri` must be an absolute URI".into());
        }
        Ok(Self(uri))
    }
}

fn default_token_uri() -> TokenUri {
    TokenUri(Uri::from_static(DEFAULT_TOKEN_URI))
}

impl KeyFile {
    pub(super) async fn load(path: &Path) -> Result<Self, AuthError> {
        let invalid = |reason: String| AuthError::CredentialsFile {
            path: path.to_owned(),
            reason,
        };

        let raw = tokio::fs::read(path).await.map_err(|e| invalid(e.to_string()))?;
        let out: Self = serde_json::from_slice(&raw).map_err(|e| invalid(e.to_string()))?;
        debug!(path = %path.display(), kind = out.kind(), "loaded credentials file");
        Ok(out)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::AuthorizedUser { .. } => "authorized_user",
            Self::ServiceAccount { .. } => "service_account",
        }
    }

    /// Exchanges these credentials for an access token at their token URI.
    pub(super) async fn exchange(
        &self,
        client: &HttpClient,
        scopes: &[String],
    ) -> Result<AccessToken, AuthError> {
        match self {
            Self::AuthorizedUser { client_id, client_secret, refresh_token, token_uri } => {
                token_endpoint::request_token(client, &token_uri.0, &[
                    ("grant_type", "refresh_token"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("refresh_token", refresh_token.as_str()),
                ]).await
            }
            Self::ServiceAccount { client_email, private_key, private_key_id, token_uri } => {
                let audience = token_uri.0.to_string();
                let claims = AssertionClaims {
                    issuer: client_email,
                    key_id: private_key_id.as_deref(),
                    audience: &audience,
                    scopes,
                    issued_at: SystemTime::now(),
                };
                let assertion = claims.sign(private_key)?;
                token_endpoint::request_token(client, &token_uri.0, &[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ]).await
            }
        }
    }
}


/// Claims of the self-signed JWT a service account trades for an access token.
struct AssertionClaims<'a> {
    issuer: &'a str,
    key_id: Option<&'a str>,
    audience: &'a str,
    scopes: &'a [String],
    issued_at: SystemTime,
}

impl AssertionClaims<'_> {
    /// The signed part of the JWT: base64 header and payload joined by `.`.
    fn message(&self) -> String {
        let iat = self.issued_at
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut header = serde_json::json!({ "alg": "RS256", "typ": "JWT" });
        if let Some(kid) = self.key_id {
            header["kid"] = kid.into();
        }
        let payload = serde_json::json!({
            "iss": self.issuer,
            "scope": self.scopes.join(" "),
            "aud": self.audience,
            "iat": iat,
            "exp": iat + ASSERTION_LIFETIME.as_secs(),
        });

        let b64 = |v: serde_json::Value| {
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(v.to_string())
        };
        format!("{}.{}", b64(header), b64(payload))
    }

    fn sign(&self, private_key_pem: &str) -> Result<String, AuthError> {
        let message = self.message();
        let signature = sign_rs256(private_key_pem, message.as_bytes())?;
        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signature);
        Ok(format!("{message}.{signature}"))
    }
}

fn sign_rs256(private_key_pem: &str, message: &[u8]) -> Result<Vec<u8>, AuthError> {
    let (label, der) = pem_rfc7468::decode_vec(private_key_pem.trim().as_bytes())
        .map_err(|e| AuthError::Signing(format!("invalid PEM: {e}")))?;
    if label != "PRIVATE KEY" {
        return Err(AuthError::Signing(format!("expected PKCS#8 'PRIVATE KEY', got '{label}'")));
    }

    let key = RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| AuthError::Signing(format!("invalid RSA key: {e}")))?;
    let mut signature = vec![0; key.public_modulus_len()];
    key.sign(&RSA_PKCS1_SHA256, &SystemRandom::new(), message, &mut signature)
        .map_err(|_| AuthError::Signing("RSA signing failed".into()))?;
    Ok(signature)
}


/// Provider for an explicitly configured credentials file.
pub(super) struct KeyFileCredentials {
    pub(super) path: PathBuf,
    pub(super) scopes: Vec<String>,
    pub(super) client: HttpClient,
}

#[async_trait]
impl CredentialProvider for KeyFileCredentials {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        KeyFile::load(&self.path).await?
            .exchange(&self.client, &self.scopes)
            .await
    }
}

//! Application default credentials: discovering credentials from the
//! environment the probe runs in.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{AccessToken, AuthConfig, AuthError, CredentialProvider, key_file::KeyFile, metadata};
use crate::{config::HttpHost, prelude::*, util::HttpClient};


const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const WELL_KNOWN_FILE: &str = "application_default_credentials.json";


/// Tries, in that order: the file named by `GOOGLE_APPLICATION_CREDENTIALS`,
/// gcloud's well-known credentials file, the metadata server.
pub(super) struct ApplicationDefault {
    /// From `GOOGLE_APPLICATION_CREDENTIALS`. If set, it must work: we do not
    /// fall back to other sources.
    pub(super) explicit_file: Option<PathBuf>,

    /// Only used if it exists.
    pub(super) well_known_file: Option<PathBuf>,

    pub(super) metadata_server: HttpHost,
    pub(super) scopes: Vec<String>,
    pub(super) client: HttpClient,
}

impl ApplicationDefault {
    pub(super) fn from_env(config: &AuthConfig, client: HttpClient) -> Self {
        let explicit_file = std::env::var_os(CREDENTIALS_ENV)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        // Same lookup as gcloud: `$CLOUDSDK_CONFIG` or `~/.config/gcloud`.
        let gcloud_dir = std::env::var_os("CLOUDSDK_CONFIG")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/gcloud"))
            });

        Self {
            explicit_file,
            well_known_file: gcloud_dir.map(|dir| dir.join(WELL_KNOWN_FILE)),
            metadata_server: config.metadata_server.clone(),
            scopes: config.scopes.clone(),
            client,
        }
    }
}

#[async_trait]
impl CredentialProvider for ApplicationDefault {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        if let Some(path) = &self.explicit_file {
            debug!(path = %path.display(), "using credentials file from `{CREDENTIALS_ENV}`");
            return KeyFile::load(path).await?.exchange(&self.client, &self.scopes).await;
        }

        if let Some(path) = self.well_known_file.as_ref().filter(|p| p.is_file()) {
            debug!(path = %path.display(), "using gcloud's well-known credentials file");
            return KeyFile::load(path).await?.exchange(&self.client, &self.scopes).await;
        }

        debug!("no credentials file found -> asking metadata server");
        metadata::access_token(&self.client, &self.metadata_server, &self.scopes)
            .await
            .map_err(|e| match e {
                AuthError::Transport(msg) => AuthError::Unavailable(format!(
                    "`{CREDENTIALS_ENV}` not set, no gcloud credentials file found and \
                        metadata server not reachable ({msg})",
                )),
                other => other,
            })
    }
}

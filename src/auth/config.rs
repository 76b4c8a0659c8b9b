use std::path::PathBuf;

use serde::Deserialize;

use crate::config::HttpHost;


#[derive(Debug, Clone, confique::Config)]
#[config(validate = Self::validate)]
pub struct AuthConfig {
    /// Where to get the OAuth2 access token sent as bearer token with the
    /// query. Possible sources:
    ///
    /// - `{ source = "application-default" }`: application default
    ///   credentials. Checks, in order: the credentials file named by env
    ///   `GOOGLE_APPLICATION_CREDENTIALS`, gcloud's well-known
    ///   `application_default_credentials.json`, and finally the metadata
    ///   server (see `metadata_server`).
    /// - `{ source = "env", name = "QUERY_PROBE_ACCESS_TOKEN" }`: a
    ///   pre-issued access token read from the given env variable.
    /// - `{ source = "key-file", path = "/etc/query-probe/key.json" }`: an
    ///   `authorized_user` or `service_account` credentials file.
    #[config(default = { "source": "application-default" })]
    pub credentials: CredentialSource,

    /// OAuth2 scopes requested for service accounts and from the metadata
    /// server.
    #[config(
        default = [
            "https://www.googleapis.com/auth/userinfo.email",
            "https://www.googleapis.com/auth/userinfo.profile",
        ],
        validate = validate_scopes,
    )]
    pub scopes: Vec<String>,

    /// Metadata server asked for a token when no credentials file is found.
    /// Only reachable from inside a cloud VM/container.
    #[config(default = "http://metadata.google.internal")]
    pub metadata_server: HttpHost,
}

impl AuthConfig {
    fn validate(&self) -> Result<(), String> {
        if let CredentialSource::Env { name } = &self.credentials {
            if name.is_empty() || name.contains('=') || name.contains('\0') {
                return Err(format!("invalid env variable name '{name}' in `credentials`"));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum CredentialSource {
    ApplicationDefault,
    Env {
        name: String,
    },
    KeyFile {
        path: PathBuf,
    },
}

fn validate_scopes(scopes: &Vec<String>) -> Result<(), &'static str> {
    crate::config::validate_not_empty(scopes)?;
    crate::config::validate_unique(scopes)?;
    if scopes.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
        return Err("scopes must not be empty or contain whitespace");
    }
    Ok(())
}

use std::{
    fmt,
    net::IpAddr,
    path::{Path, PathBuf},
};

use confique::Config as _;
use http::{Uri, uri::{Authority, PathAndQuery, Scheme}};

use crate::{auth::AuthConfig, log::LogConfig, prelude::*, probe::ProbeConfig};


/// Env variable that can hold the config path if `--config` is not given.
const PATH_ENV: &str = "QUERY_PROBE_CONFIG_PATH";

/// Locations checked (in order) if neither `--config` nor the env variable
/// specify a path.
const DEFAULT_PATHS: [&str; 2] = ["query-probe.toml", "/etc/query-probe/config.toml"];


/// Loads the config from env variables and, if one is found, a config file.
/// A path given via `--config` or `QUERY_PROBE_CONFIG_PATH` must exist. If
/// neither is given and no file exists at the default locations, all values
/// come from env variables and defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => Some(path.to_owned()),
        None => find_config_path(),
    };

    load_from(Config::builder().env(), path.as_deref())
}

fn load_from(builder: confique::Builder<Config>, path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        debug!("no config file found (looked at {DEFAULT_PATHS:?}), using env and defaults");
        return builder.load().context(
            "failed to load config from environment (no config file found, \
                specify one via `--config` or `QUERY_PROBE_CONFIG_PATH`)",
        );
    };

    if !path.exists() {
        bail!("config file '{}' does not exist", path.display());
    }

    builder.file(path)
        .load()
        .with_context(|| format!("failed to load config file '{}'", path.display()))
}

fn find_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(PATH_ENV) {
        return Some(path.into());
    }

    DEFAULT_PATHS.iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

pub fn template() -> String {
    let mut options = confique::toml::FormatOptions::default();
    options.general.nested_field_gap = 2;
    confique::toml::template::<Config>(options)
}

#[derive(Debug, confique::Config)]
pub struct Config {
    #[config(nested)]
    pub probe: ProbeConfig,

    #[config(nested)]
    pub auth: AuthConfig,

    #[config(nested)]
    pub log: LogConfig,
}


pub fn validate_unique<T: std::hash::Hash + Eq>(list: &[T]) -> Result<(), &'static str> {
    if <std::collections::HashSet<_>>::from_iter(list).len() != list.len() {
        return Err("duplicate entries");
    }
    Ok(())
}

pub fn validate_not_empty<T>(list: &[T]) -> Result<(), &'static str> {
    if list.is_empty() {
        return Err("must not be empty");
    }
    Ok(())
}

/// Checks the parts all our configured URLs have in common: HTTP(S) scheme, a
/// host, no user info and no fragment. Non-local hosts must use HTTPS unless
/// `allow_plain_http` is set.
fn validate_http_uri(s: &str, allow_plain_http: bool) -> Result<Uri, String> {
    let uri: Uri = s.parse().map_err(|e| format!("invalid URI: {e}"))?;

    let scheme = uri.scheme().ok_or("must be an absolute URI with scheme")?;
    if *scheme != Scheme::HTTP && *scheme != Scheme::HTTPS {
        return Err("scheme must be 'http' or 'https'".into());
    }

    match uri.authority() {
        None => return Err("must have authority part".into()),
        Some(authority) if authority.as_str().contains('@')
            => return Err("must not contain user part".into()),
        _ => {}
    }

    let host = uri.host().unwrap_or_default();
    let is_local = host == "localhost"
        || host.trim_matches(['[', ']']).parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback());
    if !allow_plain_http && !is_local && *scheme != Scheme::HTTPS {
        return Err("must use HTTPS".into());
    }

    if s.contains('#') {
        return Err("must not contain fragment part (#...)".into());
    }

    Ok(uri)
}


/// Full URL of an HTTP endpoint, including path and optionally query.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct HttpUrl(Uri);

impl HttpUrl {
    pub fn uri(&self) -> &Uri {
        &self.0
    }
}

impl TryFrom<String> for HttpUrl {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        validate_http_uri(&s, false).map(Self)
    }
}

impl fmt::Display for HttpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Scheme and authority of an HTTP server, without path. Plain HTTP is
/// allowed as metadata servers are only reachable from inside the machine's
/// network.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct HttpHost {
    scheme: Scheme,
    authority: Authority,
}

impl HttpHost {
    pub fn with_path_and_query(&self, pq: PathAndQuery) -> Uri {
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(pq)
            .build()
            // All parts are already validated.
            .expect("failed to build URI from valid parts")
    }
}

impl TryFrom<String> for HttpHost {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let uri = validate_http_uri(&s, true)?;
        if uri.path_and_query().is_some_and(|pq| pq.as_str() != "/") {
            return Err("must not contain path or query".into());
        }

        let parts = uri.into_parts();
        Ok(Self {
            // Both are guaranteed to exist by `validate_http_uri`.
            scheme: parts.scheme.ok_or("missing scheme")?,
            authority: parts.authority.ok_or("missing authority")?,
        })
    }
}


#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;
    use crate::auth::CredentialSource;

    /// Loads from the given TOML only, ignoring env variables.
    fn load_str(toml: &str) -> Result<Config> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        file.write_all(toml.as_bytes())?;
        load_from(Config::builder(), Some(file.path()))
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = load_str(r#"
            [probe]
            endpoint = "https://search.example.com/api/search/v2/query"
        "#).unwrap();

        assert_eq!(
            config.probe.endpoint.to_string(),
            "https://search.example.com/api/search/v2/query",
        );
        assert_eq!(config.auth.credentials, CredentialSource::ApplicationDefault);
        assert_eq!(config.auth.scopes.len(), 2);
        assert!(config.log.stderr);
        assert!(config.log.file.is_none());
    }

    #[test]
    fn env_only_config() {
        // No test touches these env variables otherwise, and the working
        // directory (the crate root) has no `query-probe.toml`.
        unsafe {
            std::env::remove_var(PATH_ENV);
            std::env::set_var("QUERY_PROBE_ENDPOINT", "https://search.example.com/query");
        }
        let result = load(None);
        unsafe { std::env::remove_var("QUERY_PROBE_ENDPOINT") };

        let config = result.unwrap();
        assert_eq!(config.probe.endpoint.to_string(), "https://search.example.com/query");
        assert_eq!(config.auth.credentials, CredentialSource::ApplicationDefault);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load(Some(Path::new("/nonexistent/query-probe/config.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("does not exist"), "{err:#}");
    }

    #[test]
    fn env_credentials_are_parsed() {
        let config = load_str(r#"
            [probe]
            endpoint = "https://search.example.com/query"

            [auth]
            credentials = { source = "env", name = "SEARCH_TOKEN" }
        "#).unwrap();

        assert_eq!(
            config.auth.credentials,
            CredentialSource::Env { name: "SEARCH_TOKEN".into() },
        );
    }

    #[test]
    fn plain_http_endpoint_is_rejected() {
        let err = load_str(r#"
            [probe]
            endpoint = "http://search.example.com/query"
        "#).unwrap_err();

        assert!(format!("{err:#}").contains("must use HTTPS"), "{err:#}");
    }

    #[test]
    fn empty_scopes_are_rejected() {
        load_str(r#"
            [probe]
            endpoint = "https://search.example.com/query"

            [auth]
            scopes = []
        "#).unwrap_err();
    }

    #[test]
    fn url_validation() {
        assert!(HttpUrl::try_from("https://example.com/query".to_owned()).is_ok());
        assert!(HttpUrl::try_from("http://localhost:8080/query".to_owned()).is_ok());
        assert!(HttpUrl::try_from("http://127.0.0.1:8080/query".to_owned()).is_ok());
        assert!(HttpUrl::try_from("http://[::1]:8080/query".to_owned()).is_ok());

        assert!(HttpUrl::try_from("/query".to_owned()).is_err());
        assert!(HttpUrl::try_from("ftp://example.com/query".to_owned()).is_err());
        assert!(HttpUrl::try_from("https://user@example.com/query".to_owned()).is_err());
        assert!(HttpUrl::try_from("https://example.com/query#foo".to_owned()).is_err());
    }

    #[test]
    fn host_validation() {
        let host = HttpHost::try_from("http://metadata.google.internal".to_owned()).unwrap();
        assert_eq!(
            host.with_path_and_query(PathAndQuery::from_static("/computeMetadata/v1/")).to_string(),
            "http://metadata.google.internal/computeMetadata/v1/",
        );

        assert!(HttpHost::try_from("http://metadata.google.internal/".to_owned()).is_ok());
        assert!(HttpHost::try_from("http://metadata.google.internal/foo".to_owned()).is_err());
    }

    #[test]
    fn template_mentions_all_sections() {
        let template = template();
        for needle in ["[probe]", "endpoint", "[auth]", "credentials", "[log]"] {
            assert!(template.contains(needle), "template lacks '{needle}'");
        }
    }
}

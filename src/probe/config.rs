use crate::config::HttpUrl;


#[derive(Debug, confique::Config)]
pub struct ProbeConfig {
    /// Full URL of the search query endpoint the probe POSTs to, e.g.
    /// "https://search.example.com/api/search/v2/query". Must use HTTPS
    /// unless the host is local. Can also be set via env `QUERY_PROBE_ENDPOINT`.
    #[config(env = "QUERY_PROBE_ENDPOINT")]
    pub endpoint: HttpUrl,
}

use std::{
    collections::HashMap,
    fs::OpenOptions,
    path::PathBuf,
};
use serde::Deserialize;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    prelude::*,
};

use crate::prelude::*;


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Specifies what log messages to emit, based on the module path and log level.
    ///
    /// This is a map where the key specifies a module path prefix, and the
    /// value specifies a minimum log level. For each log message, the map
    /// entry with the longest prefix matching the log's module path is chosen.
    /// If no such entry exists, the log is not emitted. Otherwise, that
    /// entry's level is used to check whether the log message should be
    /// emitted. Valid log levels: off, error, warn, info, debug, trace.
    ///
    /// Example: only ≥"info" logs from the probe generally, but ≥"trace" from
    /// the credential providers and ≥"debug" from the HTTP library `hyper`:
    ///
    ///    [log]
    ///    filters.query_probe = "info"
    ///    filters."query_probe::auth" = "trace"
    ///    filters.hyper = "debug"
    #[config(default = { "query_probe": "info" })]
    pub(crate) filters: Filters,

    /// If this is set, log messages are also written to this file.
    pub(crate) file: Option<PathBuf>,

    /// If this is set to `false`, log messages are not written to stderr.
    /// Stdout is reserved for the probe result and never receives logs.
    #[config(default = true)]
    pub(crate) stderr: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl Filters {
    /// Returns the level of the longest prefix matching `target`, or `None` if
    /// no prefix matches.
    fn level_for(&self, target: &str) -> Option<LevelFilter> {
        // In practice we only expect very few entries, so a linear scan is
        // fine here.
        self.0.iter()
            .filter(|(target_prefix, _)| target.starts_with(target_prefix.as_str()))
            .max_by_key(|(target_prefix, _)| target_prefix.len())
            .map(|(_, level)| *level)
    }

    fn max_level(&self) -> LevelFilter {
        self.0.values().max().copied().unwrap_or(LevelFilter::OFF)
    }
}

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(target_prefix, level)| {
                let level = parse_level_filter(&level)?;
                Ok((target_prefix, level))
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "off" => Ok(LevelFilter::OFF),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!("invalid log level '{other}'")),
    }
}

pub(crate) fn init(config: &LogConfig) -> Result<()> {
    let filter = {
        let filters = config.filters.clone();
        let max_level = filters.max_level();
        FilterFn::new(move |metadata| {
            filters.level_for(metadata.target())
                .is_some_and(|level| *metadata.level() <= level)
        }).with_max_level_hint(max_level)
    };

    let stderr_output = config.stderr
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    let file_output = if let Some(path) = &config.file {
        use std::io::Write;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("failed to open/create log file '{}'", path.display()))?;

        // Separate runs by an empty line, as the probe is usually invoked
        // periodically and appends to the same file.
        file.write_all(b"\n").context("could not write to log file")?;

        Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(stderr_output)
        .try_init()
        .context("failed to install global log subscriber")?;

    Ok(())
}

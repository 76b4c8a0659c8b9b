use std::path::PathBuf;


#[derive(clap::Parser)]
#[command(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub cmd: Command,

    /// Specifies config file location. Default locations are:
    /// 'query-probe.toml' and '/etc/query-probe/config.toml'. Can also be set
    /// via env `QUERY_PROBE_CONFIG_PATH`.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Sends the query once and checks that the search service replies 200.
    /// Exits with a non-zero code otherwise.
    Run,

    /// Checks the config and obtains an access token, without sending the
    /// query. Useful to verify credentials before scheduling the probe.
    Check,

    /// Outputs a template of the configuration, including all config options
    /// with descriptions, great as a starting point.
    GenConfigTemplate {
        /// File to write it to. If unspecified, written to stdout.
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
}


#[cfg(test)]
mod tests {
    use clap::{CommandFactory as _, Parser as _};

    use super::*;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["query-probe", "run", "--config", "probe.toml"]).unwrap();
        assert!(matches!(cli.cmd, Command::Run));
        assert_eq!(cli.config, Some(PathBuf::from("probe.toml")));
    }

    #[test]
    fn template_output_path() {
        let cli = Cli::try_parse_from(["query-probe", "gen-config-template", "-o", "t.toml"]).unwrap();
        match cli.cmd {
            Command::GenConfigTemplate { out } => assert_eq!(out, Some(PathBuf::from("t.toml"))),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

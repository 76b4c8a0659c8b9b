use std::{fs, io::{self, Write}, time::Instant};

use clap::Parser as _;

use crate::{cli::{Cli, Command}, prelude::*, probe::Probe};


mod auth;
mod cli;
mod config;
mod log;
mod prelude;
mod probe;
mod util;

#[cfg(test)]
mod test_util;


#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::GenConfigTemplate { out } => {
            let template = config::template();
            match out {
                Some(path) => fs::write(&path, &template)
                    .with_context(|| format!("failed to write '{}'", path.display()))?,
                None => io::stdout().write_all(template.as_bytes())?,
            }
        }

        Command::Check => {
            let config = config::load(cli.config.as_deref())?;
            log::init(&config.log)?;

            let probe = Probe::from_config(&config)?;
            probe.initialize().await.context("failed to obtain access token")?;
            debug!(state = ?probe.state(), "probe initialized");
            println!("OK config valid, access token obtained (endpoint: {})", probe.endpoint());
        }

        Command::Run => {
            let config = config::load(cli.config.as_deref())?;
            log::init(&config.log)?;

            let probe = Probe::from_config(&config)?;
            let start = Instant::now();
            let result = probe.run().await;
            let elapsed = start.elapsed();

            match result {
                Ok(status) => {
                    info!(%status, ?elapsed, "probe succeeded");
                    println!(
                        "OK {} POST {} in {}ms",
                        status.as_u16(),
                        probe.endpoint(),
                        elapsed.as_millis(),
                    );
                }
                Err(e) => {
                    debug!(?elapsed, "probe failed");
                    return Err(Error::new(e).context(format!("probe of {} failed", probe.endpoint())));
                }
            }
        }
    }

    Ok(())
}

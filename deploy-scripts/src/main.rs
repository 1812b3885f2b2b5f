use std::{env, path::PathBuf, process};

use clap::Parser;
use deploy_core::config::Config;
use deploy_scripts::cli::Cli;
use eyre::{Result, WrapErr};
use tokio::sync::watch;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// The variable naming the dotenv file to load
const DOTENV_PATH_ENV_VAR: &str = "DOTENV_CONFIG_PATH";
/// The dotenv file loaded when none is named
const DEFAULT_DOTENV_PATH: &str = ".env";
/// The exit code of a process stopped by a second interrupt
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before parsing so that the file can supply `NETWORK`
    load_dotenv()?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupted, stopping once the current step can be abandoned, interrupt again to exit");
        let _ = cancel_tx.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    match cli.run(config, cancel_rx).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let stage = e.stage();
            Err(e).wrap_err(format!("{} stage failed", stage))
        }
    }
}

/// Load the dotenv file into the process environment, if there is one
fn load_dotenv() -> Result<()> {
    let path: PathBuf = env::var(DOTENV_PATH_ENV_VAR)
        .unwrap_or_else(|_| DEFAULT_DOTENV_PATH.to_string())
        .into();

    match dotenvy::from_path(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).wrap_err(format!("error loading {}", path.display())),
    }
}

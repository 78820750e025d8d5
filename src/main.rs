// Main entrypoint for the deploywatch CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use deploywatch::app::{init_config, App, CreateRequest};
use deploywatch::config::{Config, ConfigTrait};
use deploywatch::poller::PollOutcome;

const HOME_DIR: &str = ".akash-deploy";
const CONFIG_FILE: &str = "config.yaml";

/// deploywatch - follows a deployment from creation to a running lease
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Home directory holding the config and archived manifests
    #[arg(long, value_name = "DIR", global = true)]
    home: Option<PathBuf>,

    /// Custom config file path (defaults to <home>/config.yaml)
    #[arg(short, long, value_name = "FILE", global = true)]
    cfg: Option<PathBuf>,

    /// Force debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config file
    Init {
        chain_id: String,
        rpc_addr: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        api_addr: Option<String>,
    },
    /// Print chain and filesystem events for the configured owner
    Start,
    /// Track an existing deployment until its services are available
    Watch { dseq: u64 },
    /// Archive an SDL, broadcast its signed transaction and track the deployment
    Create {
        sdl: PathBuf,
        #[arg(long)]
        dseq: Option<u64>,
        /// File with the signed create-deployment transaction bytes
        #[arg(long, value_name = "FILE", requires = "dseq")]
        signed_tx: Option<PathBuf>,
    },
}

fn home_dir(home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(home) = home {
        return Ok(home);
    }
    let user_home = std::env::var_os("HOME").context("HOME is not set, pass --home")?;
    Ok(PathBuf::from(user_home).join(HOME_DIR))
}

/// Configures structured logging. `RUST_LOG` wins over the config, `--debug` over both.
fn configure_logger(cfg: Option<&Config>, debug: bool) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .and_then(|cfg| cfg.logs())
        .and_then(|logs| logs.level.as_deref())
        .unwrap_or("info");

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };

    if cfg.is_some_and(|cfg| cfg.is_prod()) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let home = home_dir(args.home)?;
    let cfg_path = args.cfg.unwrap_or_else(|| home.join(CONFIG_FILE));

    if let Command::Init {
        chain_id,
        rpc_addr,
        owner,
        api_addr,
    } = &args.command
    {
        configure_logger(None, args.debug);
        let cfg = Config::new_default(chain_id, rpc_addr, owner, api_addr.as_deref());
        return init_config(&cfg_path, &cfg);
    }

    let cfg = Config::load(&cfg_path).with_context(|| format!("failed to load config from {:?}", cfg_path))?;
    // logger needs the config, so the load is reported after the fact
    configure_logger(Some(&cfg), args.debug);
    info!(
        component = "config",
        event = "load_success",
        path = ?cfg_path,
        "config loaded"
    );

    let shutdown_token = CancellationToken::new();
    let app = App::new(shutdown_token, cfg, &home)?;

    let outcome = match args.command {
        Command::Init { .. } => return Ok(()),
        Command::Start => {
            app.start().await?;
            return Ok(());
        }
        Command::Watch { dseq } => app.watch(dseq).await?,
        Command::Create { sdl, dseq, signed_tx } => {
            let signed_tx = match signed_tx {
                Some(path) => Some(
                    tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("read signed transaction {:?}", path))?,
                ),
                None => None,
            };
            app.create(CreateRequest { sdl, dseq, signed_tx }).await?
        }
    };

    if outcome == PollOutcome::TimedOut {
        warn!(component = "main", event = "timed_out", "deployment did not become available in time");
    }
    Ok(())
}

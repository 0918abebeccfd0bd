//! Mailconf - Mail Platform Configuration Tool
//!
//! Daemon and CLI front end for the live-reloading configuration store.
//! `run` keeps the merged configuration hot for the process lifetime; the
//! remaining subcommands inspect the merged record or update the named
//! fragments the platform maintains itself.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailconf::config::{ConfigManager, ConfigStore, ConfigWatcher, FragmentWriter, LogFormat};
use mailconf::shutdown::ShutdownCoordinator;

/// CLI arguments for mailconf
#[derive(Parser, Debug)]
#[command(name = "mailconf")]
#[command(about = "Mailconf - live-reloading configuration store for the mail platform")]
#[command(version)]
pub struct CliArgs {
    /// Platform root directory; fragments live in its conf.d subdirectory
    #[arg(long, default_value = "/etc/mailconf", help = "Platform root directory")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the configuration and keep it hot until SIGTERM/SIGINT
    Run,
    /// Print the merged configuration as YAML
    Show,
    /// Write the server JWT fragment
    SetJwt {
        /// Server authentication token
        jwt: String,
    },
    /// Write the instance identity fragment
    SetInstance {
        /// Operating mode (e.g. "local")
        #[arg(long)]
        mode: String,
        /// Instance hostname
        #[arg(long)]
        hostname: String,
        /// Contact email
        #[arg(long)]
        email: String,
    },
    /// Write the DKIM signing key path fragment
    SetDkim {
        /// Path to the DKIM signing key
        key_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let fragment_dir = ConfigManager::fragment_dir(&args.root);

    // Startup load is synchronous and fatal on failure: a platform process
    // must not come up with no configuration.
    let config = ConfigManager::load_from_dir(&fragment_dir)
        .with_context(|| format!("failed to load configuration from {}", fragment_dir.display()))?;

    // Strict validation point for the level/format tokens: unrecognized
    // values terminate here with a descriptive message.
    init_tracing(&config).context("failed to initialize logging")?;

    info!("mailconf v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(ConfigStore::new(config));
    let writer = FragmentWriter::new(fragment_dir.clone(), store.clone());

    match args.command {
        Command::Run => run(fragment_dir, store).await,
        Command::Show => {
            let yaml = store.current().await.pretty_print()?;
            println!("{yaml}");
            Ok(())
        }
        Command::SetJwt { jwt } => {
            writer.write_server_jwt(&jwt).await?;
            info!("server JWT updated");
            Ok(())
        }
        Command::SetInstance {
            mode,
            hostname,
            email,
        } => {
            writer.write_instance(&mode, &hostname, &email).await?;
            info!("instance configuration updated");
            Ok(())
        }
        Command::SetDkim { key_path } => {
            writer.write_dkim(&key_path).await?;
            info!("DKIM key path updated");
            Ok(())
        }
    }
}

/// Daemon mode: watch the fragment directory until a shutdown signal.
async fn run(fragment_dir: PathBuf, store: Arc<ConfigStore>) -> Result<()> {
    let config = store.current().await;
    info!(
        hostname = %config.instance_hostname,
        mode = %config.instance_mode,
        "configuration loaded"
    );

    // A failed watch subscription degrades to a static configuration rather
    // than aborting a process that already loaded successfully.
    let watcher = match ConfigWatcher::spawn(fragment_dir, store.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            error!("could not watch config directory: {e}; continuing without hot reload");
            None
        }
    };

    let shutdown = ShutdownCoordinator::new();
    shutdown.listen_for_signals().await?;

    if let Some(watcher) = watcher {
        watcher.stop().await;
    }
    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &mailconf::Config) -> Result<()> {
    let level = config.log_level()?;
    let format = config.log_format()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    match format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(true),
                )
                .with(env_filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().json())
                .with(env_filter)
                .init();
        }
    }

    Ok(())
}

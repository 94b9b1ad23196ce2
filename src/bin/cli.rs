//! watchwatch CLI
//!
//! Polls the configured forum listing and reports new or updated threads
//! until interrupted.

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use watchwatch::{
    error::Result,
    models::Config,
    pipeline::{PollDelay, PollLoop},
    services::{ForumClient, ThreadNotifier},
    storage::{LocalStateStore, StateStore},
    utils::{self, log::LogTee},
};

/// watchwatch - forum thread watcher
#[derive(Parser, Debug)]
#[command(name = "watchwatch", version, about = "Watches a forum listing for new threads")]
struct Cli {
    /// Path to the settings file (TOML, or JSON with a .json extension)
    #[arg(short, long, default_value = "settings.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run a single cycle and exit instead of polling forever
    #[arg(long)]
    once: bool,
}

/// Initialize logging based on settings and the verbosity flag.
fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { config.log_level.as_str() };

    let tee = LogTee::open(config.log_file.as_deref())?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .target(env_logger::Target::Pipe(Box::new(tee)))
        .init();
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    init_logging(&config, cli.verbose)?;

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    let channel = config.channel();

    let store = LocalStateStore::load(&config.state_file).await?;
    log::info!(
        "Loaded {} tracked threads from {}",
        store.len(),
        store.path().display()
    );

    let source = ForumClient::new(&config)?;
    let notifier = ThreadNotifier::from_channel(&config.base_url, &channel)?;
    log::info!(
        "Watching {} ({})",
        utils::get_domain(&config.sales_url).unwrap_or_else(|| config.sales_url.clone()),
        if notifier.sends_email() {
            "log + email"
        } else {
            "log only"
        }
    );
    let mut poll = PollLoop::new(
        Box::new(source),
        Box::new(notifier),
        Box::new(store),
        PollDelay::from_config(&config),
    );

    if cli.once {
        poll.run_once().await?;
        return Ok(());
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Interrupt received, finishing current cycle");
        stop_tx.send_replace(true);
    });

    poll.run(stop_rx).await?;

    log::info!("Done!");
    Ok(())
}

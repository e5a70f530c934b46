//! pilot-send - Background daemon for scheduled publishing
//!
//! Publishes posts to Facebook and Instagram once they fall due and answers
//! new comments on them for every enabled auto-responder.

use clap::Parser;
use libpostpilot::logging::{LogFormat, LoggingConfig};
use libpostpilot::{Config, PostpilotError, PostpilotService, Result, Scheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pilot-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing and comment auto-replies")]
#[command(long_about = "\
pilot-send - Background daemon for scheduled publishing

DESCRIPTION:
    pilot-send is a long-running daemon that watches the Postpilot database
    and publishes scheduled posts to Facebook and Instagram at the right
    time. Every tick it also answers new comments on posts that have an
    enabled auto-responder.

    Several pilot-send processes may share one database: each due post is
    claimed by exactly one of them and each comment is answered once.

USAGE:
    # Run in foreground (logs to stderr)
    pilot-send

    # Run with custom poll interval
    pilot-send --poll-interval 30

    # Enable verbose logging as JSON
    pilot-send --verbose --log-format json

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current tick)

CONFIGURATION:
    Configuration file: ~/.config/postpilot/config.toml
    (override with POSTPILOT_CONFIG)

    [database]
    path = \"~/.local/share/postpilot/postpilot.db\"

    [scheduler]
    interval_seconds = 60

    [generation]
    model = \"gpt-4o-mini\"    # api_key falls back to OPENAI_API_KEY

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    #[arg(help = "How often to check for due posts and new comments")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Log output format
    #[arg(long, value_name = "FORMAT")]
    #[arg(help = "Log format: text, json or pretty (default: POSTPILOT_LOG_FORMAT or text)")]
    log_format: Option<LogFormat>,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Run a single tick, print its report as JSON and exit")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(&cli);

    if let Err(e) = run(cli).await {
        error!("pilot-send failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(cli: &Cli) {
    let mut config = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        config.format = format;
    }
    config.verbose = cli.verbose;
    config.init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    info!("pilot-send daemon starting");

    let interval = cli
        .poll_interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.scheduler.interval());
    info!("Poll interval: {}s", interval.as_secs());

    let service = PostpilotService::from_config(&config).await?;
    let scheduler = Arc::new(Scheduler::new(service, interval));

    if cli.once {
        let report = scheduler.trigger_once().await;
        let json = serde_json::to_string(&report)
            .map_err(|e| PostpilotError::InvalidInput(format!("Cannot encode report: {}", e)))?;
        println!("{}", json);
        info!("pilot-send: ran one tick, exiting");
    } else {
        let shutdown = Arc::new(Notify::new());
        setup_signal_handlers(Arc::clone(&shutdown))?;

        scheduler.start().await;
        shutdown.notified().await;

        info!("Shutdown requested, waiting for the current tick");
        scheduler.stop().await;
    }

    info!("pilot-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<Notify>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| PostpilotError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    // Spawn thread to handle signals
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully...");
            shutdown.notify_one();
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<Notify>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
            shutdown.notify_one();
        }
    });
    Ok(())
}

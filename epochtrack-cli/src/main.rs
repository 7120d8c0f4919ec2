//! epochtrack CLI — replay per-epoch training logs into a tracking repository
//! and inspect what was recorded.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// epochtrack: per-epoch metric tracking for training loops
#[derive(Parser, Debug)]
#[command(name = "epochtrack", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (where `.epochtrack/config.toml` is looked up)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Replay a JSON-lines file of epoch logs through a tracker callback
    Replay {
        /// File with one log record per line
        file: PathBuf,
        /// Repository directory (defaults to the configured repository)
        #[arg(long)]
        repo: Option<PathBuf>,
        /// Experiment name (defaults to the configured experiment)
        #[arg(long)]
        experiment: Option<String>,
        /// Constant learning rate to report alongside every epoch
        #[arg(long)]
        lr: Option<f64>,
    },
    /// Show the points stored for an experiment
    Show {
        #[arg(long)]
        repo: Option<PathBuf>,
        #[arg(long)]
        experiment: Option<String>,
        /// Only show one subset: train or val
        #[arg(long)]
        subset: Option<String>,
    },
    /// List experiments stored in a repository
    Experiments {
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default `.epochtrack/config.toml` into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = epochtrack_core::load_config(Some(&workspace), None)?;

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let mut _guard = None;
    let json_layer = if config.logging.json_logs {
        let log_dir = directories::ProjectDirs::from("dev", "epochtrack", "epochtrack")
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("."));
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "epochtrack.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _guard = Some(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug")),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, &workspace, &config)
}

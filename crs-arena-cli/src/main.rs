//! CRS Arena CLI — command-line front end for the CRS Arena evaluator.
//!
//! Loads the gold annotations once, evaluates one or more run documents and
//! renders the metric tables as text or JSON.

mod commands;
mod output;

use clap::Parser;
use crs_arena_core::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// CRS Arena: score CRS judgments against human gold annotations
#[derive(Parser, Debug)]
#[command(name = "crs-arena", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.crs-arena/config.toml`)
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
    /// Evaluate one or more run documents against the gold annotations
    Evaluate {
        /// Run documents (JSON)
        #[arg(required = true)]
        runs: Vec<PathBuf>,

        /// Gold document path or URL (overrides config)
        #[arg(short, long)]
        gold: Option<String>,

        /// Output format: text or json (overrides config)
        #[arg(short, long, value_parser = parse_format)]
        format: Option<OutputFormat>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Minimum matched pairs for a turn index in the turn trend
        #[arg(long)]
        min_turn_pairs: Option<usize>,
    },
    /// Load the gold annotations and print a coverage summary
    Gold {
        /// Gold document path or URL (overrides config)
        #[arg(short, long)]
        gold: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file into the workspace
    Init,
    /// Show the effective configuration
    Show,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(format!("unknown format '{other}' (expected text or json)")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("org", "crs-arena", "crs-arena")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "crs-arena.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}

//! Slopecast CLI - render resort reports from the terminal.
//!
//! Wires the core together: an HTTP transport behind the offline cache, a
//! resort loader on top, and the HTML renderers writing to stdout or a file.

mod commands;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Context;

/// Offline-capable ski resort report viewer
#[derive(Parser, Debug)]
#[command(name = "slopecast", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Resort key from the index (overrides config and SLOPECAST_RESORT)
    #[arg(long, short, global = true)]
    resort: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the overview for the latest (or a given) date
    Overview {
        /// Day to show, YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Write HTML here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List the dates with a report, most recent first
    Dates,

    /// Render a lift's history page
    Lift { slug: String },

    /// Render a trail's history page
    Trail { slug: String },

    /// List resorts visible under the current flags
    Resorts,

    /// Hide today's morning brief for the resort
    DismissBrief,

    /// Show or change feature flags
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Inspect or manage the offline cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Show,
    Set {
        flag: String,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Pre-cache the app shell and take over from older builds
    Warm,
    /// Delete every cache namespace
    Clear,
    /// Entry counts per namespace
    Status,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // RUST_LOG controls the level (e.g., RUST_LOG=slopecast_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;
    info!("Slopecast starting");

    let ctx = Context::new(cli.resort).await?;

    let result = match cli.command {
        Command::Overview { date, out } => commands::overview(&ctx, date, out.as_deref()).await,
        Command::Dates => commands::dates(&ctx).await,
        Command::Lift { slug } => commands::lift(&ctx, &slug).await,
        Command::Trail { slug } => commands::trail(&ctx, &slug).await,
        Command::Resorts => commands::resorts(&ctx).await,
        Command::DismissBrief => commands::dismiss_brief(&ctx),
        Command::Settings { action } => match action {
            SettingsAction::Show => commands::settings_show(&ctx),
            SettingsAction::Set { flag, value } => commands::settings_set(&ctx, &flag, value),
        },
        Command::Cache { action } => match action {
            CacheAction::Warm => commands::cache_warm(&ctx).await,
            CacheAction::Clear => commands::cache_clear(&ctx).await,
            CacheAction::Status => commands::cache_status(&ctx),
        },
    };

    // Let stale-while-revalidate refreshes land before the process exits
    ctx.cache.settle().await;
    result
}

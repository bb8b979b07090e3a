use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daydiff_core::config::Settings;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
use commands::analyze::{handle_analyze, AnalyzeArgs};
use commands::prefilter::{handle_prefilter, PrefilterArgs};
use commands::reports::{handle_combined_report, handle_daily_report, DailyReportArgs};

/// Day-over-day telemetry analysis for service exports
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Root for the source, analysis and report folders
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one export, or every spreadsheet in the source folder
    Analyze(AnalyzeArgs),
    /// Build the month workbook from the daily summaries
    DailyReport(DailyReportArgs),
    /// Build the combined workbook from the metrics summaries
    CombinedReport,
    /// Keep only the columns required for a sheet type
    Prefilter(PrefilterArgs),
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when the command ran but some of its work failed.
fn run(cli: Cli) -> Result<bool> {
    let settings = Settings::load(cli.config.as_deref(), cli.base_dir.as_deref())
        .context("failed to load settings")?;
    let now = chrono::Local::now().naive_local();

    match cli.command {
        Command::Analyze(args) => handle_analyze(args, &settings, now),
        Command::DailyReport(args) => handle_daily_report(args, &settings, now),
        Command::CombinedReport => handle_combined_report(&settings, now),
        Command::Prefilter(args) => handle_prefilter(args, &settings),
    }
}

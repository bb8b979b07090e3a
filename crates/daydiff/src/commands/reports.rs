use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Args;
use daydiff_core::combined_report::build_combined_report;
use daydiff_core::config::Settings;
use daydiff_core::daily_workbook::{collect_daily_digests, daily_workbook_file_name, write_daily_workbook};
use tracing::warn;

#[derive(Args, Debug)]
pub struct DailyReportArgs {
    /// Workbook path; defaults to `<Month>_daily.xlsx` in the base folder
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn handle_daily_report(args: DailyReportArgs, settings: &Settings, now: NaiveDateTime) -> Result<bool> {
    let analysis_dir = settings.analysis_dir();
    let digests = collect_daily_digests(&analysis_dir)
        .with_context(|| format!("failed to scan {}", analysis_dir.display()))?;
    if digests.is_empty() {
        warn!(dir = %analysis_dir.display(), "no daily summaries found");
        println!("No daily summaries found in {}.", analysis_dir.display());
        return Ok(false);
    }

    let output = match args.output {
        Some(path) => path,
        None => {
            std::fs::create_dir_all(&settings.base_dir)
                .with_context(|| format!("failed to create {}", settings.base_dir.display()))?;
            settings.base_dir.join(daily_workbook_file_name(now))
        }
    };
    let report = write_daily_workbook(digests, &output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Daily workbook saved: {} ({} comparison sheets, {} service summaries)",
        report.path.display(),
        report.sheets.len(),
        report.services
    );
    Ok(true)
}

pub fn handle_combined_report(settings: &Settings, now: NaiveDateTime) -> Result<bool> {
    let report = build_combined_report(&settings.analysis_dir(), &settings.reports_dir(), now)
        .context("failed to build combined report")?;
    match report {
        Some(report) => {
            println!(
                "Combined report saved: {} ({} services)",
                report.path.display(),
                report.services
            );
            Ok(true)
        }
        None => {
            println!("No metrics summaries found; combined report not written.");
            Ok(false)
        }
    }
}

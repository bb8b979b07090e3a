use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use daydiff_core::analyzer::{analyze_file, analyze_source_dir, AnalysisOutcome};
use daydiff_core::config::Settings;
use daydiff_core::daily::{CompareSpec, DailyComparison};
use daydiff_core::status::MetricKind;
use tracing::info;

use super::reports::handle_combined_report;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Export to analyze; without it every spreadsheet in the source folder is analyzed
    file: Option<PathBuf>,
    /// Dates to compare, e.g. `01/10,03/10` or `2025-10-01,2025-10-03`
    #[arg(long)]
    compare: Option<String>,
    /// Do not rebuild the combined report afterwards
    #[arg(long)]
    skip_report: bool,
}

pub fn handle_analyze(args: AnalyzeArgs, settings: &Settings, now: NaiveDateTime) -> Result<bool> {
    let compare: Option<CompareSpec> = args
        .compare
        .as_deref()
        .map(str::parse)
        .transpose()
        .context("invalid --compare value")?;

    let mut ok = match &args.file {
        Some(file) => {
            let outcome = analyze_file(file, settings, compare.as_ref(), now)
                .with_context(|| format!("analysis of {} failed", file.display()))?;
            print_outcome(&outcome);
            true
        }
        None => {
            let batch = analyze_source_dir(settings, compare.as_ref(), now)
                .context("batch analysis failed")?;
            println!("\n--- Analysis Summary ---");
            println!("  Successful: {}", batch.successful.len());
            for name in &batch.successful {
                println!("    {name}");
            }
            println!("  Failed: {}", batch.failed.len());
            for (name, reason) in &batch.failed {
                println!("    {name}: {reason}");
            }
            batch.failed.is_empty() && !batch.successful.is_empty()
        }
    };

    if args.skip_report {
        info!("combined report skipped at user request");
    } else {
        ok &= handle_combined_report(settings, now)?;
    }
    Ok(ok)
}

fn print_outcome(outcome: &AnalysisOutcome) {
    println!("\nService: {}", outcome.service);
    println!("Output folder: {}", outcome.output_dir.display());
    println!(
        "Rows: {} loaded, {} kept after preprocessing",
        outcome.report.original_rows, outcome.report.final_rows
    );
    if !outcome.charts.is_empty() {
        println!("Charts: {}", outcome.charts.join(", "));
    }
    match &outcome.comparison {
        Some(comparison) => println!("{}", comparison_table(comparison)),
        None => println!("No daily comparison (need two days of data)."),
    }
    if !outcome.trends.is_empty() {
        let trends: Vec<String> = outcome
            .trends
            .iter()
            .map(|(kind, label)| format!("{kind}: {label}"))
            .collect();
        println!("Trends: {}", trends.join(", "));
    }
}

fn comparison_table(comparison: &DailyComparison) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Metric".to_string(),
        comparison.previous_date.format("%Y-%m-%d").to_string(),
        comparison.current_date.format("%Y-%m-%d").to_string(),
        "Change".to_string(),
        "Change %".to_string(),
        "Status".to_string(),
    ]);
    for metric in &comparison.metrics {
        let decimals = match metric.kind {
            MetricKind::Throughput | MetricKind::UserActivity => 0,
            MetricKind::LlmCost => 4,
            MetricKind::Latency | MetricKind::Reliability => 2,
        };
        table.add_row(vec![
            metric.kind.title().to_string(),
            format!("{:.*}", decimals, metric.previous),
            format!("{:.*}", decimals, metric.current),
            format!("{:+.*}", decimals, metric.change),
            format!("{:+.2}%", metric.percent),
            metric.status.to_string(),
        ]);
    }
    table
}

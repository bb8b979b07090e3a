use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::info;

use crate::charts::ChartFile;
use crate::daily::{DailyComparison, MetricComparison};
use crate::error::Result;
use crate::metrics::{percent, FailureCounts, GroupStats, ServiceMetrics};
use crate::status::MetricKind;

pub const METRICS_SUMMARY_FILE: &str = "metrics_analysis.txt";
pub const DAILY_SUMMARY_PREFIX: &str = "daily_analysis_";
const MESSAGE_DISPLAY_LIMIT: usize = 100;

/// Identifies the run a summary belongs to.
#[derive(Debug, Clone)]
pub struct SummaryContext<'a> {
    pub service: &'a str,
    pub file_name: &'a str,
    pub output_dir: &'a Path,
    pub generated: NaiveDateTime,
}

pub fn daily_summary_file_name(comparison: &DailyComparison) -> String {
    format!(
        "{DAILY_SUMMARY_PREFIX}{}_vs_{}.txt",
        comparison.previous_date.format("%d-%m"),
        comparison.current_date.format("%d-%m")
    )
}

/// `1247` -> `1,247`.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn signed_thousands(value: i64) -> String {
    if value < 0 {
        group_thousands(value)
    } else {
        format!("+{}", group_thousands(value))
    }
}

fn arrow(change: f64) -> &'static str {
    if change == 0.0 {
        "→"
    } else if change < 0.0 {
        "↓"
    } else {
        "↑"
    }
}

/// Direction word for a change: (decrease word, increase word) per metric.
fn direction_word(kind: MetricKind, change: f64) -> &'static str {
    if change == 0.0 {
        return "no change";
    }
    let (down, up) = match kind {
        MetricKind::Latency => ("improvement", "increase"),
        MetricKind::Throughput | MetricKind::LlmCost => ("decrease", "increase"),
        MetricKind::Reliability => ("degradation", "improvement"),
        MetricKind::UserActivity => ("decline", "growth"),
    };
    if change < 0.0 {
        down
    } else {
        up
    }
}

fn value_label(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Latency => "Avg Response Time",
        MetricKind::Throughput => "Total Requests",
        MetricKind::LlmCost => "Total Cost ($)",
        MetricKind::Reliability => "Success Rate",
        MetricKind::UserActivity => "Unique Users",
    }
}

fn format_value(kind: MetricKind, value: f64) -> String {
    match kind {
        MetricKind::Latency => format!("{value:.3}ms"),
        MetricKind::Throughput | MetricKind::UserActivity => {
            group_thousands(value.round() as i64)
        }
        MetricKind::LlmCost => format!("{value:.4}"),
        MetricKind::Reliability => format!("{value:.2}%"),
    }
}

fn format_change(metric: &MetricComparison) -> String {
    let pct = metric.percent.abs();
    let direction = format!(
        "{}{} {}",
        arrow(metric.change),
        match metric.kind {
            MetricKind::Throughput | MetricKind::UserActivity => format!("{pct:.1}%"),
            _ => format!("{pct:.2}%"),
        },
        direction_word(metric.kind, metric.change)
    );
    match metric.kind {
        MetricKind::Latency => format!("Change: {:+.3}ms ({direction})", metric.change),
        MetricKind::Throughput => format!(
            "Change: {} requests ({direction})",
            signed_thousands(metric.change.round() as i64)
        ),
        MetricKind::LlmCost => format!("Change ($): {:+.4} ({direction})", metric.change),
        MetricKind::Reliability => format!("Change: {:+.2}% ({direction})", metric.change),
        MetricKind::UserActivity => format!(
            "Change: {} users ({direction})",
            signed_thousands(metric.change.round() as i64)
        ),
    }
}

pub fn render_daily_summary(ctx: &SummaryContext<'_>, comparison: &DailyComparison) -> Result<String> {
    let previous = comparison.previous_date.format("%Y-%m-%d").to_string();
    let current = comparison.current_date.format("%Y-%m-%d").to_string();

    let mut out = String::new();
    writeln!(out, "DAILY ANALYSIS REPORT - {}", ctx.service)?;
    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "Generated: {}", ctx.generated.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "File: {}", ctx.file_name)?;
    writeln!(out, "Comparison: {previous} → {current}")?;
    writeln!(out)?;

    for metric in &comparison.metrics {
        let label = value_label(metric.kind);
        writeln!(out, "{}. {} Metric", metric.kind.section_number(), metric.kind.title())?;
        writeln!(out, "{previous} {label}: {}", format_value(metric.kind, metric.previous))?;
        writeln!(out, "{current} {label}: {}", format_value(metric.kind, metric.current))?;
        writeln!(out, "{}", format_change(metric))?;
        writeln!(out, "Status: {}", metric.status)?;
        writeln!(out)?;
    }

    Ok(out)
}

pub fn write_daily_summary(ctx: &SummaryContext<'_>, comparison: &DailyComparison) -> Result<PathBuf> {
    let path = ctx.output_dir.join(daily_summary_file_name(comparison));
    std::fs::write(&path, render_daily_summary(ctx, comparison)?)?;
    info!(path = %path.display(), "daily summary saved");
    Ok(path)
}

pub fn render_metrics_summary(
    ctx: &SummaryContext<'_>,
    metrics: &ServiceMetrics,
    charts: &[ChartFile],
) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "SERVICE NAME: {}", ctx.service)?;
    writeln!(out)?;
    writeln!(out, "INDIVIDUAL ANALYSIS REPORT")?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out, "File: {}", ctx.file_name)?;
    writeln!(out, "Generated: {}", ctx.generated.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "Output Directory: {}", ctx.output_dir.display())?;
    writeln!(out)?;

    writeln!(out, "RESPONSE TIME AND LLM COST METRICS")?;
    writeln!(out, "{}", "=".repeat(40))?;
    match &metrics.response_time {
        Some(rt) => {
            writeln!(out, "Response Time Metrics:")?;
            writeln!(out, "{:<25} {:<15}", "Metric", "Value")?;
            writeln!(out, "{}", "-".repeat(40))?;
            writeln!(out, "{:<25} {:.2} s", "Avg Time Taken", rt.mean)?;
            writeln!(out, "{:<25} {:.2} s", "Min Time Taken", rt.min)?;
            writeln!(out, "{:<25} {:.2} s", "Max Time Taken", rt.max)?;
            writeln!(out, "{:<25} {:.2} s", "Median Time", rt.median)?;
            writeln!(out, "{:<25} {:.2} s", "Std Deviation", rt.std)?;
            for (level, value) in rt.percentiles.levels() {
                writeln!(out, "{:<25} {:.2} s", format!("P{level} Time"), value)?;
            }
            writeln!(out, "{:<25} {}", "Records Analyzed", group_thousands(rt.count as i64))?;
            writeln!(out)?;
        }
        None => {
            writeln!(out, "Response Time Metrics: Not Available")?;
            writeln!(out)?;
        }
    }
    match &metrics.llm_cost {
        Some(cost) => {
            writeln!(out, "LLM Cost Metrics:")?;
            writeln!(out, "{:<25} {:<15}", "Metric", "Value")?;
            writeln!(out, "{}", "-".repeat(40))?;
            writeln!(out, "{:<25} ${:.4}", "Avg LLM Cost", cost.mean)?;
            writeln!(out, "{:<25} ${:.4}", "Min LLM Cost", cost.min)?;
            writeln!(out, "{:<25} ${:.4}", "Max LLM Cost", cost.max)?;
            writeln!(out, "{:<25} ${:.2}", "Total LLM Cost", cost.total)?;
            writeln!(out, "{:<25} ${:.4}", "Median Cost", cost.median)?;
            writeln!(out, "{:<25} {}", "Records with Cost", group_thousands(cost.count as i64))?;
            writeln!(out)?;
        }
        None => {
            writeln!(out, "LLM Cost Metrics: Not Available")?;
            writeln!(out)?;
        }
    }

    write_process_tables(&mut out, metrics)?;
    write_mode_tables(&mut out, metrics)?;
    write_process_mode_tables(&mut out, metrics)?;

    writeln!(out, "FAILURE/SUCCESS RATE (After Preprocessing)")?;
    writeln!(out, "{}", "=".repeat(45))?;
    match &metrics.status {
        Some(status) => {
            writeln!(out, "{:<20} {:<10} {:<12}", "Status", "Count", "% of Total")?;
            writeln!(out, "{}", "-".repeat(42))?;
            writeln!(out, "{:<20} {:<10} {:.2}%", "error (Failure)", status.errors, status.error_rate)?;
            writeln!(out, "{:<20} {:<10} {:.2}%", "info (Success)", status.success, status.success_rate)?;
            writeln!(out, "{:<20} {:<10} 100.00%", "Total", status.processed_total)?;
            writeln!(out)?;
            writeln!(out, "Processing Summary:")?;
            writeln!(out, "- Original records: {}", group_thousands(status.original_total as i64))?;
            writeln!(
                out,
                "- Records after preprocessing: {}",
                group_thousands(status.processed_total as i64)
            )?;
            writeln!(
                out,
                "- Records removed: {}",
                group_thousands(status.original_total as i64 - status.processed_total as i64)
            )?;
            writeln!(out)?;
        }
        None => {
            writeln!(out, "Status analysis not available (no status column found)")?;
            writeln!(out)?;
        }
    }

    if !metrics.error_categories.is_empty() {
        writeln!(out, "ERROR TYPE CATEGORIES")?;
        writeln!(out, "{}", "=".repeat(25))?;
        writeln!(out, "{:<35} {:<8}", "Error Category", "Count")?;
        writeln!(out, "{}", "-".repeat(43))?;
        for (category, count) in &metrics.error_categories {
            writeln!(out, "{:<35} {:<8}", category.label(), count)?;
        }
        writeln!(out)?;
        writeln!(out, "Total error categories: {}", metrics.error_categories.len())?;
        let categorized: usize = metrics.error_categories.iter().map(|(_, count)| count).sum();
        writeln!(out, "Total categorized errors: {categorized}")?;
        writeln!(out)?;
    }

    if !metrics.error_breakdown.is_empty() {
        writeln!(out, "DETAILED ERROR BREAKDOWN")?;
        writeln!(out, "{}", "=".repeat(30))?;
        writeln!(out, "{:<105} {:<8}", "Error Message", "Count")?;
        writeln!(out, "{}", "-".repeat(113))?;
        for (message, count) in &metrics.error_breakdown {
            writeln!(out, "{:<105} {:<8}", display_message(message), count)?;
        }
        writeln!(out)?;
        writeln!(out, "Total unique error messages: {}", metrics.error_breakdown.len())?;
        let occurrences: usize = metrics.error_breakdown.iter().map(|(_, count)| count).sum();
        writeln!(out, "Total error occurrences: {occurrences}")?;
        writeln!(out)?;
    }

    writeln!(out, "GENERATED CHARTS")?;
    writeln!(out, "{}", "=".repeat(20))?;
    for (idx, chart) in charts.iter().enumerate() {
        writeln!(out, "{}. {}: {}", idx + 1, chart.title, chart.file_name)?;
        writeln!(out, "   - {}", chart.description)?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out, "Analysis completed successfully!")?;
    writeln!(out, "All files saved in: {}", ctx.output_dir.display())?;

    Ok(out)
}

pub fn write_metrics_summary(
    ctx: &SummaryContext<'_>,
    metrics: &ServiceMetrics,
    charts: &[ChartFile],
) -> Result<PathBuf> {
    let path = ctx.output_dir.join(METRICS_SUMMARY_FILE);
    std::fs::write(&path, render_metrics_summary(ctx, metrics, charts)?)?;
    info!(path = %path.display(), "metrics summary saved");
    Ok(path)
}

/// Messages longer than the limit are cut and suffixed with `...`.
fn display_message(message: &str) -> String {
    if message.chars().count() > MESSAGE_DISPLAY_LIMIT {
        let cut: String = message.chars().take(MESSAGE_DISPLAY_LIMIT).collect();
        format!("{cut}...")
    } else {
        message.to_string()
    }
}

fn process_label(row: &GroupStats) -> &str {
    row.key.process.as_deref().unwrap_or("")
}

fn write_rt_row(out: &mut String, lead: &str, row: &GroupStats) -> Result<()> {
    let stats = &row.stats;
    writeln!(
        out,
        "{lead} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>8}",
        stats.mean, stats.median, stats.min, stats.max, stats.std, stats.count
    )?;
    Ok(())
}

fn write_cost_row(out: &mut String, lead: &str, row: &GroupStats) -> Result<()> {
    let stats = &row.stats;
    writeln!(
        out,
        "{lead} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>12.2} {:>8}",
        stats.mean, stats.median, stats.min, stats.max, stats.total, stats.count
    )?;
    Ok(())
}

fn write_failure_row(out: &mut String, lead: &str, row: &FailureCounts) -> Result<()> {
    writeln!(
        out,
        "{lead} {:>8} {:>16} {:>8} {:>9.2}%",
        row.errors,
        row.info,
        row.total(),
        row.failure_pct()
    )?;
    Ok(())
}

fn write_process_tables(out: &mut String, metrics: &ServiceMetrics) -> Result<()> {
    let grouped = &metrics.by_process;
    if !grouped.response_time.is_empty() {
        writeln!(out, "RESPONSE TIME BY PROCESS")?;
        writeln!(out, "{}", "=".repeat(27))?;
        writeln!(
            out,
            "{:<40} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "Process Name", "Avg (s)", "P50 (s)", "Min (s)", "Max (s)", "Std", "N"
        )?;
        writeln!(out, "{}", "-".repeat(100))?;
        for row in &grouped.response_time {
            write_rt_row(out, &format!("{:<40}", process_label(row)), row)?;
        }
        writeln!(out)?;
    }
    if !grouped.llm_cost.is_empty() {
        writeln!(out, "LLM COST BY PROCESS")?;
        writeln!(out, "{}", "=".repeat(20))?;
        writeln!(
            out,
            "{:<40} {:>10} {:>10} {:>10} {:>10} {:>12} {:>8}",
            "Process Name", "Avg ($)", "Median", "Min", "Max", "Total ($)", "N"
        )?;
        writeln!(out, "{}", "-".repeat(110))?;
        for row in &grouped.llm_cost {
            write_cost_row(out, &format!("{:<40}", process_label(row)), row)?;
        }
        writeln!(out)?;
    }
    if !grouped.failures.is_empty() {
        writeln!(out, "FAILURE RATE (ERROR COUNTS) BY PROCESS")?;
        writeln!(out, "{}", "=".repeat(38))?;
        writeln!(
            out,
            "{:<40} {:>8} {:>16} {:>8} {:>10}",
            "Process Name", "Error", "Success (Info)", "Total", "Failure %"
        )?;
        writeln!(out, "{}", "-".repeat(95))?;
        for row in &grouped.failures {
            let lead = format!("{:<40}", row.key.process.as_deref().unwrap_or(""));
            write_failure_row(out, &lead, row)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_mode_tables(out: &mut String, metrics: &ServiceMetrics) -> Result<()> {
    let grouped = &metrics.by_mode;
    let mode_lead = |mode: Option<i64>, name: Option<String>| {
        format!("{:>8} {:<30}", mode.unwrap_or(-1), name.unwrap_or_default())
    };
    if !grouped.response_time.is_empty() {
        writeln!(out, "RESPONSE TIME BY EFFECTIVE MODE")?;
        writeln!(out, "{}", "=".repeat(32))?;
        writeln!(
            out,
            "{:<8} {:<30} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "Mode", "Mode Name", "Avg (s)", "P50 (s)", "Min (s)", "Max (s)", "Std", "N"
        )?;
        writeln!(out, "{}", "-".repeat(120))?;
        for row in &grouped.response_time {
            write_rt_row(out, &mode_lead(row.key.mode, row.key.mode_name()), row)?;
        }
        writeln!(out)?;
    }
    if !grouped.llm_cost.is_empty() {
        writeln!(out, "LLM COST BY EFFECTIVE MODE")?;
        writeln!(out, "{}", "=".repeat(25))?;
        writeln!(
            out,
            "{:<8} {:<30} {:>10} {:>10} {:>10} {:>10} {:>12} {:>8}",
            "Mode", "Mode Name", "Avg ($)", "Median", "Min", "Max", "Total ($)", "N"
        )?;
        writeln!(out, "{}", "-".repeat(125))?;
        for row in &grouped.llm_cost {
            write_cost_row(out, &mode_lead(row.key.mode, row.key.mode_name()), row)?;
        }
        writeln!(out)?;
    }
    if !grouped.failures.is_empty() {
        writeln!(out, "FAILURE RATE (ERROR COUNTS) BY MODE")?;
        writeln!(out, "{}", "=".repeat(35))?;
        writeln!(
            out,
            "{:<6} {:<24} {:>8} {:>16} {:>8} {:>10}",
            "Mode", "Name", "Error", "Success (Info)", "Total", "Failure %"
        )?;
        writeln!(out, "{}", "-".repeat(70))?;
        let (mut overall_errors, mut overall_info) = (0usize, 0usize);
        for row in &grouped.failures {
            overall_errors += row.errors;
            overall_info += row.info;
            let lead = format!(
                "{:<6} {:<24}",
                row.key.mode.unwrap_or(-1),
                row.key.mode_name().unwrap_or_default()
            );
            write_failure_row(out, &lead, row)?;
        }
        let overall_total = overall_errors + overall_info;
        writeln!(
            out,
            "{:<6} {:<24} {:>8} {:>16} {:>8} {:>9.2}%",
            "-",
            "Overall",
            overall_errors,
            overall_info,
            overall_total,
            percent(overall_errors, overall_total)
        )?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_process_mode_tables(out: &mut String, metrics: &ServiceMetrics) -> Result<()> {
    let grouped = &metrics.by_process_mode;
    let lead = |process: Option<&str>, mode: Option<i64>| {
        format!("{:<40} {:>6}", process.unwrap_or(""), mode.unwrap_or(-1))
    };
    if !grouped.response_time.is_empty() {
        writeln!(out, "RESPONSE TIME BY PROCESS × MODE")?;
        writeln!(out, "{}", "=".repeat(32))?;
        writeln!(
            out,
            "{:<40} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "Process Name", "Mode", "Avg (s)", "P50 (s)", "Min (s)", "Max (s)", "Std", "N"
        )?;
        writeln!(out, "{}", "-".repeat(120))?;
        for row in &grouped.response_time {
            write_rt_row(out, &lead(row.key.process.as_deref(), row.key.mode), row)?;
        }
        writeln!(out)?;
    }
    if !grouped.llm_cost.is_empty() {
        writeln!(out, "LLM COST BY PROCESS × MODE")?;
        writeln!(out, "{}", "=".repeat(27))?;
        writeln!(
            out,
            "{:<40} {:>6} {:>10} {:>10} {:>10} {:>10} {:>12} {:>8}",
            "Process Name", "Mode", "Avg ($)", "Median", "Min", "Max", "Total ($)", "N"
        )?;
        writeln!(out, "{}", "-".repeat(125))?;
        for row in &grouped.llm_cost {
            write_cost_row(out, &lead(row.key.process.as_deref(), row.key.mode), row)?;
        }
        writeln!(out)?;
    }
    if !grouped.failures.is_empty() {
        writeln!(out, "FAILURE RATE (ERROR COUNTS) BY PROCESS × MODE")?;
        writeln!(out, "{}", "=".repeat(45))?;
        writeln!(
            out,
            "{:<40} {:>6} {:>8} {:>16} {:>8} {:>10}",
            "Process Name", "Mode", "Error", "Success (Info)", "Total", "Failure %"
        )?;
        writeln!(out, "{}", "-".repeat(135))?;
        for row in &grouped.failures {
            write_failure_row(out, &lead(row.key.process.as_deref(), row.key.mode), row)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

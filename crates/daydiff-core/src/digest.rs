use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::charts::existing_charts;
use crate::error::Result;
use crate::metrics::{GroupKey, Percentiles};
use crate::status::{MetricKind, StatusLabel};

static DAILY_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"daily_analysis_(\d+-\d+)_vs_(\d+-\d+)\.txt").expect("valid regex"));
static COMPARISON_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Comparison:\s+(\d{4}-\d{2}-\d{2})\s+→\s+(\d{4}-\d{2}-\d{2})").expect("valid regex")
});
static VALUE_AFTER_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s*\$?([\d,]*\.?\d+)").expect("valid regex"));

static SERVICE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^SERVICE NAME:\s*(.+)$").expect("valid regex"));
static RECORDS_ANALYZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Records Analyzed\s+([0-9,]+)").expect("valid regex"));
static RECORDS_WITH_COST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Records with Cost\s+([0-9,]+)").expect("valid regex"));
static ERROR_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"error \(Failure\)\s+([\d,]+)\s+([0-9.]+)%").expect("valid regex"));
static SUCCESS_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"info \(Success\)\s+([\d,]+)\s+([0-9.]+)%").expect("valid regex"));
static TOTAL_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Total\s+([\d,]+)\s+100\.00%").expect("valid regex"));
static CATEGORY_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)ERROR TYPE CATEGORIES\n=+\n.*?\n-+\n(.*?)\n\nTotal error categories:")
        .expect("valid regex")
});
static MESSAGE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)DETAILED ERROR BREAKDOWN\n=+\n.*?\n-+\n(.*?)\n\nTotal unique error")
        .expect("valid regex")
});

/// One metric section of a daily summary. Values are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestMetric {
    pub kind: MetricKind,
    pub previous_value: Option<f64>,
    pub current_value: Option<f64>,
    pub change: Option<String>,
    pub status: Option<String>,
}

impl DigestMetric {
    fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            previous_value: None,
            current_value: None,
            change: None,
            status: None,
        }
    }

    pub fn status_label(&self) -> Option<StatusLabel> {
        self.status
            .as_deref()
            .and_then(|status| StatusLabel::try_from(status).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyDigest {
    pub service: String,
    /// `DD-MM` of the older date.
    pub previous_label: String,
    /// `DD-MM` of the newer date.
    pub current_label: String,
    pub metrics: Vec<DigestMetric>,
}

impl DailyDigest {
    /// Grouping key shared by every service compared over the same dates.
    pub fn pair_key(&self) -> String {
        format!("{}_vs_{}", self.previous_label, self.current_label)
    }

    /// (month1, day1, month2, day2) for chronological ordering.
    pub fn sort_key(&self) -> (u32, u32, u32, u32) {
        let (d1, m1) = day_month(&self.previous_label);
        let (d2, m2) = day_month(&self.current_label);
        (m1, d1, m2, d2)
    }

    pub fn get(&self, kind: MetricKind) -> Option<&DigestMetric> {
        self.metrics.iter().find(|metric| metric.kind == kind)
    }
}

fn day_month(label: &str) -> (u32, u32) {
    let mut parts = label.split('-').map(|part| part.parse::<u32>().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

fn display_label(iso: &str) -> String {
    match NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        Ok(date) => date.format("%d-%m").to_string(),
        Err(_) => iso.to_string(),
    }
}

/// Reads a daily summary from disk; `None` when the file name is not a daily summary.
pub fn read_daily_summary(path: &Path) -> Result<Option<DailyDigest>> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let service = path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content = std::fs::read_to_string(path)?;
    Ok(parse_daily_summary(&service, &file_name, &content))
}

pub fn parse_daily_summary(service: &str, file_name: &str, content: &str) -> Option<DailyDigest> {
    let names = DAILY_FILE_NAME.captures(file_name)?;
    let mut previous_label = names[1].to_string();
    let mut current_label = names[2].to_string();

    let comparison = COMPARISON_LINE
        .captures(content)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()));
    if let Some((previous, current)) = &comparison {
        previous_label = display_label(previous);
        current_label = display_label(current);
    }

    let metrics = content
        .split("\n\n")
        .filter_map(|section| {
            let kind = MetricKind::ALL
                .into_iter()
                .find(|kind| section.contains(&format!("{} Metric", kind.title())))?;
            Some(parse_section(kind, section, comparison.as_ref()))
        })
        .collect();

    Some(DailyDigest {
        service: service.to_string(),
        previous_label,
        current_label,
        metrics,
    })
}

fn parse_section(kind: MetricKind, section: &str, dates: Option<&(String, String)>) -> DigestMetric {
    let mut metric = DigestMetric::new(kind);
    for line in section.lines() {
        let line = line.trim();
        if line.starts_with("Comparison:") {
            continue;
        }
        let is_previous = dates.is_some_and(|(previous, _)| line.contains(previous.as_str()))
            || line.contains("Yesterday's");
        let is_current = dates.is_some_and(|(_, current)| line.contains(current.as_str()))
            || line.contains("Today's");

        if (is_previous || is_current) && line.contains(':') {
            let value = extract_value(line);
            if is_previous {
                metric.previous_value = value;
            } else {
                metric.current_value = value;
            }
        } else if let Some(rest) = line.split_once("Change ($):").map(|(_, rest)| rest) {
            metric.change = Some(rest.trim().to_string());
        } else if let Some(rest) = line.split_once("Change:").map(|(_, rest)| rest) {
            metric.change = Some(rest.trim().to_string());
        } else if let Some(rest) = line.split_once("Status:").map(|(_, rest)| rest) {
            metric.status = Some(rest.trim().to_string());
        }
    }
    metric
}

fn extract_value(line: &str) -> Option<f64> {
    let caps = VALUE_AFTER_COLON.captures(line)?;
    let value: f64 = caps[1].replace(',', "").parse().ok()?;
    Some((value * 100.0).round() / 100.0)
}

/// Statistics block of a metrics summary. Missing rows stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsDigest {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub total: Option<f64>,
    pub records: Option<usize>,
    /// `(level, value)` for every `P<level> Time` row present.
    pub percentiles: Vec<(u32, f64)>,
}

impl StatsDigest {
    pub fn percentile(&self, level: u32) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|(candidate, _)| *candidate == level)
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusDigest {
    pub errors: usize,
    pub error_pct: f64,
    pub success: usize,
    pub success_pct: f64,
    pub total: usize,
}

/// Response time row of a grouped table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingRow {
    pub key: GroupKey,
    pub avg: f64,
    pub p50: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    pub count: usize,
}

/// LLM cost row of a grouped table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostRow {
    pub key: GroupKey,
    pub avg: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRow {
    pub key: GroupKey,
    pub errors: usize,
    pub info: usize,
    pub total: usize,
    pub failure_pct: f64,
}

/// The three tables written for one grouping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedDigest {
    pub response_time: Vec<TimingRow>,
    pub llm_cost: Vec<CostRow>,
    pub failures: Vec<FailureRow>,
}

impl GroupedDigest {
    pub fn is_empty(&self) -> bool {
        self.response_time.is_empty() && self.llm_cost.is_empty() && self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsDigest {
    pub service: String,
    pub source: PathBuf,
    pub response_time: Option<StatsDigest>,
    pub llm_cost: Option<StatsDigest>,
    pub status: Option<StatusDigest>,
    pub error_categories: Vec<(String, usize)>,
    pub error_messages: Vec<(String, usize)>,
    pub by_process: GroupedDigest,
    pub by_mode: GroupedDigest,
    pub by_process_mode: GroupedDigest,
    /// Chart images found next to the summary, in report order.
    pub charts: Vec<PathBuf>,
}

pub fn read_metrics_summary(path: &Path) -> Result<MetricsDigest> {
    let content = std::fs::read_to_string(path)?;
    let fallback = path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut digest = parse_metrics_summary(&content, &fallback);
    digest.source = path.to_path_buf();
    if let Some(dir) = path.parent() {
        digest.charts = existing_charts(dir);
    }
    Ok(digest)
}

/// `fallback_service` is used when the `SERVICE NAME:` header is missing.
pub fn parse_metrics_summary(content: &str, fallback_service: &str) -> MetricsDigest {
    let service = SERVICE_NAME
        .captures(content)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| {
            debug!(fallback = fallback_service, "no service header in metrics summary");
            fallback_service.to_string()
        });

    let response_time = StatsDigest {
        avg: seconds(content, "Avg Time Taken"),
        min: seconds(content, "Min Time Taken"),
        max: seconds(content, "Max Time Taken"),
        median: seconds(content, "Median Time"),
        std: seconds(content, "Std Deviation"),
        total: None,
        records: count(&RECORDS_ANALYZED, content),
        percentiles: Percentiles::LEVELS
            .iter()
            .filter_map(|level| seconds(content, &format!("P{level} Time")).map(|value| (*level, value)))
            .collect(),
    };
    let llm_cost = StatsDigest {
        avg: dollars(content, "Avg LLM Cost"),
        min: dollars(content, "Min LLM Cost"),
        max: dollars(content, "Max LLM Cost"),
        median: dollars(content, "Median Cost"),
        std: None,
        total: dollars(content, "Total LLM Cost"),
        records: count(&RECORDS_WITH_COST, content),
        percentiles: Vec::new(),
    };

    let status = match (
        ERROR_ROW.captures(content),
        SUCCESS_ROW.captures(content),
        TOTAL_ROW.captures(content),
    ) {
        (Some(error), Some(success), Some(total)) => Some(StatusDigest {
            errors: parse_count(&error[1]).unwrap_or(0),
            error_pct: error[2].parse().unwrap_or(0.0),
            success: parse_count(&success[1]).unwrap_or(0),
            success_pct: success[2].parse().unwrap_or(0.0),
            total: parse_count(&total[1]).unwrap_or(0),
        }),
        _ => None,
    };

    MetricsDigest {
        service,
        source: PathBuf::new(),
        response_time: (response_time.avg.is_some()).then_some(response_time),
        llm_cost: (llm_cost.avg.is_some() || llm_cost.total.is_some()).then_some(llm_cost),
        status,
        error_categories: counted_rows(&CATEGORY_BLOCK, content),
        error_messages: counted_rows(&MESSAGE_BLOCK, content),
        by_process: grouped_digest(content, Grouping::Process),
        by_mode: grouped_digest(content, Grouping::Mode),
        by_process_mode: grouped_digest(content, Grouping::ProcessMode),
        charts: Vec::new(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Grouping {
    Process,
    Mode,
    ProcessMode,
}

impl Grouping {
    fn stats_title(self) -> &'static str {
        match self {
            Grouping::Process => "PROCESS",
            Grouping::Mode => "EFFECTIVE MODE",
            Grouping::ProcessMode => "PROCESS × MODE",
        }
    }

    fn failure_title(self) -> &'static str {
        match self {
            Grouping::Process => "PROCESS",
            Grouping::Mode => "MODE",
            Grouping::ProcessMode => "PROCESS × MODE",
        }
    }

    /// Leading (non-numeric) cells of a row: `process...`, `mode name...`, or `process... mode`.
    fn key(self, lead: &[&str]) -> Option<GroupKey> {
        match self {
            Grouping::Process => {
                let process = lead.join(" ");
                (!process.is_empty()).then_some(GroupKey {
                    process: Some(process),
                    mode: None,
                })
            }
            Grouping::Mode => Some(GroupKey {
                process: None,
                mode: Some(lead.first()?.parse().ok()?),
            }),
            Grouping::ProcessMode => {
                let (mode, process) = lead.split_last()?;
                let process = process.join(" ");
                if process.is_empty() {
                    return None;
                }
                Some(GroupKey {
                    process: Some(process),
                    mode: Some(mode.parse().ok()?),
                })
            }
        }
    }
}

fn grouped_digest(content: &str, grouping: Grouping) -> GroupedDigest {
    let timing_title = format!("RESPONSE TIME BY {}", grouping.stats_title());
    let cost_title = format!("LLM COST BY {}", grouping.stats_title());
    let failure_title = format!("FAILURE RATE (ERROR COUNTS) BY {}", grouping.failure_title());

    GroupedDigest {
        response_time: table_rows(content, &timing_title, grouping, 6)
            .into_iter()
            .map(|(key, v)| TimingRow {
                key,
                avg: v[0],
                p50: v[1],
                min: v[2],
                max: v[3],
                std: v[4],
                count: v[5] as usize,
            })
            .collect(),
        llm_cost: table_rows(content, &cost_title, grouping, 6)
            .into_iter()
            .map(|(key, v)| CostRow {
                key,
                avg: v[0],
                median: v[1],
                min: v[2],
                max: v[3],
                total: v[4],
                count: v[5] as usize,
            })
            .collect(),
        failures: table_rows(content, &failure_title, grouping, 4)
            .into_iter()
            .map(|(key, v)| FailureRow {
                key,
                errors: v[0] as usize,
                info: v[1] as usize,
                total: v[2] as usize,
                failure_pct: v[3],
            })
            .collect(),
    }
}

/// Data rows of the table under `title`: the last `numeric` cells must be numbers and
/// the cells before them must form a key. Header, rule and summary rows drop out.
fn table_rows(content: &str, title: &str, grouping: Grouping, numeric: usize) -> Vec<(GroupKey, Vec<f64>)> {
    let pattern = format!(r"(?ms)^{}\n=+\n(.*?)(?:\n\n|\z)", regex::escape(title));
    let block = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            warn!(%err, title, "could not build table pattern");
            return Vec::new();
        }
    };
    let Some(caps) = block.captures(content) else {
        return Vec::new();
    };

    caps[1]
        .lines()
        .filter_map(|line| {
            let cells: Vec<&str> = line.split_whitespace().collect();
            let split = cells.len().checked_sub(numeric).filter(|lead| *lead > 0)?;
            let (lead, tail) = cells.split_at(split);
            let values = tail
                .iter()
                .map(|cell| cell.trim_end_matches('%').replace(',', "").parse::<f64>().ok())
                .collect::<Option<Vec<f64>>>()?;
            Some((grouping.key(lead)?, values))
        })
        .collect()
}

fn labelled_number(content: &str, label: &str, unit_prefix: &str, unit_suffix: &str) -> Option<f64> {
    let pattern = format!(
        r"{}\s+{}([0-9.]+){}",
        regex::escape(label),
        regex::escape(unit_prefix),
        unit_suffix
    );
    match Regex::new(&pattern) {
        Ok(re) => re.captures(content)?[1].parse().ok(),
        Err(err) => {
            warn!(%err, label, "could not build summary pattern");
            None
        }
    }
}

fn seconds(content: &str, label: &str) -> Option<f64> {
    labelled_number(content, label, "", r"\s*s")
}

fn dollars(content: &str, label: &str) -> Option<f64> {
    labelled_number(content, label, "$", "")
}

fn parse_count(text: &str) -> Option<usize> {
    text.replace(',', "").parse().ok()
}

fn count(re: &Regex, content: &str) -> Option<usize> {
    parse_count(&re.captures(content)?[1])
}

/// Rows of `<label>   <count>`; the count is the last whitespace-separated token.
fn counted_rows(block: &Regex, content: &str) -> Vec<(String, usize)> {
    let Some(caps) = block.captures(content) else {
        return Vec::new();
    };
    caps[1]
        .lines()
        .filter_map(|line| {
            let line = line.trim_end();
            let (label, count) = line.rsplit_once(char::is_whitespace)?;
            let count = count.parse::<usize>().ok()?;
            let label = label.trim();
            (!label.is_empty()).then(|| (label.to_string(), count))
        })
        .collect()
}

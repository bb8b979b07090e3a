use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::preprocess::{canonical, TelemetryFrame};

const MODE_NAMES: [(i64, &str); 16] = [
    (0, "UnresolvedRedirect"),
    (1, "isDocument"),
    (2, "isInternet"),
    (3, "isDatabase"),
    (4, "isDirectTaxCode"),
    (5, "isGlobal"),
    (6, "isHarvey"),
    (7, "isDatabaseGeneric"),
    (8, "isNLP"),
    (9, "isDeepResearch"),
    (10, "isDraft"),
    (11, "isAutoMode"),
    (12, "isMultipleDbGeneric"),
    (13, "isDatabaseGenericVersion2"),
    (14, "isDatabaseGenericLite"),
    (15, "isDeepResearchWebSearch"),
];

pub fn mode_name(mode: i64) -> String {
    MODE_NAMES
        .iter()
        .find(|(code, _)| *code == mode)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| mode.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ErrorCategory {
    Timeout,
    Network,
    Auth,
    NotFound,
    Validation,
    InternalServer,
    LlmService,
    QueryParameter,
    ApplicationException,
    ServiceConfiguration,
    DataFormat,
    Other,
}

/// Substring rules over the lower-cased message; the first rule that matches wins.
const CATEGORY_RULES: [(ErrorCategory, &[&str]); 11] = [
    (ErrorCategory::Timeout, &["timeout", "timed out", "time out"]),
    (ErrorCategory::Network, &["connection", "connect", "network", "socket"]),
    (ErrorCategory::Auth, &["auth", "permission", "unauthorized", "forbidden"]),
    (
        ErrorCategory::NotFound,
        &["not found", "404", "missing", "no results", "contains no results"],
    ),
    (
        ErrorCategory::Validation,
        &["invalid data payload", "validation", "invalid", "bad request", "payload"],
    ),
    (
        ErrorCategory::InternalServer,
        &["internal server error", "server error", "500"],
    ),
    (ErrorCategory::LlmService, &["litellm", "llm", "summarize_document"]),
    (
        ErrorCategory::QueryParameter,
        &["query", "params", "parameter", "filtertype"],
    ),
    (ErrorCategory::ApplicationException, &["exception", "baseexception"]),
    (ErrorCategory::ServiceConfiguration, &["model mapping", "fetch"]),
    (ErrorCategory::DataFormat, &["json", "parse", "format"]),
];

impl ErrorCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "Timeout Errors",
            ErrorCategory::Network => "Network/Connection Errors",
            ErrorCategory::Auth => "Authentication/Authorization Errors",
            ErrorCategory::NotFound => "Resource Not Found Errors",
            ErrorCategory::Validation => "Data Validation/Payload Errors",
            ErrorCategory::InternalServer => "Internal Server Errors",
            ErrorCategory::LlmService => "LLM Service Errors",
            ErrorCategory::QueryParameter => "Query/Parameter Errors",
            ErrorCategory::ApplicationException => "Application Exception Errors",
            ErrorCategory::ServiceConfiguration => "Service Configuration Errors",
            ErrorCategory::DataFormat => "Data Format Errors",
            ErrorCategory::Other => "Other/Uncategorized Errors",
        }
    }

    pub fn categorize(message: &str) -> Self {
        let lowered = message.to_lowercase();
        CATEGORY_RULES
            .iter()
            .find(|(_, needles)| needles.iter().any(|needle| lowered.contains(needle)))
            .map(|(category, _)| *category)
            .unwrap_or(ErrorCategory::Other)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Value at quantile `q` (0..=1) of ascending `sorted`, interpolating linearly
/// between the two closest ranks. `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let position = q.clamp(0.0, 1.0) * last as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    pub const LEVELS: [u32; 5] = [50, 75, 90, 95, 99];

    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let at = |level: u32| quantile(sorted, f64::from(level) / 100.0);
        Some(Self {
            p50: at(50)?,
            p75: at(75)?,
            p90: at(90)?,
            p95: at(95)?,
            p99: at(99)?,
        })
    }

    /// `(level, value)` pairs in ascending level order.
    pub fn levels(&self) -> [(u32, f64); 5] {
        [
            (50, self.p50),
            (75, self.p75),
            (90, self.p90),
            (95, self.p95),
            (99, self.p99),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; 0 when fewer than two values.
    pub std: f64,
    pub total: f64,
    pub count: usize,
    pub percentiles: Percentiles,
}

impl SummaryStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let total: f64 = values.iter().sum();
        let mean = total / count as f64;

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let percentiles = Percentiles::from_sorted(&sorted)?;

        let std = if count < 2 {
            0.0
        } else {
            let variance = values
                .iter()
                .map(|value| (value - mean).powi(2))
                .sum::<f64>()
                / (count - 1) as f64;
            variance.sqrt()
        };

        Some(Self {
            mean,
            median: percentiles.p50,
            min: sorted[0],
            max: sorted[count - 1],
            std,
            total,
            count,
            percentiles,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusAnalysis {
    pub original_total: usize,
    pub processed_total: usize,
    pub success: usize,
    pub errors: usize,
    pub success_rate: f64,
    pub error_rate: f64,
}

/// Grouping key for the per-process and per-mode tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub process: Option<String>,
    pub mode: Option<i64>,
}

impl GroupKey {
    pub fn mode_name(&self) -> Option<String> {
        self.mode.map(mode_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub key: GroupKey,
    pub stats: SummaryStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureCounts {
    pub key: GroupKey,
    pub errors: usize,
    pub info: usize,
}

impl FailureCounts {
    pub fn total(&self) -> usize {
        self.errors + self.info
    }

    pub fn failure_pct(&self) -> f64 {
        percent(self.errors, self.total())
    }
}

/// Grouped tables for one grouping (process, mode, or process × mode).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedMetrics {
    pub response_time: Vec<GroupStats>,
    pub llm_cost: Vec<GroupStats>,
    pub failures: Vec<FailureCounts>,
}

impl GroupedMetrics {
    pub fn is_empty(&self) -> bool {
        self.response_time.is_empty() && self.llm_cost.is_empty() && self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceMetrics {
    pub status: Option<StatusAnalysis>,
    /// Distinct error messages, most frequent first.
    pub error_breakdown: Vec<(String, usize)>,
    pub error_categories: Vec<(ErrorCategory, usize)>,
    pub response_time: Option<SummaryStats>,
    pub llm_cost: Option<SummaryStats>,
    pub by_process: GroupedMetrics,
    pub by_mode: GroupedMetrics,
    pub by_process_mode: GroupedMetrics,
}

impl ServiceMetrics {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.response_time.is_none()
            && self.llm_cost.is_none()
            && self.by_process.is_empty()
            && self.by_mode.is_empty()
            && self.by_process_mode.is_empty()
    }
}

pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn compute_metrics(frame: &TelemetryFrame) -> Result<ServiceMetrics> {
    let processed_total = frame.height();
    let statuses = frame.strings(canonical::STATUS)?;
    let messages = frame.strings(canonical::MESSAGE)?;
    let response_times = frame.floats(canonical::RESPONSE_TIME)?;
    let costs = frame.floats(canonical::LLM_COST)?;
    let processes = frame.strings(canonical::PROCESS_NAME)?;
    let modes = frame.modes()?;

    let mut metrics = ServiceMetrics::default();

    if let Some(statuses) = &statuses {
        let success = statuses.iter().filter(|s| **s == Some("info")).count();
        let errors = statuses.iter().filter(|s| **s == Some("error")).count();
        metrics.status = Some(StatusAnalysis {
            original_total: frame.report.original_rows,
            processed_total,
            success,
            errors,
            success_rate: percent(success, processed_total),
            error_rate: percent(errors, processed_total),
        });
        info!(
            processed = processed_total,
            errors,
            success,
            "status analysis"
        );

        if let Some(messages) = messages.as_ref().filter(|_| errors > 0) {
            let error_messages: Vec<&str> = statuses
                .iter()
                .zip(messages.iter())
                .filter(|(status, _)| **status == Some("error"))
                .filter_map(|(_, message)| *message)
                .collect();
            metrics.error_breakdown = count_ordered(error_messages.iter().map(|m| m.to_string()));
            metrics.error_categories =
                count_ordered(error_messages.iter().map(|m| ErrorCategory::categorize(m)));
            info!(
                messages = metrics.error_breakdown.len(),
                categories = metrics.error_categories.len(),
                "error breakdown"
            );
        }
    }

    if let Some(values) = &response_times {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        metrics.response_time = SummaryStats::from_values(&present);
    }
    if let Some(values) = &costs {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        metrics.llm_cost = SummaryStats::from_values(&present);
    }

    let inputs = GroupInputs {
        response_times: response_times.as_deref(),
        costs: costs.as_deref(),
        statuses: statuses.as_deref(),
    };

    if let Some(processes) = &processes {
        let keys: Vec<Option<GroupKey>> = processes
            .iter()
            .map(|process| {
                process.map(|name| GroupKey {
                    process: Some(name.to_string()),
                    mode: None,
                })
            })
            .collect();
        metrics.by_process = grouped(&keys, &inputs);
    }

    if let Some(modes) = &modes {
        let keys: Vec<Option<GroupKey>> = modes
            .iter()
            .map(|mode| {
                mode.map(|mode| GroupKey {
                    process: None,
                    mode: Some(mode),
                })
            })
            .collect();
        metrics.by_mode = grouped(&keys, &inputs);
    }

    if let (Some(processes), Some(modes)) = (&processes, &modes) {
        let keys: Vec<Option<GroupKey>> = processes
            .iter()
            .zip(modes.iter())
            .map(|(process, mode)| match (process, mode) {
                (Some(name), Some(mode)) => Some(GroupKey {
                    process: Some(name.to_string()),
                    mode: Some(*mode),
                }),
                _ => None,
            })
            .collect();
        let mut combined = grouped(&keys, &inputs);
        // combined tables keep key order rather than sorting by value
        combined.response_time.sort_by(|a, b| a.key.cmp(&b.key));
        combined.llm_cost.sort_by(|a, b| a.key.cmp(&b.key));
        metrics.by_process_mode = combined;
    }

    Ok(metrics)
}

struct GroupInputs<'a> {
    response_times: Option<&'a [Option<f64>]>,
    costs: Option<&'a [Option<f64>]>,
    statuses: Option<&'a [Option<&'a str>]>,
}

/// Response time sorted by mean ascending, cost by total descending, failures by key.
fn grouped(keys: &[Option<GroupKey>], inputs: &GroupInputs<'_>) -> GroupedMetrics {
    let mut result = GroupedMetrics::default();

    if let Some(values) = inputs.response_times {
        result.response_time = group_stats(keys, values);
        result
            .response_time
            .sort_by(|a, b| a.stats.mean.total_cmp(&b.stats.mean));
    }
    if let Some(values) = inputs.costs {
        result.llm_cost = group_stats(keys, values);
        result
            .llm_cost
            .sort_by(|a, b| b.stats.total.total_cmp(&a.stats.total));
    }
    if let Some(statuses) = inputs.statuses {
        let mut counts: BTreeMap<GroupKey, (usize, usize)> = BTreeMap::new();
        for (key, status) in keys.iter().zip(statuses.iter()) {
            let (Some(key), Some(status)) = (key, status) else {
                continue;
            };
            let entry = counts.entry(key.clone()).or_insert((0, 0));
            match *status {
                "error" => entry.0 += 1,
                "info" => entry.1 += 1,
                _ => {}
            }
        }
        result.failures = counts
            .into_iter()
            .map(|(key, (errors, info))| FailureCounts { key, errors, info })
            .collect();
    }

    result
}

fn group_stats(keys: &[Option<GroupKey>], values: &[Option<f64>]) -> Vec<GroupStats> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for (key, value) in keys.iter().zip(values.iter()) {
        if let (Some(key), Some(value)) = (key, value) {
            groups.entry(key.clone()).or_default().push(*value);
        }
    }
    groups
        .into_iter()
        .filter_map(|(key, values)| {
            SummaryStats::from_values(&values).map(|stats| GroupStats { key, stats })
        })
        .collect()
}

/// Counts occurrences; most frequent first, ties in order of first appearance.
fn count_ordered<T, I>(items: I) -> Vec<(T, usize)>
where
    T: Eq + std::hash::Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut order: Vec<T> = Vec::new();
    let mut counts: HashMap<T, usize> = HashMap::new();
    for item in items {
        let count = counts.entry(item.clone()).or_insert(0);
        if *count == 0 {
            order.push(item);
        }
        *count += 1;
    }
    let mut ordered: Vec<(T, usize)> = order
        .into_iter()
        .map(|item| {
            let count = counts.get(&item).copied().unwrap_or(0);
            (item, count)
        })
        .collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1));
    ordered
}

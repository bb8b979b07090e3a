use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::error::{AnalysisError, Result};
use crate::metrics::percent;
use crate::preprocess::{canonical, parse_timestamp, TelemetryFrame};
use crate::status::{dominant_trend, MetricKind, StatusLabel, Thresholds};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub total_requests: usize,
    pub unique_users: usize,
    pub avg_response_time: f64,
    pub success_rate: f64,
    pub total_llm_cost: f64,
}

impl DailyMetrics {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_requests: 0,
            unique_users: 0,
            avg_response_time: 0.0,
            success_rate: 0.0,
            total_llm_cost: 0.0,
        }
    }

    pub fn value(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Latency => self.avg_response_time,
            MetricKind::Throughput => self.total_requests as f64,
            MetricKind::LlmCost => self.total_llm_cost,
            MetricKind::Reliability => self.success_rate,
            MetricKind::UserActivity => self.unique_users as f64,
        }
    }
}

/// Per-date metrics keyed by calendar date. Empty when the frame has no dates.
pub fn daily_metrics(frame: &TelemetryFrame) -> Result<BTreeMap<NaiveDate, DailyMetrics>> {
    let Some(dates) = frame.strings(canonical::FORMATTED_DATE)? else {
        return Ok(BTreeMap::new());
    };
    let response_times = frame.floats(canonical::RESPONSE_TIME)?;
    let costs = frame.floats(canonical::LLM_COST)?;
    let statuses = frame.strings(canonical::STATUS)?;
    let users = frame.strings(canonical::USER_ID)?;

    let mut rows_by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (idx, date) in dates.iter().enumerate() {
        if let Some(date) = date.and_then(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()) {
            rows_by_date.entry(date).or_default().push(idx);
        }
    }

    let mut daily = BTreeMap::new();
    for (date, rows) in rows_by_date {
        let mut metrics = DailyMetrics::empty(date);
        metrics.total_requests = rows.len();

        if let Some(values) = &response_times {
            let present: Vec<f64> = rows.iter().filter_map(|&idx| values[idx]).collect();
            if !present.is_empty() {
                metrics.avg_response_time = present.iter().sum::<f64>() / present.len() as f64;
            }
        }
        if let Some(values) = &costs {
            metrics.total_llm_cost = rows.iter().filter_map(|&idx| values[idx]).sum();
        }
        if let Some(values) = &statuses {
            let success = rows
                .iter()
                .filter(|&&idx| values[idx] == Some("info"))
                .count();
            metrics.success_rate = percent(success, rows.len());
        }
        if let Some(values) = &users {
            let distinct: HashSet<&str> = rows.iter().filter_map(|&idx| values[idx]).collect();
            metrics.unique_users = distinct.len();
        }

        daily.insert(date, metrics);
    }

    Ok(daily)
}

/// A requested comparison pair, as typed on the command line (`A,B`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareSpec {
    pub previous: String,
    pub current: String,
}

impl FromStr for CompareSpec {
    type Err = AnalysisError;

    fn from_str(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [previous, current] if !previous.is_empty() && !current.is_empty() => Ok(Self {
                previous: previous.to_string(),
                current: current.to_string(),
            }),
            _ => Err(AnalysisError::DateSelection(format!(
                "expected two dates separated by a comma, got '{value}'"
            ))),
        }
    }
}

/// `dd/mm` picks the latest year present in `available`; anything else must be a
/// full date that exists in `available`.
pub fn resolve_date_token(token: &str, available: &[NaiveDate]) -> Option<NaiveDate> {
    let token = token.trim();
    if token.contains('/') && !token.contains('-') {
        let (day, month) = token.split_once('/')?;
        let day: u32 = day.trim().parse().ok()?;
        let month: u32 = month.trim().parse().ok()?;
        return available
            .iter()
            .filter(|date| date.day() == day && date.month() == month)
            .max()
            .copied();
    }

    let date = parse_timestamp(token)?.date();
    available.contains(&date).then_some(date)
}

/// Chooses the (previous, current) dates: the requested pair, or the last two dates.
pub fn select_dates(
    available: &[NaiveDate],
    compare: Option<&CompareSpec>,
) -> Result<(NaiveDate, NaiveDate)> {
    if available.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "need at least 2 days of data for daily analysis, found {}",
            available.len()
        )));
    }

    match compare {
        Some(spec) => {
            let previous = resolve_date_token(&spec.previous, available);
            let current = resolve_date_token(&spec.current, available);
            match (previous, current) {
                (Some(previous), Some(current)) => Ok((previous, current)),
                _ => Err(AnalysisError::DateSelection(format!(
                    "requested dates {},{} not found in data",
                    spec.previous, spec.current
                ))),
            }
        }
        None => Ok((available[available.len() - 2], available[available.len() - 1])),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub kind: MetricKind,
    pub previous: f64,
    pub current: f64,
    pub change: f64,
    /// Relative change in percent; 0 when the previous value is not positive.
    pub percent: f64,
    pub status: StatusLabel,
}

impl MetricComparison {
    pub fn new(kind: MetricKind, previous: f64, current: f64, thresholds: &Thresholds) -> Self {
        let change = current - previous;
        let percent = if previous > 0.0 {
            change / previous * 100.0
        } else {
            0.0
        };
        Self {
            kind,
            previous,
            current,
            change,
            percent,
            status: thresholds.classify(kind, change, percent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyComparison {
    pub previous_date: NaiveDate,
    pub current_date: NaiveDate,
    pub metrics: Vec<MetricComparison>,
}

impl DailyComparison {
    pub fn get(&self, kind: MetricKind) -> Option<&MetricComparison> {
        self.metrics.iter().find(|metric| metric.kind == kind)
    }
}

pub fn compare_days(
    previous: &DailyMetrics,
    current: &DailyMetrics,
    thresholds: &Thresholds,
) -> DailyComparison {
    let metrics = MetricKind::ALL
        .into_iter()
        .map(|kind| {
            MetricComparison::new(kind, previous.value(kind), current.value(kind), thresholds)
        })
        .collect();
    DailyComparison {
        previous_date: previous.date,
        current_date: current.date,
        metrics,
    }
}

/// Resolves the date pair and compares it.
pub fn compare_selected(
    daily: &BTreeMap<NaiveDate, DailyMetrics>,
    compare: Option<&CompareSpec>,
    thresholds: &Thresholds,
) -> Result<DailyComparison> {
    let available: Vec<NaiveDate> = daily.keys().copied().collect();
    let (previous, current) = select_dates(&available, compare)?;
    info!(%previous, %current, days = available.len(), "comparing days");

    match (daily.get(&previous), daily.get(&current)) {
        (Some(previous), Some(current)) => Ok(compare_days(previous, current, thresholds)),
        _ => Err(AnalysisError::DateSelection(format!(
            "no metrics for {previous} or {current}"
        ))),
    }
}

/// Every consecutive pair of dates, oldest first.
pub fn consecutive_comparisons(
    daily: &BTreeMap<NaiveDate, DailyMetrics>,
    thresholds: &Thresholds,
) -> Vec<DailyComparison> {
    let days: Vec<&DailyMetrics> = daily.values().collect();
    days.windows(2)
        .map(|pair| compare_days(pair[0], pair[1], thresholds))
        .collect()
}

/// Dominant status per metric over a run of comparisons.
pub fn trend_summary(comparisons: &[DailyComparison]) -> Vec<(MetricKind, StatusLabel)> {
    MetricKind::ALL
        .into_iter()
        .map(|kind| {
            let labels: Vec<StatusLabel> = comparisons
                .iter()
                .filter_map(|comparison| comparison.get(kind).map(|metric| metric.status))
                .collect();
            (kind, dominant_trend(&labels))
        })
        .collect()
}

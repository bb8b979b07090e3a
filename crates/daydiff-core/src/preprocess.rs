use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::columns::{numeric_values, text_values, ColumnMapping, ColumnRole};
use crate::config::PreprocessSettings;
use crate::error::Result;

/// Column names of the canonical frame produced by [`preprocess`].
pub mod canonical {
    pub const SOURCE_ROW: &str = "source_row";
    pub const SERVICE: &str = "service";
    pub const FORMATTED_DATE: &str = "formatted_date";
    pub const STATUS: &str = "status";
    pub const RESPONSE_TIME: &str = "response_time";
    pub const USER_ID: &str = "user_id";
    pub const LLM_COST: &str = "llm_cost";
    pub const MESSAGE: &str = "message";
    pub const PROCESS_NAME: &str = "process_name";
    pub const EFFECTIVE_MODE: &str = "effective_mode";
}

const DATETIME_FORMATS: [&str; 10] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%b %d, %Y @ %H:%M:%S%.f",
    "%b %d %Y %H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%b %d, %Y"];

/// Excel serial dates outside this range are not treated as dates.
const EXCEL_SERIAL_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2_958_465.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreprocessReport {
    pub original_rows: usize,
    pub original_columns: usize,
    pub dropped_columns: Vec<String>,
    pub blank_service_removed: usize,
    pub invalid_date_removed: usize,
    pub weekend_removed: usize,
    pub status_removed: usize,
    pub response_time_removed: usize,
    pub final_rows: usize,
}

impl PreprocessReport {
    pub fn removed_rows(&self) -> usize {
        self.original_rows.saturating_sub(self.final_rows)
    }

    pub fn removed_pct(&self) -> f64 {
        if self.original_rows == 0 {
            0.0
        } else {
            self.removed_rows() as f64 / self.original_rows as f64 * 100.0
        }
    }
}

/// Cleaned telemetry in canonical column names, plus the mapping that survived cleaning.
#[derive(Debug, Clone)]
pub struct TelemetryFrame {
    pub df: DataFrame,
    pub mapping: ColumnMapping,
    pub report: PreprocessReport,
}

impl TelemetryFrame {
    pub fn has(&self, column: &str) -> bool {
        self.df.column(column).is_ok()
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Most frequent non-blank service value; ties go to the value seen first.
    pub fn dominant_service(&self) -> Result<Option<String>> {
        if !self.has(canonical::SERVICE) {
            return Ok(None);
        }
        let values = self.df.column(canonical::SERVICE)?.str()?;
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (idx, value) in values.into_iter().enumerate() {
            let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            counts.entry(value).or_insert((0, idx)).0 += 1;
        }
        Ok(counts
            .into_iter()
            .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
                count_a.cmp(count_b).then(first_b.cmp(first_a))
            })
            .map(|(value, _)| value.to_string()))
    }
}

pub fn preprocess(
    raw: &DataFrame,
    mapping: &ColumnMapping,
    settings: &PreprocessSettings,
) -> Result<TelemetryFrame> {
    let original_rows = raw.height();
    let mut mapping = mapping.clone();

    let dropped_columns: Vec<String> = raw
        .get_columns()
        .iter()
        .filter(|column| original_rows > 0 && column.null_count() == column.len())
        .map(|column| column.name().to_string())
        .collect();
    mapping.remove_columns(&dropped_columns);
    info!(
        dropped = dropped_columns.len(),
        columns = ?dropped_columns,
        "removed all-null columns"
    );

    let mut report = PreprocessReport {
        original_rows,
        original_columns: raw.width(),
        dropped_columns,
        ..PreprocessReport::default()
    };
    let mut keep: Vec<usize> = (0..original_rows).collect();

    let services = role_text(raw, &mapping, ColumnRole::Service)?;
    if let Some(values) = &services {
        let before = keep.len();
        keep.retain(|&idx| {
            values[idx]
                .as_deref()
                .is_some_and(|value| !value.trim().is_empty())
        });
        report.blank_service_removed = before - keep.len();
        info!(removed = report.blank_service_removed, "dropped rows with blank service");
    }

    let dates = match mapping.get(ColumnRole::Date) {
        Some(name) => Some(date_values(raw, name)?),
        None => None,
    };
    if let Some(values) = &dates {
        let before = keep.len();
        keep.retain(|&idx| values[idx].is_some());
        report.invalid_date_removed = before - keep.len();

        if settings.drop_weekends {
            let before = keep.len();
            keep.retain(|&idx| {
                values[idx].is_some_and(|ts| ts.weekday().num_days_from_monday() < 5)
            });
            report.weekend_removed = before - keep.len();
        }
        info!(
            invalid_dates = report.invalid_date_removed,
            weekend_rows = report.weekend_removed,
            "applied date filters"
        );
    }

    let statuses = role_text(raw, &mapping, ColumnRole::Status)?.map(|values| {
        values
            .into_iter()
            .map(|value| value.map(|status| status.trim().to_lowercase()))
            .collect::<Vec<_>>()
    });
    if let Some(values) = &statuses {
        let allowed: Vec<String> = settings
            .keep_statuses
            .iter()
            .map(|status| status.trim().to_lowercase())
            .collect();
        let before = keep.len();
        keep.retain(|&idx| {
            values[idx]
                .as_ref()
                .is_some_and(|status| allowed.contains(status))
        });
        report.status_removed = before - keep.len();
        info!(removed = report.status_removed, keep = ?allowed, "filtered status values");
    }

    let response_times = role_numeric(raw, &mapping, ColumnRole::ResponseTime)?;
    if let Some(values) = &response_times {
        let before = keep.len();
        keep.retain(|&idx| {
            values[idx].is_some_and(|rt| (0.0..=settings.max_response_time_ms).contains(&rt))
        });
        report.response_time_removed = before - keep.len();
        info!(
            removed = report.response_time_removed,
            max_ms = settings.max_response_time_ms,
            "removed response time outliers"
        );
    }

    let mut columns: Vec<Column> = Vec::new();
    columns.push(
        Series::new(
            canonical::SOURCE_ROW.into(),
            keep.iter().map(|&idx| idx as i64).collect::<Vec<i64>>(),
        )
        .into(),
    );

    if let Some(values) = &services {
        columns.push(text_column(canonical::SERVICE, &keep, values, true));
    }
    if let Some(values) = &dates {
        let formatted: Vec<Option<String>> = keep
            .iter()
            .map(|&idx| values[idx].map(|ts| ts.format("%Y-%m-%d").to_string()))
            .collect();
        columns.push(Series::new(canonical::FORMATTED_DATE.into(), formatted).into());
    }
    if let Some(values) = &statuses {
        columns.push(text_column(canonical::STATUS, &keep, values, false));
    }
    if let Some(values) = &response_times {
        columns.push(numeric_column(canonical::RESPONSE_TIME, &keep, values));
    }
    if let Some(values) = role_text(raw, &mapping, ColumnRole::UserId)? {
        columns.push(text_column(canonical::USER_ID, &keep, &values, true));
    }
    if let Some(values) = role_numeric(raw, &mapping, ColumnRole::LlmCost)? {
        columns.push(numeric_column(canonical::LLM_COST, &keep, &values));
    }
    if let Some(values) = role_text(raw, &mapping, ColumnRole::Message)? {
        columns.push(text_column(canonical::MESSAGE, &keep, &values, false));
    }
    if let Some(values) = role_text(raw, &mapping, ColumnRole::ProcessName)? {
        columns.push(text_column(canonical::PROCESS_NAME, &keep, &values, true));
    }
    if let Some(request_modes) = role_numeric(raw, &mapping, ColumnRole::RequestMode)? {
        let redirected = role_numeric(raw, &mapping, ColumnRole::RedirectedMode)?;
        let modes: Vec<Option<i64>> = keep
            .iter()
            .map(|&idx| {
                let redirected = redirected.as_ref().and_then(|values| values[idx]);
                effective_mode(request_modes[idx], redirected)
            })
            .collect();
        columns.push(Series::new(canonical::EFFECTIVE_MODE.into(), modes).into());
        info!("computed effective_mode column");
    }

    let df = DataFrame::new(columns)?;
    report.final_rows = df.height();
    info!(
        original = report.original_rows,
        final_rows = report.final_rows,
        removed = report.removed_rows(),
        removed_pct = report.removed_pct(),
        "preprocessing complete"
    );

    Ok(TelemetryFrame {
        df,
        mapping,
        report,
    })
}

/// Request mode 11 (auto) resolves to the redirected mode when that is 2 or 7, else 0.
pub fn effective_mode(request_mode: Option<f64>, redirected_mode: Option<f64>) -> Option<i64> {
    let mode = request_mode? as i64;
    if mode != 11 {
        return Some(mode);
    }
    match redirected_mode.map(|value| value as i64) {
        Some(redirect @ (2 | 7)) => Some(redirect),
        _ => Some(0),
    }
}

pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_local());
    }
    if let Ok(parsed) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(parsed.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(text, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !EXCEL_SERIAL_RANGE.contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

fn date_values(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    let column = df.column(name)?;
    if column.dtype().is_float() || column.dtype().is_integer() {
        return Ok(numeric_values(df, name)?
            .into_iter()
            .map(|value| value.and_then(excel_serial_to_datetime))
            .collect());
    }
    Ok(text_values(df, name)?
        .into_iter()
        .map(|value| value.as_deref().and_then(parse_timestamp))
        .collect())
}

fn role_text(
    df: &DataFrame,
    mapping: &ColumnMapping,
    role: ColumnRole,
) -> Result<Option<Vec<Option<String>>>> {
    match mapping.get(role) {
        Some(name) => Ok(Some(text_values(df, name)?)),
        None => Ok(None),
    }
}

fn role_numeric(
    df: &DataFrame,
    mapping: &ColumnMapping,
    role: ColumnRole,
) -> Result<Option<Vec<Option<f64>>>> {
    match mapping.get(role) {
        Some(name) => Ok(Some(numeric_values(df, name)?)),
        None => Ok(None),
    }
}

fn text_column(name: &str, keep: &[usize], values: &[Option<String>], trim: bool) -> Column {
    let selected: Vec<Option<&str>> = keep
        .iter()
        .map(|&idx| {
            values[idx]
                .as_deref()
                .map(|value| if trim { value.trim() } else { value })
        })
        .collect();
    Series::new(name.into(), selected).into()
}

fn numeric_column(name: &str, keep: &[usize], values: &[Option<f64>]) -> Column {
    let selected: Vec<Option<f64>> = keep.iter().map(|&idx| values[idx]).collect();
    Series::new(name.into(), selected).into()
}

impl TelemetryFrame {
    pub fn strings(&self, column: &str) -> Result<Option<Vec<Option<&str>>>> {
        match self.df.column(column) {
            Ok(values) => Ok(Some(values.str()?.into_iter().collect())),
            Err(_) => Ok(None),
        }
    }

    pub fn floats(&self, column: &str) -> Result<Option<Vec<Option<f64>>>> {
        match self.df.column(column) {
            Ok(values) => Ok(Some(values.f64()?.into_iter().collect())),
            Err(_) => Ok(None),
        }
    }

    pub fn modes(&self) -> Result<Option<Vec<Option<i64>>>> {
        match self.df.column(canonical::EFFECTIVE_MODE) {
            Ok(values) => Ok(Some(values.i64()?.into_iter().collect())),
            Err(_) => Ok(None),
        }
    }
}

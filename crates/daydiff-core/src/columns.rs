use std::collections::BTreeMap;
use std::fmt;

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// The semantic roles a telemetry column can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ColumnRole {
    Date,
    Status,
    ResponseTime,
    UserId,
    LlmCost,
    Message,
    Service,
    ProcessName,
    RequestMode,
    RedirectedMode,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 10] = [
        ColumnRole::Date,
        ColumnRole::Status,
        ColumnRole::ResponseTime,
        ColumnRole::UserId,
        ColumnRole::LlmCost,
        ColumnRole::Message,
        ColumnRole::Service,
        ColumnRole::ProcessName,
        ColumnRole::RequestMode,
        ColumnRole::RedirectedMode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Date => "date",
            ColumnRole::Status => "status",
            ColumnRole::ResponseTime => "response_time",
            ColumnRole::UserId => "user_id",
            ColumnRole::LlmCost => "llm_cost",
            ColumnRole::Message => "message",
            ColumnRole::Service => "service",
            ColumnRole::ProcessName => "process_name",
            ColumnRole::RequestMode => "request_mode",
            ColumnRole::RedirectedMode => "redirected_mode",
        }
    }

    /// Substring patterns tried in order against normalized column names.
    pub fn patterns(&self) -> &'static [&'static str] {
        match self {
            ColumnRole::Date => &["date", "timestamp", "@timestamp", "time", "datetime"],
            ColumnRole::Status => &["status", "@status", "response_status", "result"],
            ColumnRole::ResponseTime => &[
                "responsetime",
                "response_time",
                "totaltimetaken",
                "total_time_taken",
                "duration",
                "elapsed",
                "time_taken",
                "timetaken",
            ],
            ColumnRole::UserId => &[
                "useruuid",
                "user_uuid",
                "uuid",
                "userid",
                "user_id",
                "clientid",
                "client_id",
            ],
            ColumnRole::LlmCost => &[
                "meta.totalllmcost",
                "totalllmcost",
                "llmcost",
                "totalcost",
                "meta_totalllmcost",
                "meta.total_llm_cost",
                "total_llm_cost",
            ],
            ColumnRole::Message => &[
                "message",
                "requestpayload.message",
                "requestpayloadmessage",
                "error_message",
                "@message",
            ],
            ColumnRole::Service => &[
                "service",
                "service_name",
                "@service",
                "servicename",
                "source",
                "source_name",
                "@source",
                "sourcename",
            ],
            ColumnRole::ProcessName => &["processname", "process_name"],
            ColumnRole::RequestMode => &[
                "requestpayloadmode",
                "request_payload_mode",
                "requestpayload.mode",
                "resquestpayloadmode",
            ],
            ColumnRole::RedirectedMode => &["redirectedmode", "redirect_mode", "redirectionmode"],
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cases and strips spaces, underscores and dots.
pub fn normalize_column_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '_' | '.'))
        .collect()
}

/// Maps each detected role to the source column that fills it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnMapping {
    roles: BTreeMap<ColumnRole, String>,
}

impl ColumnMapping {
    pub fn get(&self, role: ColumnRole) -> Option<&str> {
        self.roles.get(&role).map(String::as_str)
    }

    pub fn contains(&self, role: ColumnRole) -> bool {
        self.roles.contains_key(&role)
    }

    pub fn set(&mut self, role: ColumnRole, column: impl Into<String>) {
        self.roles.insert(role, column.into());
    }

    /// Unmaps every role that points at one of `columns`.
    pub fn remove_columns(&mut self, columns: &[String]) {
        self.roles.retain(|_, column| !columns.contains(column));
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColumnRole, &str)> {
        self.roles.iter().map(|(role, column)| (*role, column.as_str()))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

pub fn detect_columns<S: AsRef<str>>(columns: &[S]) -> ColumnMapping {
    let normalized: Vec<String> = columns
        .iter()
        .map(|column| normalize_column_name(column.as_ref()))
        .collect();
    let mut mapping = ColumnMapping::default();

    for role in ColumnRole::ALL {
        let hit = role.patterns().iter().find_map(|pattern| {
            let pattern = normalize_column_name(pattern);
            normalized
                .iter()
                .position(|column| column.contains(&pattern))
        });
        if let Some(idx) = hit {
            mapping.set(role, columns[idx].as_ref());
        }
    }

    let has = |name: &str| columns.iter().any(|column| column.as_ref() == name);
    if has("Message") && has("@Message") {
        mapping.set(ColumnRole::Message, "Message");
    }

    debug!(mapping = ?mapping.roles, "detected column roles");
    mapping
}

/// Column values as text. Whole floats are written without a fractional part.
pub(crate) fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?;
    let values = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|value| value.map(str::to_string))
            .collect(),
        dtype if dtype.is_float() => {
            let casted = column.cast(&DataType::Float64)?;
            casted
                .f64()?
                .into_iter()
                .map(|value| value.map(format_number))
                .collect()
        }
        _ => {
            let casted = column.cast(&DataType::String)?;
            casted
                .str()?
                .into_iter()
                .map(|value| value.map(str::to_string))
                .collect()
        }
    };
    Ok(values)
}

/// Column values coerced to numbers; anything unparseable becomes `None`.
pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?;
    if column.dtype() == &DataType::String {
        return Ok(column
            .str()?
            .into_iter()
            .map(|value| value.and_then(|text| text.trim().parse::<f64>().ok()))
            .map(|value| value.filter(|number| number.is_finite()))
            .collect());
    }

    let casted = column.cast(&DataType::Float64)?;
    let values = casted
        .f64()?
        .into_iter()
        .map(|value| value.filter(|number| number.is_finite()))
        .collect();
    Ok(values)
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

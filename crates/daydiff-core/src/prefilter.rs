use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use daydiff_parser::{extension_of, load_table};
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::columns::{format_number, numeric_values, text_values};
use crate::error::{AnalysisError, Result};

const SERVICE_COLUMNS: [&str; 4] = ["service", "source", "@service", "@source"];
const DIRECTORY_EXTENSIONS: [&str; 4] = [".xlsx", ".xls", ".csv", ".json"];

const SERVICE_KEYWORDS: [(&str, SheetType); 7] = [
    ("qna", SheetType::QnA),
    ("search", SheetType::Search),
    ("summary", SheetType::Summary),
    ("relevantdoc", SheetType::RelevantDoc),
    ("prepsubmission", SheetType::PrepSubmission),
    ("prep submission", SheetType::PrepSubmission),
    ("prepare submission", SheetType::PrepSubmission),
];

/// Characteristic lower-cased column names, checked in order.
const COLUMN_SIGNATURES: [(SheetType, &[&str]); 4] = [
    (
        SheetType::Summary,
        &[
            "@processname",
            "@processcreatedon",
            "@processstartedon",
            "@processcompletedon",
            "@requestid",
            "@totaltimetaken",
        ],
    ),
    (
        SheetType::QnA,
        &[
            "@requestpayload.mode",
            "@requestpayload.question",
            "@session_id",
            "@isautomode",
            "@redirectedmode",
            "@requestpayload.selectedguids",
        ],
    ),
    (SheetType::Search, &["@websocket.url_details.path"]),
    (
        SheetType::RelevantDoc,
        &["@http.url_details.path", "@http.method", "@http.status_code"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetType {
    QnA,
    Search,
    Summary,
    RelevantDoc,
    PrepSubmission,
}

impl SheetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetType::QnA => "QnA",
            SheetType::Search => "Search",
            SheetType::Summary => "Summary",
            SheetType::RelevantDoc => "RelevantDoc",
            SheetType::PrepSubmission => "PrepSubmission",
        }
    }
}

impl fmt::Display for SheetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MatchMode {
    /// Keep columns whose name equals a required column.
    #[default]
    Strict,
    /// Keep columns where either name contains the other, ignoring case.
    Fuzzy,
}

impl FromStr for MatchMode {
    type Err = AnalysisError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(MatchMode::Strict),
            "fuzzy" => Ok(MatchMode::Fuzzy),
            other => Err(AnalysisError::Processing(format!("unknown match mode '{other}'"))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    sheet_column_mappings: BTreeMap<String, Vec<String>>,
}

/// Required columns per sheet type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefilterConfig {
    pub mappings: BTreeMap<String, Vec<String>>,
}

impl PrefilterConfig {
    /// A missing or malformed file yields an empty mapping.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), %err, "column mapping file not readable, no columns will be filtered");
                return Self::default();
            }
        };
        match Self::from_json_str(&content) {
            Ok(config) => {
                info!(path = %path.display(), sheets = config.mappings.len(), "loaded column mapping");
                config
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "column mapping file is malformed, no columns will be filtered");
                Self::default()
            }
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(content)?;
        Ok(Self {
            mappings: raw.sheet_column_mappings,
        })
    }

    pub fn required_columns(&self, sheet: &str) -> &[String] {
        self.mappings.get(sheet).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStatus {
    Success,
    NoMapping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterReport {
    pub sheet_name: String,
    pub status: FilterStatus,
    pub total_columns: usize,
    pub required_columns: Vec<String>,
    pub kept_columns: Vec<String>,
    pub removed_columns: Vec<String>,
    pub missing_columns: Vec<String>,
}

impl FilterReport {
    pub fn kept_pct(&self) -> f64 {
        crate::metrics::percent(self.kept_columns.len(), self.total_columns)
    }
}

/// Sheet type from service values, then from characteristic columns; `QnA` otherwise.
pub fn detect_sheet_type(df: &DataFrame) -> Result<SheetType> {
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let Some(service_column) = columns
        .iter()
        .find(|name| SERVICE_COLUMNS.contains(&name.to_lowercase().as_str()))
    else {
        warn!("no service/source column found, using default sheet type");
        return Ok(SheetType::QnA);
    };

    let mut seen: Vec<String> = Vec::new();
    for value in text_values(df, service_column)?.into_iter().flatten() {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    for service in &seen {
        let lowered = service.trim().to_lowercase();
        if let Some((_, sheet)) = SERVICE_KEYWORDS.iter().find(|(key, _)| lowered.contains(key)) {
            info!(sheet = %sheet, service = %service, "detected sheet type from service values");
            return Ok(*sheet);
        }
    }

    let lowered: Vec<String> = columns.iter().map(|name| name.to_lowercase()).collect();
    for (sheet, signature) in COLUMN_SIGNATURES {
        if signature.iter().any(|column| lowered.iter().any(|name| name == column)) {
            info!(sheet = %sheet, "detected sheet type from column names");
            return Ok(sheet);
        }
    }

    warn!("could not detect sheet type, using default");
    Ok(SheetType::QnA)
}

/// Selects the columns required for `sheet`. Returns the input unchanged when the
/// sheet has no mapping or nothing matched.
pub fn filter_columns(
    df: &DataFrame,
    config: &PrefilterConfig,
    sheet: &str,
    mode: MatchMode,
) -> Result<(DataFrame, FilterReport)> {
    let available: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let required = config.required_columns(sheet).to_vec();

    if required.is_empty() {
        warn!(sheet, "no column mapping for sheet, keeping every column");
        let report = FilterReport {
            sheet_name: sheet.to_string(),
            status: FilterStatus::NoMapping,
            total_columns: available.len(),
            required_columns: Vec::new(),
            kept_columns: available,
            removed_columns: Vec::new(),
            missing_columns: Vec::new(),
        };
        return Ok((df.clone(), report));
    }

    let keeps = |column: &str| match mode {
        MatchMode::Strict => required.iter().any(|req| req == column),
        MatchMode::Fuzzy => {
            let column = column.to_lowercase();
            required.iter().any(|req| {
                let req = req.to_lowercase();
                column.contains(&req) || req.contains(&column)
            })
        }
    };
    let (kept, removed): (Vec<String>, Vec<String>) =
        available.iter().cloned().partition(|column| keeps(column));
    let missing = match mode {
        MatchMode::Strict => required
            .iter()
            .filter(|req| !available.contains(req))
            .cloned()
            .collect(),
        MatchMode::Fuzzy => Vec::new(),
    };

    let filtered = if kept.is_empty() {
        warn!(sheet, "no columns matched, keeping every column");
        df.clone()
    } else {
        df.select(kept.iter().map(String::as_str))?
    };

    let report = FilterReport {
        sheet_name: sheet.to_string(),
        status: FilterStatus::Success,
        total_columns: available.len(),
        required_columns: required,
        kept_columns: kept,
        removed_columns: removed,
        missing_columns: missing,
    };
    info!(
        sheet,
        kept = report.kept_columns.len(),
        removed = report.removed_columns.len(),
        missing = report.missing_columns.len(),
        "filtered columns"
    );
    Ok((filtered, report))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrefilterOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub report: FilterReport,
}

/// `<stem>_filtered<suffix>` next to the input; unsupported output formats become `.csv`.
pub fn default_output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = match extension_of(input).as_deref() {
        Some(ext @ (".xlsx" | ".csv" | ".json")) => ext.to_string(),
        Some(".xls") => ".xlsx".to_string(),
        _ => ".csv".to_string(),
    };
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}_filtered{suffix}"))
}

pub fn process_file(
    input: &Path,
    output: Option<&Path>,
    sheet: Option<&str>,
    mode: MatchMode,
    config: &PrefilterConfig,
) -> Result<PrefilterOutcome> {
    let table = load_table(input)?;
    let sheet = match sheet {
        Some(sheet) => sheet.to_string(),
        None => detect_sheet_type(&table.df)?.to_string(),
    };
    info!(file = %table.file_name(), sheet = %sheet, columns = table.df.width(), "pre-filtering");

    let (filtered, report) = filter_columns(&table.df, config, &sheet, mode)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input, None));
    write_frame(&filtered, &output)?;
    info!(output = %output.display(), kept_pct = report.kept_pct(), "filtered data saved");

    Ok(PrefilterOutcome {
        input: input.to_path_buf(),
        output,
        report,
    })
}

/// Filters every supported file in `input_dir`; the map holds per-file success.
pub fn process_directory(
    input_dir: &Path,
    output_dir: Option<&Path>,
    mode: MatchMode,
    config: &PrefilterConfig,
) -> Result<BTreeMap<String, bool>> {
    if !input_dir.is_dir() {
        return Err(AnalysisError::Processing(format!(
            "input directory not found: {}",
            input_dir.display()
        )));
    }
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            extension_of(path).is_some_and(|ext| DIRECTORY_EXTENSIONS.contains(&ext.as_str()))
        })
        .collect();
    files.sort();

    let mut results = BTreeMap::new();
    for path in files {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output = output_dir.map(|dir| default_output_path(&path, Some(dir)));
        let success = match process_file(&path, output.as_deref(), None, mode, config) {
            Ok(_) => true,
            Err(err) => {
                warn!(file = %name, %err, "pre-filter failed");
                false
            }
        };
        results.insert(name, success);
    }
    Ok(results)
}

/// Writes the frame in the format implied by the output extension.
pub fn write_frame(df: &DataFrame, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match extension_of(output).as_deref() {
        Some(".xlsx" | ".xls") => write_xlsx(df, output),
        Some(".json") => write_json_records(df, output),
        _ => write_csv(df, output),
    }
}

enum CellColumn {
    Numbers(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

fn cell_columns(df: &DataFrame) -> Result<Vec<(String, CellColumn)>> {
    df.get_columns()
        .iter()
        .map(|column| {
            let name = column.name().to_string();
            let values = if column.dtype().is_float() || column.dtype().is_integer() {
                CellColumn::Numbers(numeric_values(df, &name)?)
            } else {
                CellColumn::Text(text_values(df, &name)?)
            };
            Ok((name, values))
        })
        .collect()
}

fn write_xlsx(df: &DataFrame, output: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, (name, values)) in cell_columns(df)?.iter().enumerate() {
        let col = col as u16;
        sheet.write_string(0, col, name)?;
        match values {
            CellColumn::Numbers(values) => {
                for (row, value) in values.iter().enumerate() {
                    if let Some(value) = value {
                        sheet.write_number(row as u32 + 1, col, *value)?;
                    }
                }
            }
            CellColumn::Text(values) => {
                for (row, value) in values.iter().enumerate() {
                    if let Some(value) = value {
                        sheet.write_string(row as u32 + 1, col, value)?;
                    }
                }
            }
        }
    }
    workbook.save(output)?;
    Ok(())
}

fn cell_text(values: &CellColumn, row: usize) -> String {
    match values {
        CellColumn::Numbers(values) => values[row].map(format_number).unwrap_or_default(),
        CellColumn::Text(values) => values[row].clone().unwrap_or_default(),
    }
}

fn write_csv(df: &DataFrame, output: &Path) -> Result<()> {
    let columns = cell_columns(df)?;
    let mut writer = csv::Writer::from_path(output)?;
    writer.write_record(columns.iter().map(|(name, _)| name.as_str()))?;
    for row in 0..df.height() {
        writer.write_record(columns.iter().map(|(_, values)| cell_text(values, row)))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json_records(df: &DataFrame, output: &Path) -> Result<()> {
    let columns = cell_columns(df)?;
    let records: Vec<Value> = (0..df.height())
        .map(|row| {
            let record: Map<String, Value> = columns
                .iter()
                .map(|(name, values)| {
                    let value = match values {
                        CellColumn::Numbers(values) => values[row]
                            .and_then(serde_json::Number::from_f64)
                            .map(Value::Number)
                            .unwrap_or(Value::Null),
                        CellColumn::Text(values) => values[row]
                            .clone()
                            .map(Value::String)
                            .unwrap_or(Value::Null),
                    };
                    (name.clone(), value)
                })
                .collect();
            Value::Object(record)
        })
        .collect();
    std::fs::write(output, serde_json::to_string_pretty(&records)?)?;
    Ok(())
}

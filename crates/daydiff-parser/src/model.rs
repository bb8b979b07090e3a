use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableFormat {
    Excel,
    Csv,
    Json,
    Parquet,
}

impl TableFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableFormat::Excel => "excel",
            TableFormat::Csv => "csv",
            TableFormat::Json => "json",
            TableFormat::Parquet => "parquet",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = extension_of(path)?;
        TableFormat::try_from(extension.as_str()).ok()
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TableFormat {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "xlsx" | "xls" => Ok(TableFormat::Excel),
            "csv" => Ok(TableFormat::Csv),
            "json" => Ok(TableFormat::Json),
            "parquet" => Ok(TableFormat::Parquet),
            other => Err(format!("unknown table format '{other}'")),
        }
    }
}

/// Lower-cased extension including the leading dot, e.g. `.xlsx`.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// File name up to the first dot, matching how exports are named (`QnA.2025-10.xlsx` -> `QnA`).
pub fn file_stem_of(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub path: PathBuf,
    pub file_stem: String,
    pub extension: String,
    pub format: TableFormat,
    pub loader: &'static str,
    pub df: DataFrame,
}

impl LoadedTable {
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Name as it appears on disk; `file_stem` alone stops at the first dot.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}{}", self.file_stem, self.extension))
    }
}

/// A single normalized spreadsheet cell prior to column typing.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Number(value) => Some(format_number(*value)),
            CellValue::Text(value) => Some(value.clone()),
        }
    }

    /// Parses raw text the way a spreadsheet reader would: blank is empty, numeric text is a number.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => CellValue::Number(value),
            _ => CellValue::Text(raw.to_string()),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

use std::io::{Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use polars::prelude::DataFrame;
use tracing::debug;

use crate::errors::{LoaderAttempt, LoaderError};
use crate::formats::common::{header_text, TableBuilder};
use crate::model::{file_stem_of, CellValue};
use crate::registry::TableLoader;

const PARSER_NAME: &str = "excel";

/// Preferred sheet names after the first sheet; the file stem is tried before these.
const COMMON_SHEET_NAMES: [&str; 5] = ["Summary", "Data", "Sheet1", "Sheet 1", "Main"];

pub struct ExcelLoader;

impl TableLoader for ExcelLoader {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".xlsx", ".xls"]
    }

    fn load(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        let file_stem = file_stem_of(path);
        let mut workbook = open_workbook_auto(path).map_err(|err| {
            LoaderError::AllAttemptsFailed {
                loader: PARSER_NAME,
                file: file_stem.clone(),
                attempts: vec![LoaderAttempt::new("open workbook", err.to_string())],
            }
        })?;

        let sheet_names = workbook.sheet_names();
        let mut attempts = Vec::new();

        match sheet_names.first() {
            Some(first) => match load_sheet(&mut workbook, first) {
                Ok(df) => return Ok(df),
                Err(message) => attempts.push(LoaderAttempt::new("first sheet", message)),
            },
            None => attempts.push(LoaderAttempt::new("first sheet", "workbook has no sheets")),
        }

        let mut preferred: Vec<String> = vec![file_stem.clone()];
        preferred.extend(COMMON_SHEET_NAMES.iter().map(|name| name.to_string()));
        let remaining = sheet_names.iter().skip(1);
        let ordered: Vec<&String> = preferred
            .iter()
            .filter(|name| sheet_names.iter().skip(1).any(|sheet| sheet == *name))
            .chain(remaining.filter(|sheet| !preferred.contains(sheet)))
            .collect();

        for name in ordered {
            match load_sheet(&mut workbook, name) {
                Ok(df) => {
                    debug!(sheet = %name, "found data in sheet");
                    return Ok(df);
                }
                Err(message) => {
                    attempts.push(LoaderAttempt::new(format!("sheet '{name}'"), message))
                }
            }
        }

        Err(LoaderError::AllAttemptsFailed {
            loader: PARSER_NAME,
            file: file_stem,
            attempts,
        })
    }
}

fn load_sheet<RS: Read + Seek>(workbook: &mut Sheets<RS>, name: &str) -> Result<DataFrame, String> {
    let range = workbook
        .worksheet_range(name)
        .map_err(|err| err.to_string())?;
    range_to_dataframe(&range).map_err(|err| err.to_string())
}

fn range_to_dataframe(range: &Range<Data>) -> Result<DataFrame, LoaderError> {
    let mut rows = range.rows();
    let header_row = rows.next().ok_or(LoaderError::EmptyData {
        loader: PARSER_NAME,
    })?;

    let headers = header_row
        .iter()
        .map(|cell| header_text(&convert_cell(cell)))
        .collect();
    let mut builder = TableBuilder::new(headers);

    for row in rows {
        builder.push_row(row.iter().map(convert_cell).collect());
    }

    builder.finish(PARSER_NAME)
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Float(value) => CellValue::Number(*value),
        Data::Bool(value) => CellValue::Text(value.to_string()),
        Data::String(value) => {
            if value.trim().is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(value.clone())
            }
        }
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) => CellValue::Text(datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Number(value.as_f64()),
        },
        Data::DateTimeIso(value) | Data::DurationIso(value) => CellValue::Text(value.clone()),
    }
}

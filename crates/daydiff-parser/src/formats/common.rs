use std::collections::HashMap;

use polars::prelude::*;

use crate::errors::LoaderError;
use crate::model::CellValue;

/// Accumulates header + rows and turns them into a typed `DataFrame`.
#[derive(Debug, Default)]
pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TableBuilder {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers: normalize_headers(headers),
            rows: Vec::new(),
        }
    }

    /// Rows shorter than the header are padded; longer rows are truncated.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        if row.iter().all(CellValue::is_empty) {
            return;
        }
        row.resize(self.headers.len(), CellValue::Empty);
        self.rows.push(row);
    }

    pub fn finish(self, loader: &'static str) -> Result<DataFrame, LoaderError> {
        if self.rows.is_empty() || self.headers.is_empty() {
            return Err(LoaderError::EmptyData { loader });
        }

        let mut columns: Vec<Column> = Vec::with_capacity(self.headers.len());
        for (idx, header) in self.headers.iter().enumerate() {
            let cells: Vec<&CellValue> = self.rows.iter().map(|row| &row[idx]).collect();
            columns.push(build_column(header, &cells).into());
        }

        DataFrame::new(columns).map_err(|source| LoaderError::Polars { loader, source })
    }
}

fn build_column(name: &str, cells: &[&CellValue]) -> Series {
    let numeric = cells
        .iter()
        .all(|cell| matches!(cell, CellValue::Empty | CellValue::Number(_)));
    let has_values = cells.iter().any(|cell| !cell.is_empty());

    if numeric && has_values {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                CellValue::Number(value) => Some(*value),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values)
    } else {
        let values: Vec<Option<String>> = cells.iter().map(|cell| cell.as_text()).collect();
        Series::new(
            name.into(),
            values
                .iter()
                .map(|opt| opt.as_deref())
                .collect::<Vec<Option<&str>>>(),
        )
    }
}

/// Blank headers become `Unnamed: N`; repeated headers get a `.N` suffix.
fn normalize_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            let base = if header.trim().is_empty() {
                format!("Unnamed: {idx}")
            } else {
                header.trim().to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base.clone()
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

pub(crate) fn header_text(cell: &CellValue) -> String {
    cell.as_text().unwrap_or_default()
}

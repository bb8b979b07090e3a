use std::path::Path;

use polars::prelude::DataFrame;
use serde_json::{Map, Value};

use crate::errors::LoaderError;
use crate::formats::common::TableBuilder;
use crate::model::CellValue;
use crate::registry::TableLoader;

const PARSER_NAME: &str = "json";
const NESTED_KEYS: [&str; 3] = ["data", "records", "results"];

pub struct JsonLoader;

impl TableLoader for JsonLoader {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".json"]
    }

    fn load(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        let content = std::fs::read_to_string(path).map_err(|err| LoaderError::io(path, err))?;
        parse_json_str(&content)
    }
}

pub fn parse_json_str(content: &str) -> Result<DataFrame, LoaderError> {
    let value: Value = serde_json::from_str(content).map_err(|source| LoaderError::Json {
        loader: PARSER_NAME,
        source,
    })?;

    match value {
        Value::Array(items) => records_to_frame(&items),
        Value::Object(map) => {
            for key in NESTED_KEYS {
                if let Some(Value::Array(items)) = map.get(key) {
                    return records_to_frame(items);
                }
            }
            if !map.is_empty() && map.values().all(|v| v.is_array() || v.is_object()) {
                columns_to_frame(&map)
            } else {
                records_to_frame(&[Value::Object(map)])
            }
        }
        other => Err(LoaderError::Structure {
            loader: PARSER_NAME,
            message: format!("expected an array or object at the top level, found {other}"),
        }),
    }
}

fn records_to_frame(items: &[Value]) -> Result<DataFrame, LoaderError> {
    let mut headers: Vec<String> = Vec::new();
    for item in items {
        let Value::Object(record) = item else {
            return Err(LoaderError::Structure {
                loader: PARSER_NAME,
                message: "array entries must be objects".to_string(),
            });
        };
        for key in record.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut builder = TableBuilder::new(headers.clone());
    for item in items {
        if let Value::Object(record) = item {
            let row = headers
                .iter()
                .map(|key| record.get(key).map(json_cell).unwrap_or(CellValue::Empty))
                .collect();
            builder.push_row(row);
        }
    }
    builder.finish(PARSER_NAME)
}

/// Column-oriented layout: `{"col": [v0, v1], ...}` or `{"col": {"0": v0, "1": v1}, ...}`.
fn columns_to_frame(map: &Map<String, Value>) -> Result<DataFrame, LoaderError> {
    let headers: Vec<String> = map.keys().cloned().collect();
    let columns: Vec<Vec<CellValue>> = map
        .values()
        .map(|value| match value {
            Value::Array(values) => values.iter().map(json_cell).collect(),
            Value::Object(values) => values.values().map(json_cell).collect(),
            other => vec![json_cell(other)],
        })
        .collect();

    let height = columns.iter().map(Vec::len).max().unwrap_or(0);
    let mut builder = TableBuilder::new(headers);
    for row_idx in 0..height {
        let row = columns
            .iter()
            .map(|column| column.get(row_idx).cloned().unwrap_or(CellValue::Empty))
            .collect();
        builder.push_row(row);
    }
    builder.finish(PARSER_NAME)
}

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(flag) => CellValue::Text(flag.to_string()),
        Value::Number(number) => number
            .as_f64()
            .map(CellValue::Number)
            .unwrap_or_else(|| CellValue::Text(number.to_string())),
        Value::String(text) if text.trim().is_empty() => CellValue::Empty,
        Value::String(text) => CellValue::Text(text.clone()),
        nested => CellValue::Text(nested.to_string()),
    }
}

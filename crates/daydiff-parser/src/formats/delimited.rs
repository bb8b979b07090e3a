use std::path::Path;

use csv::ReaderBuilder;
use polars::prelude::DataFrame;
use tracing::debug;

use crate::errors::{LoaderAttempt, LoaderError};
use crate::formats::common::TableBuilder;
use crate::model::{file_stem_of, CellValue};
use crate::registry::TableLoader;

const PARSER_NAME: &str = "csv";
const UTF8_BOM: &str = "\u{feff}";

pub struct CsvLoader;

impl TableLoader for CsvLoader {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".csv"]
    }

    fn load(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        let bytes = std::fs::read(path).map_err(|err| LoaderError::io(path, err))?;
        let mut attempts = Vec::new();

        for (encoding, decoded) in decode_candidates(&bytes) {
            let Some(content) = decoded else {
                attempts.push(LoaderAttempt::new(encoding, "content is not valid for this encoding"));
                continue;
            };
            match parse_csv_str(&content) {
                Ok(df) => {
                    debug!(encoding, rows = df.height(), "csv loaded");
                    return Ok(df);
                }
                Err(LoaderError::EmptyData { loader }) => {
                    return Err(LoaderError::EmptyData { loader });
                }
                Err(err) => attempts.push(LoaderAttempt::new(encoding, err.to_string())),
            }
        }

        Err(LoaderError::AllAttemptsFailed {
            loader: PARSER_NAME,
            file: file_stem_of(path),
            attempts,
        })
    }
}

fn decode_candidates(bytes: &[u8]) -> Vec<(&'static str, Option<String>)> {
    let utf8 = std::str::from_utf8(bytes).ok();
    vec![
        (
            "utf-8",
            utf8.filter(|text| !text.starts_with(UTF8_BOM))
                .map(str::to_string),
        ),
        (
            "utf-8-sig",
            utf8.and_then(|text| text.strip_prefix(UTF8_BOM))
                .map(str::to_string),
        ),
        ("latin-1", Some(bytes.iter().map(|&byte| byte as char).collect())),
    ]
}

pub fn parse_csv_str(content: &str) -> Result<DataFrame, LoaderError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|source| LoaderError::Csv {
            loader: PARSER_NAME,
            source,
        })?
        .iter()
        .map(str::to_string)
        .collect();
    let mut builder = TableBuilder::new(headers);

    for record in reader.records() {
        let record = record.map_err(|source| LoaderError::Csv {
            loader: PARSER_NAME,
            source,
        })?;
        builder.push_row(record.iter().map(CellValue::from_text).collect());
    }

    builder.finish(PARSER_NAME)
}

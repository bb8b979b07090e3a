use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::DataType;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

use crate::errors::LoaderError;
use crate::formats::{parse_csv_str, parse_json_str};
use crate::model::{file_stem_of, CellValue, TableFormat};
use crate::{load_table, loader_for_path, supported_extensions};

fn write_fixture(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content)
        .unwrap_or_else(|err| panic!("failed to write fixture {}: {}", path.display(), err));
    path
}

fn write_workbook(path: &Path, sheets: &[(&str, &[&[&str]])]) {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).expect("sheet name");
        for (row_idx, row) in rows.iter().enumerate() {
            for (col_idx, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                match value.parse::<f64>() {
                    Ok(number) => sheet
                        .write_number(row_idx as u32, col_idx as u16, number)
                        .expect("write number"),
                    Err(_) => sheet
                        .write_string(row_idx as u32, col_idx as u16, *value)
                        .expect("write string"),
                };
            }
        }
    }
    workbook.save(path).expect("save workbook");
}

#[test]
fn loads_csv_with_numeric_and_text_columns() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "QnA.csv",
        b"Date,Service,TotalTimeTaken\n2025-10-01,QnA,1.5\n2025-10-02,QnA,2\n",
    );

    let table = load_table(&path).expect("csv load failed");
    assert_eq!(table.format, TableFormat::Csv);
    assert_eq!(table.loader, "csv");
    assert_eq!(table.file_stem, "QnA");
    assert_eq!(table.file_name(), "QnA.csv");
    assert_eq!(table.df.height(), 2);
    assert_eq!(
        table.column_names(),
        vec!["Date".to_string(), "Service".to_string(), "TotalTimeTaken".to_string()]
    );
    assert_eq!(table.df.column("TotalTimeTaken").unwrap().dtype(), &DataType::Float64);
    assert_eq!(table.df.column("Service").unwrap().dtype(), &DataType::String);
}

#[test]
fn strips_utf8_bom_from_first_header() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "Search.csv", "\u{feff}Status,Message\ninfo,ok\n".as_bytes());

    let table = load_table(&path).expect("bom csv load failed");
    assert_eq!(table.column_names()[0], "Status");
}

#[test]
fn falls_back_to_latin1_for_invalid_utf8() {
    let dir = TempDir::new().unwrap();
    let mut content = b"Service,Message\nQnA,caf".to_vec();
    content.push(0xE9);
    content.extend_from_slice(b"\n");
    let path = write_fixture(&dir, "Latin.csv", &content);

    let table = load_table(&path).expect("latin-1 csv load failed");
    let message = table.df.column("Message").unwrap().str().unwrap().get(0);
    assert_eq!(message, Some("café"));
}

#[test]
fn header_only_csv_is_empty_data() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "Empty.csv", b"Date,Service\n");

    let err = load_table(&path).unwrap_err();
    assert!(matches!(err, LoaderError::EmptyData { loader: "csv" }));
}

#[test]
fn unsupported_extension_lists_supported_formats() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "notes.txt", b"hello");

    match load_table(&path).unwrap_err() {
        LoaderError::UnsupportedFormat {
            extension,
            supported,
        } => {
            assert_eq!(extension, ".txt");
            assert!(supported.contains(&".xlsx"));
            assert!(supported.contains(&".parquet"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(loader_for_path(&path).is_none());
}

#[test]
fn supported_extensions_cover_all_loaders() {
    let extensions = supported_extensions();
    for ext in [".xlsx", ".xls", ".csv", ".json", ".parquet"] {
        assert!(extensions.contains(&ext), "missing {ext}");
    }
    assert_eq!(
        loader_for_path(Path::new("Report.XLSX")).map(|loader| loader.name()),
        Some("excel")
    );
}

#[test]
fn json_array_of_records_unions_keys() {
    let df = parse_json_str(r#"[{"a": 1, "b": "x"}, {"a": 2, "c": true}]"#).unwrap();
    assert_eq!(df.get_column_names(), vec!["a", "b", "c"]);
    assert_eq!(df.height(), 2);
    assert_eq!(df.column("c").unwrap().str().unwrap().get(1), Some("true"));
    assert_eq!(df.column("b").unwrap().str().unwrap().get(1), None);
}

#[test]
fn json_nested_data_key_is_unwrapped() {
    let df = parse_json_str(r#"{"meta": 3, "records": [{"Service": "QnA"}]}"#).unwrap();
    assert_eq!(df.get_column_names(), vec!["Service"]);
    assert_eq!(df.height(), 1);
}

#[test]
fn json_column_oriented_object() {
    let df = parse_json_str(r#"{"x": [1, 2, 3], "y": ["a", "b", "c"]}"#).unwrap();
    assert_eq!(df.height(), 3);
    assert_eq!(df.column("x").unwrap().f64().unwrap().get(2), Some(3.0));
}

#[test]
fn json_single_record_object() {
    let df = parse_json_str(r#"{"Service": "Search", "Status": "info"}"#).unwrap();
    assert_eq!(df.height(), 1);
    assert_eq!(df.width(), 2);
}

#[test]
fn json_scalar_is_structure_error() {
    let err = parse_json_str("42").unwrap_err();
    assert!(matches!(err, LoaderError::Structure { .. }));
}

#[test]
fn csv_headers_are_normalized() {
    let df = parse_csv_str("a,,a\n1,2,3\n").unwrap();
    assert_eq!(df.get_column_names(), vec!["a", "Unnamed: 1", "a.1"]);
}

#[test]
fn csv_skips_blank_rows_and_pads_short_rows() {
    let df = parse_csv_str("a,b,c\n1,2,3\n,,\n4\n").unwrap();
    assert_eq!(df.height(), 2);
    assert_eq!(df.column("c").unwrap().f64().unwrap().get(1), None);
}

#[test]
fn loads_first_sheet_of_workbook() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("QnA.2025-10.xlsx");
    let first: &[&[&str]] = &[&["Service", "Status"], &["QnA", "info"], &["QnA", "error"]];
    let second: &[&[&str]] = &[&["Other"], &["1"]];
    write_workbook(&path, &[("Export", first), ("Data", second)]);

    let table = load_table(&path).expect("xlsx load failed");
    assert_eq!(table.format, TableFormat::Excel);
    assert_eq!(table.file_stem, "QnA");
    assert_eq!(table.file_name(), "QnA.2025-10.xlsx");
    assert_eq!(table.column_names(), vec!["Service".to_string(), "Status".to_string()]);
    assert_eq!(table.df.height(), 2);
}

#[test]
fn falls_back_to_named_sheet_when_first_is_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Summary.xlsx");
    let empty: &[&[&str]] = &[];
    let data: &[&[&str]] = &[&["Service", "TotalTimeTaken"], &["Summary", "12.5"]];
    write_workbook(&path, &[("Cover", empty), ("Misc", empty), ("Summary", data)]);

    let table = load_table(&path).expect("fallback sheet load failed");
    assert_eq!(table.df.height(), 1);
    assert_eq!(
        table.df.column("TotalTimeTaken").unwrap().f64().unwrap().get(0),
        Some(12.5)
    );
}

#[test]
fn workbook_without_data_reports_every_attempt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Blank.xlsx");
    let empty: &[&[&str]] = &[];
    write_workbook(&path, &[("Sheet1", empty), ("Other", empty)]);

    match load_table(&path).unwrap_err() {
        LoaderError::AllAttemptsFailed { file, attempts, .. } => {
            assert_eq!(file, "Blank");
            assert_eq!(attempts.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn cell_text_parsing() {
    assert_eq!(CellValue::from_text("  "), CellValue::Empty);
    assert_eq!(CellValue::from_text("2.5"), CellValue::Number(2.5));
    assert_eq!(CellValue::from_text("abc"), CellValue::Text("abc".into()));
    assert_eq!(CellValue::Number(3.0).as_text().as_deref(), Some("3"));
    assert_eq!(file_stem_of(Path::new("/tmp/RelevantDoc.2025.csv")), "RelevantDoc");
}

mod common;
mod delimited;
mod excel;
mod json;
mod parquet;

pub use delimited::{parse_csv_str, CsvLoader};
pub use excel::ExcelLoader;
pub use json::{parse_json_str, JsonLoader};
pub use parquet::ParquetLoader;

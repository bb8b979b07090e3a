use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::errors::LoaderError;
use crate::registry::TableLoader;

const PARSER_NAME: &str = "parquet";

pub struct ParquetLoader;

impl TableLoader for ParquetLoader {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".parquet"]
    }

    fn load(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        let file = File::open(path).map_err(|err| LoaderError::io(path, err))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|source| LoaderError::Polars {
                loader: PARSER_NAME,
                source,
            })?;
        if df.height() == 0 {
            return Err(LoaderError::EmptyData {
                loader: PARSER_NAME,
            });
        }
        Ok(df)
    }
}

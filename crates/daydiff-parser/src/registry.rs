use std::path::Path;

use polars::prelude::DataFrame;
use tracing::info;

use crate::errors::LoaderError;
use crate::formats::{CsvLoader, ExcelLoader, JsonLoader, ParquetLoader};
use crate::model::{extension_of, file_stem_of, LoadedTable, TableFormat};

pub trait TableLoader {
    fn name(&self) -> &'static str;
    fn extensions(&self) -> &'static [&'static str];
    fn load(&self, path: &Path) -> Result<DataFrame, LoaderError>;
}

static EXCEL: ExcelLoader = ExcelLoader;
static CSV: CsvLoader = CsvLoader;
static JSON: JsonLoader = JsonLoader;
static PARQUET: ParquetLoader = ParquetLoader;

pub fn all_loaders() -> [&'static (dyn TableLoader + Sync); 4] {
    [&EXCEL, &CSV, &JSON, &PARQUET]
}

pub fn supported_extensions() -> Vec<&'static str> {
    all_loaders()
        .iter()
        .flat_map(|loader| loader.extensions().iter().copied())
        .collect()
}

pub fn loader_for_path(path: &Path) -> Option<&'static (dyn TableLoader + Sync)> {
    let extension = extension_of(path)?;
    all_loaders()
        .into_iter()
        .find(|loader| loader.extensions().contains(&extension.as_str()))
}

/// Loads a tabular export, dispatching on the file extension.
pub fn load_table(path: &Path) -> Result<LoadedTable, LoaderError> {
    load_with_loaders(path, &all_loaders())
}

pub fn load_with_loaders(
    path: &Path,
    loaders: &[&(dyn TableLoader + Sync)],
) -> Result<LoadedTable, LoaderError> {
    let extension = extension_of(path).unwrap_or_default();
    let loader = loaders
        .iter()
        .find(|loader| loader.extensions().contains(&extension.as_str()))
        .ok_or_else(|| LoaderError::UnsupportedFormat {
            extension: extension.clone(),
            supported: loaders
                .iter()
                .flat_map(|loader| loader.extensions().iter().copied())
                .collect(),
        })?;
    let format = TableFormat::try_from(extension.as_str()).map_err(|message| {
        LoaderError::Structure {
            loader: loader.name(),
            message,
        }
    })?;

    let df = loader.load(path)?;
    info!(
        file = %path.display(),
        loader = loader.name(),
        rows = df.height(),
        columns = df.width(),
        "loaded table"
    );

    Ok(LoadedTable {
        path: path.to_path_buf(),
        file_stem: file_stem_of(path),
        extension,
        format,
        loader: loader.name(),
        df,
    })
}

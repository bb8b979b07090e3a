pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::{LoaderAttempt, LoaderError};
pub use model::{extension_of, file_stem_of, CellValue, LoadedTable, TableFormat};
pub use registry::{
    all_loaders, load_table, load_with_loaders, loader_for_path, supported_extensions,
    TableLoader,
};

#[cfg(test)]
mod tests;

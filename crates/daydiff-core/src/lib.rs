pub mod analyzer;
pub mod charts;
pub mod columns;
pub mod combined_report;
pub mod config;
pub mod daily;
pub mod daily_workbook;
pub mod digest;
pub mod error;
pub mod metrics;
pub mod prefilter;
pub mod preprocess;
pub mod status;
pub mod summary;

pub use error::{AnalysisError, Result};

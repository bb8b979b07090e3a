use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct LoaderAttempt {
    pub method: String,
    pub message: String,
}

impl LoaderAttempt {
    pub fn new(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LoaderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method, self.message)
    }
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("unsupported file format '{extension}'; supported formats: {supported:?}")]
    UnsupportedFormat {
        extension: String,
        supported: Vec<&'static str>,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{loader} CSV error: {source}")]
    Csv {
        loader: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{loader} JSON error: {source}")]
    Json {
        loader: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{loader} unsupported structure: {message}")]
    Structure {
        loader: &'static str,
        message: String,
    },

    #[error("{loader} polars error: {source}")]
    Polars {
        loader: &'static str,
        #[source]
        source: polars::error::PolarsError,
    },

    #[error("{loader} file did not contain any data rows")]
    EmptyData { loader: &'static str },

    #[error("all {loader} loading methods failed for {file}; attempts: {attempts:?}")]
    AllAttemptsFailed {
        loader: &'static str,
        file: String,
        attempts: Vec<LoaderAttempt>,
    },
}

impl LoaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoaderError::Io {
            path: path.into(),
            source,
        }
    }
}

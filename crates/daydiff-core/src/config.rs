use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::status::Thresholds;

pub const BASE_DIR_ENV: &str = "DAYDIFF_BASE_DIR";
pub const DEFAULT_MAPPING_FILE: &str = "column_mapping_config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Rows with a response time above this (or below zero) are discarded.
    pub max_response_time_ms: f64,
    pub drop_weekends: bool,
    pub keep_statuses: Vec<String>,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            max_response_time_ms: 2000.0,
            drop_weekends: true,
            keep_statuses: vec!["info".to_string(), "error".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub source_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub thresholds: Thresholds,
    pub preprocess: PreprocessSettings,
    pub prefilter_mapping: Option<PathBuf>,
    /// TrueType font for chart text; falls back to common system fonts when unset.
    pub chart_font: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            source_dir: PathBuf::from("source_data"),
            analysis_dir: PathBuf::from("individual_analysis"),
            reports_dir: PathBuf::from("combined_reports"),
            thresholds: Thresholds::default(),
            preprocess: PreprocessSettings::default(),
            prefilter_mapping: None,
            chart_font: None,
        }
    }
}

impl Settings {
    /// Builds settings from an optional TOML file, then `DAYDIFF_BASE_DIR`, then
    /// the explicit override, each layer taking precedence over the previous one.
    pub fn load(config_path: Option<&Path>, base_dir_override: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                info!(config = %path.display(), "loaded settings file");
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };

        if let Ok(value) = std::env::var(BASE_DIR_ENV) {
            if !value.trim().is_empty() {
                debug!(base_dir = %value, "base dir taken from environment");
                settings.base_dir = PathBuf::from(value.trim());
            }
        }
        if let Some(base_dir) = base_dir_override {
            settings.base_dir = base_dir.to_path_buf();
        }

        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.resolve(&self.source_dir)
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.resolve(&self.analysis_dir)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.resolve(&self.reports_dir)
    }

    pub fn chart_font(&self) -> Option<PathBuf> {
        self.chart_font.as_deref().map(|path| self.resolve(path))
    }

    pub fn prefilter_mapping(&self) -> PathBuf {
        match &self.prefilter_mapping {
            Some(path) => self.resolve(path),
            None => self.base_dir.join(DEFAULT_MAPPING_FILE),
        }
    }
}

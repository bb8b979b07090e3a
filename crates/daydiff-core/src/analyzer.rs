use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use daydiff_parser::{extension_of, load_table};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::charts::{render_charts, ChartFile};
use crate::columns::detect_columns;
use crate::config::Settings;
use crate::daily::{compare_selected, consecutive_comparisons, daily_metrics, trend_summary, CompareSpec, DailyComparison};
use crate::error::{AnalysisError, Result};
use crate::metrics::{compute_metrics, ServiceMetrics};
use crate::preprocess::{preprocess, PreprocessReport};
use crate::status::{MetricKind, StatusLabel};
use crate::summary::{write_daily_summary, write_metrics_summary, SummaryContext};

const SOURCE_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];
const FOLDER_SEPARATORS: [char; 11] = [' ', '/', '\\', ':', '|', '*', '?', '"', '<', '>', '.'];

/// Everything one file's analysis produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub file: PathBuf,
    pub service: String,
    pub output_dir: PathBuf,
    pub report: PreprocessReport,
    pub metrics: ServiceMetrics,
    pub charts: Vec<String>,
    pub metrics_summary: Option<PathBuf>,
    pub comparison: Option<DailyComparison>,
    pub daily_summary: Option<PathBuf>,
    /// Dominant label per metric over every consecutive pair of days.
    pub trends: Vec<(MetricKind, StatusLabel)>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Lower-cased folder name with separators turned into single underscores.
pub fn normalize_service_name(raw: &str, fallback: &str) -> String {
    let replaced: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| if FOLDER_SEPARATORS.contains(&ch) { '_' } else { ch })
        .collect();
    let mut collapsed = String::with_capacity(replaced.len());
    for ch in replaced.chars() {
        if ch == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(ch);
    }
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A relative path that does not exist is looked up in the source folder.
pub fn resolve_input(path: &Path, settings: &Settings) -> PathBuf {
    if path.exists() || path.is_absolute() {
        return path.to_path_buf();
    }
    let candidate = settings.source_dir().join(path);
    if candidate.exists() {
        info!(file = %candidate.display(), "resolved input in source folder");
        candidate
    } else {
        path.to_path_buf()
    }
}

pub fn analyze_file(
    path: &Path,
    settings: &Settings,
    compare: Option<&CompareSpec>,
    now: NaiveDateTime,
) -> Result<AnalysisOutcome> {
    let path = resolve_input(path, settings);
    if !path.exists() {
        return Err(AnalysisError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )));
    }

    let table = load_table(&path)?;
    info!(
        file = %table.file_name(),
        rows = table.df.height(),
        columns = table.df.width(),
        "starting analysis"
    );

    let columns = table.column_names();
    let mapping = detect_columns(&columns);
    for (role, column) in mapping.iter() {
        info!(role = %role, column, "mapped column");
    }

    let frame = preprocess(&table.df, &mapping, &settings.preprocess)?;
    if frame.height() == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "no rows left in {} after preprocessing",
            table.file_name()
        )));
    }

    let dominant = frame.dominant_service()?;
    let folder = match &dominant {
        Some(service) => normalize_service_name(service, &table.file_stem),
        None => table.file_stem.clone(),
    };
    let service = dominant.unwrap_or_else(|| table.file_stem.clone());
    let output_dir = settings.analysis_dir().join(&folder);
    std::fs::create_dir_all(&output_dir)?;
    info!(service = %service, dir = %output_dir.display(), "service output folder");

    let metrics = compute_metrics(&frame)?;
    if metrics.is_empty() {
        return Err(AnalysisError::InsufficientData(format!(
            "no metrics could be computed for {}",
            table.file_name()
        )));
    }

    let charts: Vec<ChartFile> = render_charts(&frame, &output_dir, settings.chart_font().as_deref());

    let file_name = table.file_name();
    let ctx = SummaryContext {
        service: &service,
        file_name: &file_name,
        output_dir: &output_dir,
        generated: now,
    };

    let metrics_summary = match write_metrics_summary(&ctx, &metrics, &charts) {
        Ok(path) => Some(path),
        Err(err) => {
            warn!(%err, "failed to save metrics summary, continuing");
            None
        }
    };

    let mut comparison = None;
    let mut daily_summary = None;
    let mut trends = Vec::new();
    match daily_metrics(&frame) {
        Ok(daily) => {
            let history = consecutive_comparisons(&daily, &settings.thresholds);
            if !history.is_empty() {
                trends = trend_summary(&history);
            }
            match compare_selected(&daily, compare, &settings.thresholds) {
                Ok(selected) => {
                    match write_daily_summary(&ctx, &selected) {
                        Ok(path) => daily_summary = Some(path),
                        Err(err) => warn!(%err, "failed to save daily summary, continuing"),
                    }
                    comparison = Some(selected);
                }
                Err(err) => warn!(%err, "daily analysis skipped"),
            }
        }
        Err(err) => warn!(%err, "daily metrics failed, continuing"),
    }

    info!(service = %service, dir = %output_dir.display(), "analysis completed");
    Ok(AnalysisOutcome {
        file: path,
        service,
        output_dir,
        report: frame.report.clone(),
        metrics,
        charts: charts.iter().map(|chart| chart.file_name.to_string()).collect(),
        metrics_summary,
        comparison,
        daily_summary,
        trends,
    })
}

/// Analyzes every spreadsheet in the source folder; one failure does not stop the rest.
pub fn analyze_source_dir(
    settings: &Settings,
    compare: Option<&CompareSpec>,
    now: NaiveDateTime,
) -> Result<BatchOutcome> {
    let source_dir = settings.source_dir();
    if !source_dir.is_dir() {
        return Err(AnalysisError::Processing(format!(
            "source directory not found: {}",
            source_dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(&source_dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            extension_of(path).is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.as_str()))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        warn!(dir = %source_dir.display(), "no spreadsheet files found");
    }

    let mut outcome = BatchOutcome::default();
    for (idx, path) in files.iter().enumerate() {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = %name, position = idx + 1, total = files.len(), "analyzing file");
        match analyze_file(path, settings, compare, now) {
            Ok(_) => outcome.successful.push(name),
            Err(err) => {
                error!(file = %name, %err, "analysis failed");
                outcome.failed.push((name, err.to_string()));
            }
        }
    }

    info!(
        successful = outcome.successful.len(),
        failed = outcome.failed.len(),
        "batch analysis finished"
    );
    Ok(outcome)
}

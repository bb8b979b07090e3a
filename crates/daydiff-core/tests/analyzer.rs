use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

use daydiff_core::analyzer::{analyze_file, analyze_source_dir, normalize_service_name};
use daydiff_core::combined_report::build_combined_report;
use daydiff_core::config::Settings;
use daydiff_core::daily::CompareSpec;
use daydiff_core::daily_workbook::{collect_daily_digests, daily_workbook_file_name, write_daily_workbook};
use daydiff_core::digest::read_metrics_summary;
use daydiff_core::error::AnalysisError;
use daydiff_core::status::{MetricKind, StatusLabel};

const HEADERS: [&str; 7] = [
    "Date",
    "Service",
    "Status",
    "TotalTimeTaken",
    "UserUUID",
    "TotalLLMCost",
    "Message",
];

type Row = (&'static str, &'static str, f64, &'static str, f64, &'static str);

const ROWS: [Row; 9] = [
    ("2025-10-01 09:00:00", "info", 1.0, "u1", 0.1, "ok"),
    ("2025-10-01 10:00:00", "info", 2.0, "u2", 0.1, "ok"),
    ("2025-10-02 09:00:00", "info", 2.0, "u1", 0.2, "ok"),
    ("2025-10-02 11:00:00", "error", 4.0, "u3", 0.2, "Read timeout"),
    ("2025-10-02 12:00:00", "warn", 1.0, "u3", 0.2, "ok"),
    ("2025-10-03 09:00:00", "info", 1.0, "u1", 0.3, "ok"),
    ("2025-10-03 10:00:00", "info", 1.5, "u2", 0.3, "ok"),
    ("2025-10-03 11:00:00", "info", 1.5, "u4", 0.3, "ok"),
    ("2025-10-03 12:00:00", "info", 5000.0, "u4", 0.3, "ok"),
];

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 4)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn write_export(path: &Path, service: &str) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (idx, (date, status, time, user, cost, message)) in ROWS.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, *date).unwrap();
        sheet.write_string(row, 1, service).unwrap();
        sheet.write_string(row, 2, *status).unwrap();
        sheet.write_number(row, 3, *time).unwrap();
        sheet.write_string(row, 4, *user).unwrap();
        sheet.write_number(row, 5, *cost).unwrap();
        sheet.write_string(row, 6, *message).unwrap();
    }
    workbook.save(path).unwrap();
}

fn workspace() -> (TempDir, Settings) {
    let dir = TempDir::new().unwrap();
    let settings = Settings::with_base_dir(dir.path());
    fs::create_dir_all(settings.source_dir()).unwrap();
    (dir, settings)
}

#[test]
fn service_names_become_folder_names() {
    assert_eq!(normalize_service_name("QnA Service", "QnA"), "qna_service");
    assert_eq!(normalize_service_name(" api/v2 :: search ", "x"), "api_v2_search");
    assert_eq!(normalize_service_name("doc.parser", "x"), "doc_parser");
    assert_eq!(normalize_service_name("***", "Fallback"), "Fallback");
}

#[test]
fn settings_from_toml_resolve_against_base_dir() {
    let settings = Settings::from_toml_str(
        r#"
base_dir = "/data"
analysis_dir = "out"
chart_font = "fonts/DejaVuSans.ttf"

[thresholds]
latency_pct = 10.0

[preprocess]
drop_weekends = false
"#,
    )
    .unwrap();
    assert_eq!(settings.analysis_dir(), Path::new("/data/out"));
    assert_eq!(settings.source_dir(), Path::new("/data/source_data"));
    assert_eq!(settings.thresholds.latency_pct, 10.0);
    assert_eq!(settings.thresholds.cost_expensive_pct, 10.0);
    assert!(!settings.preprocess.drop_weekends);
    assert_eq!(settings.preprocess.max_response_time_ms, 2000.0);
    assert_eq!(
        settings.prefilter_mapping(),
        Path::new("/data/column_mapping_config.json")
    );
    assert_eq!(
        settings.chart_font().as_deref(),
        Some(Path::new("/data/fonts/DejaVuSans.ttf"))
    );

    assert!(Settings::from_toml_str("base_dir = 3").is_err());
}

#[test]
fn settings_file_with_override() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("daydiff.toml");
    fs::write(&config, "reports_dir = \"reports\"\n").unwrap();

    let settings = Settings::load(Some(&config), Some(Path::new("/srv/telemetry"))).unwrap();
    assert_eq!(settings.base_dir, Path::new("/srv/telemetry"));
    assert_eq!(settings.reports_dir(), Path::new("/srv/telemetry/reports"));
    assert!(settings.chart_font().is_none());
    assert!(Settings::load(Some(&dir.path().join("missing.toml")), None).is_err());
}

#[test]
fn analyzes_one_export_end_to_end() {
    let (_dir, settings) = workspace();
    write_export(&settings.source_dir().join("QnA.xlsx"), "QnA Service");

    let compare: CompareSpec = "01/10,03/10".parse().unwrap();
    // relative names are looked up in the source folder
    let outcome = analyze_file(Path::new("QnA.xlsx"), &settings, Some(&compare), now()).unwrap();

    assert_eq!(outcome.service, "QnA Service");
    assert_eq!(outcome.output_dir, settings.analysis_dir().join("qna_service"));
    assert_eq!(outcome.report.original_rows, 9);
    assert_eq!(outcome.report.final_rows, 7);

    let status = outcome.metrics.status.as_ref().unwrap();
    assert_eq!((status.success, status.errors), (6, 1));

    let comparison = outcome.comparison.as_ref().expect("comparison");
    assert_eq!(comparison.previous_date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
    assert_eq!(comparison.current_date, NaiveDate::from_ymd_opt(2025, 10, 3).unwrap());
    let throughput = comparison.get(MetricKind::Throughput).unwrap();
    assert_eq!((throughput.previous, throughput.current), (2.0, 3.0));
    assert_eq!(throughput.status, StatusLabel::Growing);
    assert_eq!(outcome.trends.len(), 5);

    let daily_path = outcome.daily_summary.as_ref().expect("daily summary");
    assert_eq!(
        daily_path,
        &outcome.output_dir.join("daily_analysis_01-10_vs_03-10.txt")
    );

    let summary_path = outcome.metrics_summary.as_ref().expect("metrics summary");
    let summary = read_metrics_summary(summary_path).unwrap();
    assert_eq!(summary.service, "QnA Service");
    assert_eq!(summary.error_messages, vec![("Read timeout".to_string(), 1)]);
    assert!(fs::read_to_string(summary_path).unwrap().contains("GENERATED CHARTS"));

    let digests = collect_daily_digests(&settings.analysis_dir()).unwrap();
    assert_eq!(digests.len(), 1);
    assert_eq!(digests[0].service, "qna_service");
    let workbook = settings.reports_dir().join(daily_workbook_file_name(now()));
    fs::create_dir_all(settings.reports_dir()).unwrap();
    let report = write_daily_workbook(digests, &workbook).unwrap();
    assert_eq!(report.sheets, vec!["Daily_Analysis_01_10_vs_03_10"]);
    assert!(workbook.exists());

    let combined = build_combined_report(&settings.analysis_dir(), &settings.reports_dir(), now())
        .unwrap()
        .expect("combined report");
    assert_eq!(combined.services, 1);
    assert_eq!(
        combined.path,
        settings.reports_dir().join("analysis_report_20251004_0800.xlsx")
    );
}

#[test]
fn missing_compare_date_still_writes_metrics() {
    let (_dir, settings) = workspace();
    let path = settings.source_dir().join("Search.xlsx");
    write_export(&path, "Search");

    let compare: CompareSpec = "01/10,09/10".parse().unwrap();
    let outcome = analyze_file(&path, &settings, Some(&compare), now()).unwrap();
    assert!(outcome.comparison.is_none());
    assert!(outcome.daily_summary.is_none());
    assert!(outcome.metrics_summary.is_some());
    assert_eq!(outcome.output_dir, settings.analysis_dir().join("search"));
}

#[test]
fn missing_input_is_an_error() {
    let (_dir, settings) = workspace();
    let err = analyze_file(Path::new("Nope.xlsx"), &settings, None, now()).unwrap_err();
    assert!(matches!(err, AnalysisError::Io(_)));
}

#[test]
fn batch_run_continues_past_failures() {
    let (_dir, settings) = workspace();
    write_export(&settings.source_dir().join("QnA.xlsx"), "QnA");
    fs::write(settings.source_dir().join("Broken.xlsx"), "not a workbook").unwrap();
    fs::write(settings.source_dir().join("notes.txt"), "ignored").unwrap();

    let outcome = analyze_source_dir(&settings, None, now()).unwrap();
    assert_eq!(outcome.successful, vec!["QnA.xlsx".to_string()]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0, "Broken.xlsx");
}

#[test]
fn batch_run_needs_a_source_folder() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::with_base_dir(dir.path().join("absent"));
    assert!(matches!(
        analyze_source_dir(&settings, None, now()),
        Err(AnalysisError::Processing(_))
    ));
}

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use plotters::prelude::*;
use tempfile::TempDir;

use daydiff_core::combined_report::{
    build_combined_report, combined_report_file_name, service_sheet_names, write_combined_report, SHEETS,
};
use daydiff_core::daily_workbook::{
    collect_daily_digests, daily_workbook_file_name, pair_sheet_name, write_daily_workbook,
    INDEX_SHEET,
};
use daydiff_core::digest::{
    DailyDigest, DigestMetric, FailureRow, GroupedDigest, MetricsDigest, StatsDigest, StatusDigest, TimingRow,
};
use daydiff_core::metrics::GroupKey;
use daydiff_core::status::MetricKind;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 4)
        .unwrap()
        .and_hms_opt(14, 5, 0)
        .unwrap()
}

fn sheet(path: &Path, name: &str) -> Range<Data> {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("open workbook");
    workbook.worksheet_range(name).expect("worksheet")
}

fn sheet_names(path: &Path) -> Vec<String> {
    let workbook: Xlsx<_> = open_workbook(path).expect("open workbook");
    workbook.sheet_names()
}

fn text(range: &Range<Data>, row: u32, col: u32) -> Option<String> {
    match range.get_value((row, col)) {
        Some(Data::String(value)) => Some(value.clone()),
        _ => None,
    }
}

fn number(range: &Range<Data>, row: u32, col: u32) -> Option<f64> {
    match range.get_value((row, col)) {
        Some(Data::Float(value)) => Some(*value),
        Some(Data::Int(value)) => Some(*value as f64),
        _ => None,
    }
}

fn latency_digest(service: &str, previous: &str, current: &str, values: (f64, f64)) -> DailyDigest {
    DailyDigest {
        service: service.to_string(),
        previous_label: previous.to_string(),
        current_label: current.to_string(),
        metrics: vec![DigestMetric {
            kind: MetricKind::Latency,
            previous_value: Some(values.0),
            current_value: Some(values.1),
            change: Some("-15.000ms (↓5.77% improvement)".to_string()),
            status: Some("IMPROVING".to_string()),
        }],
    }
}

#[test]
fn file_names_follow_the_clock() {
    assert_eq!(daily_workbook_file_name(now()), "October_daily.xlsx");
    assert_eq!(combined_report_file_name(now()), "analysis_report_20251004_1405.xlsx");
    assert_eq!(pair_sheet_name("02-10_vs_03-10"), "Daily_Analysis_02_10_vs_03_10");
}

#[test]
fn daily_workbook_has_index_then_chronological_pairs() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("October_daily.xlsx");
    let digests = vec![
        latency_digest("search", "02-10", "03-10", (300.0, 280.5)),
        latency_digest("qna", "02-10", "03-10", (260.0, 245.0)),
        latency_digest("qna", "30-09", "01-10", (250.0, 260.0)),
    ];

    let report = write_daily_workbook(digests, &output).unwrap();
    assert_eq!(report.services, 3);
    assert_eq!(
        report.sheets,
        vec!["Daily_Analysis_30_09_vs_01_10", "Daily_Analysis_02_10_vs_03_10"]
    );
    assert_eq!(
        sheet_names(&output),
        vec![
            INDEX_SHEET.to_string(),
            "Daily_Analysis_30_09_vs_01_10".to_string(),
            "Daily_Analysis_02_10_vs_03_10".to_string(),
        ]
    );

    let index = sheet(&output, INDEX_SHEET);
    assert_eq!(text(&index, 0, 0).as_deref(), Some("Daily Analysis Report"));
    assert_eq!(text(&index, 3, 0).as_deref(), Some("Daily_Analysis_30_09_vs_01_10"));
    assert_eq!(text(&index, 4, 0).as_deref(), Some("Daily_Analysis_02_10_vs_03_10"));
    assert_eq!(text(&index, 7, 0).as_deref(), Some("Metric Definitions"));
    assert_eq!(text(&index, 9, 0).as_deref(), Some("1. Latency Metric"));

    let pair = sheet(&output, "Daily_Analysis_02_10_vs_03_10");
    let headers: Vec<Option<String>> = (0..5).map(|col| text(&pair, 0, col)).collect();
    assert_eq!(
        headers,
        ["Service", "02-10", "03-10", "Change", "Status"]
            .map(|h| Some(h.to_string()))
            .to_vec()
    );
    assert_eq!(text(&pair, 1, 0).as_deref(), Some("qna"));
    assert_eq!(text(&pair, 2, 0).as_deref(), Some("Latency Metric"));
    assert_eq!(number(&pair, 2, 1), Some(260.0));
    assert_eq!(number(&pair, 2, 2), Some(245.0));
    assert_eq!(text(&pair, 2, 4).as_deref(), Some("IMPROVING"));
    assert_eq!(text(&pair, 4, 0).as_deref(), Some("search"));
    assert_eq!(number(&pair, 5, 2), Some(280.5));
}

#[test]
fn collects_only_parseable_daily_summaries() {
    let dir = TempDir::new().unwrap();
    let qna = dir.path().join("qna");
    fs::create_dir_all(&qna).unwrap();
    fs::write(
        qna.join("daily_analysis_02-10_vs_03-10.txt"),
        "Comparison: 2025-10-02 → 2025-10-03\n\n\
         1. Latency Metric\n\
         2025-10-02 Avg Response Time: 260.000ms\n\
         2025-10-03 Avg Response Time: 245.000ms\n\
         Change: -15.000ms (↓5.77% improvement)\n\
         Status: IMPROVING\n\n",
    )
    .unwrap();
    fs::write(qna.join("daily_analysis_notes.txt"), "not a summary").unwrap();

    let digests = collect_daily_digests(dir.path()).unwrap();
    assert_eq!(digests.len(), 1);
    assert_eq!(digests[0].service, "qna");
    assert_eq!(digests[0].pair_key(), "02-10_vs_03-10");
}

fn metrics_digest(service: &str, messages: &[(&str, usize)]) -> MetricsDigest {
    let errors: usize = messages.iter().map(|(_, count)| count).sum();
    MetricsDigest {
        service: service.to_string(),
        source: PathBuf::from(format!("analysis_output/{service}/metrics_analysis.txt")),
        response_time: Some(StatsDigest {
            avg: Some(1.25),
            min: Some(0.5),
            max: Some(3.0),
            median: Some(1.0),
            std: Some(0.4),
            total: None,
            records: Some(100),
            percentiles: vec![(50, 1.0), (95, 2.5), (99, 2.9)],
        }),
        llm_cost: None,
        status: Some(StatusDigest {
            errors,
            error_pct: errors as f64,
            success: 100 - errors,
            success_pct: (100 - errors) as f64,
            total: 100,
        }),
        error_categories: Vec::new(),
        error_messages: messages.iter().map(|(m, c)| (m.to_string(), *c)).collect(),
        ..MetricsDigest::default()
    }
}

fn blank_png(path: &Path) {
    let root = BitMapBackend::new(path, (64, 48)).into_drawing_area();
    root.fill(&WHITE).unwrap();
    root.present().unwrap();
}

#[test]
fn combined_report_sheets_and_category_messages() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("report.xlsx");
    let digests = vec![
        metrics_digest("QnA", &[("Request timed out", 5), ("Invalid payload", 2)]),
        metrics_digest("Search", &[("Read timeout", 9), ("Connection refused", 1)]),
    ];

    let report = write_combined_report(&digests, &output, now()).unwrap();
    assert_eq!(report.services, 2);
    assert_eq!(report.charts, 0);
    let mut expected = SHEETS.map(str::to_string).to_vec();
    expected.extend(["QnA".to_string(), "Search".to_string()]);
    assert_eq!(sheet_names(&output), expected);

    let index = sheet(&output, "Index");
    assert_eq!(text(&index, 3, 0).as_deref(), Some("Overview"));
    assert_eq!(text(&index, 9, 0).as_deref(), Some("Category Messages"));
    assert_eq!(text(&index, 10, 0).as_deref(), Some("Charts"));
    assert_eq!(text(&index, 11, 0).as_deref(), Some("QnA"));
    assert_eq!(text(&index, 12, 0).as_deref(), Some("Search"));

    let overview = sheet(&output, "Overview");
    assert_eq!(text(&overview, 2, 1).as_deref(), Some("2025-10-04 14:05:00"));
    assert_eq!(number(&overview, 3, 1), Some(2.0));
    assert_eq!(text(&overview, 5, 0).as_deref(), Some("QnA"));
    assert_eq!(number(&overview, 6, 1), Some(100.0));

    let response = sheet(&output, "Response Times");
    assert_eq!(text(&response, 2, 0).as_deref(), Some("Search"));
    assert_eq!(number(&response, 2, 1), Some(1.25));
    assert_eq!(text(&response, 0, 6).as_deref(), Some("P95 (s)"));
    assert_eq!(number(&response, 2, 6), Some(2.5));
    assert_eq!(number(&response, 2, 7), Some(2.9));

    let category_messages = sheet(&output, "Category Messages");
    let rows: Vec<(String, String, String, f64)> = (1..=4)
        .map(|row| {
            (
                text(&category_messages, row, 0).unwrap(),
                text(&category_messages, row, 1).unwrap(),
                text(&category_messages, row, 2).unwrap(),
                number(&category_messages, row, 3).unwrap(),
            )
        })
        .collect();
    let ordered: Vec<(&str, &str, f64)> = rows
        .iter()
        .map(|(service, _, message, count)| (service.as_str(), message.as_str(), *count))
        .collect();
    assert_eq!(
        ordered,
        vec![
            ("QnA", "Invalid payload", 2.0),
            ("Search", "Connection refused", 1.0),
            ("Search", "Read timeout", 9.0),
            ("QnA", "Request timed out", 5.0),
        ]
    );
    assert_eq!(rows[0].1, "Data Validation/Payload Errors");
    assert_eq!(rows[3].1, "Timeout Errors");
}

#[test]
fn combined_report_skipped_without_summaries() {
    let dir = TempDir::new().unwrap();
    let built = build_combined_report(&dir.path().join("analysis_output"), &dir.path().join("reports"), now())
        .unwrap();
    assert!(built.is_none());
}

#[test]
fn service_sheet_collects_kpis_tables_and_errors() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("report.xlsx");
    let mode = GroupKey {
        process: None,
        mode: Some(9),
    };
    let mut digest = metrics_digest("QnA", &[("Request timed out", 5), ("Invalid payload", 2)]);
    digest.error_categories = vec![("Timeout Errors".to_string(), 5)];
    digest.by_mode = GroupedDigest {
        response_time: vec![TimingRow {
            key: mode.clone(),
            avg: 4.5,
            p50: 4.0,
            min: 1.0,
            max: 9.0,
            std: 2.0,
            count: 40,
        }],
        llm_cost: Vec::new(),
        failures: vec![FailureRow {
            key: mode,
            errors: 4,
            info: 36,
            total: 40,
            failure_pct: 10.0,
        }],
    };
    digest.by_process_mode.response_time = vec![TimingRow {
        key: GroupKey {
            process: Some("Answer Generation".to_string()),
            mode: Some(2),
        },
        avg: 3.0,
        p50: 3.0,
        min: 3.0,
        max: 3.0,
        std: 0.0,
        count: 1,
    }];

    write_combined_report(&[digest], &output, now()).unwrap();
    let qna = sheet(&output, "QnA");

    assert_eq!(text(&qna, 0, 0).as_deref(), Some("Service: QnA"));
    assert_eq!(text(&qna, 2, 0).as_deref(), Some("Metric"));
    assert_eq!(text(&qna, 5, 0).as_deref(), Some("Errors"));
    assert_eq!(number(&qna, 5, 1), Some(7.0));
    assert_eq!(number(&qna, 7, 1), Some(0.07));

    assert_eq!(text(&qna, 12, 0).as_deref(), Some("P95 Time"));
    assert_eq!(number(&qna, 12, 1), Some(2.5));
    assert_eq!(number(&qna, 13, 1), Some(2.9));

    assert_eq!(text(&qna, 18, 0).as_deref(), Some("Response Time by Mode"));
    assert_eq!(text(&qna, 19, 1).as_deref(), Some("Mode Name"));
    assert_eq!(number(&qna, 20, 0), Some(9.0));
    assert_eq!(text(&qna, 20, 1).as_deref(), Some("isDeepResearch"));
    assert_eq!(number(&qna, 20, 2), Some(4.5));
    assert_eq!(number(&qna, 20, 7), Some(40.0));

    assert_eq!(text(&qna, 22, 0).as_deref(), Some("Failure Rate by Mode"));
    assert_eq!(number(&qna, 24, 2), Some(4.0));
    assert_eq!(number(&qna, 24, 5), Some(0.1));

    assert_eq!(text(&qna, 26, 0).as_deref(), Some("Response Time by Process × Mode"));
    assert_eq!(text(&qna, 27, 1).as_deref(), Some("Mode"));
    assert_eq!(text(&qna, 28, 0).as_deref(), Some("Answer Generation"));
    assert_eq!(number(&qna, 28, 1), Some(2.0));

    assert_eq!(text(&qna, 30, 0).as_deref(), Some("Error Categories"));
    assert_eq!(text(&qna, 32, 0).as_deref(), Some("Timeout Errors"));

    assert_eq!(text(&qna, 34, 0).as_deref(), Some("Error Messages"));
    assert_eq!(text(&qna, 36, 1).as_deref(), Some("Invalid payload"));
    assert_eq!(text(&qna, 37, 0).as_deref(), Some("Timeout Errors"));
    assert_eq!(number(&qna, 37, 2), Some(5.0));
}

#[test]
fn charts_sheet_embeds_images_and_notes_unreadable_ones() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("report.xlsx");
    let chart = dir.path().join("dau_chart.png");
    blank_png(&chart);
    let broken = dir.path().join("response_time_analysis.png");
    fs::write(&broken, b"not an image").unwrap();

    let mut qna = metrics_digest("QnA", &[]);
    qna.charts = vec![chart, broken.clone()];
    let search = metrics_digest("Search", &[]);

    let report = write_combined_report(&[qna, search], &output, now()).unwrap();
    assert_eq!(report.charts, 1);

    let charts = sheet(&output, "Charts");
    assert_eq!(text(&charts, 0, 0).as_deref(), Some("Charts by Service"));
    assert_eq!(text(&charts, 2, 0).as_deref(), Some("Service: QnA"));
    assert_eq!(
        text(&charts, 31, 0),
        Some(format!("[Image not found: {}]", broken.display()))
    );
    // services without charts get no section
    assert_eq!(text(&charts, 35, 0), None);
}

#[test]
fn service_sheet_names_are_valid_and_unique() {
    let digest = |service: &str| MetricsDigest {
        service: service.to_string(),
        ..MetricsDigest::default()
    };
    let digests = [
        digest("Overview"),
        digest("qna/search: v2"),
        digest("a very long service name that keeps going"),
        digest("A very long service name that keeps on going"),
    ];

    assert_eq!(
        service_sheet_names(&digests),
        vec![
            "Overview-1",
            "qna_search_ v2",
            "a very long service name that k",
            "A very long service name that-1",
        ]
    );
}

use polars::prelude::*;

use daydiff_core::columns::detect_columns;
use daydiff_core::config::PreprocessSettings;
use daydiff_core::metrics::{
    compute_metrics, mode_name, quantile, ErrorCategory, Percentiles, SummaryStats,
};
use daydiff_core::preprocess::{preprocess, TelemetryFrame};

fn frame_from(raw: DataFrame) -> TelemetryFrame {
    let names: Vec<String> = raw.get_column_names().iter().map(|n| n.to_string()).collect();
    preprocess(&raw, &detect_columns(&names), &PreprocessSettings::default()).expect("preprocess")
}

fn process_mode_frame() -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            "Date".into(),
            vec![
                "2025-10-01 09:00:00",
                "2025-10-01 10:00:00",
                "2025-10-01 11:00:00",
                "2025-10-02 09:00:00",
                "2025-10-02 10:00:00",
            ],
        )
        .into(),
        Series::new("Status".into(), vec!["info", "error", "info", "info", "error"]).into(),
        Series::new("TotalTimeTaken".into(), vec![4.0, 6.0, 1.0, 2.0, 3.0]).into(),
        Series::new("TotalLLMCost".into(), vec![0.5, 0.5, 0.1, 0.2, 0.4]).into(),
        Series::new("ProcessName".into(), vec!["ingest", "ingest", "answer", "answer", "answer"])
            .into(),
        Series::new("RequestPayload.Mode".into(), vec![1.0, 11.0, 11.0, 3.0, 3.0]).into(),
        Series::new("RedirectedMode".into(), vec![None, Some(2.0), Some(9.0), None, None]).into(),
        Series::new(
            "Message".into(),
            vec![
                "ok",
                "LiteLLM request timed out",
                "ok",
                "ok",
                "Invalid data payload received",
            ],
        )
        .into(),
    ])
}

#[test]
fn response_time_percentiles_interpolate_between_ranks() {
    let shuffled = [7.0, 1.0, 10.0, 4.0, 2.0, 9.0, 3.0, 8.0, 6.0, 5.0];
    let stats = SummaryStats::from_values(&shuffled).unwrap();

    let expected = [(50, 5.5), (75, 7.75), (90, 9.1), (95, 9.55), (99, 9.91)];
    for ((level, value), (want_level, want)) in stats.percentiles.levels().into_iter().zip(expected) {
        assert_eq!(level, want_level);
        assert!((value - want).abs() < 1e-9, "p{level} = {value}, expected {want}");
    }
    assert_eq!(stats.median, stats.percentiles.p50);
    assert_eq!(Percentiles::LEVELS, [50, 75, 90, 95, 99]);

    assert_eq!(quantile(&[], 0.5), None);
    assert_eq!(quantile(&[2.0, 4.0], 0.0), Some(2.0));
    assert_eq!(quantile(&[2.0, 4.0], 1.0), Some(4.0));
    assert_eq!(quantile(&[2.0, 4.0], 0.25), Some(2.5));
}

#[test]
fn summary_stats_use_sample_deviation() {
    let stats = SummaryStats::from_values(&[1.0, 3.0, 2.0, 6.0]).unwrap();
    assert_eq!(stats.mean, 3.0);
    assert_eq!(stats.median, 2.5);
    assert_eq!(stats.min, 1.0);
    assert_eq!(stats.max, 6.0);
    assert_eq!(stats.total, 12.0);
    assert!((stats.std - (14.0_f64 / 3.0).sqrt()).abs() < 1e-12);

    let single = SummaryStats::from_values(&[7.0]).unwrap();
    assert_eq!(single.percentiles.p99, 7.0);
    assert_eq!(single.std, 0.0);
    assert!(SummaryStats::from_values(&[]).is_none());
}

#[test]
fn categorizes_error_messages_by_first_matching_rule() {
    assert_eq!(ErrorCategory::categorize("Request timed out after 30s"), ErrorCategory::Timeout);
    assert_eq!(ErrorCategory::categorize("Socket closed"), ErrorCategory::Network);
    assert_eq!(ErrorCategory::categorize("403 Forbidden"), ErrorCategory::Auth);
    assert_eq!(ErrorCategory::categorize("Index contains no results"), ErrorCategory::NotFound);
    assert_eq!(ErrorCategory::categorize("Internal Server Error"), ErrorCategory::InternalServer);
    assert_eq!(ErrorCategory::categorize("litellm.BadGateway"), ErrorCategory::LlmService);
    assert_eq!(ErrorCategory::categorize("Unknown filtertype"), ErrorCategory::QueryParameter);
    assert_eq!(ErrorCategory::categorize("Unhandled exception"), ErrorCategory::ApplicationException);
    assert_eq!(ErrorCategory::categorize("Model mapping missing"), ErrorCategory::NotFound);
    assert_eq!(ErrorCategory::categorize("Could not fetch model mapping"), ErrorCategory::ServiceConfiguration);
    assert_eq!(ErrorCategory::categorize("Unexpected JSON token"), ErrorCategory::DataFormat);
    assert_eq!(ErrorCategory::categorize("something odd"), ErrorCategory::Other);
    assert_eq!(ErrorCategory::Other.label(), "Other/Uncategorized Errors");
}

#[test]
fn status_and_error_breakdown() -> PolarsResult<()> {
    let frame = frame_from(process_mode_frame()?);
    let metrics = compute_metrics(&frame).expect("metrics");

    let status = metrics.status.as_ref().expect("status analysis");
    assert_eq!(status.processed_total, 5);
    assert_eq!(status.success, 3);
    assert_eq!(status.errors, 2);
    assert!((status.error_rate - 40.0).abs() < 1e-9);

    assert_eq!(metrics.error_breakdown.len(), 2);
    let categories: Vec<ErrorCategory> = metrics.error_categories.iter().map(|(c, _)| *c).collect();
    assert_eq!(categories, vec![ErrorCategory::Timeout, ErrorCategory::Validation]);

    let rt = metrics.response_time.as_ref().expect("response time");
    assert_eq!(rt.count, 5);
    assert_eq!(rt.mean, 3.2);
    let cost = metrics.llm_cost.as_ref().expect("cost");
    assert!((cost.total - 1.7).abs() < 1e-9);
    Ok(())
}

#[test]
fn grouped_tables_by_process_and_mode() -> PolarsResult<()> {
    let frame = frame_from(process_mode_frame()?);
    let metrics = compute_metrics(&frame).expect("metrics");

    // mean ascending: answer (2.0) before ingest (5.0)
    let processes: Vec<&str> = metrics
        .by_process
        .response_time
        .iter()
        .filter_map(|row| row.key.process.as_deref())
        .collect();
    assert_eq!(processes, vec!["answer", "ingest"]);

    // cost by total descending: ingest (1.0) before answer (0.7)
    assert_eq!(metrics.by_process.llm_cost[0].key.process.as_deref(), Some("ingest"));

    let ingest = metrics
        .by_process
        .failures
        .iter()
        .find(|row| row.key.process.as_deref() == Some("ingest"))
        .expect("ingest failures");
    assert_eq!((ingest.errors, ingest.info), (1, 1));
    assert_eq!(ingest.failure_pct(), 50.0);

    // 11 -> 2 via redirect, 11 with redirect 9 -> 0
    let modes: Vec<i64> = metrics.by_mode.failures.iter().filter_map(|row| row.key.mode).collect();
    assert_eq!(modes, vec![0, 1, 2, 3]);
    assert_eq!(metrics.by_mode.failures[3].errors, 1);
    assert_eq!(mode_name(2), "isInternet");
    assert_eq!(mode_name(42), "42");

    assert_eq!(metrics.by_process_mode.failures.len(), 4);
    Ok(())
}

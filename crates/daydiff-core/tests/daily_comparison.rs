use std::collections::BTreeMap;

use chrono::NaiveDate;
use polars::prelude::*;

use daydiff_core::columns::detect_columns;
use daydiff_core::config::PreprocessSettings;
use daydiff_core::daily::{
    compare_selected, consecutive_comparisons, daily_metrics, resolve_date_token, select_dates,
    trend_summary, CompareSpec, DailyMetrics,
};
use daydiff_core::error::AnalysisError;
use daydiff_core::preprocess::preprocess;
use daydiff_core::status::{MetricKind, StatusLabel, Thresholds};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn day(date: NaiveDate, requests: usize, users: usize, rt: f64, success: f64, cost: f64) -> DailyMetrics {
    DailyMetrics {
        date,
        total_requests: requests,
        unique_users: users,
        avg_response_time: rt,
        success_rate: success,
        total_llm_cost: cost,
    }
}

#[test]
fn aggregates_metrics_per_calendar_date() -> PolarsResult<()> {
    let raw = DataFrame::new(vec![
        Series::new(
            "Date".into(),
            vec![
                "2025-10-01 09:00:00",
                "2025-10-01 10:00:00",
                "2025-10-02 09:00:00",
                "2025-10-02 09:30:00",
                "2025-10-02 11:00:00",
            ],
        )
        .into(),
        Series::new("Status".into(), vec!["info", "error", "info", "info", "info"]).into(),
        Series::new("TotalTimeTaken".into(), vec![1.0, 3.0, 2.0, 2.0, 5.0]).into(),
        Series::new("UserUUID".into(), vec!["a", "b", "a", "a", "c"]).into(),
        Series::new("TotalLLMCost".into(), vec![0.25, 0.25, 0.5, 0.5, 1.0]).into(),
    ])?;
    let names: Vec<String> = raw.get_column_names().iter().map(|n| n.to_string()).collect();
    let frame = preprocess(&raw, &detect_columns(&names), &PreprocessSettings::default())
        .expect("preprocess");

    let daily = daily_metrics(&frame).expect("daily metrics");
    assert_eq!(daily.len(), 2);
    let first = &daily[&date(2025, 10, 1)];
    assert_eq!(first.total_requests, 2);
    assert_eq!(first.unique_users, 2);
    assert_eq!(first.avg_response_time, 2.0);
    assert_eq!(first.success_rate, 50.0);
    assert_eq!(first.total_llm_cost, 0.5);
    let second = &daily[&date(2025, 10, 2)];
    assert_eq!(second.total_requests, 3);
    assert_eq!(second.unique_users, 2);
    assert_eq!(second.avg_response_time, 3.0);
    assert_eq!(second.success_rate, 100.0);
    assert_eq!(second.total_llm_cost, 2.0);

    let comparison = compare_selected(&daily, None, &Thresholds::default()).expect("comparison");
    let latency = comparison.get(MetricKind::Latency).unwrap();
    assert_eq!(latency.change, 1.0);
    assert_eq!(latency.percent, 50.0);
    assert_eq!(latency.status, StatusLabel::Degrading);
    assert_eq!(comparison.get(MetricKind::Reliability).unwrap().status, StatusLabel::Improving);
    assert_eq!(comparison.get(MetricKind::LlmCost).unwrap().status, StatusLabel::Expensive);
    assert_eq!(comparison.get(MetricKind::UserActivity).unwrap().status, StatusLabel::Stable);
    Ok(())
}

#[test]
fn compare_spec_parsing() {
    let spec: CompareSpec = " 01/10 , 03/10 ".parse().unwrap();
    assert_eq!(spec.previous, "01/10");
    assert_eq!(spec.current, "03/10");
    assert!("01/10".parse::<CompareSpec>().is_err());
    assert!("01/10,".parse::<CompareSpec>().is_err());
}

#[test]
fn day_month_tokens_pick_latest_year() {
    let available = [date(2024, 10, 1), date(2025, 10, 1), date(2025, 10, 2)];
    assert_eq!(resolve_date_token("01/10", &available), Some(date(2025, 10, 1)));
    assert_eq!(resolve_date_token("2024-10-01", &available), Some(date(2024, 10, 1)));
    assert_eq!(resolve_date_token("2025-10-03", &available), None);
    assert_eq!(resolve_date_token("31/12", &available), None);
}

#[test]
fn selects_requested_or_last_two_dates() {
    let available = [date(2025, 10, 1), date(2025, 10, 2), date(2025, 10, 3)];
    assert_eq!(
        select_dates(&available, None).unwrap(),
        (date(2025, 10, 2), date(2025, 10, 3))
    );

    let spec: CompareSpec = "01/10,03/10".parse().unwrap();
    assert_eq!(
        select_dates(&available, Some(&spec)).unwrap(),
        (date(2025, 10, 1), date(2025, 10, 3))
    );

    let missing: CompareSpec = "2025-10-01,2025-10-09".parse().unwrap();
    assert!(matches!(
        select_dates(&available, Some(&missing)),
        Err(AnalysisError::DateSelection(_))
    ));
    assert!(matches!(
        select_dates(&available[..1], None),
        Err(AnalysisError::InsufficientData(_))
    ));
}

#[test]
fn trend_summary_over_consecutive_days() {
    let mut daily = BTreeMap::new();
    for metrics in [
        day(date(2025, 10, 1), 100, 50, 200.0, 99.0, 1.0),
        day(date(2025, 10, 2), 120, 50, 200.0, 99.0, 1.0),
        day(date(2025, 10, 3), 150, 40, 200.0, 99.0, 1.0),
        day(date(2025, 10, 6), 150, 40, 200.0, 95.0, 1.0),
    ] {
        daily.insert(metrics.date, metrics);
    }

    let history = consecutive_comparisons(&daily, &Thresholds::default());
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].previous_date, date(2025, 10, 3));

    let trends: BTreeMap<MetricKind, StatusLabel> = trend_summary(&history).into_iter().collect();
    assert_eq!(trends[&MetricKind::Throughput], StatusLabel::Growing);
    assert_eq!(trends[&MetricKind::Latency], StatusLabel::Stable);
    assert_eq!(trends[&MetricKind::UserActivity], StatusLabel::Stable);
    assert_eq!(trends[&MetricKind::Reliability], StatusLabel::Stable);
}

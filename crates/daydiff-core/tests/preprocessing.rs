use chrono::{NaiveDate, Timelike};
use polars::prelude::*;

use daydiff_core::columns::{detect_columns, normalize_column_name, ColumnRole};
use daydiff_core::config::PreprocessSettings;
use daydiff_core::preprocess::{
    canonical, effective_mode, excel_serial_to_datetime, parse_timestamp, preprocess,
};

fn telemetry_frame() -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            "Date".into(),
            vec![
                "2025-10-01 10:00:00",
                "2025-10-01 11:00:00",
                "2025-10-04 09:00:00",
                "not a date",
                "2025-10-02 09:00:00",
                "2025-10-02 09:30:00",
                "2025-10-02 10:00:00",
                "2025-10-02 12:00:00",
            ],
        )
        .into(),
        Series::new(
            "Service".into(),
            vec!["QnA", "QnA", "QnA", "QnA", "  ", "QnA", "QnA", "QnA"],
        )
        .into(),
        Series::new(
            "Status".into(),
            vec!["info", "Error", "info", "info", "info", "warn", "info", "info"],
        )
        .into(),
        Series::new(
            "TotalTimeTaken".into(),
            vec![1.0, 3.0, 1.0, 1.0, 1.0, 1.0, 2500.0, 2.0],
        )
        .into(),
        Series::new(
            "UserUUID".into(),
            vec!["u1", "u2", "u1", "u1", "u1", "u1", "u1", "u3"],
        )
        .into(),
        Series::new(
            "Meta.TotalLLMCost".into(),
            vec![0.1, 0.2, 0.1, 0.1, 0.1, 0.1, 0.1, 0.3],
        )
        .into(),
        Series::new(
            "Message".into(),
            vec!["ok", "Connection timeout", "ok", "ok", "ok", "ok", "ok", "ok"],
        )
        .into(),
        Series::new("Unused".into(), vec![None::<&str>; 8]).into(),
    ])
}

#[test]
fn detects_roles_from_normalized_names() {
    let columns = [
        "@timestamp",
        "@Status",
        "Meta.TotalLLMCost",
        "@UserUUID",
        "ProcessName",
        "RequestPayload.Mode",
        "RedirectedMode",
        "Message",
        "@Message",
    ];
    let mapping = detect_columns(&columns);
    assert_eq!(mapping.get(ColumnRole::Date), Some("@timestamp"));
    assert_eq!(mapping.get(ColumnRole::Status), Some("@Status"));
    assert_eq!(mapping.get(ColumnRole::LlmCost), Some("Meta.TotalLLMCost"));
    assert_eq!(mapping.get(ColumnRole::UserId), Some("@UserUUID"));
    assert_eq!(mapping.get(ColumnRole::ProcessName), Some("ProcessName"));
    assert_eq!(mapping.get(ColumnRole::RequestMode), Some("RequestPayload.Mode"));
    assert_eq!(mapping.get(ColumnRole::RedirectedMode), Some("RedirectedMode"));
    assert_eq!(mapping.get(ColumnRole::Message), Some("Message"));
    assert!(!mapping.contains(ColumnRole::ResponseTime));
    assert_eq!(normalize_column_name("Total Time_Taken.ms"), "totaltimetakenms");
}

#[test]
fn preprocess_applies_every_filter_in_order() -> PolarsResult<()> {
    let raw = telemetry_frame()?;
    let names: Vec<String> = raw.get_column_names().iter().map(|n| n.to_string()).collect();
    let mapping = detect_columns(&names);

    let frame = preprocess(&raw, &mapping, &PreprocessSettings::default()).expect("preprocess");
    let report = &frame.report;
    assert_eq!(report.original_rows, 8);
    assert_eq!(report.dropped_columns, vec!["Unused".to_string()]);
    assert_eq!(report.blank_service_removed, 1);
    assert_eq!(report.invalid_date_removed, 1);
    assert_eq!(report.weekend_removed, 1);
    assert_eq!(report.status_removed, 1);
    assert_eq!(report.response_time_removed, 1);
    assert_eq!(report.final_rows, 3);
    assert_eq!(report.removed_rows(), 5);

    let statuses = frame.df.column(canonical::STATUS)?.str()?;
    assert_eq!(statuses.get(1), Some("error"));
    let dates = frame.df.column(canonical::FORMATTED_DATE)?.str()?;
    assert_eq!(dates.get(2), Some("2025-10-02"));
    let rows = frame.df.column(canonical::SOURCE_ROW)?.i64()?;
    assert_eq!(rows.get(2), Some(7));
    assert_eq!(frame.dominant_service().expect("service"), Some("QnA".to_string()));
    Ok(())
}

#[test]
fn weekends_can_be_kept() -> PolarsResult<()> {
    let raw = telemetry_frame()?;
    let names: Vec<String> = raw.get_column_names().iter().map(|n| n.to_string()).collect();
    let settings = PreprocessSettings {
        drop_weekends: false,
        ..PreprocessSettings::default()
    };
    let frame = preprocess(&raw, &detect_columns(&names), &settings).expect("preprocess");
    assert_eq!(frame.report.weekend_removed, 0);
    assert_eq!(frame.height(), 4);
    Ok(())
}

#[test]
fn auto_mode_resolves_through_redirect() {
    assert_eq!(effective_mode(Some(11.0), Some(2.0)), Some(2));
    assert_eq!(effective_mode(Some(11.0), Some(7.0)), Some(7));
    assert_eq!(effective_mode(Some(11.0), Some(3.0)), Some(0));
    assert_eq!(effective_mode(Some(11.0), None), Some(0));
    assert_eq!(effective_mode(Some(4.0), Some(2.0)), Some(4));
    assert_eq!(effective_mode(None, Some(2.0)), None);
}

#[test]
fn parses_common_timestamp_layouts() {
    let expected = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
    for text in [
        "2025-10-01T08:15:00Z",
        "2025-10-01 08:15:00.123",
        "10/01/2025 08:15:00",
        "Oct 1, 2025 @ 08:15:00.000",
        "2025-10-01",
    ] {
        let parsed = parse_timestamp(text).unwrap_or_else(|| panic!("failed to parse {text}"));
        assert_eq!(parsed.date(), expected, "{text}");
    }
    assert!(parse_timestamp("yesterday").is_none());

    let serial = excel_serial_to_datetime(45931.5).unwrap();
    assert_eq!(serial.date(), expected);
    assert_eq!(serial.hour(), 12);
    assert!(excel_serial_to_datetime(-3.0).is_none());
}

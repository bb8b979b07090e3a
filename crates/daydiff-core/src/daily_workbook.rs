use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatUnderline, Url, Workbook, Worksheet,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::digest::{read_daily_summary, DailyDigest};
use crate::error::Result;
use crate::status::{StatusLabel, Tone};

pub const INDEX_SHEET: &str = "Link to other tabs";
const MAX_COLUMN_WIDTH: usize = 50;
const COLUMNS: u16 = 5;

const METRIC_DEFINITIONS: [(&str, [&str; 4]); 5] = [
    (
        "1. Latency Metric",
        [
            "Definition: Measures the response time of the system in milliseconds. Lower values indicate better performance.",
            "This metric tracks how quickly the system responds to user requests. Faster response times lead to better user experience.",
            "Example: 03-10 Avg Response Time: 245ms, 02-10: 260ms, Change: -15ms (↓5.8% improvement)",
            "Status: IMPROVING (response time decreased), DEGRADING (increased), STABLE (minimal change)",
        ],
    ),
    (
        "2. Throughput Metric",
        [
            "Definition: Measures the total number of requests processed by the system in a given time period.",
            "This metric indicates the system's workload and capacity. Higher throughput often indicates higher usage and demand.",
            "Example: 03-10 Total Requests: 1,247, 02-10: 1,156, Change: +91 requests (↑7.9% increase)",
            "Status: GROWING (more requests), DECLINING (fewer requests), STABLE (similar request volume)",
        ],
    ),
    (
        "3. LLM Cost Metric",
        [
            "Definition: Measures the financial cost of using Large Language Models (LLMs) for processing requests.",
            "This metric tracks expenditure on AI processing and helps monitor cost efficiency of LLM usage.",
            "Example: 03-10 Total Cost: $45.67, 02-10: $42.30, Change: +$3.37 (↑8.0% increase)",
            "Status: EFFICIENT (cost per request decreased), EXPENSIVE (cost per request increased), STABLE (similar cost efficiency)",
        ],
    ),
    (
        "4. Reliability Metric",
        [
            "Definition: Measures the percentage of successful requests compared to the total number of requests.",
            "This metric indicates system stability and error rates. Higher percentages indicate fewer failures.",
            "Example: 03-10 Success Rate: 98.5%, 02-10: 96.8%, Change: +1.7% (↑1.8% improvement)",
            "Status: IMPROVING (higher success rate), DEGRADING (lower success rate), STABLE (similar success rate)",
        ],
    ),
    (
        "5. User Activity Metric",
        [
            "Definition: Measures the number of unique users interacting with the system in a given time period.",
            "This metric tracks user engagement and adoption. Higher numbers indicate broader usage of the system.",
            "Example: 03-10 Unique Users: 892, 02-10: 847, Change: +45 users (↑5.3% growth)",
            "Status: GROWING (more unique users), DECLINING (fewer unique users), STABLE (similar user count)",
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyWorkbookReport {
    pub path: PathBuf,
    pub sheets: Vec<String>,
    pub services: usize,
}

/// `<MonthName>_daily.xlsx` for the month of `now`.
pub fn daily_workbook_file_name(now: NaiveDateTime) -> String {
    format!("{}_daily.xlsx", now.format("%B"))
}

pub fn pair_sheet_name(pair_key: &str) -> String {
    format!("Daily_Analysis_{}", pair_key.replace('-', "_"))
}

/// Every parseable `daily_analysis_*.txt` under `analysis_dir`, in path order.
pub fn collect_daily_digests(analysis_dir: &Path) -> Result<Vec<DailyDigest>> {
    let pattern = format!(
        "{}/**/daily_analysis_*.txt",
        glob::Pattern::escape(&analysis_dir.to_string_lossy())
    );
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) => paths.push(path),
            Err(err) => warn!(%err, "unreadable entry while scanning daily summaries"),
        }
    }
    paths.sort();

    let mut digests = Vec::new();
    for path in paths {
        match read_daily_summary(&path) {
            Ok(Some(digest)) => digests.push(digest),
            Ok(None) => warn!(path = %path.display(), "file name is not a daily summary, skipped"),
            Err(err) => warn!(path = %path.display(), %err, "could not read daily summary"),
        }
    }
    info!(files = digests.len(), dir = %analysis_dir.display(), "collected daily summaries");
    Ok(digests)
}

/// Groups digests by date pair, ordered by (month1, day1, month2, day2).
pub fn group_by_pair(digests: Vec<DailyDigest>) -> Vec<(String, Vec<DailyDigest>)> {
    let mut groups: BTreeMap<((u32, u32, u32, u32), String), Vec<DailyDigest>> = BTreeMap::new();
    for digest in digests {
        groups
            .entry((digest.sort_key(), digest.pair_key()))
            .or_default()
            .push(digest);
    }
    groups
        .into_iter()
        .map(|((_, key), mut services)| {
            services.sort_by(|a, b| a.service.cmp(&b.service));
            (key, services)
        })
        .collect()
}

pub fn write_daily_workbook(digests: Vec<DailyDigest>, output: &Path) -> Result<DailyWorkbookReport> {
    let services = digests.len();
    let groups = group_by_pair(digests);

    let mut pair_sheets = Vec::with_capacity(groups.len());
    let mut sheet_names = Vec::with_capacity(groups.len());
    for (key, services) in &groups {
        let name = pair_sheet_name(key);
        let mut sheet = Worksheet::new();
        sheet.set_name(&name)?;
        write_pair_sheet(&mut sheet, services)?;
        info!(sheet = %name, services = services.len(), "created comparison sheet");
        sheet_names.push(name);
        pair_sheets.push(sheet);
    }

    let mut index = Worksheet::new();
    index.set_name(INDEX_SHEET)?;
    write_index_sheet(&mut index, &sheet_names)?;

    let mut workbook = Workbook::new();
    workbook.push_worksheet(index);
    for sheet in pair_sheets {
        workbook.push_worksheet(sheet);
    }
    workbook.save(output)?;
    info!(path = %output.display(), sheets = sheet_names.len(), "daily workbook saved");

    Ok(DailyWorkbookReport {
        path: output.to_path_buf(),
        sheets: sheet_names,
        services,
    })
}

fn thin_border(format: Format) -> Format {
    format.set_border(FormatBorder::Thin)
}

fn tone_format(status: Option<&str>) -> Format {
    let base = thin_border(Format::new().set_align(FormatAlign::Right));
    let tone = status.and_then(|status| StatusLabel::try_from(status).ok()).map(|label| label.tone());
    match tone {
        Some(Tone::Positive) => base.set_background_color(Color::RGB(0xC6EFCE)),
        Some(Tone::Negative) => base.set_background_color(Color::RGB(0xFFC7CE)),
        Some(Tone::Neutral) => base.set_background_color(Color::RGB(0xFFEB9C)),
        None => base,
    }
}

/// Tracks the widest text per column.
struct ColumnWidths([usize; COLUMNS as usize]);

impl ColumnWidths {
    fn observe(&mut self, col: u16, text: &str) {
        let len = text.chars().count();
        if let Some(width) = self.0.get_mut(col as usize) {
            *width = (*width).max(len);
        }
    }

    fn apply(&self, sheet: &mut Worksheet) -> Result<()> {
        for (col, width) in self.0.iter().enumerate() {
            sheet.set_column_width(col as u16, (width + 2).min(MAX_COLUMN_WIDTH) as f64)?;
        }
        Ok(())
    }
}

fn write_pair_sheet(sheet: &mut Worksheet, services: &[DailyDigest]) -> Result<()> {
    let header_format = thin_border(
        Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(0x366092))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter),
    );
    let service_format = thin_border(
        Format::new()
            .set_bold()
            .set_font_size(12)
            .set_font_color(Color::RGB(0x2F4F4F))
            .set_background_color(Color::RGB(0xE7E6E6))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter),
    );
    let metric_format = thin_border(Format::new().set_bold());
    let value_format = thin_border(
        Format::new()
            .set_num_format("0.00")
            .set_align(FormatAlign::Right),
    );
    let blank_value_format = thin_border(Format::new().set_align(FormatAlign::Right));

    let mut widths = ColumnWidths([0; COLUMNS as usize]);
    let (date1, date2) = services
        .first()
        .map(|first| (first.previous_label.clone(), first.current_label.clone()))
        .unwrap_or_default();
    let headers = ["Service".to_string(), date1, date2, "Change".to_string(), "Status".to_string()];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &header_format)?;
        widths.observe(col as u16, header);
    }

    let mut row: u32 = 1;
    for service in services {
        sheet.merge_range(row, 0, row, COLUMNS - 1, &service.service, &service_format)?;
        widths.observe(0, &service.service);
        row += 1;

        for metric in &service.metrics {
            let label = format!("{} Metric", metric.kind.title());
            sheet.write_string_with_format(row, 0, &label, &metric_format)?;
            widths.observe(0, &label);

            for (col, value) in [(1u16, metric.previous_value), (2, metric.current_value)] {
                match value {
                    Some(number) => {
                        sheet.write_number_with_format(row, col, number, &value_format)?;
                        widths.observe(col, &number.to_string());
                    }
                    None => {
                        sheet.write_string_with_format(row, col, "", &blank_value_format)?;
                    }
                }
            }

            // fill only applies when both change and status are present
            let status = metric.status.as_deref();
            let change = metric.change.as_deref().unwrap_or("");
            let change_format = if change.is_empty() {
                tone_format(None)
            } else {
                tone_format(status)
            };
            sheet.write_string_with_format(row, 3, change, &change_format)?;
            widths.observe(3, change);
            sheet.write_string_with_format(row, 4, status.unwrap_or(""), &tone_format(status))?;
            widths.observe(4, status.unwrap_or(""));
            row += 1;
        }
        row += 1;
    }

    widths.apply(sheet)
}

fn write_index_sheet(sheet: &mut Worksheet, sheet_names: &[String]) -> Result<()> {
    let title = Format::new()
        .set_bold()
        .set_font_size(16)
        .set_font_color(Color::RGB(0x2F4F4F))
        .set_align(FormatAlign::Center);
    let subtitle = Format::new()
        .set_font_size(12)
        .set_italic()
        .set_font_color(Color::RGB(0x696969));
    let link = Format::new()
        .set_font_size(11)
        .set_font_color(Color::RGB(0x0066CC))
        .set_underline(FormatUnderline::Single)
        .set_align(FormatAlign::Left);
    let section = Format::new().set_bold().set_font_size(14);
    let bold = Format::new().set_bold();

    sheet.write_string_with_format(0, 0, "Daily Analysis Report", &title)?;
    sheet.write_string_with_format(
        1,
        0,
        "Click on any link below to jump to that date comparison:",
        &subtitle,
    )?;

    let mut row: u32 = 3;
    for name in sheet_names {
        let url = Url::new(format!("internal:'{name}'!A1")).set_text(name);
        sheet.write_url_with_format(row, 0, url, &link)?;
        row += 1;
    }

    row += 2;
    sheet.write_string_with_format(row, 0, "Metric Definitions", &section)?;
    row += 2;

    for (heading, lines) in METRIC_DEFINITIONS {
        sheet.write_string_with_format(row, 0, heading, &bold)?;
        row += 1;
        for line in lines {
            sheet.write_string(row, 0, line)?;
            row += 1;
        }
        row += 1;
    }

    sheet.set_column_width(0, 50)?;
    Ok(())
}

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatUnderline, Image, Url, Workbook, Worksheet};
use serde::Serialize;
use tracing::{info, warn};

use crate::digest::{read_metrics_summary, GroupedDigest, MetricsDigest};
use crate::error::Result;
use crate::metrics::{ErrorCategory, GroupKey};
use crate::summary::METRICS_SUMMARY_FILE;

const MESSAGE_LIMIT: usize = 300;
const SHEET_NAME_LIMIT: usize = 31;
const IMAGE_SIZE: (u32, u32) = (720, 405);
const IMAGE_ROWS: u32 = 28;

/// Fixed sheets, in workbook order. One sheet per service follows them.
pub const SHEETS: [&str; 9] = [
    "Index",
    "Overview",
    "Response Times",
    "Success Rates",
    "LLM Costs",
    "Error Categories",
    "Error Messages",
    "Category Messages",
    "Charts",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedReport {
    pub path: PathBuf,
    pub services: usize,
    /// Images embedded on the Charts sheet.
    pub charts: usize,
}

pub fn combined_report_file_name(now: NaiveDateTime) -> String {
    format!("analysis_report_{}.xlsx", now.format("%Y%m%d_%H%M"))
}

/// Reads `<service>/metrics_analysis.txt` for every service folder under `analysis_dir`.
pub fn collect_metrics_digests(analysis_dir: &Path) -> Result<Vec<MetricsDigest>> {
    let pattern = format!(
        "{}/*/{METRICS_SUMMARY_FILE}",
        glob::Pattern::escape(&analysis_dir.to_string_lossy())
    );
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(%err, "unreadable entry while scanning metrics summaries");
                None
            }
        })
        .collect();
    paths.sort();

    let mut digests = Vec::with_capacity(paths.len());
    for path in paths {
        match read_metrics_summary(&path) {
            Ok(digest) => digests.push(digest),
            Err(err) => warn!(path = %path.display(), %err, "could not read metrics summary"),
        }
    }
    info!(files = digests.len(), "collected metrics summaries");
    Ok(digests)
}

/// Writes the combined workbook into `reports_dir`. `None` when there is nothing to report.
pub fn build_combined_report(
    analysis_dir: &Path,
    reports_dir: &Path,
    now: NaiveDateTime,
) -> Result<Option<CombinedReport>> {
    let digests = collect_metrics_digests(analysis_dir)?;
    if digests.is_empty() {
        warn!(dir = %analysis_dir.display(), "no metrics summaries found, combined report skipped");
        return Ok(None);
    }
    std::fs::create_dir_all(reports_dir)?;
    let path = reports_dir.join(combined_report_file_name(now));
    write_combined_report(&digests, &path, now).map(Some)
}

struct Formats {
    header: Format,
    bold: Format,
    number: Format,
    count: Format,
    percent: Format,
    seconds: Format,
    dollars: Format,
    link: Format,
}

impl Formats {
    fn new() -> Self {
        let right = Format::new().set_align(FormatAlign::Right);
        Self {
            header: Format::new().set_bold().set_align(FormatAlign::Left),
            bold: Format::new().set_bold(),
            number: right.clone().set_num_format("0.00"),
            count: right.clone().set_num_format("#,##0"),
            percent: right.clone().set_num_format("0.00%"),
            seconds: right.clone().set_num_format("0.00\" s\""),
            dollars: right.set_num_format("\"$\"#,##0.0000"),
            link: Format::new()
                .set_font_color(Color::RGB(0x0066CC))
                .set_underline(FormatUnderline::Single),
        }
    }
}

pub fn write_combined_report(
    digests: &[MetricsDigest],
    output: &Path,
    generated: NaiveDateTime,
) -> Result<CombinedReport> {
    let formats = Formats::new();
    let mut sheets: Vec<Worksheet> = Vec::with_capacity(SHEETS.len());

    let mut overview = named_sheet(SHEETS[1])?;
    write_overview(&mut overview, digests, generated, &formats)?;
    sheets.push(overview);

    let mut response = named_sheet(SHEETS[2])?;
    write_response_times(&mut response, digests, &formats)?;
    sheets.push(response);

    let mut success = named_sheet(SHEETS[3])?;
    write_success_rates(&mut success, digests, &formats)?;
    sheets.push(success);

    let mut costs = named_sheet(SHEETS[4])?;
    write_llm_costs(&mut costs, digests, &formats)?;
    sheets.push(costs);

    let mut categories = named_sheet(SHEETS[5])?;
    write_counted_blocks(
        &mut categories,
        digests,
        "Error Category",
        |digest| &digest.error_categories,
        usize::MAX,
        &formats,
    )?;
    sheets.push(categories);

    let mut messages = named_sheet(SHEETS[6])?;
    write_counted_blocks(
        &mut messages,
        digests,
        "Error Message",
        |digest| &digest.error_messages,
        MESSAGE_LIMIT,
        &formats,
    )?;
    sheets.push(messages);

    let mut category_messages = named_sheet(SHEETS[7])?;
    write_category_messages(&mut category_messages, digests, &formats)?;
    sheets.push(category_messages);

    let mut charts_sheet = named_sheet(SHEETS[8])?;
    let charts = write_charts(&mut charts_sheet, digests, &formats)?;
    sheets.push(charts_sheet);

    let service_names = service_sheet_names(digests);
    for (digest, name) in digests.iter().zip(&service_names) {
        let mut sheet = named_sheet(name)?;
        write_service_sheet(&mut sheet, digest, &formats)?;
        sheets.push(sheet);
    }

    let mut index = named_sheet(SHEETS[0])?;
    write_index(&mut index, &service_names, &formats)?;
    sheets.insert(0, index);

    let mut workbook = Workbook::new();
    for sheet in sheets {
        workbook.push_worksheet(sheet);
    }
    workbook.save(output)?;
    info!(path = %output.display(), services = digests.len(), charts, "combined report saved");

    Ok(CombinedReport {
        path: output.to_path_buf(),
        services: digests.len(),
        charts,
    })
}

/// Sheet names for the per-service sheets: Excel's forbidden characters replaced, cut
/// to 31 characters and made unique (case-insensitively) against every other sheet.
pub fn service_sheet_names(digests: &[MetricsDigest]) -> Vec<String> {
    let mut taken: Vec<String> = SHEETS.iter().map(|name| name.to_lowercase()).collect();
    let mut names = Vec::with_capacity(digests.len());
    for digest in digests {
        let cleaned: String = digest
            .service
            .chars()
            .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
            .collect();
        let cleaned = cleaned.trim_matches('\'').to_string();
        let base = if cleaned.is_empty() { "Service".to_string() } else { cleaned };

        let mut name: String = base.chars().take(SHEET_NAME_LIMIT).collect();
        let mut suffix = 1;
        while taken.contains(&name.to_lowercase()) {
            let tag = format!("-{suffix}");
            let head: String = base.chars().take(SHEET_NAME_LIMIT - tag.len()).collect();
            name = format!("{head}{tag}");
            suffix += 1;
        }
        taken.push(name.to_lowercase());
        names.push(name);
    }
    names
}

fn named_sheet(name: &str) -> Result<Worksheet> {
    let mut sheet = Worksheet::new();
    sheet.set_name(name)?;
    Ok(sheet)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let cut: String = text.chars().take(limit).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn write_headers(sheet: &mut Worksheet, row: u32, headers: &[&str], formats: &Formats) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(row, col as u16, *header, &formats.header)?;
    }
    Ok(())
}

fn write_index(sheet: &mut Worksheet, service_names: &[String], formats: &Formats) -> Result<()> {
    sheet.write_string_with_format(0, 0, "Index", &formats.bold)?;
    sheet.write_string(1, 0, "Click to jump to sheet:")?;
    let targets = SHEETS
        .iter()
        .skip(1)
        .copied()
        .chain(service_names.iter().map(String::as_str));
    for (offset, name) in targets.enumerate() {
        let url = Url::new(format!("internal:'{}'!A1", name.replace('\'', "''"))).set_text(name);
        sheet.write_url_with_format(3 + offset as u32, 0, url, &formats.link)?;
    }
    sheet.set_column_width(0, 30)?;
    Ok(())
}

fn write_overview(
    sheet: &mut Worksheet,
    digests: &[MetricsDigest],
    generated: NaiveDateTime,
    formats: &Formats,
) -> Result<()> {
    write_headers(sheet, 0, &["Metric", "Value"], formats)?;
    sheet.write_string_with_format(1, 0, "Analysis Summary", &formats.bold)?;
    sheet.write_string(2, 0, "Generated")?;
    sheet.write_string(2, 1, generated.format("%Y-%m-%d %H:%M:%S").to_string())?;
    sheet.write_string(3, 0, "Files Analyzed")?;
    sheet.write_number_with_format(3, 1, digests.len() as f64, &formats.count)?;

    let mut row: u32 = 5;
    for digest in digests {
        sheet.write_string_with_format(row, 0, &digest.service, &formats.bold)?;
        row += 1;
        if let Some(status) = &digest.status {
            sheet.write_string(row, 0, "Total Records")?;
            sheet.write_number_with_format(row, 1, status.total as f64, &formats.count)?;
            row += 1;
            sheet.write_string(row, 0, "Success Rate")?;
            sheet.write_number_with_format(row, 1, status.success_pct / 100.0, &formats.percent)?;
            row += 1;
            sheet.write_string(row, 0, "Error Count")?;
            sheet.write_number_with_format(row, 1, status.errors as f64, &formats.count)?;
            row += 1;
        }
        if let Some(avg) = digest.response_time.as_ref().and_then(|rt| rt.avg) {
            sheet.write_string(row, 0, "Avg Response Time")?;
            sheet.write_number_with_format(row, 1, avg, &formats.seconds)?;
            row += 1;
        }
        row += 1;
    }

    sheet.set_column_width(0, 30)?;
    sheet.set_column_width(1, 22)?;
    Ok(())
}

fn write_optional(sheet: &mut Worksheet, row: u32, col: u16, value: Option<f64>, format: &Format) -> Result<()> {
    if let Some(value) = value {
        sheet.write_number_with_format(row, col, value, format)?;
    }
    Ok(())
}

fn write_response_times(sheet: &mut Worksheet, digests: &[MetricsDigest], formats: &Formats) -> Result<()> {
    write_headers(
        sheet,
        0,
        &[
            "File",
            "Avg Time (s)",
            "Min Time (s)",
            "Max Time (s)",
            "Median Time (s)",
            "Std Dev (s)",
            "P95 (s)",
            "P99 (s)",
        ],
        formats,
    )?;
    let mut row: u32 = 1;
    for digest in digests {
        let Some(rt) = &digest.response_time else {
            continue;
        };
        sheet.write_string(row, 0, &digest.service)?;
        let values = [rt.avg, rt.min, rt.max, rt.median, rt.std, rt.percentile(95), rt.percentile(99)];
        for (col, value) in values.into_iter().enumerate() {
            write_optional(sheet, row, col as u16 + 1, value, &formats.number)?;
        }
        row += 1;
    }
    sheet.set_column_width(0, 30)?;
    sheet.set_column_range_width(1, 7, 16)?;
    Ok(())
}

fn write_success_rates(sheet: &mut Worksheet, digests: &[MetricsDigest], formats: &Formats) -> Result<()> {
    let mut start: u32 = 0;
    for digest in digests {
        let Some(status) = &digest.status else {
            continue;
        };
        sheet.write_string_with_format(start, 0, &digest.service, &formats.bold)?;
        write_headers(sheet, start + 2, &["Status", "Count", "% of Total"], formats)?;
        let rows = [
            ("Success", status.success, status.success_pct),
            ("Error", status.errors, status.error_pct),
            ("Total", status.total, 100.0),
        ];
        for (offset, (label, count, pct)) in rows.iter().enumerate() {
            let row = start + 3 + offset as u32;
            sheet.write_string(row, 0, *label)?;
            sheet.write_number_with_format(row, 1, *count as f64, &formats.count)?;
            sheet.write_number_with_format(row, 2, pct / 100.0, &formats.percent)?;
        }
        start += rows.len() as u32 + 4;
    }
    sheet.set_column_width(0, 30)?;
    sheet.set_column_range_width(1, 2, 14)?;
    Ok(())
}

fn write_llm_costs(sheet: &mut Worksheet, digests: &[MetricsDigest], formats: &Formats) -> Result<()> {
    write_headers(
        sheet,
        0,
        &["File", "Avg Cost", "Min Cost", "Max Cost", "Median Cost", "Total Cost", "Records"],
        formats,
    )?;
    let mut row: u32 = 1;
    for digest in digests {
        let Some(cost) = &digest.llm_cost else {
            continue;
        };
        sheet.write_string(row, 0, &digest.service)?;
        for (col, value) in [cost.avg, cost.min, cost.max, cost.median, cost.total]
            .into_iter()
            .enumerate()
        {
            write_optional(sheet, row, col as u16 + 1, value, &formats.dollars)?;
        }
        write_optional(sheet, row, 6, cost.records.map(|n| n as f64), &formats.count)?;
        row += 1;
    }
    sheet.set_column_width(0, 30)?;
    sheet.set_column_range_width(1, 6, 16)?;
    Ok(())
}

fn write_counted_blocks<F>(
    sheet: &mut Worksheet,
    digests: &[MetricsDigest],
    label_header: &str,
    rows_of: F,
    limit: usize,
    formats: &Formats,
) -> Result<()>
where
    F: Fn(&MetricsDigest) -> &Vec<(String, usize)>,
{
    let mut start: u32 = 0;
    for digest in digests {
        let rows = rows_of(digest);
        if rows.is_empty() {
            continue;
        }
        sheet.write_string_with_format(start, 0, &digest.service, &formats.bold)?;
        write_headers(sheet, start + 2, &[label_header, "Count"], formats)?;
        for (offset, (label, count)) in rows.iter().enumerate() {
            let row = start + 3 + offset as u32;
            sheet.write_string(row, 0, truncate(label, limit))?;
            sheet.write_number_with_format(row, 1, *count as f64, &formats.count)?;
        }
        start += rows.len() as u32 + 4;
    }
    sheet.set_column_width(0, if limit == usize::MAX { 40 } else { 100 })?;
    sheet.set_column_width(1, 10)?;
    Ok(())
}

fn write_category_messages(sheet: &mut Worksheet, digests: &[MetricsDigest], formats: &Formats) -> Result<()> {
    let mut rows: Vec<(&str, ErrorCategory, &str, usize)> = digests
        .iter()
        .flat_map(|digest| {
            digest.error_messages.iter().map(|(message, count)| {
                (
                    digest.service.as_str(),
                    ErrorCategory::categorize(message),
                    message.as_str(),
                    *count,
                )
            })
        })
        .collect();
    rows.sort_by(|a, b| a.1.label().cmp(b.1.label()).then(b.3.cmp(&a.3)));

    write_headers(sheet, 0, &["Service", "Error Category", "Error Message", "Count"], formats)?;
    for (offset, (service, category, message, count)) in rows.iter().enumerate() {
        let row = 1 + offset as u32;
        sheet.write_string(row, 0, *service)?;
        sheet.write_string(row, 1, category.label())?;
        sheet.write_string(row, 2, truncate(message, MESSAGE_LIMIT))?;
        sheet.write_number_with_format(row, 3, *count as f64, &formats.count)?;
    }
    sheet.set_column_width(0, 24)?;
    sheet.set_column_width(1, 36)?;
    sheet.set_column_width(2, 100)?;
    sheet.set_column_width(3, 10)?;
    Ok(())
}

/// Inserts each chart at `row`, or a note when the file is not a readable image.
/// Returns the next free row and the number of images placed.
fn insert_charts(sheet: &mut Worksheet, mut row: u32, charts: &[PathBuf]) -> Result<(u32, usize)> {
    let mut inserted = 0;
    for chart in charts {
        match Image::new(chart) {
            Ok(image) => {
                let image = image.set_scale_to_size(IMAGE_SIZE.0, IMAGE_SIZE.1, true);
                sheet.insert_image(row, 0, &image)?;
                inserted += 1;
                row += IMAGE_ROWS;
            }
            Err(err) => {
                warn!(path = %chart.display(), %err, "chart image could not be embedded");
                sheet.write_string(row, 0, format!("[Image not found: {}]", chart.display()))?;
                row += 2;
            }
        }
    }
    Ok((row, inserted))
}

fn write_charts(sheet: &mut Worksheet, digests: &[MetricsDigest], formats: &Formats) -> Result<usize> {
    sheet.write_string_with_format(0, 0, "Charts by Service", &formats.bold)?;
    let mut row: u32 = 2;
    let mut total = 0;
    for digest in digests.iter().filter(|digest| !digest.charts.is_empty()) {
        sheet.write_string_with_format(row, 0, format!("Service: {}", digest.service), &formats.bold)?;
        let (next, inserted) = insert_charts(sheet, row + 1, &digest.charts)?;
        total += inserted;
        row = next + 2;
    }
    sheet.set_column_width(0, 30)?;
    Ok(total)
}

/// Writes a Metric/Value table at `row` and returns the row after its trailing gap.
fn write_kpi_table(
    sheet: &mut Worksheet,
    row: u32,
    rows: &[(&str, Option<f64>, &Format)],
    formats: &Formats,
) -> Result<u32> {
    write_headers(sheet, row, &["Metric", "Value"], formats)?;
    for (offset, (label, value, format)) in rows.iter().enumerate() {
        let at = row + 1 + offset as u32;
        sheet.write_string(at, 0, *label)?;
        write_optional(sheet, at, 1, *value, format)?;
    }
    Ok(row + rows.len() as u32 + 2)
}

fn key_headers(key: &GroupKey) -> Vec<&'static str> {
    match (&key.process, key.mode) {
        (Some(_), Some(_)) => vec!["Process", "Mode"],
        (Some(_), None) => vec!["Process"],
        (None, _) => vec!["Mode", "Mode Name"],
    }
}

fn write_key(sheet: &mut Worksheet, row: u32, key: &GroupKey, formats: &Formats) -> Result<u16> {
    let mut col: u16 = 0;
    if let Some(process) = &key.process {
        sheet.write_string(row, col, process)?;
        col += 1;
    }
    if let Some(mode) = key.mode {
        sheet.write_number_with_format(row, col, mode as f64, &formats.count)?;
        col += 1;
        if let (None, Some(name)) = (&key.process, key.mode_name()) {
            sheet.write_string(row, col, name)?;
            col += 1;
        }
    }
    Ok(col)
}

type GroupRow<'a> = (&'a GroupKey, Vec<(f64, &'a Format)>);

/// Titled table of grouped figures; nothing is written for an empty table.
fn write_group_table(
    sheet: &mut Worksheet,
    row: u32,
    title: &str,
    value_headers: &[&str],
    rows: &[GroupRow<'_>],
    formats: &Formats,
) -> Result<u32> {
    let Some((first, _)) = rows.first() else {
        return Ok(row);
    };
    sheet.write_string_with_format(row, 0, title, &formats.bold)?;
    let mut headers = key_headers(first);
    headers.extend_from_slice(value_headers);
    write_headers(sheet, row + 1, &headers, formats)?;
    for (offset, (key, values)) in rows.iter().enumerate() {
        let at = row + 2 + offset as u32;
        let start = write_key(sheet, at, key, formats)?;
        for (col, (value, format)) in values.iter().enumerate() {
            sheet.write_number_with_format(at, start + col as u16, *value, format)?;
        }
    }
    Ok(row + rows.len() as u32 + 3)
}

fn write_grouped(
    sheet: &mut Worksheet,
    mut row: u32,
    label: &str,
    grouped: &GroupedDigest,
    formats: &Formats,
) -> Result<u32> {
    if grouped.is_empty() {
        return Ok(row);
    }
    let timing: Vec<GroupRow<'_>> = grouped
        .response_time
        .iter()
        .map(|r| {
            let s = &formats.seconds;
            let values = vec![(r.avg, s), (r.p50, s), (r.min, s), (r.max, s), (r.std, s)];
            (&r.key, [values, vec![(r.count as f64, &formats.count)]].concat())
        })
        .collect();
    row = write_group_table(
        sheet,
        row,
        &format!("Response Time by {label}"),
        &["Avg (s)", "P50 (s)", "Min (s)", "Max (s)", "Std (s)", "N"],
        &timing,
        formats,
    )?;

    let cost: Vec<GroupRow<'_>> = grouped
        .llm_cost
        .iter()
        .map(|r| {
            let d = &formats.dollars;
            let values = vec![(r.avg, d), (r.median, d), (r.min, d), (r.max, d), (r.total, d)];
            (&r.key, [values, vec![(r.count as f64, &formats.count)]].concat())
        })
        .collect();
    row = write_group_table(
        sheet,
        row,
        &format!("LLM Cost by {label}"),
        &["Avg ($)", "Median ($)", "Min ($)", "Max ($)", "Total ($)", "N"],
        &cost,
        formats,
    )?;

    let failures: Vec<GroupRow<'_>> = grouped
        .failures
        .iter()
        .map(|r| {
            let c = &formats.count;
            (
                &r.key,
                vec![
                    (r.errors as f64, c),
                    (r.info as f64, c),
                    (r.total as f64, c),
                    (r.failure_pct / 100.0, &formats.percent),
                ],
            )
        })
        .collect();
    write_group_table(
        sheet,
        row,
        &format!("Failure Rate by {label}"),
        &["Errors", "Success (Info)", "Total", "Failure %"],
        &failures,
        formats,
    )
}

/// Everything known about one service on a single sheet, charts last.
fn write_service_sheet(sheet: &mut Worksheet, digest: &MetricsDigest, formats: &Formats) -> Result<()> {
    sheet.write_string_with_format(0, 0, format!("Service: {}", digest.service), &formats.bold)?;
    let mut row: u32 = 2;

    if let Some(status) = &digest.status {
        row = write_kpi_table(
            sheet,
            row,
            &[
                ("Total", Some(status.total as f64), &formats.count),
                ("Success", Some(status.success as f64), &formats.count),
                ("Errors", Some(status.errors as f64), &formats.count),
                ("Success %", Some(status.success_pct / 100.0), &formats.percent),
                ("Error %", Some(status.error_pct / 100.0), &formats.percent),
            ],
            formats,
        )?;
    }
    if let Some(rt) = &digest.response_time {
        let s = &formats.seconds;
        row = write_kpi_table(
            sheet,
            row,
            &[
                ("Avg Time", rt.avg, s),
                ("Median Time", rt.median, s),
                ("P95 Time", rt.percentile(95), s),
                ("P99 Time", rt.percentile(99), s),
                ("Min Time", rt.min, s),
                ("Max Time", rt.max, s),
                ("Std Deviation", rt.std, s),
            ],
            formats,
        )?;
    }
    if let Some(cost) = &digest.llm_cost {
        let d = &formats.dollars;
        row = write_kpi_table(
            sheet,
            row,
            &[
                ("Avg Cost ($)", cost.avg, d),
                ("Min Cost ($)", cost.min, d),
                ("Max Cost ($)", cost.max, d),
                ("Median Cost ($)", cost.median, d),
                ("Total Cost ($)", cost.total, d),
            ],
            formats,
        )?;
    }

    row = write_grouped(sheet, row, "Mode", &digest.by_mode, formats)?;
    row = write_grouped(sheet, row, "Process", &digest.by_process, formats)?;
    row = write_grouped(sheet, row, "Process × Mode", &digest.by_process_mode, formats)?;

    if !digest.error_categories.is_empty() {
        sheet.write_string_with_format(row, 0, "Error Categories", &formats.bold)?;
        write_headers(sheet, row + 1, &["Error Category", "Count"], formats)?;
        for (offset, (category, count)) in digest.error_categories.iter().enumerate() {
            let at = row + 2 + offset as u32;
            sheet.write_string(at, 0, category)?;
            sheet.write_number_with_format(at, 1, *count as f64, &formats.count)?;
        }
        row += digest.error_categories.len() as u32 + 3;
    }

    if !digest.error_messages.is_empty() {
        let mut messages: Vec<(ErrorCategory, &str, usize)> = digest
            .error_messages
            .iter()
            .map(|(message, count)| (ErrorCategory::categorize(message), message.as_str(), *count))
            .collect();
        messages.sort_by(|a, b| a.0.label().cmp(b.0.label()).then(b.2.cmp(&a.2)));

        sheet.write_string_with_format(row, 0, "Error Messages", &formats.bold)?;
        write_headers(sheet, row + 1, &["Error Category", "Error Message", "Count"], formats)?;
        for (offset, (category, message, count)) in messages.iter().enumerate() {
            let at = row + 2 + offset as u32;
            sheet.write_string(at, 0, category.label())?;
            sheet.write_string(at, 1, truncate(message, MESSAGE_LIMIT))?;
            sheet.write_number_with_format(at, 2, *count as f64, &formats.count)?;
        }
        row += messages.len() as u32 + 3;
    }

    insert_charts(sheet, row, &digest.charts)?;

    sheet.set_column_width(0, 36)?;
    sheet.set_column_width(1, 24)?;
    sheet.set_column_range_width(2, 8, 14)?;
    Ok(())
}

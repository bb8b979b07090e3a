use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use tracing::{info, warn};

use crate::error::{AnalysisError, Result};
use crate::metrics::{mode_name, quantile, SummaryStats};
use crate::preprocess::{canonical, TelemetryFrame};
use crate::summary::group_thousands;

const CHART_SIZE: (u32, u32) = (1200, 600);
const ANALYSIS_SIZE: (u32, u32) = (1600, 1200);
const HISTOGRAM_BINS: usize = 50;
const FONT_FAMILY: &str = "sans-serif";

/// Tried in order when no font is configured.
const FONT_CANDIDATES: [&str; 8] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const LIGHT_BLUE: RGBColor = RGBColor(173, 216, 230);
const ORANGE: RGBColor = RGBColor(255, 152, 0);
const PURPLE: RGBColor = RGBColor(156, 39, 176);
const BAR_COLORS: [RGBColor; 5] = [
    RGBColor(0x4C, 0xAF, 0x50),
    RGBColor(0xFF, 0xC1, 0x07),
    RGBColor(0xFF, 0x98, 0x00),
    RGBColor(0xFF, 0x57, 0x22),
    RGBColor(0x9C, 0x27, 0xB0),
];

static CHART_FONT: OnceCell<PathBuf> = OnceCell::new();

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type DrawResult = std::result::Result<(), Box<dyn Error>>;

/// A chart written into a service folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartFile {
    pub file_name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

pub const DAU_CHART: ChartFile = ChartFile {
    file_name: "dau_chart.png",
    title: "Daily Active Usage",
    description: "Requests per day",
};
pub const DAUU_CHART: ChartFile = ChartFile {
    file_name: "dauu_chart.png",
    title: "Daily Active Unique Users",
    description: "Distinct users per day",
};
pub const MODE_DAU_CHART: ChartFile = ChartFile {
    file_name: "mode_wise_dau_chart.png",
    title: "Mode-wise Daily Usage",
    description: "Requests per day for each effective mode",
};
pub const RESPONSE_RANGE_CHART: ChartFile = ChartFile {
    file_name: "daily_response_time_range.png",
    title: "Daily Response Time Range",
    description: "Minimum, average and maximum response time per day",
};
pub const RESPONSE_ANALYSIS_CHART: ChartFile = ChartFile {
    file_name: "response_time_analysis.png",
    title: "Response Time Analysis",
    description: "Distribution, box plot, percentile curve and daily P95/P99 trends",
};
pub const PERCENTILE_CHART: ChartFile = ChartFile {
    file_name: "response_time_percentiles.png",
    title: "Response Time Percentiles",
    description: "P50, P75, P90, P95 and P99 response times with mean and max",
};

/// Order in which charts are laid out in reports.
pub const REPORT_ORDER: [ChartFile; 6] = [
    DAUU_CHART,
    DAU_CHART,
    MODE_DAU_CHART,
    PERCENTILE_CHART,
    RESPONSE_RANGE_CHART,
    RESPONSE_ANALYSIS_CHART,
];

/// Chart files present in `dir`, in report order.
pub fn existing_charts(dir: &Path) -> Vec<PathBuf> {
    REPORT_ORDER
        .iter()
        .map(|chart| dir.join(chart.file_name))
        .filter(|path| path.is_file())
        .collect()
}

/// Registers the TrueType font used for chart text. The first successful call wins;
/// later calls return the already registered font.
pub fn ensure_chart_font(configured: Option<&Path>) -> Result<&'static Path> {
    if let Some(path) = CHART_FONT.get() {
        return Ok(path.as_path());
    }
    let path = match configured {
        Some(path) => path.to_path_buf(),
        None => FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                AnalysisError::Chart(
                    "no TrueType font found, set chart_font in the settings file".to_string(),
                )
            })?,
    };
    let registered = CHART_FONT.get_or_try_init(|| -> Result<PathBuf> {
        let bytes: &'static [u8] = Box::leak(std::fs::read(&path)?.into_boxed_slice());
        register_font(FONT_FAMILY, FontStyle::Normal, bytes)
            .map_err(|_| AnalysisError::Chart(format!("{}: InvalidFont", path.display())))?;
        info!(font = %path.display(), "chart font registered");
        Ok(path)
    })?;
    Ok(registered.as_path())
}

struct ChartLine {
    name: String,
    values: Vec<f64>,
}

/// Renders every chart the frame has data for. Failures are logged and skipped.
pub fn render_charts(frame: &TelemetryFrame, output_dir: &Path, font: Option<&Path>) -> Vec<ChartFile> {
    if let Err(err) = ensure_chart_font(font) {
        warn!(%err, "charts skipped");
        return Vec::new();
    }

    let mut written = Vec::new();
    let attempts: [(ChartFile, fn(&TelemetryFrame, &Path) -> Result<bool>); 6] = [
        (DAU_CHART, daily_usage_chart),
        (DAUU_CHART, unique_users_chart),
        (MODE_DAU_CHART, mode_usage_chart),
        (RESPONSE_RANGE_CHART, response_range_chart),
        (RESPONSE_ANALYSIS_CHART, response_analysis_chart),
        (PERCENTILE_CHART, percentile_summary_chart),
    ];

    for (chart, render) in attempts {
        let path = output_dir.join(chart.file_name);
        match render(frame, &path) {
            Ok(true) => {
                info!(chart = chart.file_name, "chart saved");
                written.push(chart);
            }
            Ok(false) => info!(chart = chart.file_name, "chart skipped, required columns missing"),
            Err(err) => warn!(chart = chart.file_name, %err, "chart generation failed"),
        }
    }
    written
}

fn dates(frame: &TelemetryFrame) -> Result<Option<Vec<Option<NaiveDate>>>> {
    Ok(frame.strings(canonical::FORMATTED_DATE)?.map(|values| {
        values
            .into_iter()
            .map(|value| value.and_then(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()))
            .collect()
    }))
}

fn sorted_response_times(frame: &TelemetryFrame) -> Result<Vec<f64>> {
    let mut values: Vec<f64> = frame
        .floats(canonical::RESPONSE_TIME)?
        .map(|values| values.into_iter().flatten().collect())
        .unwrap_or_default();
    values.sort_by(|a, b| a.total_cmp(b));
    Ok(values)
}

/// Response times grouped per day, each day sorted ascending.
fn response_times_by_date(frame: &TelemetryFrame) -> Result<BTreeMap<NaiveDate, Vec<f64>>> {
    let mut per_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    let (Some(dates), Some(times)) = (dates(frame)?, frame.floats(canonical::RESPONSE_TIME)?) else {
        return Ok(per_date);
    };
    for (date, time) in dates.into_iter().zip(times) {
        if let (Some(date), Some(time)) = (date, time) {
            per_date.entry(date).or_default().push(time);
        }
    }
    for values in per_date.values_mut() {
        values.sort_by(|a, b| a.total_cmp(b));
    }
    Ok(per_date)
}

fn daily_usage_chart(frame: &TelemetryFrame, path: &Path) -> Result<bool> {
    let Some(dates) = dates(frame)? else {
        return Ok(false);
    };
    let mut counts: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for date in dates.into_iter().flatten() {
        *counts.entry(date).or_insert(0.0) += 1.0;
    }
    if counts.is_empty() {
        return Ok(false);
    }
    let labels = date_labels(counts.keys());
    let series = vec![ChartLine {
        name: "Requests".to_string(),
        values: counts.into_values().collect(),
    }];
    render_png(path, CHART_SIZE, |root| {
        plot_lines(root, DAU_CHART.title, "Requests", &labels, &series)
    })?;
    Ok(true)
}

fn unique_users_chart(frame: &TelemetryFrame, path: &Path) -> Result<bool> {
    let (Some(dates), Some(users)) = (dates(frame)?, frame.strings(canonical::USER_ID)?) else {
        return Ok(false);
    };
    let mut distinct: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    for (date, user) in dates.into_iter().zip(users) {
        if let (Some(date), Some(user)) = (date, user) {
            distinct.entry(date).or_default().insert(user);
        }
    }
    if distinct.is_empty() {
        return Ok(false);
    }
    let labels = date_labels(distinct.keys());
    let series = vec![ChartLine {
        name: "Unique users".to_string(),
        values: distinct.values().map(|users| users.len() as f64).collect(),
    }];
    render_png(path, CHART_SIZE, |root| {
        plot_lines(root, DAUU_CHART.title, "Unique users", &labels, &series)
    })?;
    Ok(true)
}

fn mode_usage_chart(frame: &TelemetryFrame, path: &Path) -> Result<bool> {
    let (Some(dates), Some(modes)) = (dates(frame)?, frame.modes()?) else {
        return Ok(false);
    };
    let mut counts: BTreeMap<i64, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    let mut all_dates: BTreeMap<NaiveDate, ()> = BTreeMap::new();
    for (date, mode) in dates.into_iter().zip(modes) {
        if let (Some(date), Some(mode)) = (date, mode) {
            *counts.entry(mode).or_default().entry(date).or_insert(0.0) += 1.0;
            all_dates.insert(date, ());
        }
    }
    if counts.is_empty() {
        return Ok(false);
    }
    let labels = date_labels(all_dates.keys());
    let series: Vec<ChartLine> = counts
        .into_iter()
        .map(|(mode, per_date)| ChartLine {
            name: format!("Mode {mode} ({})", mode_name(mode)),
            values: all_dates
                .keys()
                .map(|date| per_date.get(date).copied().unwrap_or(0.0))
                .collect(),
        })
        .collect();
    render_png(path, CHART_SIZE, |root| {
        plot_lines(root, MODE_DAU_CHART.title, "Requests", &labels, &series)
    })?;
    Ok(true)
}

fn response_range_chart(frame: &TelemetryFrame, path: &Path) -> Result<bool> {
    let per_date = response_times_by_date(frame)?;
    if per_date.is_empty() {
        return Ok(false);
    }
    let labels = date_labels(per_date.keys());
    let mut min = Vec::with_capacity(per_date.len());
    let mut avg = Vec::with_capacity(per_date.len());
    let mut max = Vec::with_capacity(per_date.len());
    for values in per_date.values() {
        min.push(values.first().copied().unwrap_or(0.0));
        max.push(values.last().copied().unwrap_or(0.0));
        avg.push(values.iter().sum::<f64>() / values.len() as f64);
    }
    let series = vec![
        ChartLine { name: "Min".to_string(), values: min },
        ChartLine { name: "Avg".to_string(), values: avg },
        ChartLine { name: "Max".to_string(), values: max },
    ];
    render_png(path, CHART_SIZE, |root| {
        plot_lines(root, RESPONSE_RANGE_CHART.title, "Response time (s)", &labels, &series)
    })?;
    Ok(true)
}

fn response_analysis_chart(frame: &TelemetryFrame, path: &Path) -> Result<bool> {
    let sorted = sorted_response_times(frame)?;
    let Some(stats) = SummaryStats::from_values(&sorted) else {
        return Ok(false);
    };

    let per_date = response_times_by_date(frame)?;
    let labels = date_labels(per_date.keys());
    let mut trends = vec![
        ChartLine { name: "Mean".to_string(), values: Vec::new() },
        ChartLine { name: "Median".to_string(), values: Vec::new() },
        ChartLine { name: "95th percentile".to_string(), values: Vec::new() },
        ChartLine { name: "99th percentile".to_string(), values: Vec::new() },
    ];
    for values in per_date.values() {
        trends[0].values.push(values.iter().sum::<f64>() / values.len() as f64);
        for (line, q) in trends[1..].iter_mut().zip([0.5, 0.95, 0.99]) {
            line.values.push(quantile(values, q).unwrap_or(0.0));
        }
    }

    render_png(path, ANALYSIS_SIZE, |root| {
        let root = root.titled("Comprehensive Response Time Analysis", (FONT_FAMILY, 30))?;
        let panels = root.split_evenly((2, 2));
        histogram_panel(&panels[0], &sorted, &stats)?;
        box_panel(&panels[1], &sorted, &stats)?;
        percentile_curve_panel(&panels[2], &sorted, &stats)?;
        if !labels.is_empty() {
            plot_lines(&panels[3], "Daily Response Time Trends", "Response time (s)", &labels, &trends)?;
        }
        Ok(())
    })?;
    Ok(true)
}

fn percentile_summary_chart(frame: &TelemetryFrame, path: &Path) -> Result<bool> {
    let sorted = sorted_response_times(frame)?;
    let Some(stats) = SummaryStats::from_values(&sorted) else {
        return Ok(false);
    };
    let levels = stats.percentiles.levels();
    let y_max = padded_max(stats.max);
    let caption = format!(
        "Response Time Percentiles Summary (Total Requests: {})",
        group_thousands(stats.count as i64)
    );

    render_png(path, CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(&caption, (FONT_FAMILY, 24))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(0f64..levels.len() as f64, 0f64..y_max)?;

        let formatter = |x: &f64| bar_label(*x, &levels);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(levels.len() * 2 + 1)
            .x_label_formatter(&formatter)
            .x_desc("Percentiles")
            .y_desc("Response time (s)")
            .draw()?;

        chart.draw_series(levels.iter().zip(BAR_COLORS).enumerate().map(
            |(idx, ((_, value), color))| {
                let left = idx as f64 + 0.15;
                Rectangle::new([(left, 0.0), (left + 0.7, *value)], color.filled())
            },
        ))?;
        chart.draw_series(levels.iter().enumerate().map(|(idx, (_, value))| {
            Text::new(
                format!("{value:.2}s"),
                (idx as f64 + 0.35, value + y_max * 0.02),
                (FONT_FAMILY, 16).into_font(),
            )
        }))?;

        for (name, value, color) in [("Mean", stats.mean, RED), ("Max", stats.max, PURPLE)] {
            let style = color.stroke_width(2);
            chart
                .draw_series(LineSeries::new(
                    vec![(0.0, value), (levels.len() as f64, value)],
                    style,
                ))?
                .label(format!("{name}: {value:.2}s"))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        Ok(())
    })?;
    Ok(true)
}

/// `50th` under the middle of each bar, nothing elsewhere.
fn bar_label(x: f64, levels: &[(u32, f64)]) -> String {
    let slot = x - 0.5;
    if slot < 0.0 || (slot - slot.round()).abs() > 1e-6 {
        return String::new();
    }
    levels
        .get(slot.round() as usize)
        .map(|(level, _)| format!("{level}th"))
        .unwrap_or_default()
}

fn padded_max(value: f64) -> f64 {
    if value > 0.0 {
        value * 1.15
    } else {
        1.0
    }
}

fn histogram_panel(area: &Area<'_>, sorted: &[f64], stats: &SummaryStats) -> DrawResult {
    let width = if stats.max > stats.min {
        (stats.max - stats.min) / HISTOGRAM_BINS as f64
    } else {
        1.0
    };
    let mut bins = [0usize; HISTOGRAM_BINS];
    for value in sorted {
        let idx = ((value - stats.min) / width) as usize;
        bins[idx.min(HISTOGRAM_BINS - 1)] += 1;
    }
    let peak = padded_max(bins.iter().copied().max().unwrap_or(0) as f64);
    let x_end = stats.min + width * HISTOGRAM_BINS as f64;

    let mut chart = ChartBuilder::on(area)
        .caption("Response Time Distribution", (FONT_FAMILY, 20))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(stats.min..x_end, 0f64..peak)?;
    chart
        .configure_mesh()
        .x_desc("Response time (s)")
        .y_desc("Frequency")
        .draw()?;

    chart.draw_series(bins.iter().enumerate().map(|(idx, count)| {
        let left = stats.min + width * idx as f64;
        Rectangle::new([(left, 0.0), (left + width, *count as f64)], SKY_BLUE.filled())
    }))?;

    let markers = [
        ("Mean", stats.mean, RED),
        ("Median", stats.median, GREEN),
        ("95th", stats.percentiles.p95, ORANGE),
        ("99th", stats.percentiles.p99, PURPLE),
    ];
    for (name, value, color) in markers {
        let style = color.stroke_width(2);
        chart
            .draw_series(LineSeries::new(vec![(value, 0.0), (value, peak)], style))?
            .label(format!("{name}: {value:.2}s"))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Tukey box plot: whiskers reach the furthest values within 1.5 IQR of the box.
fn box_panel(area: &Area<'_>, sorted: &[f64], stats: &SummaryStats) -> DrawResult {
    let q1 = quantile(sorted, 0.25).unwrap_or(stats.min);
    let q3 = quantile(sorted, 0.75).unwrap_or(stats.max);
    let reach = 1.5 * (q3 - q1);
    let low = sorted
        .iter()
        .copied()
        .find(|value| *value >= q1 - reach)
        .unwrap_or(stats.min);
    let high = sorted
        .iter()
        .rev()
        .copied()
        .find(|value| *value <= q3 + reach)
        .unwrap_or(stats.max);
    let pad = if stats.max > stats.min {
        (stats.max - stats.min) * 0.05
    } else {
        1.0
    };

    let mut chart = ChartBuilder::on(area)
        .caption("Response Time Box Plot", (FONT_FAMILY, 20))
        .margin(15)
        .x_label_area_size(20)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..2f64, (stats.min - pad)..(stats.max + pad))?;
    let no_labels = |_: &f64| String::new();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&no_labels)
        .y_desc("Response time (s)")
        .draw()?;

    chart.draw_series([
        Rectangle::new([(0.7, q1), (1.3, q3)], LIGHT_BLUE.filled()),
        Rectangle::new([(0.7, q1), (1.3, q3)], BLACK.stroke_width(1)),
    ])?;
    chart.draw_series(
        [
            vec![(0.7, stats.median), (1.3, stats.median)],
            vec![(1.0, low), (1.0, q1)],
            vec![(1.0, q3), (1.0, high)],
            vec![(0.85, low), (1.15, low)],
            vec![(0.85, high), (1.15, high)],
        ]
        .into_iter()
        .map(|points| PathElement::new(points, BLACK.stroke_width(2))),
    )?;
    chart.draw_series(
        sorted
            .iter()
            .filter(|value| **value < low || **value > high)
            .map(|value| Circle::new((1.0, *value), 3, BLACK.stroke_width(1))),
    )?;

    for (name, value, color) in [
        ("95th", stats.percentiles.p95, RED),
        ("99th", stats.percentiles.p99, PURPLE),
    ] {
        chart.draw_series([
            PathElement::new(vec![(1.3, value), (1.4, value)], color.stroke_width(1)),
        ])?;
        chart.draw_series([Text::new(
            format!("{name}: {value:.2}s"),
            (1.42, value),
            (FONT_FAMILY, 14).into_font().color(&color),
        )])?;
    }
    Ok(())
}

fn percentile_curve_panel(area: &Area<'_>, sorted: &[f64], stats: &SummaryStats) -> DrawResult {
    let curve: Vec<(f64, f64)> = (1..=100u32)
        .filter_map(|level| {
            quantile(sorted, f64::from(level) / 100.0).map(|value| (f64::from(level), value))
        })
        .collect();
    let y_max = padded_max(stats.max);

    let mut chart = ChartBuilder::on(area)
        .caption("Response Time Percentiles", (FONT_FAMILY, 20))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..101f64, 0f64..y_max)?;
    chart
        .configure_mesh()
        .x_desc("Percentile")
        .y_desc("Response time (s)")
        .draw()?;

    chart.draw_series(LineSeries::new(curve, BLUE.stroke_width(2)))?;
    for (name, value, color) in [
        ("95th", stats.percentiles.p95, ORANGE),
        ("99th", stats.percentiles.p99, PURPLE),
    ] {
        let style = color.stroke_width(2);
        chart
            .draw_series(LineSeries::new(vec![(0.0, value), (101.0, value)], style))?
            .label(format!("{name}: {value:.2}s"))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    let critical = [
        (90.0, stats.percentiles.p90),
        (95.0, stats.percentiles.p95),
        (99.0, stats.percentiles.p99),
    ];
    chart.draw_series(
        critical
            .iter()
            .map(|(level, value)| Circle::new((*level, *value), 5, RED.filled())),
    )?;
    chart.draw_series(critical.iter().map(|(level, value)| {
        Text::new(
            format!("{level}th: {value:.2}s"),
            (level - 6.0, value + y_max * 0.05),
            (FONT_FAMILY, 13).into_font(),
        )
    }))?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn date_labels<'a>(dates: impl Iterator<Item = &'a NaiveDate>) -> Vec<String> {
    dates.map(|date| date.format("%d-%m").to_string()).collect()
}

fn render_png<F>(path: &Path, size: (u32, u32), draw: F) -> Result<()>
where
    F: FnOnce(&Area<'_>) -> DrawResult,
{
    let root = BitMapBackend::new(path, size).into_drawing_area();
    let drawn = root
        .fill(&WHITE)
        .map_err(Box::<dyn Error>::from)
        .and_then(|_| draw(&root))
        .and_then(|_| root.present().map_err(Box::<dyn Error>::from));
    drawn.map_err(|err| AnalysisError::Chart(format!("{}: {err}", path.display())))
}

fn plot_lines(area: &Area<'_>, title: &str, y_desc: &str, labels: &[String], series: &[ChartLine]) -> DrawResult {
    let y_max = padded_max(
        series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold(0.0_f64, f64::max),
    );
    let x_max = labels.len().saturating_sub(1).max(1);

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT_FAMILY, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0usize..x_max, 0f64..y_max)?;

    let formatter = |idx: &usize| labels.get(*idx).cloned().unwrap_or_default();
    chart
        .configure_mesh()
        .x_labels(labels.len().max(2))
        .x_label_formatter(&formatter)
        .x_desc("Date")
        .y_desc(y_desc)
        .draw()?;

    for (idx, line) in series.iter().enumerate() {
        let style = Palette99::pick(idx).stroke_width(2);
        chart
            .draw_series(LineSeries::new(
                line.values.iter().enumerate().map(|(x, y)| (x, *y)),
                style,
            ))?
            .label(line.name.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The five day-over-day metrics tracked per service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    Latency,
    Throughput,
    LlmCost,
    Reliability,
    UserActivity,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Latency,
        MetricKind::Throughput,
        MetricKind::LlmCost,
        MetricKind::Reliability,
        MetricKind::UserActivity,
    ];

    /// Section title as written in daily summaries (`<title> Metric`).
    pub fn title(&self) -> &'static str {
        match self {
            MetricKind::Latency => "Latency",
            MetricKind::Throughput => "Throughput",
            MetricKind::LlmCost => "LLM Cost",
            MetricKind::Reliability => "Reliability",
            MetricKind::UserActivity => "User Activity",
        }
    }

    pub fn from_title(title: &str) -> Option<Self> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.title().eq_ignore_ascii_case(title.trim()))
    }

    pub fn section_number(&self) -> usize {
        match self {
            MetricKind::Latency => 1,
            MetricKind::Throughput => 2,
            MetricKind::LlmCost => 3,
            MetricKind::Reliability => 4,
            MetricKind::UserActivity => 5,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusLabel {
    Stable,
    Improving,
    Degrading,
    Growing,
    Declining,
    Efficient,
    Expensive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
}

impl StatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Stable => "STABLE",
            StatusLabel::Improving => "IMPROVING",
            StatusLabel::Degrading => "DEGRADING",
            StatusLabel::Growing => "GROWING",
            StatusLabel::Declining => "DECLINING",
            StatusLabel::Efficient => "EFFICIENT",
            StatusLabel::Expensive => "EXPENSIVE",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            StatusLabel::Improving | StatusLabel::Growing | StatusLabel::Efficient => Tone::Positive,
            StatusLabel::Degrading | StatusLabel::Declining | StatusLabel::Expensive => {
                Tone::Negative
            }
            StatusLabel::Stable => Tone::Neutral,
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StatusLabel {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STABLE" => Ok(StatusLabel::Stable),
            "IMPROVING" => Ok(StatusLabel::Improving),
            "DEGRADING" => Ok(StatusLabel::Degrading),
            "GROWING" => Ok(StatusLabel::Growing),
            "DECLINING" => Ok(StatusLabel::Declining),
            "EFFICIENT" => Ok(StatusLabel::Efficient),
            "EXPENSIVE" => Ok(StatusLabel::Expensive),
            other => Err(format!("unknown status label '{other}'")),
        }
    }
}

/// Labelling thresholds. All comparisons are strict; values are percent except
/// `reliability_points`, which applies to the absolute change in success rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub latency_pct: f64,
    pub throughput_pct: f64,
    pub cost_efficient_pct: f64,
    pub cost_expensive_pct: f64,
    pub reliability_points: f64,
    pub user_activity_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            latency_pct: 5.0,
            throughput_pct: 5.0,
            cost_efficient_pct: 5.0,
            cost_expensive_pct: 10.0,
            reliability_points: 1.0,
            user_activity_pct: 5.0,
        }
    }
}

impl Thresholds {
    pub fn classify(&self, kind: MetricKind, change: f64, percent: f64) -> StatusLabel {
        match kind {
            MetricKind::Latency => {
                if percent < -self.latency_pct {
                    StatusLabel::Improving
                } else if percent > self.latency_pct {
                    StatusLabel::Degrading
                } else {
                    StatusLabel::Stable
                }
            }
            MetricKind::Throughput => growth_label(percent, self.throughput_pct),
            MetricKind::LlmCost => {
                if percent < -self.cost_efficient_pct {
                    StatusLabel::Efficient
                } else if percent > self.cost_expensive_pct {
                    StatusLabel::Expensive
                } else {
                    StatusLabel::Stable
                }
            }
            MetricKind::Reliability => {
                if change > self.reliability_points {
                    StatusLabel::Improving
                } else if change < -self.reliability_points {
                    StatusLabel::Degrading
                } else {
                    StatusLabel::Stable
                }
            }
            MetricKind::UserActivity => growth_label(percent, self.user_activity_pct),
        }
    }
}

fn growth_label(percent: f64, threshold: f64) -> StatusLabel {
    if percent > threshold {
        StatusLabel::Growing
    } else if percent < -threshold {
        StatusLabel::Declining
    } else {
        StatusLabel::Stable
    }
}

/// Most frequent label; ties go to the label seen first. Empty input is `STABLE`.
pub fn dominant_trend(labels: &[StatusLabel]) -> StatusLabel {
    let mut counts: HashMap<StatusLabel, usize> = HashMap::new();
    for label in labels {
        *counts.entry(*label).or_insert(0) += 1;
    }

    let mut best: Option<(StatusLabel, usize)> = None;
    for label in labels {
        let count = counts.get(label).copied().unwrap_or(0);
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((*label, count));
        }
    }
    best.map(|(label, _)| label).unwrap_or(StatusLabel::Stable)
}

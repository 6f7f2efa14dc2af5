//! Weight-history charting: bucketed averages over a trailing period.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::WeightEntry;

const MONTHS_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPeriod {
    ThirtyDays,
    NinetyDays,
    SixMonths,
    OneYear,
}

impl ProgressPeriod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "30d" => Some(Self::ThirtyDays),
            "90d" => Some(Self::NinetyDays),
            "6m" => Some(Self::SixMonths),
            "1y" => Some(Self::OneYear),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThirtyDays => "30d",
            Self::NinetyDays => "90d",
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
        }
    }

    /// First day included when the period ends on `end`.
    #[must_use]
    pub fn start(self, end: NaiveDate) -> NaiveDate {
        match self {
            Self::ThirtyDays => end - chrono::Days::new(30),
            Self::NinetyDays => end - chrono::Days::new(90),
            Self::SixMonths => end - chrono::Months::new(6),
            Self::OneYear => end - chrono::Months::new(12),
        }
    }

    /// Daily buckets for the day-granular periods, calendar months for 6m,
    /// quarters for 1y.
    fn bucket_key(self, date: NaiveDate) -> String {
        match self {
            Self::ThirtyDays | Self::NinetyDays => date.format("%Y-%m-%d").to_string(),
            Self::SixMonths => date.format("%Y-%m").to_string(),
            Self::OneYear => {
                let quarter = (date.month() - 1) / 3 + 1;
                format!("{}-Q{quarter}", date.year())
            }
        }
    }

    /// Chart labels for the sorted bucket keys. Day-granular periods are
    /// sampled (every 5th or 15th point plus the last) to keep the axis
    /// readable; month and quarter buckets are labelled one to one.
    fn labels(self, keys: &[String]) -> Vec<String> {
        let day_label = |key: &String| {
            NaiveDate::parse_from_str(key, "%Y-%m-%d")
                .map(|d| format!("{}/{}", d.day(), d.month()))
                .unwrap_or_default()
        };
        match self {
            Self::ThirtyDays | Self::NinetyDays => {
                let step = if self == Self::ThirtyDays { 5 } else { 15 };
                keys.iter()
                    .enumerate()
                    .filter(|(i, _)| i % step == 0 || *i == keys.len() - 1)
                    .map(|(_, key)| day_label(key))
                    .collect()
            }
            Self::SixMonths => keys
                .iter()
                .map(|key| {
                    NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d")
                        .map(|d| MONTHS_SHORT[d.month0() as usize].to_string())
                        .unwrap_or_default()
                })
                .collect(),
            Self::OneYear => keys
                .iter()
                .map(|key| key.split('-').nth(1).unwrap_or_default().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightProgress {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
    pub performance: f64,
    pub change: f64,
    pub positive: bool,
    pub target_weight: f64,
    pub progress_percentage: f64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Aggregate a user's weight entries (ascending by date) into chart data.
///
/// `current_weight` and `target_weight` come off the user row; `goal`
/// decides both the direction considered positive and which end of the
/// series anchors the progress percentage.
#[must_use]
pub fn build_weight_progress(
    period: ProgressPeriod,
    entries: &[WeightEntry],
    current_weight: Option<f64>,
    target_weight: Option<f64>,
    goal: Option<&str>,
) -> WeightProgress {
    let performance = current_weight.unwrap_or(0.0);
    let target = target_weight.unwrap_or(0.0);

    let mut buckets: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for entry in entries {
        let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(&entry.date) else {
            continue;
        };
        let key = period.bucket_key(parsed.date_naive());
        let slot = buckets.entry(key).or_insert((0.0, 0));
        slot.0 += entry.weight;
        slot.1 += 1;
    }

    if buckets.is_empty() {
        return WeightProgress {
            labels: Vec::new(),
            data: Vec::new(),
            performance,
            change: 0.0,
            positive: true,
            target_weight: target,
            progress_percentage: 0.0,
        };
    }

    let keys: Vec<String> = buckets.keys().cloned().collect();
    let data: Vec<f64> = buckets
        .values()
        .map(|(sum, count)| sum / f64::from(*count))
        .collect();
    let labels = period.labels(&keys);

    let oldest = data[0];
    let newest = data[data.len() - 1];
    let change = if oldest != 0.0 && newest != 0.0 {
        round1((newest - oldest) / oldest * 100.0)
    } else {
        0.0
    };

    let positive = if goal == Some("gain") {
        change >= 0.0
    } else {
        change <= 0.0
    };

    let mut progress = 0.0;
    if target != 0.0 && performance != 0.0 {
        match goal {
            Some("lose") => {
                let peak = data.iter().copied().fold(f64::MIN, f64::max);
                let span = peak - target;
                if span != 0.0 {
                    progress = (peak - performance) / span * 100.0;
                }
            }
            Some("gain") => {
                let trough = data.iter().copied().fold(f64::MAX, f64::min);
                let span = target - trough;
                if span != 0.0 {
                    progress = (performance - trough) / span * 100.0;
                }
            }
            _ => {}
        }
        progress = round1(progress.clamp(0.0, 100.0));
    }

    WeightProgress {
        labels,
        data,
        performance,
        change,
        positive,
        target_weight: target,
        progress_percentage: progress,
    }
}

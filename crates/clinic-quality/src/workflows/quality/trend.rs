use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::domain::{Observation, TrendDirection};

/// Percent change inside this band on either side of zero counts as stable.
const STABLE_BAND_PCT: f64 = 2.0;

/// Rolling window applied before computing a trend.
///
/// Deserializes through `FromStr`, so query strings and JSON accept the same spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum TrendPeriod {
    #[serde(rename = "1month")]
    OneMonth,
    #[serde(rename = "3months")]
    ThreeMonths,
    #[default]
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "1year")]
    OneYear,
    #[serde(rename = "all")]
    All,
}

impl TrendPeriod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMonth => "1month",
            Self::ThreeMonths => "3months",
            Self::SixMonths => "6months",
            Self::OneYear => "1year",
            Self::All => "all",
        }
    }

    pub const fn months(self) -> Option<u32> {
        match self {
            Self::OneMonth => Some(1),
            Self::ThreeMonths => Some(3),
            Self::SixMonths => Some(6),
            Self::OneYear => Some(12),
            Self::All => None,
        }
    }

    /// Earliest date kept by the window, or `None` when every observation counts.
    pub fn window_start(self, now: NaiveDate) -> Option<NaiveDate> {
        self.months()
            .map(|months| now.checked_sub_months(Months::new(months)).unwrap_or(NaiveDate::MIN))
    }
}

impl fmt::Display for TrendPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTrendPeriod(pub String);

impl fmt::Display for UnknownTrendPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown period '{}' (expected 1month, 3months, 6months, 1year, or all)",
            self.0
        )
    }
}

impl std::error::Error for UnknownTrendPeriod {}

impl FromStr for TrendPeriod {
    type Err = UnknownTrendPeriod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1month" => Ok(Self::OneMonth),
            "3months" => Ok(Self::ThreeMonths),
            "6months" => Ok(Self::SixMonths),
            "1year" => Ok(Self::OneYear),
            "all" => Ok(Self::All),
            other => Err(UnknownTrendPeriod(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for TrendPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Mean of the observations falling in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub value: f64,
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub period: TrendPeriod,
    pub direction: TrendDirection,
    pub percentage: f64,
    pub observations: usize,
    pub series: Vec<MonthlyPoint>,
}

/// Direction, percent change, and monthly buckets for any dated series.
///
/// Fidelity, adoption, delivery-count, and outcome trends all run through here.
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    /// Pure in `now`: identical inputs always produce identical output.
    pub fn analyze(observations: &[Observation], period: TrendPeriod, now: NaiveDate) -> TrendAnalysis {
        let window_start = period.window_start(now);
        let mut windowed: Vec<Observation> = observations
            .iter()
            .filter(|observation| observation.value.is_finite())
            .filter(|observation| window_start.map_or(true, |start| observation.date >= start))
            .copied()
            .collect();
        windowed.sort_by(|a, b| a.date.cmp(&b.date).then(a.value.total_cmp(&b.value)));

        let series = Self::monthly_series(&windowed);

        let (direction, percentage) = match (windowed.first(), windowed.last()) {
            (Some(earliest), Some(latest)) if windowed.len() >= 2 => {
                let pct = percent_change(earliest.value, latest.value);
                (classify_change(pct), pct)
            }
            _ => (TrendDirection::Stable, 0.0),
        };

        TrendAnalysis {
            period,
            direction,
            percentage,
            observations: windowed.len(),
            series,
        }
    }

    /// Groups by calendar month in chronological order, averaging same-month values.
    pub fn monthly_series(observations: &[Observation]) -> Vec<MonthlyPoint> {
        let mut sorted: Vec<&Observation> = observations
            .iter()
            .filter(|observation| observation.value.is_finite())
            .collect();
        sorted.sort_by(|a, b| a.date.cmp(&b.date).then(a.value.total_cmp(&b.value)));

        let mut buckets: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
        for observation in sorted {
            let entry = buckets
                .entry((observation.date.year(), observation.date.month()))
                .or_insert((0.0, 0));
            entry.0 += observation.value;
            entry.1 += 1;
        }

        buckets
            .into_iter()
            .map(|((year, month), (sum, count))| MonthlyPoint {
                year,
                month,
                label: month_label(year, month),
                value: sum / count as f64,
                observations: count,
            })
            .collect()
    }
}

/// Signed percent change; a zero baseline yields 0 rather than dividing by zero.
pub fn percent_change(earliest: f64, latest: f64) -> f64 {
    if earliest == 0.0 {
        return 0.0;
    }
    (latest - earliest) / earliest.abs() * 100.0
}

pub fn classify_change(percentage: f64) -> TrendDirection {
    if percentage > STABLE_BAND_PCT {
        TrendDirection::Up
    } else if percentage < -STABLE_BAND_PCT {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    }
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|date| date.format("%b %Y").to_string())
        .unwrap_or_else(|| format!("{year}-{month:02}"))
}

use serde::{Deserialize, Serialize};

use super::domain::QualityMetric;

/// Tolerance band used when a metric has no external benchmark.
const NEAR_TARGET_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Met,
    NearTarget,
    Below,
}

impl MetricStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Met => "Met",
            Self::NearTarget => "Near Target",
            Self::Below => "Below Target",
        }
    }
}

/// Shared rule for both the status tag and the persisted `meets_target` flag.
pub struct MetricStatusClassifier;

impl MetricStatusClassifier {
    pub fn classify(metric: &QualityMetric) -> MetricStatus {
        Self::classify_value(
            metric.current_value,
            metric.target_value,
            metric.benchmark_value,
            metric.higher_is_better,
        )
    }

    pub fn classify_value(
        current_value: Option<f64>,
        target_value: f64,
        benchmark_value: Option<f64>,
        higher_is_better: bool,
    ) -> MetricStatus {
        let Some(current) = current_value else {
            return MetricStatus::Below;
        };

        if passes(current, target_value, higher_is_better) {
            return MetricStatus::Met;
        }

        let near = near_threshold(target_value, benchmark_value, higher_is_better);
        if passes(current, near, higher_is_better) {
            MetricStatus::NearTarget
        } else {
            MetricStatus::Below
        }
    }

    pub fn meets_target(metric: &QualityMetric) -> bool {
        Self::classify(metric) == MetricStatus::Met
    }
}

/// Benchmark when provided, otherwise 10% short of target on the metric's bad side.
pub fn near_threshold(target_value: f64, benchmark_value: Option<f64>, higher_is_better: bool) -> f64 {
    match benchmark_value {
        Some(benchmark) => benchmark,
        None if higher_is_better => target_value * (1.0 - NEAR_TARGET_TOLERANCE),
        None => target_value * (1.0 + NEAR_TARGET_TOLERANCE),
    }
}

fn passes(value: f64, threshold: f64, higher_is_better: bool) -> bool {
    if higher_is_better {
        value >= threshold
    } else {
        value <= threshold
    }
}

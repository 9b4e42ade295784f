use chrono::NaiveDate;
use serde::Serialize;

use super::domain::FidelityAssessment;
use crate::workflows::validation::ValidationError;

const LATEST_WEIGHT: f64 = 0.5;
const HISTORICAL_WEIGHT: f64 = 0.3;
/// Points of movement against the historical average that earn the full trend bonus.
const TREND_BAND: f64 = 5.0;
const MAX_TREND_BONUS: f64 = 10.0;
const CONSISTENCY_WINDOW: usize = 5;
const MAX_CONSISTENCY_BONUS: f64 = 10.0;

/// Components of a composite fidelity score, kept for audit displays.
///
/// `composite` is rounded to the nearest whole point; the components are unrounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FidelityBreakdown {
    pub latest: f64,
    pub historical_average: f64,
    pub trend_bonus: f64,
    pub consistency_bonus: f64,
    pub composite: f64,
    pub assessed_on: NaiveDate,
    pub assessment_count: usize,
}

/// Weighted composite over an EBP's assessment history.
pub struct FidelityScorer;

impl FidelityScorer {
    /// Scores an assessment history in any order; recency is decided by `assessment_date`.
    ///
    /// Returns `Ok(None)` when there is nothing to score so callers can keep the prior value.
    pub fn score(
        assessments: &[FidelityAssessment],
    ) -> Result<Option<FidelityBreakdown>, ValidationError> {
        for assessment in assessments {
            assessment.validate()?;
        }

        let mut ordered: Vec<&FidelityAssessment> = assessments.iter().collect();
        ordered.sort_by_key(|assessment| assessment.assessment_date);

        let Some(latest_assessment) = ordered.last() else {
            return Ok(None);
        };

        let scores: Vec<f64> = ordered
            .iter()
            .map(|assessment| assessment.fidelity_score)
            .collect();
        let latest = latest_assessment.fidelity_score;
        let earlier = &scores[..scores.len() - 1];

        let historical_average = if earlier.is_empty() {
            latest
        } else {
            mean(earlier)
        };

        let trend_bonus = if earlier.is_empty() {
            0.0
        } else {
            trend_bonus(latest, historical_average)
        };

        let consistency_bonus = if scores.len() < 2 {
            0.0
        } else {
            let window = &scores[scores.len().saturating_sub(CONSISTENCY_WINDOW)..];
            (MAX_CONSISTENCY_BONUS - population_std_dev(window)).max(0.0)
        };

        let composite = (latest * LATEST_WEIGHT
            + historical_average * HISTORICAL_WEIGHT
            + trend_bonus
            + consistency_bonus)
            .clamp(0.0, 100.0)
            .round();

        Ok(Some(FidelityBreakdown {
            latest,
            historical_average,
            trend_bonus,
            consistency_bonus,
            composite,
            assessed_on: latest_assessment.assessment_date,
            assessment_count: scores.len(),
        }))
    }
}

/// Linear between -10 and +10 across a +/-5 point band around the historical average.
fn trend_bonus(latest: f64, historical_average: f64) -> f64 {
    let delta = latest - historical_average;
    (delta / TREND_BAND * MAX_TREND_BONUS).clamp(-MAX_TREND_BONUS, MAX_TREND_BONUS)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64]) -> f64 {
    let avg = mean(values);
    let variance = values
        .iter()
        .map(|value| (value - avg).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

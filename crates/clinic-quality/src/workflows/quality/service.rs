use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    AssessmentSubmission, EbpId, EvidenceBasedPractice, FidelityAssessment,
    MetricId, Observation, QualityMetric,
};
use super::fidelity::{FidelityBreakdown, FidelityScorer};
use super::notifications::{NotificationBatch, NotificationGenerator};
use super::recency::{RecencyAssessment, RecencyEvaluator};
use super::repository::{DateRange, QualityRepository};
use super::status::{MetricStatus, MetricStatusClassifier};
use super::trend::{TrendAnalysis, TrendAnalyzer, TrendPeriod};
use crate::config::EngineConfig;
use crate::workflows::store::RepositoryError;
use crate::workflows::validation::ValidationError;

/// Window used when refreshing a metric's stored trend after a new observation.
const STORED_TREND_PERIOD: TrendPeriod = TrendPeriod::ThreeMonths;

/// Point-in-time view of a metric for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub metric: QualityMetric,
    pub status: MetricStatus,
    pub status_label: &'static str,
    pub meets_target: bool,
    pub trend: TrendAnalysis,
}

/// Point-in-time view of an EBP with its assessment cadence and fidelity history.
#[derive(Debug, Clone, Serialize)]
pub struct EbpReport {
    pub ebp: EvidenceBasedPractice,
    pub recency: RecencyAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fidelity: Option<FidelityBreakdown>,
    pub fidelity_trend: TrendAnalysis,
    pub adoption_trend: TrendAnalysis,
}

/// Loads metrics and EBPs, runs the scoring rules, and persists derived values.
pub struct QualityService<R> {
    repository: Arc<R>,
    config: EngineConfig,
}

impl<R> QualityService<R>
where
    R: QualityRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: EngineConfig) -> Self {
        Self { repository, config }
    }

    pub fn get_ebp(&self, id: &EbpId) -> Result<EvidenceBasedPractice, QualityServiceError> {
        self.repository
            .get_ebp(id)?
            .ok_or_else(|| QualityServiceError::not_found("ebp", id))
    }

    pub fn get_metric(&self, id: &MetricId) -> Result<QualityMetric, QualityServiceError> {
        self.repository
            .get_metric(id)?
            .ok_or_else(|| QualityServiceError::not_found("metric", id))
    }

    pub fn list_fidelity_assessments(
        &self,
        id: &EbpId,
        range: Option<DateRange>,
    ) -> Result<Vec<FidelityAssessment>, QualityServiceError> {
        self.get_ebp(id)?;
        Ok(self.repository.list_fidelity_assessments(id, range)?)
    }

    /// Records an assessment and returns the EBP with its recomputed fidelity score.
    ///
    /// The score is rebuilt from the full stored history plus the new row, so an assessment
    /// dated before the latest one leaves `last_fidelity_review` on the latest date.
    pub fn append_fidelity_assessment(
        &self,
        id: &EbpId,
        submission: AssessmentSubmission,
    ) -> Result<EvidenceBasedPractice, QualityServiceError> {
        let assessment = submission.into_assessment(id.clone());
        assessment.validate()?;

        self.with_retries("ebp", id, |attempt| {
            let current = self.get_ebp(id)?;
            let mut history = self.repository.list_fidelity_assessments(id, None)?;
            history.push(assessment.clone());

            let mut updated = current.clone();
            if let Some(breakdown) = FidelityScorer::score(&history)? {
                updated.fidelity_score = breakdown.composite;
                updated.last_fidelity_review = Some(breakdown.assessed_on);
            }

            let stored = self.repository.commit_fidelity_assessment(
                assessment.clone(),
                updated,
                current.version,
            )?;
            info!(
                ebp_id = %id,
                attempt,
                fidelity_score = stored.fidelity_score,
                assessments = history.len(),
                "fidelity score recomputed"
            );
            Ok(stored)
        })
    }

    /// Replaces the training counts, recomputes the adoption rate, and appends it to the
    /// EBP's adoption history under `recorded_on`.
    pub fn update_training(
        &self,
        id: &EbpId,
        trained_staff: u32,
        total_staff: u32,
        recorded_on: NaiveDate,
    ) -> Result<EvidenceBasedPractice, QualityServiceError> {
        if trained_staff > total_staff {
            return Err(ValidationError::new(
                "trained_staff",
                format!("{trained_staff} trained exceeds {total_staff} total staff"),
            )
            .into());
        }

        self.with_retries("ebp", id, |attempt| {
            let current = self.get_ebp(id)?;
            let mut updated = current.clone();
            updated.record_training(trained_staff, total_staff, recorded_on);

            let stored = self.repository.update_ebp(updated, current.version)?;
            info!(
                ebp_id = %id,
                attempt,
                adoption_rate = stored.adoption_rate,
                "adoption rate recomputed"
            );
            Ok(stored)
        })
    }

    pub fn ebp_report(
        &self,
        id: &EbpId,
        period: TrendPeriod,
        today: NaiveDate,
    ) -> Result<EbpReport, QualityServiceError> {
        let ebp = self.get_ebp(id)?;
        let history = self.repository.list_fidelity_assessments(id, None)?;
        let fidelity = FidelityScorer::score(&history)?;

        let series: Vec<Observation> = history
            .iter()
            .map(|assessment| Observation::new(assessment.assessment_date, assessment.fidelity_score))
            .collect();
        let fidelity_trend = TrendAnalyzer::analyze(&series, period, today);
        let adoption_trend = TrendAnalyzer::analyze(&ebp.adoption_history, period, today);
        let recency = RecencyEvaluator::evaluate(ebp.last_fidelity_review, today);

        Ok(EbpReport {
            ebp,
            recency,
            fidelity,
            fidelity_trend,
            adoption_trend,
        })
    }

    /// Appends a reporting-period value, then refreshes `current_value` and the stored trend.
    ///
    /// Runs as a versioned read-modify-write so concurrent recorders never drop a value.
    pub fn record_metric_value(
        &self,
        id: &MetricId,
        observation: Observation,
    ) -> Result<QualityMetric, QualityServiceError> {
        self.with_retries("metric", id, |attempt| {
            let current = self.get_metric(id)?;
            if !current.is_active {
                return Err(
                    ValidationError::new("metric_id", format!("metric '{id}' is inactive")).into(),
                );
            }

            let mut updated = current.clone();
            updated.record_observation(observation.date, observation.value)?;
            let analysis = TrendAnalyzer::analyze(
                &updated.historical_data,
                STORED_TREND_PERIOD,
                observation.date,
            );
            updated.trend = analysis.direction;
            updated.trend_percentage = Some(analysis.percentage);

            let stored = self.repository.update_metric(updated, current.version)?;
            info!(
                metric_id = %id,
                attempt,
                value = observation.value,
                trend = stored.trend.label(),
                "metric observation recorded"
            );
            Ok(stored)
        })
    }

    /// Soft delete; the metric keeps its history but leaves every active scan.
    pub fn deactivate_metric(&self, id: &MetricId) -> Result<QualityMetric, QualityServiceError> {
        self.with_retries("metric", id, |attempt| {
            let current = self.get_metric(id)?;
            if !current.is_active {
                return Ok(current);
            }

            let mut updated = current.clone();
            updated.is_active = false;
            let stored = self.repository.update_metric(updated, current.version)?;
            info!(metric_id = %id, attempt, "metric deactivated");
            Ok(stored)
        })
    }

    pub fn metric_report(
        &self,
        id: &MetricId,
        period: TrendPeriod,
        today: NaiveDate,
    ) -> Result<MetricReport, QualityServiceError> {
        let metric = self.get_metric(id)?;
        metric.validate()?;

        let range = period.window_start(today).map(DateRange::since);
        let history = self.repository.list_metric_history(id, range)?;
        let trend = TrendAnalyzer::analyze(&history, period, today);
        let status = MetricStatusClassifier::classify(&metric);

        Ok(MetricReport {
            meets_target: status == MetricStatus::Met,
            status_label: status.label(),
            status,
            metric,
            trend,
        })
    }

    /// Scans the active population; entities that fail evaluation are logged and reported.
    pub fn notifications(&self, today: NaiveDate) -> Result<NotificationBatch, QualityServiceError> {
        let metrics = self.repository.list_active_metrics()?;
        let ebps = self.repository.list_active_ebps()?;
        let batch = NotificationGenerator::generate(&metrics, &ebps, today);

        for failure in &batch.failures {
            warn!(subject = %failure.subject, reason = %failure.reason, "entity skipped during notification scan");
        }
        let summary = batch.summary();
        info!(
            metrics = metrics.len(),
            ebps = ebps.len(),
            total = summary.total,
            errors = summary.errors,
            action_required = summary.action_required,
            "notification scan complete"
        );
        Ok(batch)
    }

    /// Runs an optimistic read-modify-write, re-reading on version conflicts.
    fn with_retries<T, I, F>(
        &self,
        entity: &'static str,
        id: &I,
        mut write: F,
    ) -> Result<T, QualityServiceError>
    where
        I: std::fmt::Display + ?Sized,
        F: FnMut(u8) -> Result<T, QualityServiceError>,
    {
        let attempts = self.config.write_retries.max(1);
        for attempt in 1..=attempts {
            match write(attempt) {
                Err(QualityServiceError::Repository(RepositoryError::Conflict)) => {
                    debug!(%entity, %id, attempt, "version conflict, retrying");
                }
                Err(QualityServiceError::Repository(RepositoryError::NotFound)) => {
                    return Err(QualityServiceError::not_found(entity, id));
                }
                other => return other,
            }
        }

        warn!(%entity, %id, attempts, "giving up after repeated version conflicts");
        Err(QualityServiceError::WriteContention {
            entity,
            id: id.to_string(),
            attempts,
        })
    }
}

/// Error raised by the quality service.
#[derive(Debug, thiserror::Error)]
pub enum QualityServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{entity} '{id}' is being updated concurrently (gave up after {attempts} attempts)")]
    WriteContention {
        entity: &'static str,
        id: String,
        attempts: u8,
    },
}

impl QualityServiceError {
    fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

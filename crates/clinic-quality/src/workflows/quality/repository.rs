use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{EbpId, EvidenceBasedPractice, FidelityAssessment, MetricId, Observation, QualityMetric};
use crate::workflows::store::RepositoryError;

/// Inclusive date window for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn since(from: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Store boundary for metrics, EBPs, and their time series.
///
/// Writes that recompute derived metric or EBP fields carry the version the caller read;
/// stores must reject a stale version with [`RepositoryError::Conflict`] so only one writer
/// wins.
pub trait QualityRepository: Send + Sync {
    fn get_ebp(&self, id: &EbpId) -> Result<Option<EvidenceBasedPractice>, RepositoryError>;
    fn list_fidelity_assessments(
        &self,
        id: &EbpId,
        range: Option<DateRange>,
    ) -> Result<Vec<FidelityAssessment>, RepositoryError>;
    /// Appends the assessment and replaces the EBP in one atomic step, bumping its version.
    fn commit_fidelity_assessment(
        &self,
        assessment: FidelityAssessment,
        ebp: EvidenceBasedPractice,
        expected_version: u64,
    ) -> Result<EvidenceBasedPractice, RepositoryError>;
    fn update_ebp(
        &self,
        ebp: EvidenceBasedPractice,
        expected_version: u64,
    ) -> Result<EvidenceBasedPractice, RepositoryError>;
    fn list_active_ebps(&self) -> Result<Vec<EvidenceBasedPractice>, RepositoryError>;

    fn get_metric(&self, id: &MetricId) -> Result<Option<QualityMetric>, RepositoryError>;
    fn list_metric_history(
        &self,
        id: &MetricId,
        range: Option<DateRange>,
    ) -> Result<Vec<Observation>, RepositoryError>;
    fn update_metric(
        &self,
        metric: QualityMetric,
        expected_version: u64,
    ) -> Result<QualityMetric, RepositoryError>;
    fn list_active_metrics(&self) -> Result<Vec<QualityMetric>, RepositoryError>;
}

#[derive(Default)]
struct QualityTables {
    metrics: BTreeMap<MetricId, QualityMetric>,
    ebps: BTreeMap<EbpId, EvidenceBasedPractice>,
    assessments: BTreeMap<EbpId, Vec<FidelityAssessment>>,
}

/// Mutex-backed store with per-row version checks.
#[derive(Default)]
pub struct InMemoryQualityRepository {
    tables: Mutex<QualityTables>,
}

impl InMemoryQualityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_metric(&self, metric: QualityMetric) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if tables.metrics.contains_key(&metric.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.metrics.insert(metric.id.clone(), metric);
        Ok(())
    }

    pub fn insert_ebp(&self, ebp: EvidenceBasedPractice) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if tables.ebps.contains_key(&ebp.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.ebps.insert(ebp.id.clone(), ebp);
        Ok(())
    }

    /// Loads historical assessments without touching the EBP's derived fields.
    pub fn seed_assessments(
        &self,
        assessments: Vec<FidelityAssessment>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        for assessment in assessments {
            if !tables.ebps.contains_key(&assessment.ebp_id) {
                return Err(RepositoryError::NotFound);
            }
            tables
                .assessments
                .entry(assessment.ebp_id.clone())
                .or_default()
                .push(assessment);
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, QualityTables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("quality store mutex poisoned".to_string()))
    }
}

impl QualityRepository for InMemoryQualityRepository {
    fn get_ebp(&self, id: &EbpId) -> Result<Option<EvidenceBasedPractice>, RepositoryError> {
        Ok(self.lock()?.ebps.get(id).cloned())
    }

    fn list_fidelity_assessments(
        &self,
        id: &EbpId,
        range: Option<DateRange>,
    ) -> Result<Vec<FidelityAssessment>, RepositoryError> {
        let tables = self.lock()?;
        let mut assessments: Vec<FidelityAssessment> = tables
            .assessments
            .get(id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| range.map_or(true, |range| range.contains(row.assessment_date)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        assessments.sort_by_key(|assessment| assessment.assessment_date);
        Ok(assessments)
    }

    fn commit_fidelity_assessment(
        &self,
        assessment: FidelityAssessment,
        mut ebp: EvidenceBasedPractice,
        expected_version: u64,
    ) -> Result<EvidenceBasedPractice, RepositoryError> {
        let mut tables = self.lock()?;
        let stored = tables.ebps.get(&ebp.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::Conflict);
        }

        ebp.version = expected_version + 1;
        tables
            .assessments
            .entry(ebp.id.clone())
            .or_default()
            .push(assessment);
        tables.ebps.insert(ebp.id.clone(), ebp.clone());
        Ok(ebp)
    }

    fn update_ebp(
        &self,
        mut ebp: EvidenceBasedPractice,
        expected_version: u64,
    ) -> Result<EvidenceBasedPractice, RepositoryError> {
        let mut tables = self.lock()?;
        let stored = tables.ebps.get(&ebp.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::Conflict);
        }

        ebp.version = expected_version + 1;
        tables.ebps.insert(ebp.id.clone(), ebp.clone());
        Ok(ebp)
    }

    fn list_active_ebps(&self) -> Result<Vec<EvidenceBasedPractice>, RepositoryError> {
        Ok(self
            .lock()?
            .ebps
            .values()
            .filter(|ebp| ebp.is_active)
            .cloned()
            .collect())
    }

    fn get_metric(&self, id: &MetricId) -> Result<Option<QualityMetric>, RepositoryError> {
        Ok(self.lock()?.metrics.get(id).cloned())
    }

    fn list_metric_history(
        &self,
        id: &MetricId,
        range: Option<DateRange>,
    ) -> Result<Vec<Observation>, RepositoryError> {
        let tables = self.lock()?;
        let metric = tables.metrics.get(id).ok_or(RepositoryError::NotFound)?;
        Ok(metric
            .historical_data
            .iter()
            .filter(|observation| range.map_or(true, |range| range.contains(observation.date)))
            .copied()
            .collect())
    }

    fn update_metric(
        &self,
        mut metric: QualityMetric,
        expected_version: u64,
    ) -> Result<QualityMetric, RepositoryError> {
        let mut tables = self.lock()?;
        let stored = tables.metrics.get(&metric.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::Conflict);
        }

        metric.version = expected_version + 1;
        tables.metrics.insert(metric.id.clone(), metric.clone());
        Ok(metric)
    }

    fn list_active_metrics(&self) -> Result<Vec<QualityMetric>, RepositoryError> {
        Ok(self
            .lock()?
            .metrics
            .values()
            .filter(|metric| metric.is_active)
            .cloned()
            .collect())
    }
}

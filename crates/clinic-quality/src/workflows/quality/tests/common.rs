use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::workflows::quality::domain::{
    AssessmentSubmission, AssessmentType, EbpCategory, EbpId, EvidenceBasedPractice,
    FidelityAssessment, MetricCategory, MetricId, Observation, QualityMetric,
};
use crate::workflows::quality::repository::{
    DateRange, InMemoryQualityRepository, QualityRepository,
};
use crate::workflows::quality::QualityService;
use crate::workflows::store::RepositoryError;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn today() -> NaiveDate {
    date(2024, 6, 30)
}

/// CCBHC-required screening measure reported monthly, currently short of target.
pub(super) fn screening_metric() -> QualityMetric {
    let mut metric = QualityMetric::new(
        "depression-screening",
        "Depression screening",
        MetricCategory::Ccbhc,
        80.0,
    );
    metric.code = Some("CDF-AD".to_string());
    metric.is_ccbhc_required = true;
    metric.critical_threshold = Some(60.0);
    for (month, value) in [(1, 70.0), (2, 72.0), (3, 74.0), (4, 75.0), (5, 76.0), (6, 77.0)] {
        metric
            .record_observation(date(2024, month, 15), value)
            .expect("chronological history");
    }
    metric
}

pub(super) fn readmission_metric() -> QualityMetric {
    let mut metric = QualityMetric::new(
        "readmission-30d",
        "30-day readmission",
        MetricCategory::Safety,
        10.0,
    );
    metric.higher_is_better = false;
    metric
        .record_observation(date(2024, 6, 1), 8.0)
        .expect("first observation");
    metric
}

pub(super) fn cbt() -> EvidenceBasedPractice {
    let mut ebp = EvidenceBasedPractice::new("ebp-cbt", "Cognitive Behavioral Therapy", EbpCategory::Counseling);
    ebp.trained_staff = 6;
    ebp.total_staff = 10;
    ebp.adoption_rate = 60.0;
    ebp
}

pub(super) fn assessment(ebp_id: &EbpId, on: NaiveDate, score: f64) -> FidelityAssessment {
    FidelityAssessment {
        ebp_id: ebp_id.clone(),
        assessment_date: on,
        assessment_type: AssessmentType::Standard,
        fidelity_score: score,
        notes: None,
    }
}

pub(super) fn submission(on: NaiveDate, score: f64) -> AssessmentSubmission {
    AssessmentSubmission {
        assessment_date: on,
        assessment_type: AssessmentType::SpotCheck,
        fidelity_score: score,
        notes: Some("observed session".to_string()),
    }
}

pub(super) fn seeded_repository() -> Arc<InMemoryQualityRepository> {
    let repository = InMemoryQualityRepository::new();
    repository
        .insert_metric(screening_metric())
        .expect("insert screening metric");
    repository
        .insert_metric(readmission_metric())
        .expect("insert readmission metric");
    repository.insert_ebp(cbt()).expect("insert ebp");
    Arc::new(repository)
}

pub(super) fn build_service() -> (
    QualityService<InMemoryQualityRepository>,
    Arc<InMemoryQualityRepository>,
) {
    let repository = seeded_repository();
    let service = QualityService::new(repository.clone(), EngineConfig::default());
    (service, repository)
}

/// Wraps the in-memory store and loses the version race a fixed number of times.
pub(super) struct ContendedRepository {
    inner: InMemoryQualityRepository,
    conflicts_remaining: AtomicUsize,
    write_attempts: AtomicUsize,
}

impl ContendedRepository {
    pub(super) fn new(conflicts: usize) -> Self {
        let inner = InMemoryQualityRepository::new();
        inner.insert_ebp(cbt()).expect("insert ebp");
        inner
            .insert_metric(screening_metric())
            .expect("insert metric");
        Self {
            inner,
            conflicts_remaining: AtomicUsize::new(conflicts),
            write_attempts: AtomicUsize::new(0),
        }
    }

    pub(super) fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    fn lose_race(&self) -> bool {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        self.conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl QualityRepository for ContendedRepository {
    fn get_ebp(&self, id: &EbpId) -> Result<Option<EvidenceBasedPractice>, RepositoryError> {
        self.inner.get_ebp(id)
    }

    fn list_fidelity_assessments(
        &self,
        id: &EbpId,
        range: Option<DateRange>,
    ) -> Result<Vec<FidelityAssessment>, RepositoryError> {
        self.inner.list_fidelity_assessments(id, range)
    }

    fn commit_fidelity_assessment(
        &self,
        assessment: FidelityAssessment,
        ebp: EvidenceBasedPractice,
        expected_version: u64,
    ) -> Result<EvidenceBasedPractice, RepositoryError> {
        if self.lose_race() {
            return Err(RepositoryError::Conflict);
        }
        self.inner
            .commit_fidelity_assessment(assessment, ebp, expected_version)
    }

    fn update_ebp(
        &self,
        ebp: EvidenceBasedPractice,
        expected_version: u64,
    ) -> Result<EvidenceBasedPractice, RepositoryError> {
        if self.lose_race() {
            return Err(RepositoryError::Conflict);
        }
        self.inner.update_ebp(ebp, expected_version)
    }

    fn list_active_ebps(&self) -> Result<Vec<EvidenceBasedPractice>, RepositoryError> {
        self.inner.list_active_ebps()
    }

    fn get_metric(&self, id: &MetricId) -> Result<Option<QualityMetric>, RepositoryError> {
        self.inner.get_metric(id)
    }

    fn list_metric_history(
        &self,
        id: &MetricId,
        range: Option<DateRange>,
    ) -> Result<Vec<Observation>, RepositoryError> {
        self.inner.list_metric_history(id, range)
    }

    fn update_metric(
        &self,
        metric: QualityMetric,
        expected_version: u64,
    ) -> Result<QualityMetric, RepositoryError> {
        if self.lose_race() {
            return Err(RepositoryError::Conflict);
        }
        self.inner.update_metric(metric, expected_version)
    }

    fn list_active_metrics(&self) -> Result<Vec<QualityMetric>, RepositoryError> {
        self.inner.list_active_metrics()
    }
}

pub(super) struct UnavailableRepository;

impl QualityRepository for UnavailableRepository {
    fn get_ebp(&self, _id: &EbpId) -> Result<Option<EvidenceBasedPractice>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".into()))
    }

    fn list_fidelity_assessments(
        &self,
        _id: &EbpId,
        _range: Option<DateRange>,
    ) -> Result<Vec<FidelityAssessment>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".into()))
    }

    fn commit_fidelity_assessment(
        &self,
        _assessment: FidelityAssessment,
        _ebp: EvidenceBasedPractice,
        _expected_version: u64,
    ) -> Result<EvidenceBasedPractice, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".into()))
    }

    fn update_ebp(
        &self,
        _ebp: EvidenceBasedPractice,
        _expected_version: u64,
    ) -> Result<EvidenceBasedPractice, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".into()))
    }

    fn list_active_ebps(&self) -> Result<Vec<EvidenceBasedPractice>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".into()))
    }

    fn get_metric(&self, _id: &MetricId) -> Result<Option<QualityMetric>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".into()))
    }

    fn list_metric_history(
        &self,
        _id: &MetricId,
        _range: Option<DateRange>,
    ) -> Result<Vec<Observation>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".into()))
    }

    fn update_metric(
        &self,
        _metric: QualityMetric,
        _expected_version: u64,
    ) -> Result<QualityMetric, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".into()))
    }

    fn list_active_metrics(&self) -> Result<Vec<QualityMetric>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".into()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("valid json")
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::workflows::research::domain::{
    EnrollmentRequest, EnrollmentStatus, IrbStatus, ParticipantId, PatientId, ResearchStudy,
    StudyId, StudyParticipant, StudyStatus,
};
use crate::workflows::research::repository::{
    InMemoryStudyRepository, StudyRepository, StudyWrite,
};
use crate::workflows::research::ResearchService;
use crate::workflows::store::RepositoryError;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn study_id() -> StudyId {
    StudyId("study-ccm".to_string())
}

/// Active, approved 2024 study with room for exactly one more participant once seeded.
pub(super) fn ccm_study() -> ResearchStudy {
    ResearchStudy {
        id: study_id(),
        title: "Collaborative care for perinatal depression".to_string(),
        status: StudyStatus::Active,
        irb_status: IrbStatus::Approved,
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
        enrollment_target: 10,
        current_enrollment: 0,
        version: 0,
    }
}

pub(super) fn enrolled_participant(index: usize) -> StudyParticipant {
    StudyParticipant {
        id: ParticipantId(format!("seed-{index:03}")),
        study_id: study_id(),
        patient_id: PatientId(format!("patient-{index:03}")),
        enrolled_date: date(2024, 2, 1),
        enrollment_status: EnrollmentStatus::Enrolled,
        consent_obtained: true,
        consent_date: Some(date(2024, 2, 1)),
        withdrawal_date: None,
        withdrawal_reason: None,
    }
}

pub(super) fn request(patient: &str, enrolled_on: NaiveDate) -> EnrollmentRequest {
    EnrollmentRequest {
        patient_id: PatientId(patient.to_string()),
        enrolled_date: enrolled_on,
        consent_obtained: true,
        consent_date: Some(enrolled_on),
    }
}

/// Study with nine enrolled participants against a target of ten.
pub(super) fn seeded_repository(study: ResearchStudy) -> Arc<InMemoryStudyRepository> {
    let repository = InMemoryStudyRepository::new();
    repository.insert_study(study).expect("insert study");
    repository
        .seed_participants((1..=9).map(enrolled_participant).collect())
        .expect("seed participants");
    Arc::new(repository)
}

pub(super) fn build_service() -> (
    ResearchService<InMemoryStudyRepository>,
    Arc<InMemoryStudyRepository>,
) {
    let repository = seeded_repository(ccm_study());
    let service = ResearchService::new(repository.clone(), EngineConfig::default());
    (service, repository)
}

/// Reads pass through; every write loses the version race.
pub(super) struct ConflictingStudyRepository {
    inner: Arc<InMemoryStudyRepository>,
    writes: AtomicUsize,
}

impl ConflictingStudyRepository {
    pub(super) fn new() -> Self {
        Self {
            inner: seeded_repository(ccm_study()),
            writes: AtomicUsize::new(0),
        }
    }

    pub(super) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StudyRepository for ConflictingStudyRepository {
    fn get_study(&self, id: &StudyId) -> Result<Option<ResearchStudy>, RepositoryError> {
        self.inner.get_study(id)
    }

    fn list_participants(
        &self,
        study_id: &StudyId,
    ) -> Result<Vec<StudyParticipant>, RepositoryError> {
        self.inner.list_participants(study_id)
    }

    fn get_participant(
        &self,
        study_id: &StudyId,
        participant_id: &ParticipantId,
    ) -> Result<Option<StudyParticipant>, RepositoryError> {
        self.inner.get_participant(study_id, participant_id)
    }

    fn insert_participant(
        &self,
        _participant: StudyParticipant,
        _expected_version: u64,
    ) -> Result<StudyWrite, RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::Conflict)
    }

    fn update_participant(
        &self,
        _participant: StudyParticipant,
        _expected_version: u64,
    ) -> Result<StudyWrite, RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::Conflict)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("valid json")
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::domain::{
    EnrollmentRequest, EnrollmentStatus, ParticipantId, PatientId, ResearchStudy, StudyId,
    StudyParticipant, WithdrawalRequest,
};
use super::eligibility::{EligibilityDecision, EligibilityEvaluator};
use super::repository::{StudyRepository, StudyWrite};
use crate::config::EngineConfig;
use crate::workflows::store::RepositoryError;
use crate::workflows::validation::ValidationError;

/// Enrollment and participant status changes with a fresh eligibility check on every write.
pub struct ResearchService<R> {
    repository: Arc<R>,
    config: EngineConfig,
}

static PARTICIPANT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_participant_id() -> ParticipantId {
    let id = PARTICIPANT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ParticipantId(format!("sp-{id:06}"))
}

impl<R> ResearchService<R>
where
    R: StudyRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: EngineConfig) -> Self {
        Self { repository, config }
    }

    pub fn get_study(&self, id: &StudyId) -> Result<ResearchStudy, EnrollmentError> {
        self.repository
            .get_study(id)?
            .ok_or_else(|| EnrollmentError::not_found("study", id))
    }

    pub fn list_participants(
        &self,
        study_id: &StudyId,
    ) -> Result<Vec<StudyParticipant>, EnrollmentError> {
        self.get_study(study_id)?;
        Ok(self.repository.list_participants(study_id)?)
    }

    pub fn eligibility(
        &self,
        study_id: &StudyId,
        today: NaiveDate,
    ) -> Result<EligibilityDecision, EnrollmentError> {
        let study = self.get_study(study_id)?;
        Ok(EligibilityEvaluator::evaluate(&study, today))
    }

    /// Enrolls a patient after re-reading the study and re-running every check.
    ///
    /// Each retry after a version conflict starts from a fresh study row, so a study that
    /// filled up in the meantime fails eligibility instead of overshooting its target.
    pub fn enroll(
        &self,
        study_id: &StudyId,
        request: EnrollmentRequest,
        today: NaiveDate,
    ) -> Result<StudyWrite, EnrollmentError> {
        let participant = StudyParticipant {
            id: next_participant_id(),
            study_id: study_id.clone(),
            patient_id: request.patient_id,
            enrolled_date: request.enrolled_date,
            enrollment_status: EnrollmentStatus::Enrolled,
            consent_obtained: request.consent_obtained,
            consent_date: request.consent_date,
            withdrawal_date: None,
            withdrawal_reason: None,
        };
        participant.validate()?;

        self.with_retries(study_id, |attempt| {
            let study = self.get_study(study_id)?;

            let decision = EligibilityEvaluator::evaluate(&study, today);
            if !decision.can_enroll {
                return Err(EnrollmentError::Eligibility {
                    reasons: decision.reasons,
                });
            }

            if !study.covers(participant.enrolled_date) {
                return Err(ValidationError::new(
                    "enrolled_date",
                    format!(
                        "{} is outside the study period {} to {}",
                        participant.enrolled_date, study.start_date, study.end_date
                    ),
                )
                .into());
            }

            let already_enrolled = self
                .repository
                .list_participants(study_id)?
                .iter()
                .any(|row| row.patient_id == participant.patient_id && row.is_enrolled());
            if already_enrolled {
                return Err(EnrollmentError::Duplicate {
                    patient_id: participant.patient_id.clone(),
                    study_id: study_id.clone(),
                });
            }

            let write = self
                .repository
                .insert_participant(participant.clone(), study.version)?;
            info!(
                study_id = %study_id,
                participant_id = %write.participant.id,
                attempt,
                current_enrollment = write.study.current_enrollment,
                enrollment_target = write.study.enrollment_target,
                "participant enrolled"
            );
            Ok(write)
        })
    }

    pub fn withdraw(
        &self,
        study_id: &StudyId,
        participant_id: &ParticipantId,
        request: WithdrawalRequest,
    ) -> Result<StudyWrite, EnrollmentError> {
        self.change_status(study_id, participant_id, |participant| {
            participant.enrollment_status = EnrollmentStatus::Withdrawn;
            participant.withdrawal_date = Some(request.withdrawal_date);
            participant.withdrawal_reason = Some(request.reason.trim().to_string());
        })
    }

    pub fn complete(
        &self,
        study_id: &StudyId,
        participant_id: &ParticipantId,
    ) -> Result<StudyWrite, EnrollmentError> {
        self.change_status(study_id, participant_id, |participant| {
            participant.enrollment_status = EnrollmentStatus::Completed;
        })
    }

    pub fn mark_lost_to_followup(
        &self,
        study_id: &StudyId,
        participant_id: &ParticipantId,
    ) -> Result<StudyWrite, EnrollmentError> {
        self.change_status(study_id, participant_id, |participant| {
            participant.enrollment_status = EnrollmentStatus::LostToFollowup;
        })
    }

    /// Moves an enrolled participant to a terminal status and recounts the study.
    fn change_status<F>(
        &self,
        study_id: &StudyId,
        participant_id: &ParticipantId,
        apply: F,
    ) -> Result<StudyWrite, EnrollmentError>
    where
        F: Fn(&mut StudyParticipant),
    {
        self.with_retries(study_id, |attempt| {
            let study = self.get_study(study_id)?;
            let mut participant = self
                .repository
                .get_participant(study_id, participant_id)?
                .ok_or_else(|| EnrollmentError::not_found("participant", participant_id))?;

            if !participant.is_enrolled() {
                return Err(ValidationError::new(
                    "enrollment_status",
                    format!(
                        "participant is '{}'; only enrolled participants can change status",
                        participant.enrollment_status.as_str()
                    ),
                )
                .into());
            }

            apply(&mut participant);
            participant.validate()?;

            let write = self
                .repository
                .update_participant(participant, study.version)?;
            info!(
                study_id = %study_id,
                participant_id = %participant_id,
                attempt,
                status = write.participant.enrollment_status.as_str(),
                current_enrollment = write.study.current_enrollment,
                "participant status changed"
            );
            Ok(write)
        })
    }

    fn with_retries<T, F>(&self, study_id: &StudyId, mut write: F) -> Result<T, EnrollmentError>
    where
        F: FnMut(u8) -> Result<T, EnrollmentError>,
    {
        let attempts = self.config.write_retries.max(1);
        for attempt in 1..=attempts {
            match write(attempt) {
                Err(EnrollmentError::Repository(RepositoryError::Conflict)) => {
                    debug!(%study_id, attempt, "study version conflict, retrying");
                }
                Err(EnrollmentError::Repository(RepositoryError::NotFound)) => {
                    return Err(EnrollmentError::not_found("study", study_id));
                }
                other => return other,
            }
        }

        warn!(%study_id, attempts, "giving up after repeated study version conflicts");
        Err(EnrollmentError::WriteContention {
            entity: "study",
            id: study_id.to_string(),
            attempts,
        })
    }
}

/// Error raised by enrollment and participant status changes.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("enrollment not permitted: {}", .reasons.join("; "))]
    Eligibility { reasons: Vec<String> },
    #[error("patient '{patient_id}' is already enrolled in study '{study_id}'")]
    Duplicate {
        patient_id: PatientId,
        study_id: StudyId,
    },
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

impl EnrollmentError {
    fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

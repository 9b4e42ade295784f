use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl std::fmt::Display for StudyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyStatus {
    Planning,
    Active,
    DataCollection,
    Analysis,
    Completed,
    Cancelled,
}

impl StudyStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Active => "active",
            Self::DataCollection => "data_collection",
            Self::Analysis => "analysis",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn accepts_enrollment(self) -> bool {
        matches!(self, Self::Active | Self::DataCollection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrbStatus {
    Pending,
    Approved,
    Exempt,
    Rejected,
    Expired,
}

impl IrbStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Exempt => "exempt",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

/// Research study with its enrollment counter.
///
/// `current_enrollment` is derived: stores recount it from participants on every
/// participant write, and bump `version` so stale read-modify-writes are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchStudy {
    pub id: StudyId,
    pub title: String,
    pub status: StudyStatus,
    pub irb_status: IrbStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub enrollment_target: u32,
    #[serde(default)]
    pub current_enrollment: u32,
    #[serde(default)]
    pub version: u64,
}

impl ResearchStudy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enrollment_target == 0 {
            return Err(ValidationError::new(
                "enrollment_target",
                "must be a positive number of participants",
            ));
        }
        if self.end_date < self.start_date {
            return Err(ValidationError::new(
                "end_date",
                format!("{} is before start date {}", self.end_date, self.start_date),
            ));
        }
        Ok(())
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Enrolled,
    Withdrawn,
    Completed,
    LostToFollowup,
}

impl EnrollmentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enrolled => "enrolled",
            Self::Withdrawn => "withdrawn",
            Self::Completed => "completed",
            Self::LostToFollowup => "lost_to_followup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyParticipant {
    pub id: ParticipantId,
    pub study_id: StudyId,
    pub patient_id: PatientId,
    pub enrolled_date: NaiveDate,
    pub enrollment_status: EnrollmentStatus,
    pub consent_obtained: bool,
    #[serde(default)]
    pub consent_date: Option<NaiveDate>,
    #[serde(default)]
    pub withdrawal_date: Option<NaiveDate>,
    #[serde(default)]
    pub withdrawal_reason: Option<String>,
}

impl StudyParticipant {
    pub fn is_enrolled(&self) -> bool {
        self.enrollment_status == EnrollmentStatus::Enrolled
    }

    /// Consent date accompanies consent, withdrawal details accompany withdrawal.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.consent_obtained, self.consent_date) {
            (true, None) => {
                return Err(ValidationError::new(
                    "consent_date",
                    "required when consent was obtained",
                ))
            }
            (false, Some(_)) => {
                return Err(ValidationError::new(
                    "consent_date",
                    "must be empty when consent was not obtained",
                ))
            }
            _ => {}
        }

        let withdrawn = self.enrollment_status == EnrollmentStatus::Withdrawn;
        let has_reason = self
            .withdrawal_reason
            .as_deref()
            .is_some_and(|reason| !reason.trim().is_empty());

        if withdrawn {
            let Some(withdrawal_date) = self.withdrawal_date else {
                return Err(ValidationError::new(
                    "withdrawal_date",
                    "required when withdrawing",
                ));
            };
            if !has_reason {
                return Err(ValidationError::new(
                    "withdrawal_reason",
                    "required when withdrawing",
                ));
            }
            if withdrawal_date < self.enrolled_date {
                return Err(ValidationError::new(
                    "withdrawal_date",
                    format!(
                        "{withdrawal_date} is before the enrolled date {}",
                        self.enrolled_date
                    ),
                ));
            }
        } else if self.withdrawal_date.is_some() || self.withdrawal_reason.is_some() {
            return Err(ValidationError::new(
                "withdrawal_reason",
                format!(
                    "only withdrawn participants carry withdrawal details (status is '{}')",
                    self.enrollment_status.as_str()
                ),
            ));
        }

        Ok(())
    }
}

/// Inbound payload for enrolling a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub patient_id: PatientId,
    pub enrolled_date: NaiveDate,
    pub consent_obtained: bool,
    #[serde(default)]
    pub consent_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub withdrawal_date: NaiveDate,
    /// Left empty when absent so the participant check reports `withdrawal_reason`.
    #[serde(default)]
    pub reason: String,
}

//! Research study enrollment gate and participant lifecycle.

pub mod domain;
pub mod eligibility;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    EnrollmentRequest, EnrollmentStatus, IrbStatus, ParticipantId, PatientId, ResearchStudy,
    StudyId, StudyParticipant, StudyStatus, WithdrawalRequest,
};
pub use eligibility::{EligibilityDecision, EligibilityEvaluator};
pub use repository::{InMemoryStudyRepository, StudyRepository, StudyWrite};
pub use router::{research_router, AsOfQuery};
pub use service::{EnrollmentError, ResearchService};

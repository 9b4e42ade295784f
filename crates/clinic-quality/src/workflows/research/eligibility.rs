use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{IrbStatus, ResearchStudy};

/// Whether a study may take a new participant today, with every failing condition listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityDecision {
    pub can_enroll: bool,
    pub reasons: Vec<String>,
}

/// Study-level enrollment gate.
///
/// All four conditions are checked on every call so callers can show the full list.
pub struct EligibilityEvaluator;

impl EligibilityEvaluator {
    pub fn evaluate(study: &ResearchStudy, today: NaiveDate) -> EligibilityDecision {
        let mut reasons = Vec::new();

        if !study.status.accepts_enrollment() {
            reasons.push(format!(
                "Study status is '{}' (must be 'active' or 'data_collection')",
                study.status.as_str()
            ));
        }

        if study.irb_status != IrbStatus::Approved {
            reasons.push(format!(
                "IRB status is '{}' (must be 'approved')",
                study.irb_status.as_str()
            ));
        }

        if today < study.start_date {
            reasons.push(format!(
                "Study has not started (starts {}, today is {today})",
                study.start_date
            ));
        } else if today > study.end_date {
            reasons.push(format!(
                "Study has ended (ended {}, today is {today})",
                study.end_date
            ));
        }

        if study.current_enrollment >= study.enrollment_target {
            reasons.push(format!(
                "Study enrollment is at capacity ({} of {} enrolled)",
                study.current_enrollment, study.enrollment_target
            ));
        }

        EligibilityDecision {
            can_enroll: reasons.is_empty(),
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::research::domain::{StudyId, StudyStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn open_study() -> ResearchStudy {
        ResearchStudy {
            id: StudyId("study-ccm".to_string()),
            title: "Collaborative care".to_string(),
            status: StudyStatus::Active,
            irb_status: IrbStatus::Approved,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            enrollment_target: 10,
            current_enrollment: 9,
            version: 0,
        }
    }

    #[test]
    fn open_study_accepts_enrollment() {
        let decision = EligibilityEvaluator::evaluate(&open_study(), date(2024, 6, 1));
        assert!(decision.can_enroll);
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn planning_status_yields_exactly_one_reason() {
        let mut study = open_study();
        study.status = StudyStatus::Planning;

        let decision = EligibilityEvaluator::evaluate(&study, date(2024, 6, 1));
        assert!(!decision.can_enroll);
        assert_eq!(
            decision.reasons,
            vec!["Study status is 'planning' (must be 'active' or 'data_collection')".to_string()]
        );
    }

    #[test]
    fn data_collection_counts_as_open() {
        let mut study = open_study();
        study.status = StudyStatus::DataCollection;
        assert!(EligibilityEvaluator::evaluate(&study, date(2024, 6, 1)).can_enroll);
    }

    #[test]
    fn date_range_is_inclusive_on_both_ends() {
        let study = open_study();
        assert!(EligibilityEvaluator::evaluate(&study, date(2024, 1, 1)).can_enroll);
        assert!(EligibilityEvaluator::evaluate(&study, date(2024, 12, 31)).can_enroll);
        assert!(!EligibilityEvaluator::evaluate(&study, date(2023, 12, 31)).can_enroll);
        assert!(!EligibilityEvaluator::evaluate(&study, date(2025, 1, 1)).can_enroll);
    }

    #[test]
    fn reaching_target_exactly_blocks_enrollment() {
        let mut study = open_study();
        study.current_enrollment = 10;

        let decision = EligibilityEvaluator::evaluate(&study, date(2024, 6, 1));
        assert_eq!(
            decision.reasons,
            vec!["Study enrollment is at capacity (10 of 10 enrolled)".to_string()]
        );
    }

    #[test]
    fn every_failing_condition_is_reported() {
        let study = ResearchStudy {
            status: StudyStatus::Completed,
            irb_status: IrbStatus::Expired,
            current_enrollment: 12,
            ..open_study()
        };

        let decision = EligibilityEvaluator::evaluate(&study, date(2025, 3, 1));
        assert!(!decision.can_enroll);
        assert_eq!(decision.reasons.len(), 4);
        assert!(decision.reasons[1].contains("'expired'"));
        assert!(decision.reasons[2].starts_with("Study has ended"));
    }
}

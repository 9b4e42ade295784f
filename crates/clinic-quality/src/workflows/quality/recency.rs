use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Assessments older than this are no longer current.
const CURRENT_WINDOW_DAYS: i64 = 60;
/// Quarterly assessment cadence.
const ASSESSMENT_CADENCE_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyStatus {
    Never,
    Current,
    DueSoon,
    Overdue,
}

impl RecencyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Never => "Never Assessed",
            Self::Current => "Current",
            Self::DueSoon => "Due Soon",
            Self::Overdue => "Overdue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecencyAssessment {
    pub status: RecencyStatus,
    pub days_since_review: Option<i64>,
    pub message: String,
}

/// Classifies how stale an EBP's last fidelity review is.
pub struct RecencyEvaluator;

impl RecencyEvaluator {
    pub fn evaluate(last_review: Option<NaiveDate>, today: NaiveDate) -> RecencyAssessment {
        let Some(last_review) = last_review else {
            return RecencyAssessment {
                status: RecencyStatus::Never,
                days_since_review: None,
                message: "No fidelity assessment has been recorded".to_string(),
            };
        };

        let days = (today - last_review).num_days();
        let (status, message) = if days <= CURRENT_WINDOW_DAYS {
            (
                RecencyStatus::Current,
                format!("Last assessed {days} days ago"),
            )
        } else if days <= ASSESSMENT_CADENCE_DAYS {
            let remaining = ASSESSMENT_CADENCE_DAYS - days;
            (
                RecencyStatus::DueSoon,
                format!("Assessment due within {remaining} days (last assessed {days} days ago)"),
            )
        } else {
            let overdue_by = days - ASSESSMENT_CADENCE_DAYS;
            (
                RecencyStatus::Overdue,
                format!("Assessment overdue by {overdue_by} days (last assessed {days} days ago)"),
            )
        };

        RecencyAssessment {
            status,
            days_since_review: Some(days),
            message,
        }
    }

    /// Timestamps are truncated to their calendar date before comparing.
    pub fn evaluate_timestamps(
        last_review: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> RecencyAssessment {
        Self::evaluate(last_review.map(|stamp| stamp.date()), now.date())
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::workflows::validation::{ensure_finite, ensure_percentage, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EbpId(pub String);

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for EbpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Outcomes,
    Access,
    Ccbhc,
    Integration,
    Safety,
    Efficiency,
    PatientExperience,
}

impl MetricCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Outcomes => "Outcomes",
            Self::Access => "Access",
            Self::Ccbhc => "CCBHC",
            Self::Integration => "Integration",
            Self::Safety => "Safety",
            Self::Efficiency => "Efficiency",
            Self::PatientExperience => "Patient Experience",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
    #[default]
    Unknown,
}

impl TrendDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Stable => "Stable",
            Self::Unknown => "Unknown",
        }
    }
}

/// One dated numeric reading of a metric or EBP dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

fn default_unit() -> String {
    "%".to_string()
}

fn default_true() -> bool {
    true
}

/// Configured quality measure with its reporting history.
///
/// `current_value`, when present, always mirrors the last entry of `historical_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetric {
    pub id: MetricId,
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    pub category: MetricCategory,
    #[serde(default)]
    pub current_value: Option<f64>,
    pub target_value: f64,
    #[serde(default)]
    pub benchmark_value: Option<f64>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_true")]
    pub higher_is_better: bool,
    #[serde(default)]
    pub warning_threshold: Option<f64>,
    #[serde(default)]
    pub critical_threshold: Option<f64>,
    #[serde(default)]
    pub trend: TrendDirection,
    #[serde(default)]
    pub trend_percentage: Option<f64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_ccbhc_required: bool,
    #[serde(default)]
    pub is_mips_measure: bool,
    #[serde(default)]
    pub historical_data: Vec<Observation>,
    #[serde(default)]
    pub version: u64,
}

impl QualityMetric {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: MetricCategory,
        target_value: f64,
    ) -> Self {
        Self {
            id: MetricId(id.into()),
            code: None,
            name: name.into(),
            category,
            current_value: None,
            target_value,
            benchmark_value: None,
            unit: default_unit(),
            higher_is_better: true,
            warning_threshold: None,
            critical_threshold: None,
            trend: TrendDirection::Unknown,
            trend_percentage: None,
            is_active: true,
            is_ccbhc_required: false,
            is_mips_measure: false,
            historical_data: Vec::new(),
            version: 0,
        }
    }

    /// CCBHC-required and MIPS measures are escalated when they miss target.
    pub fn is_compliance_measure(&self) -> bool {
        self.is_ccbhc_required || self.is_mips_measure
    }

    /// Rejects metrics whose numbers cannot be compared against thresholds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_finite("target_value", self.target_value)?;
        if let Some(value) = self.current_value {
            ensure_finite("current_value", value)?;
        }
        if let Some(value) = self.benchmark_value {
            ensure_finite("benchmark_value", value)?;
        }
        if let Some(value) = self.warning_threshold {
            ensure_finite("warning_threshold", value)?;
        }
        if let Some(value) = self.critical_threshold {
            ensure_finite("critical_threshold", value)?;
        }
        Ok(())
    }

    /// Appends a reporting-period value; history stays chronological.
    pub fn record_observation(
        &mut self,
        date: NaiveDate,
        value: f64,
    ) -> Result<(), ValidationError> {
        ensure_finite("value", value)?;
        if let Some(last) = self.historical_data.last() {
            if date < last.date {
                return Err(ValidationError::new(
                    "date",
                    format!(
                        "{date} is earlier than the latest recorded observation {}",
                        last.date
                    ),
                ));
            }
        }

        self.historical_data.push(Observation::new(date, value));
        self.current_value = Some(value);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EbpCategory {
    Counseling,
    Behavioral,
    Medical,
    Organizational,
}

/// Clinical protocol tracked for adoption, fidelity, and sustainability.
///
/// The three scores are derived values on a 0-100 scale. `version` increments on every
/// store write so concurrent recomputations can be detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBasedPractice {
    pub id: EbpId,
    pub name: String,
    pub category: EbpCategory,
    #[serde(default)]
    pub adoption_rate: f64,
    #[serde(default)]
    pub fidelity_score: f64,
    #[serde(default)]
    pub sustainability_score: f64,
    #[serde(default)]
    pub trained_staff: u32,
    #[serde(default)]
    pub total_staff: u32,
    #[serde(default)]
    pub last_fidelity_review: Option<NaiveDate>,
    #[serde(default)]
    pub outcomes_tracked: BTreeSet<String>,
    /// Dated adoption-rate snapshots, one per training update, oldest first.
    #[serde(default)]
    pub adoption_history: Vec<Observation>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub version: u64,
}

impl EvidenceBasedPractice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: EbpCategory) -> Self {
        Self {
            id: EbpId(id.into()),
            name: name.into(),
            category,
            adoption_rate: 0.0,
            fidelity_score: 0.0,
            sustainability_score: 0.0,
            trained_staff: 0,
            total_staff: 0,
            last_fidelity_review: None,
            outcomes_tracked: BTreeSet::new(),
            adoption_history: Vec::new(),
            is_active: true,
            version: 0,
        }
    }

    /// Sets the training counts and logs the resulting adoption rate under `recorded_on`.
    pub fn record_training(&mut self, trained_staff: u32, total_staff: u32, recorded_on: NaiveDate) {
        self.trained_staff = trained_staff;
        self.total_staff = total_staff;
        self.adoption_rate = adoption_rate(trained_staff, total_staff);

        let position = self
            .adoption_history
            .partition_point(|observation| observation.date <= recorded_on);
        self.adoption_history
            .insert(position, Observation::new(recorded_on, self.adoption_rate));
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_percentage("adoption_rate", self.adoption_rate)?;
        ensure_percentage("fidelity_score", self.fidelity_score)?;
        ensure_percentage("sustainability_score", self.sustainability_score)?;
        if self.trained_staff > self.total_staff {
            return Err(ValidationError::new(
                "trained_staff",
                format!(
                    "{} trained exceeds {} total staff",
                    self.trained_staff, self.total_staff
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
    #[default]
    Standard,
    SpotCheck,
    Comprehensive,
    SelfAssessment,
}

/// Append-only fidelity review of one EBP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityAssessment {
    pub ebp_id: EbpId,
    pub assessment_date: NaiveDate,
    #[serde(default)]
    pub assessment_type: AssessmentType,
    pub fidelity_score: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl FidelityAssessment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_percentage("fidelity_score", self.fidelity_score)
    }
}

/// Inbound payload for recording a new fidelity assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSubmission {
    pub assessment_date: NaiveDate,
    #[serde(default)]
    pub assessment_type: AssessmentType,
    pub fidelity_score: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AssessmentSubmission {
    pub fn into_assessment(self, ebp_id: EbpId) -> FidelityAssessment {
        FidelityAssessment {
            ebp_id,
            assessment_date: self.assessment_date,
            assessment_type: self.assessment_type,
            fidelity_score: self.fidelity_score,
            notes: self.notes,
        }
    }
}

/// Share of staff trained on the practice, rounded to a whole percent.
pub fn adoption_rate(trained_staff: u32, total_staff: u32) -> f64 {
    if total_staff == 0 {
        return 0.0;
    }

    let rate = (trained_staff as f64 / total_staff as f64) * 100.0;
    rate.round().clamp(0.0, 100.0)
}

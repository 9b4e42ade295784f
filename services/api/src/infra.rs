use chrono::{Days, Months, NaiveDate};
use clinic_quality::workflows::quality::{
    AssessmentType, EbpCategory, EvidenceBasedPractice, FidelityAssessment,
    InMemoryQualityRepository, MetricCategory, Observation, QualityMetric, QualityServiceError,
};
use clinic_quality::workflows::research::{
    EnrollmentError, EnrollmentStatus, InMemoryStudyRepository, IrbStatus, ParticipantId,
    PatientId, ResearchStudy, StudyId, StudyParticipant, StudyStatus,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_STUDY_ID: &str = "study-ccm";

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn months_ago(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_sub_months(Months::new(months))
        .unwrap_or(today)
}

fn days_ago(today: NaiveDate, days: u64) -> NaiveDate {
    today.checked_sub_days(Days::new(days)).unwrap_or(today)
}

/// Monthly history ending this month, oldest value first.
fn with_monthly_history(mut metric: QualityMetric, values: &[f64], today: NaiveDate) -> QualityMetric {
    let count = values.len() as u32;
    metric.historical_data = values
        .iter()
        .enumerate()
        .map(|(index, value)| Observation::new(months_ago(today, count - 1 - index as u32), *value))
        .collect();
    metric.current_value = metric.historical_data.last().map(|observation| observation.value);
    metric
}

/// Clinic metrics and EBPs covering every notification rule relative to `today`.
pub(crate) fn seed_quality_repository(
    today: NaiveDate,
) -> Result<InMemoryQualityRepository, QualityServiceError> {
    let repository = InMemoryQualityRepository::new();

    let mut screening = QualityMetric::new(
        "ccbhc-depression-screening",
        "Depression screening and follow-up",
        MetricCategory::Ccbhc,
        80.0,
    );
    screening.code = Some("CDF-AD".to_string());
    screening.is_ccbhc_required = true;
    screening.critical_threshold = Some(60.0);
    repository.insert_metric(with_monthly_history(
        screening,
        &[70.0, 72.0, 73.0, 75.0, 76.0, 77.0],
        today,
    ))?;

    let mut remission = QualityMetric::new(
        "phq9-remission",
        "PHQ-9 remission at 12 months",
        MetricCategory::Outcomes,
        40.0,
    );
    remission.benchmark_value = Some(35.0);
    remission.critical_threshold = Some(25.0);
    remission.is_mips_measure = true;
    repository.insert_metric(with_monthly_history(
        remission,
        &[31.0, 30.0, 28.0, 26.0, 24.0],
        today,
    ))?;

    let mut readmission = QualityMetric::new(
        "er-readmission-30d",
        "Emergency readmission within 30 days",
        MetricCategory::Safety,
        10.0,
    );
    readmission.higher_is_better = false;
    repository.insert_metric(with_monthly_history(readmission, &[11.0, 9.5, 8.0], today))?;

    let mut access = QualityMetric::new(
        "days-to-first-appointment",
        "Days to first appointment",
        MetricCategory::Access,
        10.0,
    );
    access.unit = "days".to_string();
    access.higher_is_better = false;
    repository.insert_metric(with_monthly_history(access, &[14.0, 13.0, 12.0], today))?;

    let mut cbt = EvidenceBasedPractice::new(
        "ebp-cbt",
        "Cognitive Behavioral Therapy",
        EbpCategory::Counseling,
    );
    cbt.record_training(6, 12, days_ago(today, 180));
    cbt.record_training(9, 12, days_ago(today, 30));
    cbt.fidelity_score = 84.0;
    cbt.sustainability_score = 70.0;
    cbt.last_fidelity_review = Some(days_ago(today, 30));
    cbt.outcomes_tracked = ["PHQ-9", "GAD-7"].into_iter().map(String::from).collect();

    let mut motivational = EvidenceBasedPractice::new(
        "ebp-mi",
        "Motivational Interviewing",
        EbpCategory::Behavioral,
    );
    motivational.record_training(5, 12, days_ago(today, 90));
    motivational.fidelity_score = 66.0;
    motivational.last_fidelity_review = Some(days_ago(today, 120));

    let collaborative = EvidenceBasedPractice::new(
        "ebp-collaborative-care",
        "Collaborative Care Model",
        EbpCategory::Medical,
    );

    let assessments = vec![
        FidelityAssessment {
            ebp_id: cbt.id.clone(),
            assessment_date: days_ago(today, 120),
            assessment_type: AssessmentType::Comprehensive,
            fidelity_score: 80.0,
            notes: None,
        },
        FidelityAssessment {
            ebp_id: cbt.id.clone(),
            assessment_date: days_ago(today, 30),
            assessment_type: AssessmentType::Standard,
            fidelity_score: 90.0,
            notes: Some("Session recordings reviewed".to_string()),
        },
        FidelityAssessment {
            ebp_id: motivational.id.clone(),
            assessment_date: days_ago(today, 120),
            assessment_type: AssessmentType::SelfAssessment,
            fidelity_score: 82.0,
            notes: None,
        },
    ];

    repository.insert_ebp(cbt)?;
    repository.insert_ebp(motivational)?;
    repository.insert_ebp(collaborative)?;
    repository.seed_assessments(assessments)?;

    Ok(repository)
}

/// One open study a seat short of target and one still in planning.
pub(crate) fn seed_study_repository(
    today: NaiveDate,
) -> Result<InMemoryStudyRepository, EnrollmentError> {
    let repository = InMemoryStudyRepository::new();
    let open = ResearchStudy {
        id: StudyId(DEMO_STUDY_ID.to_string()),
        title: "Collaborative care for perinatal depression".to_string(),
        status: StudyStatus::Active,
        irb_status: IrbStatus::Approved,
        start_date: months_ago(today, 6),
        end_date: today.checked_add_months(Months::new(6)).unwrap_or(today),
        enrollment_target: 10,
        current_enrollment: 0,
        version: 0,
    };
    let planning = ResearchStudy {
        id: StudyId("study-peer-support".to_string()),
        title: "Peer support after crisis stabilization".to_string(),
        status: StudyStatus::Planning,
        irb_status: IrbStatus::Pending,
        start_date: today.checked_add_months(Months::new(2)).unwrap_or(today),
        end_date: today.checked_add_months(Months::new(14)).unwrap_or(today),
        enrollment_target: 40,
        current_enrollment: 0,
        version: 0,
    };

    let enrolled_on = months_ago(today, 3);
    let participants = (1..=9)
        .map(|index| StudyParticipant {
            id: ParticipantId(format!("sp-seed-{index:03}")),
            study_id: open.id.clone(),
            patient_id: PatientId(format!("patient-{index:03}")),
            enrolled_date: enrolled_on,
            enrollment_status: EnrollmentStatus::Enrolled,
            consent_obtained: true,
            consent_date: Some(enrolled_on),
            withdrawal_date: None,
            withdrawal_reason: None,
        })
        .collect();

    repository.insert_study(open)?;
    repository.insert_study(planning)?;
    repository.seed_participants(participants)?;

    Ok(repository)
}

use crate::infra::{seed_quality_repository, seed_study_repository, DEMO_STUDY_ID};
use chrono::{Local, NaiveDate};
use clap::Args;
use clinic_quality::config::EngineConfig;
use clinic_quality::error::AppError;
use clinic_quality::workflows::quality::{
    AssessmentSubmission, AssessmentType, EbpId, MetricHistoryImporter, NotificationBatch,
    QualityRepository, QualityService, QualityServiceError, TrendAnalysis, TrendAnalyzer,
    TrendPeriod,
};
use clinic_quality::workflows::research::{
    EnrollmentError, EnrollmentRequest, PatientId, ResearchService, StudyId,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the reporting date (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct TrendArgs {
    /// CSV export with `date,value` columns
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Rolling window: 1month, 3months, 6months, 1year, or all
    #[arg(long, default_value_t = TrendPeriod::SixMonths)]
    pub(crate) period: TrendPeriod,
    /// Evaluation date for the window (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn run_trend(args: TrendArgs) -> Result<(), AppError> {
    let TrendArgs { csv, period, today } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let observations = MetricHistoryImporter::from_path(&csv)?;
    let analysis = TrendAnalyzer::analyze(&observations, period, today);

    println!(
        "Trend for {} ({} rows, window {} as of {})",
        csv.display(),
        observations.len(),
        period,
        today
    );
    render_trend(&analysis);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let config = EngineConfig::default();

    println!("Quality and program metrics demo ({today})");

    let quality_repository = Arc::new(seed_quality_repository(today)?);
    let quality = QualityService::new(quality_repository.clone(), config);

    let batch = quality.notifications(today)?;
    render_notifications(&batch);

    println!("\nMetric status");
    let metrics = quality_repository
        .list_active_metrics()
        .map_err(QualityServiceError::from)?;
    for metric in &metrics {
        let report = quality.metric_report(&metric.id, TrendPeriod::SixMonths, today)?;
        println!(
            "- {} [{}]: {} | target {} | {} ({:+.1}% over {})",
            report.metric.name,
            report.metric.category.label(),
            report
                .metric
                .current_value
                .map(|value| format!("{value:.1} {}", report.metric.unit))
                .unwrap_or_else(|| "no data".to_string()),
            report.metric.target_value,
            report.status_label,
            report.trend.percentage,
            report.trend.period
        );
    }

    println!("\nEvidence-based practices");
    for ebp in quality_repository
        .list_active_ebps()
        .map_err(QualityServiceError::from)?
    {
        let report = quality.ebp_report(&ebp.id, TrendPeriod::All, today)?;
        println!(
            "- {}: fidelity {:.0} | adoption {:.0}% ({}/{} trained, {}) | {}",
            report.ebp.name,
            report.ebp.fidelity_score,
            report.ebp.adoption_rate,
            report.ebp.trained_staff,
            report.ebp.total_staff,
            report.adoption_trend.direction.label(),
            report.recency.message
        );
    }

    let ebp_id = EbpId("ebp-mi".to_string());
    let refreshed = quality.append_fidelity_assessment(
        &ebp_id,
        AssessmentSubmission {
            assessment_date: today,
            assessment_type: AssessmentType::SpotCheck,
            fidelity_score: 88.0,
            notes: Some("Demo spot check".to_string()),
        },
    )?;
    println!(
        "  Recorded spot check for {} -> fidelity {:.0}, last review {}",
        refreshed.name,
        refreshed.fidelity_score,
        refreshed
            .last_fidelity_review
            .map(|date| date.to_string())
            .unwrap_or_else(|| "never".to_string())
    );

    println!("\nResearch enrollment");
    let research = ResearchService::new(Arc::new(seed_study_repository(today)?), config);
    let study_id = StudyId(DEMO_STUDY_ID.to_string());
    for study in [study_id.clone(), StudyId("study-peer-support".to_string())] {
        let decision = research.eligibility(&study, today)?;
        if decision.can_enroll {
            println!("- {study}: open for enrollment");
        } else {
            println!("- {study}: closed");
            for reason in &decision.reasons {
                println!("    - {reason}");
            }
        }
    }

    for patient in ["patient-demo-1", "patient-demo-2"] {
        let request = EnrollmentRequest {
            patient_id: PatientId(patient.to_string()),
            enrolled_date: today,
            consent_obtained: true,
            consent_date: Some(today),
        };
        match research.enroll(&study_id, request, today) {
            Ok(write) => println!(
                "  Enrolled {} as {} ({} of {} enrolled)",
                patient,
                write.participant.id,
                write.study.current_enrollment,
                write.study.enrollment_target
            ),
            Err(EnrollmentError::Eligibility { reasons }) => {
                println!("  {} refused: {}", patient, reasons.join("; "))
            }
            Err(other) => return Err(other.into()),
        }
    }

    Ok(())
}

fn render_notifications(batch: &NotificationBatch) {
    let summary = batch.summary();
    println!(
        "\nNotifications: {} total | {} error | {} warning | {} info | {} need action",
        summary.total, summary.errors, summary.warnings, summary.info, summary.action_required
    );
    for notification in &batch.notifications {
        println!(
            "- [{}{}] {}",
            notification.severity.label(),
            if notification.action_required {
                ", action"
            } else {
                ""
            },
            notification.title
        );
        println!("    {}", notification.message);
    }
    for failure in &batch.failures {
        println!("- skipped {}: {}", failure.subject, failure.reason);
    }
}

fn render_trend(analysis: &TrendAnalysis) {
    println!(
        "Direction: {} ({:+.1}% across {} observations)",
        analysis.direction.label(),
        analysis.percentage,
        analysis.observations
    );
    if analysis.series.is_empty() {
        println!("No observations inside the window");
        return;
    }
    for point in &analysis.series {
        println!(
            "  {}: {:.2} (n={})",
            point.label, point.value, point.observations
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn demo_runs_against_seeded_data() {
        let today = NaiveDate::from_ymd_opt(2024, 9, 15).expect("valid date");
        run_demo(DemoArgs { today: Some(today) }).expect("demo completes");
    }

    #[test]
    fn trend_reads_csv_history() {
        let path = std::env::temp_dir().join(format!(
            "clinic-quality-trend-{}.csv",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).expect("temp file");
        writeln!(file, "date,value\n2024-01-15,10\n2024-02-15,20\n2024-03-15,40").expect("write");
        drop(file);

        let result = run_trend(TrendArgs {
            csv: path.clone(),
            period: TrendPeriod::All,
            today: NaiveDate::from_ymd_opt(2024, 4, 1),
        });
        std::fs::remove_file(&path).ok();
        result.expect("trend completes");
    }

    #[test]
    fn missing_csv_is_an_error() {
        let result = run_trend(TrendArgs {
            csv: PathBuf::from("/nonexistent/history.csv"),
            period: TrendPeriod::All,
            today: None,
        });
        assert!(matches!(result, Err(AppError::Import(_))));
    }
}

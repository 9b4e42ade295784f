use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{EbpId, EvidenceBasedPractice, MetricId, QualityMetric};
use super::recency::{RecencyEvaluator, RecencyStatus};
use super::status::{MetricStatus, MetricStatusClassifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSeverity {
    Info,
    Warning,
    Error,
}

impl NotificationSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Error => 0,
            Self::Warning => 1,
            Self::Info => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    CriticalThresholdBreach,
    BelowTarget,
    FidelityAssessmentDue,
    ComplianceGap,
}

impl NotificationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CriticalThresholdBreach => "critical_threshold_breach",
            Self::BelowTarget => "below_target",
            Self::FidelityAssessmentDue => "fidelity_assessment_due",
            Self::ComplianceGap => "compliance_gap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NotificationSubject {
    Metric(MetricId),
    Ebp(EbpId),
}

impl std::fmt::Display for NotificationSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metric(id) => write!(f, "metric/{id}"),
            Self::Ebp(id) => write!(f, "ebp/{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub severity: NotificationSeverity,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub action_required: bool,
    pub subject: NotificationSubject,
}

impl Notification {
    fn new(
        severity: NotificationSeverity,
        notification_type: NotificationType,
        subject: NotificationSubject,
        title: String,
        message: String,
        action_required: bool,
    ) -> Self {
        Self {
            id: format!("{}:{}", notification_type.as_str(), subject),
            severity,
            notification_type,
            title,
            message,
            action_required,
            subject,
        }
    }
}

/// Entity skipped during a scan because its data could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityFailure {
    pub subject: NotificationSubject,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub action_required: usize,
}

impl NotificationSummary {
    pub fn from_notifications(notifications: &[Notification]) -> Self {
        notifications
            .iter()
            .fold(Self::default(), |mut summary, notification| {
                summary.total += 1;
                match notification.severity {
                    NotificationSeverity::Error => summary.errors += 1,
                    NotificationSeverity::Warning => summary.warnings += 1,
                    NotificationSeverity::Info => summary.info += 1,
                }
                if notification.action_required {
                    summary.action_required += 1;
                }
                summary
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationBatch {
    pub notifications: Vec<Notification>,
    pub failures: Vec<EntityFailure>,
}

impl NotificationBatch {
    pub fn summary(&self) -> NotificationSummary {
        NotificationSummary::from_notifications(&self.notifications)
    }
}

/// Read-only scan over the active metric and EBP population.
pub struct NotificationGenerator;

impl NotificationGenerator {
    /// Notifications come back ordered error, warning, info; metrics precede EBPs within a
    /// severity. Inactive entities are skipped; invalid ones land in `failures`.
    pub fn generate(
        metrics: &[QualityMetric],
        ebps: &[EvidenceBasedPractice],
        today: NaiveDate,
    ) -> NotificationBatch {
        let mut batch = NotificationBatch::default();

        for metric in metrics.iter().filter(|metric| metric.is_active) {
            match metric.validate() {
                Ok(()) => batch.notifications.extend(metric_notifications(metric)),
                Err(err) => batch.failures.push(EntityFailure {
                    subject: NotificationSubject::Metric(metric.id.clone()),
                    reason: err.to_string(),
                }),
            }
        }

        for ebp in ebps.iter().filter(|ebp| ebp.is_active) {
            match ebp.validate() {
                Ok(()) => batch.notifications.extend(ebp_notification(ebp, today)),
                Err(err) => batch.failures.push(EntityFailure {
                    subject: NotificationSubject::Ebp(ebp.id.clone()),
                    reason: err.to_string(),
                }),
            }
        }

        batch
            .notifications
            .sort_by_key(|notification| notification.severity.rank());
        batch
    }
}

fn metric_notifications(metric: &QualityMetric) -> Vec<Notification> {
    let mut notifications = Vec::new();
    let status = MetricStatusClassifier::classify(metric);
    let subject = NotificationSubject::Metric(metric.id.clone());

    let breach = match (status, metric.current_value, metric.critical_threshold) {
        (MetricStatus::Below, Some(current), Some(critical)) => {
            let breached = if metric.higher_is_better {
                current < critical
            } else {
                current > critical
            };
            breached.then_some((current, critical))
        }
        _ => None,
    };

    if let Some((current, critical)) = breach {
        notifications.push(Notification::new(
            NotificationSeverity::Error,
            NotificationType::CriticalThresholdBreach,
            subject.clone(),
            format!("Critical threshold breached: {}", metric.name),
            format!(
                "{} is at {}, past the critical threshold of {} (target {})",
                metric.name,
                format_value(current, &metric.unit),
                format_value(critical, &metric.unit),
                format_value(metric.target_value, &metric.unit)
            ),
            true,
        ));
    } else if matches!(status, MetricStatus::Below | MetricStatus::NearTarget) {
        let current = metric
            .current_value
            .map(|value| format_value(value, &metric.unit))
            .unwrap_or_else(|| "not reported".to_string());
        notifications.push(Notification::new(
            NotificationSeverity::Warning,
            NotificationType::BelowTarget,
            subject.clone(),
            format!("{}: {}", status.label(), metric.name),
            format!(
                "{} is {} against a target of {}",
                metric.name,
                current,
                format_value(metric.target_value, &metric.unit)
            ),
            false,
        ));
    }

    if metric.is_compliance_measure() && status != MetricStatus::Met {
        notifications.push(Notification::new(
            NotificationSeverity::Warning,
            NotificationType::ComplianceGap,
            subject,
            format!("Compliance gap: {}", metric.name),
            format!(
                "{} is a required {} measure and is not meeting its target of {}",
                metric.name,
                compliance_programs(metric),
                format_value(metric.target_value, &metric.unit)
            ),
            true,
        ));
    }

    notifications
}

fn ebp_notification(ebp: &EvidenceBasedPractice, today: NaiveDate) -> Option<Notification> {
    let recency = RecencyEvaluator::evaluate(ebp.last_fidelity_review, today);
    let (severity, action_required) = match recency.status {
        RecencyStatus::Overdue => (NotificationSeverity::Warning, true),
        RecencyStatus::Never => (NotificationSeverity::Info, false),
        RecencyStatus::Current | RecencyStatus::DueSoon => return None,
    };

    Some(Notification::new(
        severity,
        NotificationType::FidelityAssessmentDue,
        NotificationSubject::Ebp(ebp.id.clone()),
        format!("Fidelity assessment due: {}", ebp.name),
        recency.message,
        action_required,
    ))
}

fn compliance_programs(metric: &QualityMetric) -> &'static str {
    match (metric.is_ccbhc_required, metric.is_mips_measure) {
        (true, true) => "CCBHC and MIPS",
        (true, false) => "CCBHC",
        _ => "MIPS",
    }
}

fn format_value(value: f64, unit: &str) -> String {
    match unit {
        "%" => format!("{value:.1}%"),
        "" => format!("{value:.1}"),
        unit => format!("{value:.1} {unit}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::quality::domain::{EbpCategory, MetricCategory};
    use chrono::Days;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).expect("valid date")
    }

    fn metric(id: &str, current: Option<f64>, target: f64) -> QualityMetric {
        let mut metric = QualityMetric::new(id, format!("Metric {id}"), MetricCategory::Outcomes, target);
        metric.current_value = current;
        metric
    }

    fn ebp(id: &str, last_review_days_ago: Option<u64>) -> EvidenceBasedPractice {
        let mut ebp = EvidenceBasedPractice::new(id, format!("Practice {id}"), EbpCategory::Counseling);
        ebp.last_fidelity_review =
            last_review_days_ago.and_then(|days| today().checked_sub_days(Days::new(days)));
        ebp
    }

    #[test]
    fn critical_breach_supersedes_below_target() {
        let mut breached = metric("m-crit", Some(40.0), 80.0);
        breached.critical_threshold = Some(50.0);

        let batch = NotificationGenerator::generate(&[breached], &[], today());

        assert_eq!(batch.notifications.len(), 1);
        let notification = &batch.notifications[0];
        assert_eq!(notification.severity, NotificationSeverity::Error);
        assert_eq!(
            notification.notification_type,
            NotificationType::CriticalThresholdBreach
        );
        assert!(notification.action_required);
        assert_eq!(notification.id, "critical_threshold_breach:metric/m-crit");
    }

    #[test]
    fn lower_is_better_breach_uses_inverted_comparison() {
        let mut wait_time = metric("m-wait", Some(30.0), 10.0);
        wait_time.higher_is_better = false;
        wait_time.unit = "days".to_string();
        wait_time.critical_threshold = Some(21.0);

        let batch = NotificationGenerator::generate(&[wait_time], &[], today());
        assert_eq!(batch.notifications.len(), 1);
        assert_eq!(
            batch.notifications[0].notification_type,
            NotificationType::CriticalThresholdBreach
        );
        assert!(batch.notifications[0].message.contains("30.0 days"));
    }

    #[test]
    fn near_target_and_missing_data_warn_without_action() {
        let near = metric("m-near", Some(75.0), 80.0);
        let missing = metric("m-missing", None, 80.0);
        let met = metric("m-met", Some(85.0), 80.0);

        let batch = NotificationGenerator::generate(&[near, missing, met], &[], today());

        assert_eq!(batch.notifications.len(), 2);
        assert!(batch.notifications.iter().all(|notification| {
            notification.notification_type == NotificationType::BelowTarget
                && notification.severity == NotificationSeverity::Warning
                && !notification.action_required
        }));
        assert!(batch.notifications[1].message.contains("not reported"));
    }

    #[test]
    fn compliance_measures_escalate_with_action_required() {
        let mut ccbhc = metric("m-ccbhc", Some(75.0), 80.0);
        ccbhc.is_ccbhc_required = true;
        let mut mips_met = metric("m-mips", Some(90.0), 80.0);
        mips_met.is_mips_measure = true;

        let batch = NotificationGenerator::generate(&[ccbhc, mips_met], &[], today());
        let types: Vec<NotificationType> = batch
            .notifications
            .iter()
            .map(|notification| notification.notification_type)
            .collect();

        assert_eq!(
            types,
            vec![NotificationType::BelowTarget, NotificationType::ComplianceGap]
        );
        assert!(batch.notifications[1].action_required);
        assert!(batch.notifications[1].message.contains("CCBHC"));
    }

    #[test]
    fn stale_and_unassessed_ebps_are_flagged() {
        let ebps = [ebp("overdue", Some(120)), ebp("never", None), ebp("fresh", Some(10)), ebp("soon", Some(75))];

        let batch = NotificationGenerator::generate(&[], &ebps, today());

        assert_eq!(batch.notifications.len(), 2);
        let overdue = &batch.notifications[0];
        assert_eq!(overdue.subject, NotificationSubject::Ebp(EbpId("overdue".to_string())));
        assert_eq!(overdue.severity, NotificationSeverity::Warning);
        assert!(overdue.action_required);

        let never = &batch.notifications[1];
        assert_eq!(never.severity, NotificationSeverity::Info);
        assert!(!never.action_required);
    }

    #[test]
    fn invalid_entities_are_isolated_and_reported() {
        let mut broken = metric("m-broken", Some(f64::NAN), 80.0);
        broken.critical_threshold = Some(50.0);
        let mut bad_ebp = ebp("bad", None);
        bad_ebp.fidelity_score = 140.0;
        let healthy = metric("m-low", Some(10.0), 80.0);

        let batch = NotificationGenerator::generate(&[broken, healthy], &[bad_ebp], today());

        assert_eq!(batch.failures.len(), 2);
        assert_eq!(batch.notifications.len(), 1);
        assert_eq!(
            batch.notifications[0].subject,
            NotificationSubject::Metric(MetricId("m-low".to_string()))
        );
    }

    #[test]
    fn inactive_entities_are_ignored() {
        let mut retired = metric("m-retired", Some(10.0), 80.0);
        retired.is_active = false;
        let mut retired_ebp = ebp("retired", None);
        retired_ebp.is_active = false;

        let batch = NotificationGenerator::generate(&[retired], &[retired_ebp], today());
        assert!(batch.notifications.is_empty());
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn summary_counts_by_severity_and_action() {
        let mut critical = metric("m-crit", Some(10.0), 80.0);
        critical.critical_threshold = Some(40.0);
        critical.is_mips_measure = true;
        let near = metric("m-near", Some(75.0), 80.0);

        let batch = NotificationGenerator::generate(
            &[critical, near],
            &[ebp("never", None), ebp("overdue", Some(200))],
            today(),
        );
        let summary = batch.summary();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.warnings, 3);
        assert_eq!(summary.info, 1);
        assert_eq!(summary.action_required, 3);
        assert_eq!(batch.notifications[0].severity, NotificationSeverity::Error);
        assert_eq!(batch.notifications[4].severity, NotificationSeverity::Info);
    }

    #[test]
    fn generation_is_idempotent() {
        let metrics = [metric("a", Some(10.0), 80.0), metric("b", Some(79.0), 80.0)];
        let ebps = [ebp("x", None)];
        assert_eq!(
            NotificationGenerator::generate(&metrics, &ebps, today()),
            NotificationGenerator::generate(&metrics, &ebps, today())
        );
    }
}

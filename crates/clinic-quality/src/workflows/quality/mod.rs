//! Quality metric status, EBP fidelity, trends, and threshold notifications.

pub mod domain;
pub mod fidelity;
pub mod import;
pub mod notifications;
pub mod recency;
pub mod repository;
pub mod router;
pub mod service;
pub mod status;
pub mod trend;

#[cfg(test)]
mod tests;

pub use domain::{
    adoption_rate, AssessmentSubmission, AssessmentType, EbpCategory, EbpId,
    EvidenceBasedPractice, FidelityAssessment, MetricCategory, MetricId, Observation,
    QualityMetric, TrendDirection,
};
pub use fidelity::{FidelityBreakdown, FidelityScorer};
pub use import::{MetricHistoryImportError, MetricHistoryImporter};
pub use notifications::{
    EntityFailure, Notification, NotificationBatch, NotificationGenerator, NotificationSeverity,
    NotificationSubject, NotificationSummary, NotificationType,
};
pub use recency::{RecencyAssessment, RecencyEvaluator, RecencyStatus};
pub use repository::{DateRange, InMemoryQualityRepository, QualityRepository};
pub use router::{quality_router, ReportQuery};
pub use service::{EbpReport, MetricReport, QualityService, QualityServiceError};
pub use status::{MetricStatus, MetricStatusClassifier};
pub use trend::{MonthlyPoint, TrendAnalysis, TrendAnalyzer, TrendPeriod, UnknownTrendPeriod};

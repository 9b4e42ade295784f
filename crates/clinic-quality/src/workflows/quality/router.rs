use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::{AssessmentSubmission, EbpId, MetricId, Observation};
use super::repository::QualityRepository;
use super::service::{QualityService, QualityServiceError};
use super::trend::TrendPeriod;

/// Optional knobs shared by report endpoints; `today` defaults to the local date.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub period: Option<TrendPeriod>,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

impl ReportQuery {
    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Router builder exposing metric, EBP, and notification endpoints.
pub fn quality_router<R>(service: Arc<QualityService<R>>) -> Router
where
    R: QualityRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/quality/metrics/:metric_id",
            get(metric_report_handler::<R>),
        )
        .route(
            "/api/v1/quality/metrics/:metric_id/observations",
            post(record_observation_handler::<R>),
        )
        .route("/api/v1/quality/ebps/:ebp_id", get(ebp_report_handler::<R>))
        .route(
            "/api/v1/quality/ebps/:ebp_id/assessments",
            post(append_assessment_handler::<R>),
        )
        .route(
            "/api/v1/quality/notifications",
            get(notifications_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn metric_report_handler<R>(
    State(service): State<Arc<QualityService<R>>>,
    Path(metric_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Response
where
    R: QualityRepository + 'static,
{
    let period = query.period.unwrap_or_default();
    match service.metric_report(&MetricId(metric_id), period, query.today()) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn record_observation_handler<R>(
    State(service): State<Arc<QualityService<R>>>,
    Path(metric_id): Path<String>,
    axum::Json(observation): axum::Json<Observation>,
) -> Response
where
    R: QualityRepository + 'static,
{
    match service.record_metric_value(&MetricId(metric_id), observation) {
        Ok(metric) => (StatusCode::CREATED, axum::Json(metric)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn ebp_report_handler<R>(
    State(service): State<Arc<QualityService<R>>>,
    Path(ebp_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Response
where
    R: QualityRepository + 'static,
{
    let period = query.period.unwrap_or_default();
    match service.ebp_report(&EbpId(ebp_id), period, query.today()) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn append_assessment_handler<R>(
    State(service): State<Arc<QualityService<R>>>,
    Path(ebp_id): Path<String>,
    axum::Json(submission): axum::Json<AssessmentSubmission>,
) -> Response
where
    R: QualityRepository + 'static,
{
    match service.append_fidelity_assessment(&EbpId(ebp_id), submission) {
        Ok(ebp) => (StatusCode::CREATED, axum::Json(ebp)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn notifications_handler<R>(
    State(service): State<Arc<QualityService<R>>>,
    Query(query): Query<ReportQuery>,
) -> Response
where
    R: QualityRepository + 'static,
{
    match service.notifications(query.today()) {
        Ok(batch) => {
            let payload = json!({
                "summary": batch.summary(),
                "notifications": batch.notifications,
                "failures": batch.failures,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: QualityServiceError) -> Response {
    let (status, payload) = match &error {
        QualityServiceError::Validation(validation) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": validation.to_string(),
                "field": validation.field,
            }),
        ),
        QualityServiceError::NotFound { .. } => (
            StatusCode::NOT_FOUND,
            json!({ "error": error.to_string() }),
        ),
        QualityServiceError::WriteContention { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": error.to_string() }),
        ),
        QualityServiceError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": error.to_string() }),
        ),
    };
    (status, axum::Json(payload)).into_response()
}

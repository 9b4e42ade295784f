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

use super::domain::{EnrollmentRequest, ParticipantId, StudyId, WithdrawalRequest};
use super::repository::StudyRepository;
use super::service::{EnrollmentError, ResearchService};

#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

impl AsOfQuery {
    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Router builder exposing eligibility checks and participant writes.
pub fn research_router<R>(service: Arc<ResearchService<R>>) -> Router
where
    R: StudyRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/research/studies/:study_id/eligibility",
            get(eligibility_handler::<R>),
        )
        .route(
            "/api/v1/research/studies/:study_id/participants",
            post(enroll_handler::<R>),
        )
        .route(
            "/api/v1/research/studies/:study_id/participants/:participant_id/withdraw",
            post(withdraw_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn eligibility_handler<R>(
    State(service): State<Arc<ResearchService<R>>>,
    Path(study_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Response
where
    R: StudyRepository + 'static,
{
    let study_id = StudyId(study_id);
    match service.eligibility(&study_id, query.today()) {
        Ok(decision) => {
            let payload = json!({
                "study_id": study_id,
                "can_enroll": decision.can_enroll,
                "reasons": decision.reasons,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn enroll_handler<R>(
    State(service): State<Arc<ResearchService<R>>>,
    Path(study_id): Path<String>,
    Query(query): Query<AsOfQuery>,
    axum::Json(request): axum::Json<EnrollmentRequest>,
) -> Response
where
    R: StudyRepository + 'static,
{
    match service.enroll(&StudyId(study_id), request, query.today()) {
        Ok(write) => (StatusCode::CREATED, axum::Json(write)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn withdraw_handler<R>(
    State(service): State<Arc<ResearchService<R>>>,
    Path((study_id, participant_id)): Path<(String, String)>,
    axum::Json(request): axum::Json<WithdrawalRequest>,
) -> Response
where
    R: StudyRepository + 'static,
{
    match service.withdraw(&StudyId(study_id), &ParticipantId(participant_id), request) {
        Ok(write) => (StatusCode::OK, axum::Json(write)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: EnrollmentError) -> Response {
    let (status, payload) = match &error {
        EnrollmentError::Validation(validation) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": validation.to_string(),
                "field": validation.field,
            }),
        ),
        EnrollmentError::Eligibility { reasons } => (
            StatusCode::CONFLICT,
            json!({
                "error": "study is not accepting enrollment",
                "reasons": reasons,
            }),
        ),
        EnrollmentError::Duplicate { .. } => (
            StatusCode::CONFLICT,
            json!({ "error": error.to_string() }),
        ),
        EnrollmentError::NotFound { .. } => (
            StatusCode::NOT_FOUND,
            json!({ "error": error.to_string() }),
        ),
        EnrollmentError::WriteContention { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": error.to_string() }),
        ),
        EnrollmentError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": error.to_string() }),
        ),
    };
    (status, axum::Json(payload)).into_response()
}

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::quality::{MetricHistoryImportError, QualityServiceError};
use crate::workflows::research::EnrollmentError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Import(MetricHistoryImportError),
    Quality(QualityServiceError),
    Enrollment(EnrollmentError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Import(err) => write!(f, "import error: {}", err),
            AppError::Quality(err) => write!(f, "quality error: {}", err),
            AppError::Enrollment(err) => write!(f, "enrollment error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Quality(err) => Some(err),
            AppError::Enrollment(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Import(_)
            | AppError::Quality(QualityServiceError::Validation(_))
            | AppError::Enrollment(EnrollmentError::Validation(_))
            | AppError::Enrollment(EnrollmentError::Eligibility { .. })
            | AppError::Enrollment(EnrollmentError::Duplicate { .. }) => StatusCode::BAD_REQUEST,
            AppError::Quality(QualityServiceError::NotFound { .. })
            | AppError::Enrollment(EnrollmentError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Quality(_)
            | AppError::Enrollment(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<MetricHistoryImportError> for AppError {
    fn from(value: MetricHistoryImportError) -> Self {
        Self::Import(value)
    }
}

impl From<QualityServiceError> for AppError {
    fn from(value: QualityServiceError) -> Self {
        Self::Quality(value)
    }
}

impl From<EnrollmentError> for AppError {
    fn from(value: EnrollmentError) -> Self {
        Self::Enrollment(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::ValidationError;

    #[test]
    fn bad_input_maps_to_bad_request() {
        let error = AppError::from(QualityServiceError::Validation(ValidationError::new(
            "fidelity_score",
            "120 is outside the 0-100 range",
        )));
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);

        let error = AppError::from(EnrollmentError::Eligibility {
            reasons: vec!["IRB status is 'pending' (must be 'approved')".to_string()],
        });
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_records_map_to_not_found() {
        let error = AppError::from(EnrollmentError::NotFound {
            entity: "study",
            id: "study-x".to_string(),
        });
        assert!(error.to_string().contains("study 'study-x' not found"));
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn infrastructure_failures_are_internal() {
        let error = AppError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

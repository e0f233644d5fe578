use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::reconstruction::report::LayoutReport;

/// Rejected by the validating `BoundingBox` constructor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("bounding box has non-finite coordinates")]
    NonFinite,

    #[error("bounding box has negative size ({width} x {height})")]
    NegativeSize { width: f32, height: f32 },
}

/// Malformed page geometry. The page is skipped, the job continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("page {page_number} has invalid dimensions {width} x {height}")]
    InvalidPage {
        page_number: u32,
        width: f32,
        height: f32,
    },

    #[error("text region '{id}' has zero area")]
    DegenerateRegion { id: String },

    #[error("element '{id}' lies outside the page bounds")]
    OutOfBounds { id: String },

    #[error("text region '{id}' has a non-positive font size")]
    InvalidFormatting { id: String },

    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolverError {
    #[error("page deadline exceeded after {passes} resolution passes")]
    DeadlineExceeded { passes: u32 },
}

/// Page-level failure. Fatal to that page only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconstructionError {
    #[error("duplicate element id '{id}' on page")]
    DuplicateId { id: String },

    #[error("layout invariant violated for '{id}': {detail}")]
    InvariantViolated { id: String, detail: String },

    #[error("layout analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("conflict resolution failed: {0}")]
    Resolver(#[from] ResolverError),

    #[error("page abandoned after {millis} ms")]
    Timeout { millis: u64 },

    #[error("page worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("page worker pool unavailable: {0}")]
    WorkerUnavailable(String),
}

/// Whole-job failure. Only raised when every page fails or strict mode rejects the result.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("all {pages} pages failed reconstruction")]
    AllPagesFailed { pages: usize },

    #[error("strict mode: {unresolved} layout conflicts remain unresolved")]
    StrictModeViolation {
        unresolved: usize,
        report: Box<LayoutReport>,
    },

    #[error("translation provider failed: {0}")]
    Translation(#[from] CollaboratorError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f32,
        expected: &'static str,
    },

    #[error("worker_concurrency must be at least 1")]
    ZeroWorkers,
}

/// Failures reported by parser, writer and translation implementations.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::UnprocessableEntity(err.to_string())
    }
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Translation(e) => AppError::Upstream(e.to_string()),
            other => AppError::UnprocessableEntity(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_maps_to_unprocessable() {
        let err: AppError = JobError::AllPagesFailed { pages: 3 }.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_translation_failure_maps_to_bad_gateway() {
        let err: AppError =
            JobError::Translation(CollaboratorError::Translation("quota".to_string())).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_config_error_maps_to_bad_request() {
        let err: AppError = ConfigError::ZeroWorkers.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}

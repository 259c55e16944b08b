use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::lifecycle::{ConflictSummary, LifecycleError};
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictSummary>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String, Option<ConflictSummary>),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Username or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", msg.into())
    }

    fn to_error_response(
        code: &str,
        message: &str,
        conflict: Option<ConflictSummary>,
    ) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                conflict,
            },
        })
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Validation(msg) => ApiError::validation(msg),
            LifecycleError::Conflict(summary) => {
                let msg = LifecycleError::Conflict(summary.clone()).to_string();
                ApiError::Conflict("SLOT_CONFLICT", msg, Some(summary))
            }
            LifecycleError::NotFound { .. } => ApiError::NotFound("NOT_FOUND", e.to_string()),
            LifecycleError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotTaken { .. } => ApiError::Conflict("SLOT_CONFLICT", e.to_string(), None),
            StoreError::NotFound { .. } => ApiError::NotFound("NOT_FOUND", e.to_string()),
            StoreError::StatusChanged { .. } => {
                ApiError::Conflict("STATUS_CHANGED", e.to_string(), None)
            }
            StoreError::AlreadyConverted(_) | StoreError::Duplicate(_) => {
                ApiError::Conflict("CONFLICT", e.to_string(), None)
            }
            StoreError::Backend(msg) => {
                tracing::error!(error = %msg, "store failure");
                ApiError::Internal(format!("db error: {msg}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::Conflict(code, msg, summary) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg, summary)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg, None),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::AppointmentStatus;

    #[test]
    fn lifecycle_errors_map_to_status_codes() {
        let cases = [
            (LifecycleError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                LifecycleError::NotFound { entity: "appointment", id: Uuid::nil() },
                StatusCode::NOT_FOUND,
            ),
            (
                LifecycleError::Store(StoreError::Backend("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LifecycleError::Store(StoreError::SlotTaken {
                    date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                    time: "10:00".into(),
                }),
                StatusCode::CONFLICT,
            ),
            (
                LifecycleError::Store(StoreError::StatusChanged {
                    id: Uuid::nil(),
                    expected: AppointmentStatus::Scheduled,
                    found: AppointmentStatus::Completed,
                }),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn conflict_carries_summary_and_message() {
        let summary = ConflictSummary {
            appointment_id: Uuid::nil(),
            patient_name: "Ada".into(),
            appointment_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            appointment_time: "10:00".into(),
        };
        match ApiError::from(LifecycleError::Conflict(summary)) {
            ApiError::Conflict(code, msg, Some(s)) => {
                assert_eq!(code, "SLOT_CONFLICT");
                assert_eq!(msg, "Ada is already booked at 10:00 on 2026-01-01");
                assert_eq!(s.patient_name, "Ada");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }
}

/// 应用层错误到稳定错误码的映射，REST 响应与 WebSocket
/// 错误帧共用同一张表。
pub fn classify(error: &ApplicationError) -> (StatusCode, &'static str, String) {
    match error {
        ApplicationError::Domain(domain) => {
            let (status, code) = match domain {
                DomainError::InvalidArgument { .. } => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
                DomainError::InvalidParticipant => {
                    (StatusCode::BAD_REQUEST, "INVALID_PARTICIPANT")
                }
                DomainError::InvalidOption => (StatusCode::BAD_REQUEST, "INVALID_OPTION"),
                DomainError::PollNotFound => (StatusCode::NOT_FOUND, "POLL_NOT_FOUND"),
                DomainError::ParticipantNotFound => {
                    (StatusCode::NOT_FOUND, "PARTICIPANT_NOT_FOUND")
                }
                DomainError::NoActivePoll => (StatusCode::CONFLICT, "NO_ACTIVE_POLL"),
                DomainError::PollNotActive => (StatusCode::CONFLICT, "POLL_NOT_ACTIVE"),
                DomainError::PollExpired => (StatusCode::CONFLICT, "POLL_EXPIRED"),
                DomainError::AlreadyVoted => (StatusCode::CONFLICT, "ALREADY_VOTED"),
                DomainError::SubmissionInProgress => {
                    (StatusCode::CONFLICT, "SUBMISSION_IN_PROGRESS")
                }
                DomainError::ParticipantRemoved => (StatusCode::FORBIDDEN, "PARTICIPANT_REMOVED"),
            };
            (status, code, domain.to_string())
        }
        ApplicationError::Repository(repository) => match repository {
            RepositoryError::NotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "requested resource not found".to_string(),
            ),
            RepositoryError::Conflict => (
                StatusCode::CONFLICT,
                "CONFLICT",
                "resource already exists".to_string(),
            ),
            RepositoryError::Storage { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                format!("storage error: {}", message),
            ),
        },
        ApplicationError::Broadcast(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "BROADCAST_ERROR",
            err.to_string(),
        ),
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let (status, code, message) = classify(&error);
        ApiError::new(status, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

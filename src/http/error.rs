use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app::auth::AuthError;
use crate::app::error::ServiceError;
use crate::domain::social_graph::FollowRequestStatus;

/// Every failure leaves the service as `{"kind", "message"}`; a conflicting
/// follow request also carries its `status`.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    request_status: Option<FollowRequestStatus>,
}

#[derive(Serialize)]
struct ErrorResponse {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<FollowRequestStatus>,
}

impl AppError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            request_status: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "conflict", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => Self::bad_request(message),
            ServiceError::NotFound(message) => Self::not_found(message),
            ServiceError::Conflict { message, status } => Self {
                request_status: status,
                ..Self::conflict(message)
            },
            ServiceError::Unavailable(_) => Self::unavailable("service temporarily unavailable"),
            ServiceError::Store(_) => Self::internal("internal error"),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential => Self::unauthorized("missing credential"),
            AuthError::InvalidCredential => Self::unauthorized("invalid token"),
            AuthError::Internal(_) => Self::internal("internal error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            kind: self.kind,
            message: self.message,
            status: self.request_status,
        });
        (self.status, body).into_response()
    }
}

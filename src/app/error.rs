use thiserror::Error;

use crate::domain::social_graph::FollowRequestStatus;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const QUERY_CANCELED: &str = "57014";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict {
        message: String,
        status: Option<FollowRequestStatus>,
    },

    /// Timeouts and connection failures; the caller may retry.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("store error: {0}")]
    Store(#[source] sqlx::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            status: None,
        }
    }

    pub fn conflict_with_status(message: impl Into<String>, status: FollowRequestStatus) -> Self {
        Self::Conflict {
            message: message.into(),
            status: Some(status),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code.into_owned());

        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => Self::conflict("resource already exists"),
            Some(FOREIGN_KEY_VIOLATION) => Self::not_found("referenced user not found"),
            Some(CHECK_VIOLATION) => Self::validation("constraint check failed"),
            code if is_retryable(&err, code) => Self::Unavailable(err),
            _ => Self::Store(err),
        }
    }
}

fn is_retryable(err: &sqlx::Error, code: Option<&str>) -> bool {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::WorkerCrashed => true,
        // SQLSTATE class 08 is a connection exception.
        sqlx::Error::Database(_) => {
            matches!(code, Some(code) if code == QUERY_CANCELED || code.starts_with("08"))
        }
        _ => false,
    }
}

/// True when `err` is a unique violation on the named constraint or index.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error()
        .map(|db_err| {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some(constraint)
        })
        .unwrap_or(false)
}

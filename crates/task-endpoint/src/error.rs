//! Error types for the task endpoint server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Request-level failure, mapped one-to-one onto an HTTP status
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// Path shape not recognized; no lookup was attempted
    #[error("no route for path")]
    NotFound,

    /// Path shape recognized but identity or parameter resolution failed
    #[error("{0}")]
    BadRequest(String),

    /// A collaborator failed unexpectedly
    #[error("{0}")]
    Internal(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("rate limit exceeded")]
    TooManyRequests,
}

impl EndpointError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for EndpointError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::BadRequest(message) | Self::Internal(message) => {
                (status, Json(message)).into_response()
            }
            Self::NotFound | Self::MethodNotAllowed | Self::TooManyRequests => {
                status.into_response()
            }
        }
    }
}

/// Failure reported by the stats engine
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("no stats sample for container {container_id} of task {task_arn}")]
    NoSample {
        task_arn: String,
        container_id: String,
    },

    #[error("stats engine unavailable: {0}")]
    Unavailable(String),
}

/// Failure fetching resource tags from the control plane
#[derive(Debug, Error)]
pub enum TagsError {
    #[error("tag request for {arn} timed out after {timeout_ms}ms")]
    Timeout { arn: String, timeout_ms: u64 },

    #[error("control plane request failed: {0}")]
    Request(String),
}

/// Failure recording an audit entry
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to write audit entry: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode audit entry: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(EndpointError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            EndpointError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EndpointError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            EndpointError::TooManyRequests.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_not_found_has_empty_body() {
        let response = EndpointError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_bad_request_body_is_json_string() {
        let response = EndpointError::bad_request("Unable to resolve task").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let message: String = serde_json::from_slice(&body).unwrap();
        assert_eq!(message, "Unable to resolve task");
    }
}

//! Task IAM role credentials endpoints (v1 query-string, v2 path)

use crate::audit::{AuditEntry, AuditLogger, EVENT_GET_CREDENTIALS};
use crate::collaborators::CredentialsManager;
use crate::lookup::Lookup;
use crate::models::TaskIamRoleCredentials;
use crate::observability::EndpointMetrics;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{info, warn};

pub const V1_CREDENTIALS_PATH: &str = "/v1/credentials";
pub const V2_CREDENTIALS_PATH: &str = "/v2/credentials";
pub const CREDENTIALS_ID_QUERY_PARAMETER: &str = "id";

pub const ERR_NO_ID_IN_REQUEST: &str = "NoIdInRequest";
pub const ERR_INVALID_ID_IN_REQUEST: &str = "InvalidIdInRequest";
pub const ERR_CREDENTIALS_UNINITIALIZED: &str = "CredentialsUninitialized";

/// Which credentials endpoint the caller used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsVersion {
    V1,
    V2,
}

impl CredentialsVersion {
    /// Prefix used in error messages so callers can tell the endpoints apart
    pub fn request_type(&self) -> &'static str {
        match self {
            Self::V1 => "CredentialsV1Request",
            Self::V2 => "CredentialsV2Request",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

/// Existence state of a credentials record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsState {
    /// No record for the id
    Absent,
    /// Slot reserved for a task but not populated yet
    Uninitialized { task_arn: String },
    Ready(TaskIamRoleCredentials),
}

impl From<Lookup<TaskIamRoleCredentials>> for CredentialsState {
    fn from(lookup: Lookup<TaskIamRoleCredentials>) -> Self {
        match lookup {
            Lookup::Absent => Self::Absent,
            Lookup::Found(record) if record.credentials.is_uninitialized() => {
                Self::Uninitialized {
                    task_arn: record.task_arn,
                }
            }
            Lookup::Found(record) => Self::Ready(record),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("{}: No ID in the request", .0.request_type())]
    NoIdInRequest(CredentialsVersion),

    #[error("{}: ID not found", .0.request_type())]
    InvalidIdInRequest(CredentialsVersion),

    #[error("{}: Credentials uninitialized for ID", .0.request_type())]
    CredentialsUninitialized(CredentialsVersion),
}

impl CredentialsError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoIdInRequest(_) => ERR_NO_ID_IN_REQUEST,
            Self::InvalidIdInRequest(_) => ERR_INVALID_ID_IN_REQUEST,
            Self::CredentialsUninitialized(_) => ERR_CREDENTIALS_UNINITIALIZED,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoIdInRequest(_) | Self::InvalidIdInRequest(_) => StatusCode::BAD_REQUEST,
            Self::CredentialsUninitialized(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Label used for the lookup outcome metric
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::NoIdInRequest(_) => "no_id",
            Self::InvalidIdInRequest(_) => "not_found",
            Self::CredentialsUninitialized(_) => "uninitialized",
        }
    }
}

/// Error document returned by the credentials endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
}

impl IntoResponse for CredentialsError {
    fn into_response(self) -> Response {
        let body = ErrorMessage {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Credentials document returned to the container. The session token stays server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialsResponse {
    pub role_arn: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl From<&TaskIamRoleCredentials> for CredentialsResponse {
    fn from(record: &TaskIamRoleCredentials) -> Self {
        Self {
            role_arn: record.credentials.role_arn.clone(),
            access_key_id: record.credentials.access_key_id.clone(),
            secret_access_key: record.credentials.secret_access_key.clone(),
        }
    }
}

/// Transport details of one credentials request
#[derive(Debug, Clone)]
pub struct CredentialsRequest<'a> {
    pub version: CredentialsVersion,
    pub credentials_id: Option<&'a str>,
    pub source_addr: Option<SocketAddr>,
    pub request_uri: &'a str,
    pub user_agent: Option<&'a str>,
}

/// Answers credentials lookups and records each one in the audit log
pub struct CredentialsHandler<'a> {
    pub manager: &'a dyn CredentialsManager,
    pub audit: &'a dyn AuditLogger,
    pub metrics: &'a EndpointMetrics,
    pub cluster: &'a str,
    pub container_instance_arn: &'a str,
}

impl CredentialsHandler<'_> {
    pub fn get_credentials(
        &self,
        request: &CredentialsRequest<'_>,
    ) -> Result<CredentialsResponse, CredentialsError> {
        let (result, task_arn) = self.lookup(request);

        let status = match &result {
            Ok(_) => StatusCode::OK,
            Err(e) => e.status_code(),
        };
        self.audit(request, status, task_arn);

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        self.metrics.inc_credentials_lookup(outcome);
        result
    }

    fn lookup(
        &self,
        request: &CredentialsRequest<'_>,
    ) -> (Result<CredentialsResponse, CredentialsError>, Option<String>) {
        let version = request.version;
        let credentials_id = match request.credentials_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                info!(version = version.as_str(), "Credentials request without id");
                return (Err(CredentialsError::NoIdInRequest(version)), None);
            }
        };

        match CredentialsState::from(self.manager.get_task_credentials(credentials_id)) {
            CredentialsState::Absent => {
                warn!(
                    version = version.as_str(),
                    credentials_id = %credentials_id,
                    "Credentials not found for id"
                );
                (Err(CredentialsError::InvalidIdInRequest(version)), None)
            }
            CredentialsState::Uninitialized { task_arn } => {
                warn!(
                    version = version.as_str(),
                    credentials_id = %credentials_id,
                    task_arn = %task_arn,
                    "Credentials not yet populated for id"
                );
                (
                    Err(CredentialsError::CredentialsUninitialized(version)),
                    Some(task_arn),
                )
            }
            CredentialsState::Ready(record) => {
                info!(
                    version = version.as_str(),
                    task_arn = %record.task_arn,
                    role_arn = %record.credentials.role_arn,
                    "Processing credentials request"
                );
                (Ok(CredentialsResponse::from(&record)), Some(record.task_arn))
            }
        }
    }

    fn audit(&self, request: &CredentialsRequest<'_>, status: StatusCode, task_arn: Option<String>) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            status_code: status.as_u16(),
            source_addr: request.source_addr.map(|addr| addr.to_string()),
            request_uri: request.request_uri.to_string(),
            user_agent: request.user_agent.map(str::to_string),
            credentials_id: request.credentials_id.map(str::to_string),
            task_arn,
            event_type: EVENT_GET_CREDENTIALS,
            cluster: self.cluster.to_string(),
            container_instance_arn: self.container_instance_arn.to_string(),
        };

        if let Err(e) = self.audit.log(&entry) {
            self.metrics.inc_audit_failures();
            warn!(error = %e, "Failed to record credentials audit entry");
        }
    }
}

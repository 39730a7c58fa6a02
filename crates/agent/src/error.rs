//! REST error shape: standard status codes, `{success:false,
//! error}` body, never secret material.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self { status: StatusCode::CONFLICT, message: message.into() }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_IMPLEMENTED, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "success": false, "error": self.message }))).into_response()
    }
}

impl From<warden_registry::RegistryError> for ApiError {
    fn from(err: warden_registry::RegistryError) -> Self {
        use warden_registry::RegistryError;
        match err {
            RegistryError::PluginNotFound(_) | RegistryError::InstanceNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            RegistryError::PluginInUse(_, _) | RegistryError::InstanceDisabled(_) | RegistryError::InstanceErrored(_, _) => {
                ApiError::conflict(err.to_string())
            }
            RegistryError::Plugin(_) => ApiError::bad_request(err.to_string()),
            RegistryError::PluginAlreadyRegistered(_) | RegistryError::Vault(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl From<warden_approval::ApprovalError> for ApiError {
    fn from(err: warden_approval::ApprovalError) -> Self {
        use warden_approval::ApprovalError;
        match err {
            ApprovalError::NotFound(_) => ApiError::not_found(err.to_string()),
            ApprovalError::NotPending(_, _) | ApprovalError::Expired(_) => ApiError::conflict(err.to_string()),
        }
    }
}

impl From<warden_issues::IssueError> for ApiError {
    fn from(err: warden_issues::IssueError) -> Self {
        ApiError::not_found(err.to_string())
    }
}

impl From<warden_orchestrator::OrchestratorError> for ApiError {
    fn from(err: warden_orchestrator::OrchestratorError) -> Self {
        use warden_orchestrator::OrchestratorError;
        match err {
            OrchestratorError::SessionNotFound(_) => ApiError::not_found(err.to_string()),
            OrchestratorError::SessionNotActive(_) => ApiError::conflict(err.to_string()),
            OrchestratorError::Llm(_) => ApiError::internal(err.to_string()),
        }
    }
}

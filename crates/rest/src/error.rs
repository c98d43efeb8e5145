//! Error types for the HTTP API.
//!
//! Storage errors from the persistence layer are mapped to HTTP status codes
//! and rendered as `{"error": <kind>, "message": <text>}`:
//!
//! | Storage Error | HTTP Status | Kind |
//! |--------------|-------------|------|
//! | MissingTenant | 401 | unauthorized |
//! | BindingFailed, AccessDenied, UnboundTransaction | 403 | forbidden |
//! | InvalidArgument, Validation | 400 | bad_request |
//! | NotFound | 404 | not_found |
//! | AlreadyExists | 409 | conflict |
//! | Unavailable, ConnectionFailed, PoolExhausted | 503 | unavailable |
//! | anything else | 500 | internal |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ledgerdesk_persistence::error::{
    BackendError, ResourceError, StorageError, TenantError, TransactionError,
};
use thiserror::Error;
use tracing::error;

use crate::tenant::TenantMismatchError;

/// The error type for HTTP handlers.
#[derive(Debug, Error)]
pub enum RestError {
    /// No tenant could be determined for a route that needs one (HTTP 401).
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message.
        message: String,
    },

    /// The tenant may not perform the operation (HTTP 403).
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Error message.
        message: String,
    },

    /// Invalid input (HTTP 400).
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// The row does not exist for this tenant (HTTP 404).
    #[error("Not found: {resource_type} {id}")]
    NotFound {
        /// Kind of row, e.g. `service`.
        resource_type: String,
        /// Key of the row.
        id: String,
    },

    /// A row with the same key already exists (HTTP 409).
    #[error("Conflict: {resource_type} {id} already exists")]
    Conflict {
        /// Kind of row.
        resource_type: String,
        /// Conflicting key.
        id: String,
    },

    /// The database cannot be reached (HTTP 503).
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Error message.
        message: String,
    },

    /// Anything else (HTTP 500).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

/// Result type for handlers.
pub type RestResult<T> = Result<T, RestError>;

impl RestError {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            RestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RestError::Forbidden { .. } => StatusCode::FORBIDDEN,
            RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::NotFound { .. } => StatusCode::NOT_FOUND,
            RestError::Conflict { .. } => StatusCode::CONFLICT,
            RestError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RestError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The machine-readable `error` field of the body.
    pub fn kind(&self) -> &'static str {
        match self {
            RestError::Unauthorized { .. } => "unauthorized",
            RestError::Forbidden { .. } => "forbidden",
            RestError::BadRequest { .. } => "bad_request",
            RestError::NotFound { .. } => "not_found",
            RestError::Conflict { .. } => "conflict",
            RestError::ServiceUnavailable { .. } => "unavailable",
            RestError::Internal { .. } => "internal",
        }
    }

    fn message(&self) -> String {
        match self {
            RestError::Unauthorized { message }
            | RestError::Forbidden { message }
            | RestError::BadRequest { message }
            | RestError::ServiceUnavailable { message }
            | RestError::Internal { message } => message.clone(),
            RestError::NotFound { resource_type, id } => {
                format!("{} '{}' not found", resource_type, id)
            }
            RestError::Conflict { resource_type, id } => {
                format!("{} '{}' already exists", resource_type, id)
            }
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.message(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Tenant(e) => e.into(),
            StorageError::Validation(e) => RestError::BadRequest {
                message: e.to_string(),
            },
            StorageError::Resource(e) => e.into(),
            StorageError::Transaction(e) => e.into(),
            StorageError::Backend(e) => e.into(),
            StorageError::Rollout(e) => RestError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<TenantError> for RestError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::MissingTenant { .. } => RestError::Unauthorized {
                message: err.to_string(),
            },
            TenantError::InvalidArgument { .. } => RestError::BadRequest {
                message: err.to_string(),
            },
            TenantError::BindingFailed { .. }
            | TenantError::AccessDenied { .. }
            | TenantError::UnboundTransaction => RestError::Forbidden {
                message: err.to_string(),
            },
        }
    }
}

impl From<ResourceError> for RestError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::NotFound { resource_type, id } => {
                RestError::NotFound { resource_type, id }
            }
            ResourceError::AlreadyExists { resource_type, id } => {
                RestError::Conflict { resource_type, id }
            }
        }
    }
}

impl From<TransactionError> for RestError {
    fn from(err: TransactionError) -> Self {
        RestError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<BackendError> for RestError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable { .. }
            | BackendError::ConnectionFailed { .. }
            | BackendError::PoolExhausted { .. } => RestError::ServiceUnavailable {
                message: err.to_string(),
            },
            _ => RestError::Internal {
                message: err.to_string(),
            },
        }
    }
}

impl From<TenantMismatchError> for RestError {
    fn from(err: TenantMismatchError) -> Self {
        RestError::BadRequest {
            message: err.to_string(),
        }
    }
}

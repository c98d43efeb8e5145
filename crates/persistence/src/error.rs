//! Error types for the persistence layer.
//!
//! This module defines all error types used throughout the persistence layer,
//! following a hierarchy that separates tenant errors, validation errors,
//! transaction errors, backend errors and rollout errors.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::tenant::TenantId;

/// The primary error type for all storage operations.
///
/// This enum encompasses all possible errors that can occur during persistence
/// operations, organized by category.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Tenant context and isolation errors
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Row state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Transaction errors
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// RLS rollout errors
    #[error(transparent)]
    Rollout(#[from] RolloutError),
}

/// Errors related to the tenant context and tenant isolation.
#[derive(Error, Debug)]
pub enum TenantError {
    /// No tenant was supplied explicitly and none is active in the ambient scope.
    #[error("missing tenant context: {hint}")]
    MissingTenant { hint: String },

    /// A tenant id was supplied but is empty or otherwise unusable.
    #[error("invalid tenant argument: {message}")]
    InvalidArgument { message: String },

    /// The database refused to apply the tenant session setting.
    #[error("failed to bind tenant {tenant_id} to the session: {message}")]
    BindingFailed { tenant_id: TenantId, message: String },

    /// A statement was issued on a transaction that has no tenant bound.
    #[error("transaction has no tenant bound; run statements through the tenant-scoped executor")]
    UnboundTransaction,

    /// The current tenant may not access rows owned by another tenant.
    #[error("access denied: tenant {tenant_id} cannot access data of tenant {resource_tenant}")]
    AccessDenied {
        tenant_id: TenantId,
        resource_tenant: TenantId,
    },
}

/// Errors related to input validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Missing required field.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    /// A field carries a value that cannot be stored.
    #[error("invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },

    /// An SQL identifier failed validation.
    #[error("invalid identifier: {identifier}")]
    InvalidIdentifier { identifier: String },
}

/// Errors related to row state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested row was not found.
    #[error("{resource_type} not found: {id}")]
    NotFound { resource_type: String, id: String },

    /// A row with the given key already exists.
    #[error("{resource_type} already exists: {id}")]
    AlreadyExists { resource_type: String, id: String },
}

/// Errors related to transactions.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// The transaction could not be started.
    #[error("failed to begin transaction: {message}")]
    BeginFailed { message: String },

    /// The transaction could not be committed.
    #[error("failed to commit transaction: {message}")]
    CommitFailed { message: String },

    /// The transaction could not be rolled back.
    #[error("failed to roll back transaction: {message}")]
    RollbackFailed { message: String },

    /// Transaction is no longer valid (already committed or rolled back).
    #[error("transaction no longer valid")]
    InvalidTransaction,
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Errors raised while rolling out row-level security.
#[derive(Error, Debug)]
pub enum RolloutError {
    /// Rows without a tenant would become invisible once the policy tightens.
    #[error("{phase} refused: {offending_tables} table(s) still contain NULL tenant rows")]
    NullTenantRows {
        phase: String,
        offending_tables: usize,
    },

    /// Post-rollout verification found a table in an unexpected state.
    #[error("verification failed for {table}: {message}")]
    VerificationFailed { table: String, message: String },

    /// The requested phase name is unknown.
    #[error("unknown rollout phase: {phase}")]
    UnknownPhase { phase: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

impl StorageError {
    /// Returns `true` when the error signals that no tenant could be determined.
    pub fn is_missing_tenant(&self) -> bool {
        matches!(self, StorageError::Tenant(TenantError::MissingTenant { .. }))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "postgres".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

impl From<deadpool_postgres::PoolError> for StorageError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StorageError::Backend(BackendError::ConnectionFailed {
            backend_name: "postgres".to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tenant_display() {
        let err = StorageError::Tenant(TenantError::MissingTenant {
            hint: "pass a tenant id".to_string(),
        });
        assert_eq!(err.to_string(), "missing tenant context: pass a tenant id");
        assert!(err.is_missing_tenant());
    }

    #[test]
    fn test_binding_failed_display() {
        let err = TenantError::BindingFailed {
            tenant_id: TenantId::new("tenant-a"),
            message: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("tenant-a"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_resource_error_display() {
        let err = ResourceError::AlreadyExists {
            resource_type: "service".to_string(),
            id: "haircut".to_string(),
        };
        assert_eq!(err.to_string(), "service already exists: haircut");
    }

    #[test]
    fn test_rollout_error_display() {
        let err = RolloutError::NullTenantRows {
            phase: "tighten".to_string(),
            offending_tables: 2,
        };
        assert!(err.to_string().contains("2 table(s)"));
    }

    #[test]
    fn test_storage_error_from_categories() {
        let err: StorageError = TransactionError::InvalidTransaction.into();
        assert!(matches!(err, StorageError::Transaction(_)));
        assert!(!err.is_missing_tenant());

        let err: StorageError = TenantError::UnboundTransaction.into();
        assert!(matches!(err, StorageError::Tenant(_)));
    }
}

//! Error handling for ModStack
//!
//! Every error belongs to one of four classes. Only storage failures are
//! hard failures; the other classes are recovered where they occur.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for ModStack operations
pub type Result<T> = std::result::Result<T, ModStackError>;

/// The four error classes the engine distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The layer stack breaks a structural rule (duplicate role, missing role)
    StructuralViolation,
    /// A referenced layer file cannot be found where it should be
    UnreachableReference,
    /// Malformed input to a pure computation (bad hash, bad node path)
    ValidationInput,
    /// The storage collaborator failed; input can no longer be trusted
    StorageIoFailure,
}

/// Main error type for ModStack operations
#[derive(Error, Debug)]
pub enum ModStackError {
    // Structural Errors
    #[error("Structural violation: {reason}")]
    StructuralViolation { reason: String },

    #[error("Action not allowed on layer {identifier}: {reason}")]
    ActionNotAllowed { identifier: String, reason: String },

    #[error("Unreachable layer reference: {path}")]
    UnreachableReference { path: String },

    // Input Errors
    #[error("Invalid input: {reason}")]
    ValidationInput { reason: String },

    // Storage Errors
    #[error("Layer not found: {identifier}")]
    LayerNotFound { identifier: String },

    #[error("Layer already exists: {path}")]
    LayerAlreadyExists { path: PathBuf },

    #[error("Failed to read layer file: {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write layer file: {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory creation failed: {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid layer schema version: {version}")]
    InvalidSchemaVersion { version: String },

    #[error("Migration failed from {from} to {to}: {reason}")]
    Migration {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Storage task failed: {reason}")]
    StorageTask { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModStackError {
    /// Convenience constructor for structural violations
    pub fn structural(reason: impl Into<String>) -> Self {
        ModStackError::StructuralViolation {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for malformed input
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        ModStackError::ValidationInput {
            reason: reason.into(),
        }
    }

    /// The error class this error belongs to
    pub fn class(&self) -> ErrorClass {
        match self {
            ModStackError::StructuralViolation { .. } | ModStackError::ActionNotAllowed { .. } => {
                ErrorClass::StructuralViolation
            }
            ModStackError::UnreachableReference { .. } => ErrorClass::UnreachableReference,
            ModStackError::ValidationInput { .. } => ErrorClass::ValidationInput,
            _ => ErrorClass::StorageIoFailure,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ModStackError::StructuralViolation { .. } => "STRUCTURAL_VIOLATION",
            ModStackError::ActionNotAllowed { .. } => "ACTION_NOT_ALLOWED",
            ModStackError::UnreachableReference { .. } => "UNREACHABLE_REFERENCE",
            ModStackError::ValidationInput { .. } => "VALIDATION_INPUT",
            ModStackError::LayerNotFound { .. } => "LAYER_NOT_FOUND",
            ModStackError::LayerAlreadyExists { .. } => "LAYER_ALREADY_EXISTS",
            ModStackError::FileRead { .. } => "FILE_READ_ERROR",
            ModStackError::FileWrite { .. } => "FILE_WRITE_ERROR",
            ModStackError::DirectoryCreate { .. } => "DIRECTORY_CREATE_ERROR",
            ModStackError::InvalidSchemaVersion { .. } => "INVALID_SCHEMA_VERSION",
            ModStackError::Migration { .. } => "MIGRATION_ERROR",
            ModStackError::StorageTask { .. } => "STORAGE_TASK_ERROR",
            ModStackError::Io(_) => "IO_ERROR",
            ModStackError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recovered locally rather than surfaced
    pub fn is_recoverable(&self) -> bool {
        self.class() != ErrorClass::StorageIoFailure
    }

    /// Get a user-facing recovery suggestion
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ModStackError::UnreachableReference { .. } => {
                Some("Move the capture file under the project's deps/captures folder.")
            }
            ModStackError::ActionNotAllowed { .. } => {
                Some("Project, capture and mod layers are managed by the project itself.")
            }
            ModStackError::LayerNotFound { .. } => Some("Check the layer path and try again."),
            ModStackError::LayerAlreadyExists { .. } => {
                Some("Insert the existing layer instead of creating a new one.")
            }
            ModStackError::InvalidSchemaVersion { .. } => {
                Some("The layer was written by a newer version; upgrade before opening it.")
            }
            _ => None,
        }
    }
}

//! Error types for the cronscale operator.

use crate::validation::ValidationError;
use thiserror::Error;

/// Errors that can occur during operator operations.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Resource not found.
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Resource namespace.
        namespace: String,
    },

    /// Conditional update lost against a concurrent writer.
    #[error("Conflicting update on {kind}/{name}: {cause}")]
    Conflict {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Error cause.
        cause: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Schedule spec validation error.
    #[error("Schedule validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    /// Scale-up requested but the workload carries no replica memory.
    #[error("No original replica count recorded on {kind}/{name} in namespace {namespace}")]
    MissingReplicaMemory {
        /// Workload kind.
        kind: String,
        /// Workload name.
        name: String,
        /// Workload namespace.
        namespace: String,
    },

    /// The replica memory annotation holds something other than a replica count.
    #[error("Invalid original replica count {value:?} on {kind}/{name}")]
    InvalidReplicaMemory {
        /// Workload kind.
        kind: String,
        /// Workload name.
        name: String,
        /// Raw annotation value.
        value: String,
    },

    /// Resource kind not handled by the operator.
    #[error("Unsupported resource kind: {0}")]
    UnsupportedKind(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

impl OperatorError {
    /// Whether retrying on the next pass can succeed without human intervention.
    ///
    /// Remote failures (API errors, timeouts, conflicts, missing objects) are
    /// transient. Spec and replica-memory problems are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OperatorError::KubeError(_)
                | OperatorError::NotFound { .. }
                | OperatorError::Conflict { .. }
                | OperatorError::IoError(_)
        )
    }

    /// Map a kube error for a named object, folding 404 and 409 into typed variants.
    pub fn from_kube(err: kube::Error, kind: &str, name: &str, namespace: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => OperatorError::NotFound {
                kind: kind.into(),
                name: name.into(),
                namespace: namespace.into(),
            },
            kube::Error::Api(ae) if ae.code == 409 => OperatorError::Conflict {
                kind: kind.into(),
                name: name.into(),
                cause: ae.message,
            },
            other => OperatorError::KubeError(other),
        }
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

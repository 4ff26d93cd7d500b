use serde::Serialize;

use super::repository::RepositoryError;

/// Error kinds surfaced to the request-handling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Forbidden,
    Expired,
    Unauthenticated,
    Storage,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Expired => "expired",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Error raised by the assessment workflows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Expired(String),
    #[error("authentication required")]
    Unauthenticated,
    /// Store text stays behind `source()`; the message is fixed.
    #[error("record store failure; the operation was not applied")]
    Storage(#[source] RepositoryError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::Conflict(_) => ErrorKind::Conflict,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::Forbidden(_) => ErrorKind::Forbidden,
            WorkflowError::Expired(_) => ErrorKind::Expired,
            WorkflowError::Unauthenticated => ErrorKind::Unauthenticated,
            WorkflowError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn view(&self) -> ErrorView {
        ErrorView {
            kind: self.kind(),
            message: self.message(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

impl From<RepositoryError> for WorkflowError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(message) => WorkflowError::Conflict(message),
            RepositoryError::NotFound(message) => WorkflowError::NotFound(message),
            unavailable @ RepositoryError::Unavailable(_) => WorkflowError::Storage(unavailable),
        }
    }
}

/// Kind plus message; the whole error contract exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub message: String,
}

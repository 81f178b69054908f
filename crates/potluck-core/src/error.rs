//! Error taxonomy surfaced by every engine operation.

use std::fmt;

use uuid::Uuid;

/// The kind of record an operation could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Meal,
    Participant,
    PlanItem,
    Recipe,
    Dish,
    Post,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Meal => "meal",
            Self::Participant => "participant",
            Self::PlanItem => "plan item",
            Self::Recipe => "recipe",
            Self::Dish => "dish",
            Self::Post => "post",
        };
        f.write_str(s)
    }
}

/// Errors returned by the coordination engine.
///
/// Store failures arrive as `anyhow::Error` from the repository layer and
/// are always wrapped in [`PotluckError::Store`].
#[derive(Debug, thiserror::Error)]
pub enum PotluckError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Copyable discriminant of [`PotluckError`], for callers that branch on
/// the kind without holding the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    InvalidState,
    Validation,
    Conflict,
    Store,
}

impl PotluckError {
    pub fn not_found(entity: Entity, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// Whether retrying the identical request can succeed.
    ///
    /// Only lost races and infrastructure failures qualify; every other kind
    /// fails the same way until the request changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Store)
    }
}

pub type Result<T, E = PotluckError> = std::result::Result<T, E>;

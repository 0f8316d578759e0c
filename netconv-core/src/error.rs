//! Error types for gateway calls and reconciliation.

use std::fmt;

use thiserror::Error;

use crate::model::Status;
use crate::reconciler::Lifecycle;

/// Failure to talk to the remote API, or to make sense of its answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Payload could not be encoded or the response could not be decoded.
    #[error("malformed payload: {0}")]
    Decode(String),

    /// The API answered with an error body.
    #[error("remote returned {status}: {message}")]
    Api {
        status: Status,
        code: Option<i64>,
        message: String,
    },
}

impl TransportError {
    /// Status carried inside an API error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            TransportError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Status and cause of a failed remote call, kept for error reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub status: Option<Status>,
    pub cause: Option<TransportError>,
}

impl CallFailure {
    pub fn new(status: Option<Status>, cause: Option<TransportError>) -> Self {
        Self { status, cause }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            cause: Some(TransportError::Decode(message.into())),
        }
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.cause) {
            (Some(status), Some(cause)) => write!(f, "status {}: {}", status, cause),
            (Some(status), None) => write!(f, "unexpected status {}", status),
            (None, Some(cause)) => write!(f, "{}", cause),
            (None, None) => write!(f, "unknown failure"),
        }
    }
}

/// Which tier of name matching produced an ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Prefix,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTier::Exact => write!(f, "named"),
            MatchTier::Prefix => write!(f, "with name starting with"),
        }
    }
}

/// Errors surfaced by the reconciler. None of them are retried internally.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Neither an id nor a display name was supplied.
    #[error("{kind}: neither id nor display name given")]
    InvalidReference { kind: &'static str },

    /// No object matched the reference.
    #[error("{kind} {reference} was not found")]
    NotFound {
        kind: &'static str,
        reference: String,
    },

    /// More than one object matched at the deciding tier.
    #[error("found {count} {kind} objects {tier} '{name}'")]
    AmbiguousReference {
        kind: &'static str,
        name: String,
        tier: MatchTier,
        count: usize,
    },

    /// The object exists but is of a different sub-kind than requested.
    #[error("{kind} {id} is not a {expected} {kind} (found {actual})")]
    WrongKind {
        kind: &'static str,
        id: String,
        expected: String,
        actual: String,
    },

    #[error("create of {kind} '{name}' rejected: {failure}")]
    CreateRejected {
        kind: &'static str,
        name: String,
        failure: CallFailure,
    },

    #[error("read of {kind} {id} failed: {failure}")]
    ReadFailed {
        kind: &'static str,
        id: String,
        failure: CallFailure,
    },

    /// The object to update does not exist remotely. It is never recreated.
    #[error("{kind} {id} to update does not exist")]
    UpdateTargetMissing { kind: &'static str, id: String },

    /// The remote rejected the revision sent with the update.
    #[error("{kind} {id} was modified concurrently, revision {revision} is stale")]
    ConflictingUpdate {
        kind: &'static str,
        id: String,
        revision: i64,
    },

    #[error("update of {kind} {id} failed: {failure}")]
    UpdateFailed {
        kind: &'static str,
        id: String,
        failure: CallFailure,
    },

    #[error("delete of {kind} {id} failed: {failure}")]
    DeleteFailed {
        kind: &'static str,
        id: String,
        failure: CallFailure,
    },

    /// Operation not allowed from the object's current lifecycle state.
    #[error("cannot {operation} {kind} while it is {state}")]
    InvalidState {
        kind: &'static str,
        operation: &'static str,
        state: Lifecycle,
    },

    /// Listing or other gateway traffic failed outside a lifecycle call.
    #[error("{kind}: {context}: {source}")]
    Transport {
        kind: &'static str,
        context: String,
        #[source]
        source: TransportError,
    },
}

impl ReconcileError {
    /// Object kind the error refers to.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::InvalidReference { kind }
            | ReconcileError::NotFound { kind, .. }
            | ReconcileError::AmbiguousReference { kind, .. }
            | ReconcileError::WrongKind { kind, .. }
            | ReconcileError::CreateRejected { kind, .. }
            | ReconcileError::ReadFailed { kind, .. }
            | ReconcileError::UpdateTargetMissing { kind, .. }
            | ReconcileError::ConflictingUpdate { kind, .. }
            | ReconcileError::UpdateFailed { kind, .. }
            | ReconcileError::DeleteFailed { kind, .. }
            | ReconcileError::InvalidState { kind, .. }
            | ReconcileError::Transport { kind, .. } => *kind,
        }
    }
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

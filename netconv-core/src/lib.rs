//! netconv core
//!
//! Converges objects on a remote network manager toward declared state:
//! - Identity resolution (id, exact name, unique name prefix)
//! - Revision tracking for optimistic concurrency
//! - A per-object reconcile state machine with drift detection
//!
//! The remote is only reached through a [`Gateway`], so everything here runs
//! against the in-memory gateway in `testing` as well as against HTTP.

pub mod drift;
pub mod error;
pub mod gateway;
pub mod kinds;
pub mod model;
pub mod reconciler;
pub mod resolver;
pub mod revision;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{CallFailure, MatchTier, ReconcileError, Result, TransportError};
pub use gateway::{ApiFlavor, AttributesOf, Gateway, ObjectKind, ObjectOf, Reply};
pub use model::{DesiredSpec, RemoteObject, ResourceRef, Status, Tag};
pub use reconciler::{Lifecycle, ReadOutcome, Reconciler, Tracked};
pub use resolver::IdentityResolver;
pub use revision::{RevisionChange, RevisionTracker};

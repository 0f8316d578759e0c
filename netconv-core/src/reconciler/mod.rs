//! Reconciler - the per-object state machine.
//!
//! One generic reconciler drives every object kind through create, read,
//! update and delete against its [`Gateway`], with the same failure rules for
//! all of them:
//!
//! - a read that finds the object gone forgets it (drift) instead of failing;
//! - a delete that finds the object gone succeeds (idempotent delete) and the
//!   entry keeps the deleted id, so deleting it again is a no-op;
//! - an update that finds the object gone fails and never recreates it;
//! - a stale revision is reported as a conflict and never retried.
//!
//! The caller owns the [`Tracked`] entry and must not run two operations on
//! the same entry at once. An entry is only written after the remote call it
//! depends on has returned, so dropping an operation's future leaves the
//! entry at its last known value.

mod lifecycle;

pub use lifecycle::{Event, Lifecycle, Tracked};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{CallFailure, ReconcileError, Result};
use crate::gateway::{AttributesOf, Gateway, ObjectKind, ObjectOf, Reply};
use crate::model::{DesiredSpec, ResourceRef, Status};
use crate::resolver::IdentityResolver;
use crate::revision::{RevisionChange, RevisionTracker};

/// Result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    Present(T),
    /// The object no longer exists remotely and has been forgotten.
    Gone,
}

/// How a remote reply is interpreted.
enum Verdict<T> {
    Success(T),
    NotFound(CallFailure),
    Conflict(CallFailure),
    Failure(CallFailure),
}

/// Drives one object kind through its lifecycle.
pub struct Reconciler<G: Gateway> {
    gateway: Arc<G>,
    kind_filter: Option<String>,
}

impl<G: Gateway> Reconciler<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            kind_filter: None,
        }
    }

    /// Restrict name resolution and lookups to one sub-kind, e.g. `TIER0`
    /// logical routers.
    pub fn with_kind_filter(mut self, kind_filter: impl Into<String>) -> Self {
        self.kind_filter = Some(kind_filter.into());
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn kind_filter(&self) -> Option<&str> {
        self.kind_filter.as_deref()
    }

    fn kind() -> &'static str {
        <G::Kind as ObjectKind>::NAME
    }

    fn resolver(&self) -> IdentityResolver<'_, G> {
        IdentityResolver::new(self.gateway.as_ref()).with_kind_filter(self.kind_filter.as_deref())
    }

    fn begin(&self, state: Lifecycle, event: Event, operation: &'static str) -> Result<Lifecycle> {
        let next = state
            .transition(event)
            .ok_or(ReconcileError::InvalidState {
                kind: Self::kind(),
                operation,
                state,
            })?;
        debug!("{} {}: {} -> {}", Self::kind(), operation, state, next);
        Ok(next)
    }

    fn classify<T>(&self, reply: Reply<T>, accept: impl Fn(Status) -> bool) -> Verdict<T> {
        let error = reply.body.as_ref().err();
        if self.gateway.is_not_found(reply.status, error) {
            return Verdict::NotFound(CallFailure::new(reply.status, error.cloned()));
        }
        if self.gateway.is_conflict(reply.status, error) {
            return Verdict::Conflict(CallFailure::new(reply.status, error.cloned()));
        }

        match (reply.status, reply.body) {
            (Some(status), Ok(body)) if accept(status) => Verdict::Success(body),
            (None, Ok(body)) => Verdict::Success(body),
            (status, Ok(_)) => Verdict::Failure(CallFailure::new(status, None)),
            (status, Err(cause)) => Verdict::Failure(CallFailure::new(status, Some(cause))),
        }
    }

    async fn resolve_id(&self, reference: &ResourceRef) -> Result<String> {
        self.resolver().resolve(reference).await
    }

    fn note_revision(id: &str, change: RevisionChange) {
        match change {
            RevisionChange::Regressed { from, to } => warn!(
                "{} {} revision went backwards ({} -> {}), recreated out of band?",
                Self::kind(),
                id,
                from,
                to
            ),
            RevisionChange::Advanced { from, to } => {
                debug!("{} {} revision {} -> {}", Self::kind(), id, from, to)
            }
            RevisionChange::First(_) | RevisionChange::Unchanged(_) => {}
        }
    }

    /// Create the object declared by `spec`, then read it back so fields the
    /// server defaulted are reflected in the result.
    ///
    /// If the trailing read fails the entry still records the new id, so the
    /// object is not leaked.
    pub async fn create(
        &self,
        tracked: &mut Tracked<AttributesOf<G>>,
        spec: &DesiredSpec<AttributesOf<G>>,
    ) -> Result<ObjectOf<G>> {
        let in_flight = self.begin(tracked.lifecycle, Event::BeginCreate, "create")?;
        info!("Creating {} '{}'", Self::kind(), spec.display_name);

        let expected = self.gateway.expected_create_status();
        let reply = self.gateway.create(&spec.to_payload()).await;
        let created = match self.classify(reply, |status| status == expected) {
            Verdict::Success(obj) => obj,
            Verdict::NotFound(failure) | Verdict::Conflict(failure) | Verdict::Failure(failure) => {
                return Err(ReconcileError::CreateRejected {
                    kind: Self::kind(),
                    name: spec.display_name.clone(),
                    failure,
                });
            }
        };
        if created.id.is_empty() {
            return Err(ReconcileError::CreateRejected {
                kind: Self::kind(),
                name: spec.display_name.clone(),
                failure: CallFailure::message("response carried no id"),
            });
        }

        let id = created.id.clone();
        info!("{} '{}' created as {}", Self::kind(), spec.display_name, id);
        tracked.lifecycle = self.begin(in_flight, Event::Succeeded, "create")?;
        tracked.observe(created);

        match self.read(tracked).await? {
            ReadOutcome::Present(obj) => Ok(obj),
            ReadOutcome::Gone => Err(ReconcileError::ReadFailed {
                kind: Self::kind(),
                id,
                failure: CallFailure::new(Some(Status::NOT_FOUND), None),
            }),
        }
    }

    /// Refresh the entry from the remote.
    ///
    /// A missing object is not an error: the entry is forgotten and
    /// [`ReadOutcome::Gone`] tells the caller to recreate it on the next
    /// apply. Any other failure leaves the entry untouched.
    pub async fn read(
        &self,
        tracked: &mut Tracked<AttributesOf<G>>,
    ) -> Result<ReadOutcome<ObjectOf<G>>> {
        let id = match tracked.id() {
            Some(id) => id.to_string(),
            None => self.resolve_id(&tracked.reference).await?,
        };

        let reply = self.gateway.get(&id).await;
        match self.classify(reply, Status::is_success) {
            Verdict::Success(obj) => {
                tracked.lifecycle = self.begin(tracked.lifecycle, Event::Observed, "read")?;
                let change = tracked.observe(obj.clone());
                Self::note_revision(&id, change);
                Ok(ReadOutcome::Present(obj))
            }
            Verdict::NotFound(_) => {
                info!(
                    "{} {} no longer exists remotely, forgetting it",
                    Self::kind(),
                    id
                );
                tracked.lifecycle = self.begin(tracked.lifecycle, Event::Vanished, "read")?;
                tracked.forget();
                Ok(ReadOutcome::Gone)
            }
            Verdict::Conflict(failure) | Verdict::Failure(failure) => {
                Err(ReconcileError::ReadFailed {
                    kind: Self::kind(),
                    id,
                    failure,
                })
            }
        }
    }

    /// Update the object to match `spec`, sending the cached revision.
    ///
    /// The pre-update read only happens when no revision is cached. A stale
    /// revision fails with [`ReconcileError::ConflictingUpdate`]; the caller
    /// has to read again before retrying.
    pub async fn update(
        &self,
        tracked: &mut Tracked<AttributesOf<G>>,
        spec: &DesiredSpec<AttributesOf<G>>,
    ) -> Result<ObjectOf<G>> {
        let in_flight = self.begin(tracked.lifecycle, Event::BeginUpdate, "update")?;
        let id = match tracked.id() {
            Some(id) => id.to_string(),
            None => self.resolve_id(&tracked.reference).await?,
        };

        let revision = match tracked.revision.cached() {
            Some(revision) => revision,
            None => self.current_revision(&id).await?,
        };

        info!("Updating {} {} at revision {}", Self::kind(), id, revision);
        let payload = RevisionTracker::attach(spec.to_payload_for(&id), revision);
        let reply = self.gateway.update(&id, &payload).await;
        let updated = match self.classify(reply, Status::is_success) {
            Verdict::Success(obj) => obj,
            Verdict::NotFound(_) => {
                return Err(ReconcileError::UpdateTargetMissing {
                    kind: Self::kind(),
                    id,
                });
            }
            Verdict::Conflict(_) => {
                warn!(
                    "{} {} changed remotely since revision {}",
                    Self::kind(),
                    id,
                    revision
                );
                return Err(ReconcileError::ConflictingUpdate {
                    kind: Self::kind(),
                    id,
                    revision,
                });
            }
            Verdict::Failure(failure) => {
                return Err(ReconcileError::UpdateFailed {
                    kind: Self::kind(),
                    id,
                    failure,
                });
            }
        };

        tracked.lifecycle = self.begin(in_flight, Event::Succeeded, "update")?;
        if updated.id.is_empty() {
            tracked.reference.id = Some(id.clone());
        } else {
            tracked.observe(updated);
        }

        // Gone here keeps the entry present with its id; the next read settles
        // the drift.
        let reply = self.gateway.get(&id).await;
        match self.classify(reply, Status::is_success) {
            Verdict::Success(obj) => {
                let change = tracked.observe(obj.clone());
                Self::note_revision(&id, change);
                Ok(obj)
            }
            Verdict::NotFound(_) => {
                warn!(
                    "{} {} disappeared right after its update",
                    Self::kind(),
                    id
                );
                Err(ReconcileError::UpdateTargetMissing {
                    kind: Self::kind(),
                    id,
                })
            }
            Verdict::Conflict(failure) | Verdict::Failure(failure) => {
                Err(ReconcileError::ReadFailed {
                    kind: Self::kind(),
                    id,
                    failure,
                })
            }
        }
    }

    async fn current_revision(&self, id: &str) -> Result<i64> {
        debug!("{} {} has no cached revision, reading it", Self::kind(), id);
        let reply = self.gateway.get(id).await;
        match self.classify(reply, Status::is_success) {
            Verdict::Success(obj) => Ok(RevisionTracker::extract(&obj)),
            Verdict::NotFound(_) => Err(ReconcileError::UpdateTargetMissing {
                kind: Self::kind(),
                id: id.to_string(),
            }),
            Verdict::Conflict(failure) | Verdict::Failure(failure) => {
                Err(ReconcileError::UpdateFailed {
                    kind: Self::kind(),
                    id: id.to_string(),
                    failure,
                })
            }
        }
    }

    /// Delete the object. Already gone counts as deleted.
    ///
    /// On failure the entry keeps its previous state.
    pub async fn delete(&self, tracked: &mut Tracked<AttributesOf<G>>) -> Result<()> {
        let in_flight = self.begin(tracked.lifecycle, Event::BeginDelete, "delete")?;
        let id = match tracked.id() {
            Some(id) => id.to_string(),
            None => self.resolve_id(&tracked.reference).await?,
        };

        info!("Deleting {} {}", Self::kind(), id);
        let reply = self.gateway.delete(&id).await;
        // A success status settles a delete even if the body did not decode.
        let reply = match reply.status {
            Some(status) if status.is_success() => Reply::ok(status, ()),
            _ => reply,
        };

        let done = match self.classify(reply, Status::is_success) {
            Verdict::Success(()) => self.begin(in_flight, Event::Succeeded, "delete")?,
            Verdict::NotFound(_) => {
                info!(
                    "{} {} already absent, treating delete as done",
                    Self::kind(),
                    id
                );
                self.begin(in_flight, Event::Vanished, "delete")?
            }
            Verdict::Conflict(failure) | Verdict::Failure(failure) => {
                return Err(ReconcileError::DeleteFailed {
                    kind: Self::kind(),
                    id,
                    failure,
                });
            }
        };

        tracked.lifecycle = done;
        tracked.retire(id);
        Ok(())
    }

    /// Look an object up by id or name without tracking it.
    ///
    /// Unlike [`Reconciler::read`], a missing object is an error here: the
    /// caller asked for something that has to exist.
    pub async fn lookup(&self, reference: &ResourceRef) -> Result<ObjectOf<G>> {
        let Some(id) = reference.id() else {
            return match reference.display_name() {
                Some(name) => self.resolver().resolve_name(name).await,
                None => Err(ReconcileError::InvalidReference { kind: Self::kind() }),
            };
        };

        let reply = self.gateway.get(id).await;
        let obj = match self.classify(reply, Status::is_success) {
            Verdict::Success(obj) => obj,
            Verdict::NotFound(_) => {
                return Err(ReconcileError::NotFound {
                    kind: Self::kind(),
                    reference: id.to_string(),
                });
            }
            Verdict::Conflict(failure) | Verdict::Failure(failure) => {
                return Err(ReconcileError::ReadFailed {
                    kind: Self::kind(),
                    id: id.to_string(),
                    failure,
                });
            }
        };

        if let Some(expected) = self.kind_filter() {
            let actual = <G::Kind as ObjectKind>::discriminator(&obj.attributes);
            if actual != Some(expected) {
                return Err(ReconcileError::WrongKind {
                    kind: Self::kind(),
                    id: id.to_string(),
                    expected: expected.to_string(),
                    actual: actual.unwrap_or("none").to_string(),
                });
            }
        }
        Ok(obj)
    }

    /// Bring an existing remote object under management.
    pub async fn import(&self, reference: &ResourceRef) -> Result<Tracked<AttributesOf<G>>> {
        let obj = self.lookup(reference).await?;
        info!("Importing {} {} ('{}')", Self::kind(), obj.id, obj.display_name);

        let mut tracked = Tracked::new(ResourceRef {
            id: Some(obj.id.clone()),
            display_name: reference.display_name.clone(),
        });
        tracked.lifecycle = self.begin(tracked.lifecycle, Event::Observed, "import")?;
        tracked.observe(obj);
        Ok(tracked)
    }

    /// Every object of the kind, with the kind filter applied.
    pub async fn list(&self) -> Result<Vec<ObjectOf<G>>> {
        self.resolver().listing().await
    }
}

#[cfg(test)]
mod tests;

//! Per-object lifecycle state and the tracked entry the caller keeps.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{RemoteObject, ResourceRef};
use crate::revision::{RevisionChange, RevisionTracker};

/// Lifecycle of one managed object.
///
/// `Creating`, `Updating` and `Deleting` only exist while a remote call is in
/// flight; a tracked entry is committed as `Unmanaged` or `Present`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Unmanaged,
    Creating,
    Present,
    Updating,
    Deleting,
}

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    BeginCreate,
    BeginUpdate,
    BeginDelete,
    /// The in-flight mutation was accepted by the remote.
    Succeeded,
    /// A read returned the object.
    Observed,
    /// A read or delete found the object gone.
    Vanished,
}

impl Lifecycle {
    /// Next state for `event`, or `None` if the event is not allowed here.
    pub fn transition(self, event: Event) -> Option<Lifecycle> {
        use Event::*;
        use Lifecycle::*;

        match (self, event) {
            (Unmanaged, BeginCreate) => Some(Creating),
            (Creating, Succeeded) => Some(Present),
            (Present, BeginUpdate) => Some(Updating),
            (Updating, Succeeded) => Some(Present),
            (Present | Unmanaged, BeginDelete) => Some(Deleting),
            (Deleting, Succeeded) => Some(Unmanaged),
            (Deleting, Observed) => None,
            (_, Observed) => Some(Present),
            (_, Vanished) => Some(Unmanaged),
            _ => None,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Unmanaged => "unmanaged",
            Lifecycle::Creating => "creating",
            Lifecycle::Present => "present",
            Lifecycle::Updating => "updating",
            Lifecycle::Deleting => "deleting",
        };
        f.write_str(s)
    }
}

/// Local state for one managed object: how to find it, where it is in its
/// lifecycle, and what it looked like at the last read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "A: Deserialize<'de>"))]
pub struct Tracked<A> {
    pub reference: ResourceRef,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub revision: RevisionTracker,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<RemoteObject<A>>,
}

impl<A> Tracked<A> {
    /// A not-yet-managed entry.
    pub fn new(reference: ResourceRef) -> Self {
        Self {
            reference,
            lifecycle: Lifecycle::Unmanaged,
            revision: RevisionTracker::default(),
            snapshot: None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.reference.id()
    }

    pub fn is_present(&self) -> bool {
        self.lifecycle == Lifecycle::Present
    }

    // The helpers below only record what the remote said. The lifecycle is
    // always set by the reconciler from `Lifecycle::transition`.

    /// Record a read: id, snapshot, and the revision replacing the cached one.
    pub(crate) fn observe(&mut self, obj: RemoteObject<A>) -> RevisionChange {
        let change = self.revision.observe(&obj);
        self.reference.id = Some(obj.id.clone());
        self.snapshot = Some(obj);
        change
    }

    /// Drop everything learned about the remote object. The display name is
    /// kept so the entry can still be found by name.
    pub(crate) fn forget(&mut self) {
        self.reference.id = None;
        self.clear_observed();
    }

    /// The object was deleted under `id`. The id is kept so deleting the same
    /// entry again goes to the same object.
    pub(crate) fn retire(&mut self, id: String) {
        self.reference.id = Some(id);
        self.clear_observed();
    }

    fn clear_observed(&mut self) {
        self.revision.clear();
        self.snapshot = None;
    }
}

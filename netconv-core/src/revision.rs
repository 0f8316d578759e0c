//! Revision tracking for optimistic concurrency.
//!
//! The remote bumps an object's `_revision` on every successful update and
//! rejects updates that carry anything but the current value. The tracker
//! caches the revision from the last successful read; that cached value is
//! what the next update sends.

use serde::{Deserialize, Serialize};

use crate::model::RemoteObject;

/// How a newly observed revision relates to the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionChange {
    /// Nothing was cached before.
    First(i64),
    Unchanged(i64),
    Advanced { from: i64, to: i64 },
    /// The remote went backwards, e.g. the object was deleted and recreated
    /// out of band under the same id.
    Regressed { from: i64, to: i64 },
}

/// Locally cached revision of one object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionTracker {
    cached: Option<i64>,
}

impl RevisionTracker {
    pub fn new(cached: Option<i64>) -> Self {
        Self { cached }
    }

    pub fn cached(&self) -> Option<i64> {
        self.cached
    }

    pub fn extract<A>(obj: &RemoteObject<A>) -> i64 {
        obj.revision
    }

    /// Record the revision of a freshly read object, overwriting the cache.
    pub fn observe<A>(&mut self, obj: &RemoteObject<A>) -> RevisionChange {
        let to = Self::extract(obj);
        let change = match self.cached {
            None => RevisionChange::First(to),
            Some(from) if from == to => RevisionChange::Unchanged(to),
            Some(from) if from < to => RevisionChange::Advanced { from, to },
            Some(from) => RevisionChange::Regressed { from, to },
        };
        self.cached = Some(to);
        change
    }

    /// Stamp `revision` onto an outgoing update payload.
    pub fn attach<A>(mut payload: RemoteObject<A>, revision: i64) -> RemoteObject<A> {
        payload.revision = revision;
        payload
    }

    pub fn clear(&mut self) {
        self.cached = None;
    }
}

//! In-memory gateway for tests.
//!
//! Behaves like the remote API for one kind: ids are assigned on create,
//! `_revision` starts at 0 and is bumped by every accepted update, a stale
//! revision is answered with 412 and a missing object with 404. Faults can be
//! queued to fail the next calls.

use std::collections::{BTreeMap, VecDeque};
use std::marker::PhantomData;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::gateway::{ApiFlavor, Gateway, ObjectKind, Reply};
use crate::model::{RemoteObject, Status};

/// A canned failure for the next gateway call.
#[derive(Debug, Clone)]
pub enum Fault {
    /// The remote answers with this status and an empty error body.
    Status(Status),
    /// The call never got a status.
    Transport(TransportError),
    /// Status and error together, e.g. a body that failed to decode.
    StatusWithError(Status, TransportError),
}

/// Number of calls per verb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub create: usize,
    pub get: usize,
    pub list: usize,
    pub update: usize,
    pub delete: usize,
}

struct State<A> {
    objects: BTreeMap<String, RemoteObject<A>>,
    next_id: u64,
    faults: VecDeque<Fault>,
    calls: Calls,
    create_status: Option<Status>,
    vanish_after_update: bool,
}

pub struct MemoryGateway<K: ObjectKind> {
    state: Mutex<State<K::Attributes>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ObjectKind> Default for MemoryGateway<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ObjectKind> MemoryGateway<K> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                objects: BTreeMap::new(),
                next_id: 1,
                faults: VecDeque::new(),
                calls: Calls::default(),
                create_status: None,
                vanish_after_update: false,
            }),
            _kind: PhantomData,
        }
    }

    /// Insert an object as if someone else had created it. Returns its id.
    pub async fn seed(&self, display_name: &str, attributes: K::Attributes) -> String {
        let mut state = self.state.lock().await;
        let id = next_id::<K, _>(&mut *state);
        state.objects.insert(
            id.clone(),
            RemoteObject {
                id: id.clone(),
                display_name: display_name.to_string(),
                description: String::new(),
                revision: 0,
                tags: Vec::new(),
                attributes,
            },
        );
        id
    }

    /// Delete an object behind the reconciler's back.
    pub async fn remove(&self, id: &str) -> Option<RemoteObject<K::Attributes>> {
        self.state.lock().await.objects.remove(id)
    }

    /// Simulate an out-of-band update. Returns the new revision.
    pub async fn bump(&self, id: &str) -> Option<i64> {
        let mut state = self.state.lock().await;
        let obj = state.objects.get_mut(id)?;
        obj.revision += 1;
        Some(obj.revision)
    }

    /// Current remote copy, without counting a call.
    pub async fn get_now(&self, id: &str) -> Option<RemoteObject<K::Attributes>> {
        self.state.lock().await.objects.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Queue a failure for the next call, whatever its verb.
    pub async fn fail_next(&self, fault: Fault) {
        self.state.lock().await.faults.push_back(fault);
    }

    /// Answer successful creates with `status` instead of the kind's usual one.
    pub async fn answer_create_with(&self, status: Status) {
        self.state.lock().await.create_status = Some(status);
    }

    /// Delete the object right after the next accepted update has been
    /// answered, as if someone removed it between the update and a re-read.
    pub async fn vanish_after_update(&self) {
        self.state.lock().await.vanish_after_update = true;
    }

    pub async fn calls(&self) -> Calls {
        self.state.lock().await.calls
    }

    pub async fn list_calls(&self) -> usize {
        self.calls().await.list
    }
}

fn next_id<K: ObjectKind, A>(state: &mut State<A>) -> String {
    let id = format!("{}-{}", K::KEY.replace('_', "-"), state.next_id);
    state.next_id += 1;
    id
}

fn api_error(status: Status, message: impl Into<String>) -> TransportError {
    TransportError::Api {
        status,
        code: None,
        message: message.into(),
    }
}

fn fault_reply<T>(fault: Fault) -> Reply<T> {
    match fault {
        Fault::Status(status) => Reply::failed(Some(status), api_error(status, "injected")),
        Fault::Transport(error) => Reply::failed(None, error),
        Fault::StatusWithError(status, error) => Reply::failed(Some(status), error),
    }
}

fn not_found<T>(id: &str) -> Reply<T> {
    Reply::failed(
        Some(Status::NOT_FOUND),
        api_error(Status::NOT_FOUND, format!("object {} not found", id)),
    )
}

#[async_trait]
impl<K: ObjectKind> Gateway for MemoryGateway<K> {
    type Kind = K;

    async fn create(
        &self,
        payload: &RemoteObject<K::Attributes>,
    ) -> Reply<RemoteObject<K::Attributes>> {
        let mut state = self.state.lock().await;
        state.calls.create += 1;
        if let Some(fault) = state.faults.pop_front() {
            return fault_reply(fault);
        }

        let id = match K::API {
            ApiFlavor::Policy if !payload.id.is_empty() => payload.id.clone(),
            _ => next_id::<K, _>(&mut *state),
        };
        let mut obj = payload.clone();
        obj.id = id.clone();
        obj.revision = 0;
        state.objects.insert(id, obj.clone());

        let status = state.create_status.unwrap_or(self.expected_create_status());
        Reply::ok(status, obj)
    }

    async fn get(&self, id: &str) -> Reply<RemoteObject<K::Attributes>> {
        let mut state = self.state.lock().await;
        state.calls.get += 1;
        if let Some(fault) = state.faults.pop_front() {
            return fault_reply(fault);
        }

        match state.objects.get(id) {
            Some(obj) => Reply::ok(Status::OK, obj.clone()),
            None => not_found(id),
        }
    }

    async fn list(
        &self,
        _kind_filter: Option<&str>,
    ) -> Result<Vec<RemoteObject<K::Attributes>>, TransportError> {
        let mut state = self.state.lock().await;
        state.calls.list += 1;
        if let Some(fault) = state.faults.pop_front() {
            return fault_reply::<()>(fault).body.map(|_| Vec::new());
        }

        // The server-side filter is ignored so callers have to filter locally.
        Ok(state.objects.values().cloned().collect())
    }

    async fn update(
        &self,
        id: &str,
        payload: &RemoteObject<K::Attributes>,
    ) -> Reply<RemoteObject<K::Attributes>> {
        let mut state = self.state.lock().await;
        state.calls.update += 1;
        if let Some(fault) = state.faults.pop_front() {
            return fault_reply(fault);
        }

        let Some(current) = state.objects.get_mut(id) else {
            return not_found(id);
        };
        if payload.revision != current.revision {
            let message = format!(
                "object {} was modified by somebody else (revision {} != {})",
                id, payload.revision, current.revision
            );
            return Reply::failed(
                Some(Status::PRECONDITION_FAILED),
                TransportError::Api {
                    status: Status::PRECONDITION_FAILED,
                    code: Some(207),
                    message,
                },
            );
        }

        let mut obj = payload.clone();
        obj.id = id.to_string();
        obj.revision = current.revision + 1;
        *current = obj.clone();
        if std::mem::take(&mut state.vanish_after_update) {
            state.objects.remove(id);
        }
        Reply::ok(Status::OK, obj)
    }

    async fn delete(&self, id: &str) -> Reply<()> {
        let mut state = self.state.lock().await;
        state.calls.delete += 1;
        if let Some(fault) = state.faults.pop_front() {
            return fault_reply(fault);
        }

        match state.objects.remove(id) {
            Some(_) => Reply::ok(Status::OK, ()),
            None => not_found(id),
        }
    }
}

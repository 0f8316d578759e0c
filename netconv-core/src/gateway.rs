//! Remote object gateway - the narrow seam to the remote API.
//!
//! A gateway performs the raw CRUD calls for one object kind. It reports what
//! the remote said (status and body or transport failure) and leaves every
//! decision about what that means to the reconciler.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use crate::error::TransportError;
use crate::model::{RemoteObject, Status};

/// Which API surface a kind lives on. Decides the create verb and the
/// status a successful create answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// `POST <collection>`, server-assigned id, `201 Created`.
    Manager,
    /// `PUT <collection>/<id>`, client-chosen id, `200 OK`.
    Policy,
}

/// Static description of one remote object kind.
pub trait ObjectKind: Send + Sync + 'static {
    /// Kind-specific attributes, flattened next to the common fields.
    type Attributes: Clone
        + Debug
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Key used in manifests and state files, e.g. `logical_switch`.
    const KEY: &'static str;
    /// Human name used in logs and errors, e.g. `logical switch`.
    const NAME: &'static str;
    /// Collection path relative to the API root.
    const COLLECTION: &'static str;
    const API: ApiFlavor = ApiFlavor::Manager;
    /// Query parameter the server narrows listings by, if the kind has one.
    const FILTER_PARAM: Option<&'static str> = None;

    /// Sub-kind of an object, matched against a kind filter.
    fn discriminator(_attributes: &Self::Attributes) -> Option<&str> {
        None
    }
}

/// Object type handled by a gateway.
pub type ObjectOf<G> = RemoteObject<AttributesOf<G>>;
/// Attribute type handled by a gateway.
pub type AttributesOf<G> = <<G as Gateway>::Kind as ObjectKind>::Attributes;

/// Outcome of one remote call.
///
/// Both halves may be present at once: a transport error can arrive together
/// with a meaningful status code, and the status then decides how the call is
/// classified.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: Option<Status>,
    pub body: Result<T, TransportError>,
}

impl<T> Reply<T> {
    pub fn ok(status: Status, body: T) -> Self {
        Self {
            status: Some(status),
            body: Ok(body),
        }
    }

    pub fn failed(status: Option<Status>, error: TransportError) -> Self {
        Self {
            status,
            body: Err(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            status: self.status,
            body: self.body.map(f),
        }
    }
}

/// CRUD access to one object kind on the remote API.
///
/// Implementations receive their API client from the caller; they hold no
/// process-wide state. `list` must return the complete listing, pages
/// concatenated.
#[async_trait]
pub trait Gateway: Send + Sync {
    type Kind: ObjectKind;

    async fn create(
        &self,
        payload: &RemoteObject<<Self::Kind as ObjectKind>::Attributes>,
    ) -> Reply<RemoteObject<<Self::Kind as ObjectKind>::Attributes>>;

    async fn get(&self, id: &str) -> Reply<RemoteObject<<Self::Kind as ObjectKind>::Attributes>>;

    async fn list(
        &self,
        kind_filter: Option<&str>,
    ) -> Result<Vec<RemoteObject<<Self::Kind as ObjectKind>::Attributes>>, TransportError>;

    /// Update `id`; the payload carries the revision the caller last read.
    async fn update(
        &self,
        id: &str,
        payload: &RemoteObject<<Self::Kind as ObjectKind>::Attributes>,
    ) -> Reply<RemoteObject<<Self::Kind as ObjectKind>::Attributes>>;

    async fn delete(&self, id: &str) -> Reply<()>;

    /// Status a successful create answers with. Any other status, success
    /// class or not, is a rejected create.
    fn expected_create_status(&self) -> Status {
        match <Self::Kind as ObjectKind>::API {
            ApiFlavor::Manager => Status::CREATED,
            ApiFlavor::Policy => Status::OK,
        }
    }

    /// The one place "does not exist" is decided. A status, when present,
    /// takes precedence over whatever the error says.
    fn is_not_found(&self, status: Option<Status>, error: Option<&TransportError>) -> bool {
        match status {
            Some(status) => status == Status::NOT_FOUND,
            None => error.and_then(TransportError::status) == Some(Status::NOT_FOUND),
        }
    }

    /// Whether the remote rejected a stale revision.
    fn is_conflict(&self, status: Option<Status>, error: Option<&TransportError>) -> bool {
        let status = status.or_else(|| error.and_then(TransportError::status));
        matches!(status, Some(Status::CONFLICT | Status::PRECONDITION_FAILED))
    }
}

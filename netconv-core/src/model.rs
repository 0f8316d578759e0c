//! Data model shared by every object kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status code the remote API answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub u16);

impl Status {
    pub const OK: Status = Status(200);
    pub const CREATED: Status = Status(201);
    pub const NO_CONTENT: Status = Status(204);
    pub const NOT_FOUND: Status = Status(404);
    pub const CONFLICT: Status = Status(409);
    pub const PRECONDITION_FAILED: Status = Status(412);
    pub const TOO_MANY_REQUESTS: Status = Status(429);
    pub const INTERNAL_SERVER_ERROR: Status = Status(500);
    pub const SERVICE_UNAVAILABLE: Status = Status(503);

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a remote object by id, by display name, or both.
///
/// An id always wins: resolving a reference that carries one never lists
/// the remote collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ResourceRef {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            display_name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            display_name: Some(name.into()),
        }
    }

    /// The id, if one is set and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// The display name, if one is set and non-empty.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref().filter(|name| !name.is_empty())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.id(), self.display_name()) {
            (Some(id), _) => write!(f, "{}", id),
            (None, Some(name)) => write!(f, "with name '{}'", name),
            (None, None) => write!(f, "<empty reference>"),
        }
    }
}

/// Scoped tag attached to a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub tag: String,
}

impl Tag {
    pub fn new(scope: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            tag: tag.into(),
        }
    }
}

/// A remote object as the API returns it.
///
/// `id` is assigned by the server at creation and never changes. `revision`
/// advances on every successful update; it is only compared, never
/// interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject<A> {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "_revision", default)]
    pub revision: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(flatten)]
    pub attributes: A,
}

/// Configuration the caller declared for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredSpec<A> {
    /// Empty means "let the server choose" (it defaults to the id).
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub attributes: A,
}

impl<A: Clone> DesiredSpec<A> {
    pub fn new(display_name: impl Into<String>, attributes: A) -> Self {
        Self {
            display_name: display_name.into(),
            description: String::new(),
            tags: Vec::new(),
            attributes,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// Payload for a create call: no id, revision zero.
    pub fn to_payload(&self) -> RemoteObject<A> {
        RemoteObject {
            id: String::new(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            revision: 0,
            tags: self.tags.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Payload for an update of `id`. The revision is attached separately.
    pub fn to_payload_for(&self, id: &str) -> RemoteObject<A> {
        RemoteObject {
            id: id.to_string(),
            ..self.to_payload()
        }
    }
}

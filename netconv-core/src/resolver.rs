//! Identity resolver - turns an id or a display name into exactly one id.
//!
//! Matching runs in two tiers over the complete listing of a kind. Exact
//! display-name matches are tried first and win when there is exactly one,
//! so "foo" still resolves while "foobar" exists. Prefix matches are only
//! consulted when nothing matches exactly. More than one match at the
//! deciding tier is always an error; the resolver never guesses.
//!
//! A kind filter (e.g. `router_type = TIER0`) is an explicit pre-filter: it is
//! handed to the gateway listing and re-applied locally before matching.

use tracing::debug;

use crate::error::{MatchTier, ReconcileError, Result};
use crate::gateway::{Gateway, ObjectKind, ObjectOf};
use crate::model::{RemoteObject, ResourceRef};

/// Why a listing produced no single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    Missing,
    Ambiguous { tier: MatchTier, count: usize },
}

/// Listing entries partitioned by how they match a queried name.
///
/// Every exact match is also a prefix match, so `prefix` is a superset of
/// `exact`.
#[derive(Debug)]
pub struct Candidates<'a, A> {
    pub exact: Vec<&'a RemoteObject<A>>,
    pub prefix: Vec<&'a RemoteObject<A>>,
}

impl<'a, A> Candidates<'a, A> {
    pub fn classify<I>(listing: I, name: &str) -> Self
    where
        I: IntoIterator<Item = &'a RemoteObject<A>>,
    {
        let mut exact = Vec::new();
        let mut prefix = Vec::new();
        for entry in listing {
            if entry.display_name.starts_with(name) {
                prefix.push(entry);
            }
            if entry.display_name == name {
                exact.push(entry);
            }
        }
        Self { exact, prefix }
    }

    /// Apply the precedence rules and pick the single winner.
    pub fn pick(self) -> std::result::Result<&'a RemoteObject<A>, Unresolved> {
        match (self.exact.as_slice(), self.prefix.as_slice()) {
            ([only], _) => Ok(*only),
            (exact, _) if exact.len() > 1 => Err(Unresolved::Ambiguous {
                tier: MatchTier::Exact,
                count: exact.len(),
            }),
            (_, [only]) => Ok(*only),
            (_, prefix) if prefix.len() > 1 => Err(Unresolved::Ambiguous {
                tier: MatchTier::Prefix,
                count: prefix.len(),
            }),
            _ => Err(Unresolved::Missing),
        }
    }
}

/// Resolves references for one gateway, optionally narrowed to a sub-kind.
pub struct IdentityResolver<'g, G: Gateway> {
    gateway: &'g G,
    kind_filter: Option<&'g str>,
}

impl<'g, G: Gateway> IdentityResolver<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self {
            gateway,
            kind_filter: None,
        }
    }

    pub fn with_kind_filter(mut self, kind_filter: Option<&'g str>) -> Self {
        self.kind_filter = kind_filter;
        self
    }

    /// Resolve a reference to an id. An id in the reference is returned as-is
    /// without contacting the remote.
    pub async fn resolve(&self, reference: &ResourceRef) -> Result<String> {
        if let Some(id) = reference.id() {
            return Ok(id.to_string());
        }
        let Some(name) = reference.display_name() else {
            return Err(ReconcileError::InvalidReference { kind: Self::kind() });
        };
        self.resolve_name(name).await.map(|obj| obj.id)
    }

    /// Resolve a display name to the full matching object.
    pub async fn resolve_name(&self, name: &str) -> Result<ObjectOf<G>> {
        let listing = self.listing().await?;
        let candidates = Candidates::classify(&listing, name);
        debug!(
            "Resolving {} '{}': {} exact, {} prefix matches in {} entries",
            Self::kind(),
            name,
            candidates.exact.len(),
            candidates.prefix.len(),
            listing.len()
        );

        match candidates.pick() {
            Ok(obj) => Ok(obj.clone()),
            Err(Unresolved::Missing) => Err(ReconcileError::NotFound {
                kind: Self::kind(),
                reference: format!("with name '{}'", name),
            }),
            Err(Unresolved::Ambiguous { tier, count }) => Err(ReconcileError::AmbiguousReference {
                kind: Self::kind(),
                name: name.to_string(),
                tier,
                count,
            }),
        }
    }

    /// Complete listing of the kind, with the kind filter applied.
    pub async fn listing(&self) -> Result<Vec<ObjectOf<G>>> {
        let mut listing = self.gateway.list(self.kind_filter).await.map_err(|source| {
            ReconcileError::Transport {
                kind: Self::kind(),
                context: "listing failed".to_string(),
                source,
            }
        })?;

        if let Some(filter) = self.kind_filter {
            listing.retain(|obj| {
                <G::Kind as ObjectKind>::discriminator(&obj.attributes) == Some(filter)
            });
        }
        Ok(listing)
    }

    fn kind() -> &'static str {
        <G::Kind as ObjectKind>::NAME
    }
}

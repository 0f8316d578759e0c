//! Kind drivers: the typed reconciler of one kind behind an untyped face.
//!
//! The engine works with manifest declarations and state entries whose
//! attributes are plain JSON. A [`Driver`] turns them into the kind's
//! attribute type, runs the reconciler and turns the result back.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use netconv_core::{
    AttributesOf, DesiredSpec, Gateway, ObjectKind, ReadOutcome, Reconciler, RemoteObject,
    ResourceRef, Tracked,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::manifest::ResourceDecl;

/// Operations the engine needs for one kind.
#[async_trait]
pub trait KindDriver: Send + Sync {
    /// Manifest key of the kind, e.g. `logical_switch`.
    fn key(&self) -> &'static str;

    /// Check the declared attributes against the kind's schema.
    fn validate(&self, decl: &ResourceDecl) -> Result<()>;

    /// Declared fields that differ from the entry's last snapshot.
    fn diff(&self, decl: &ResourceDecl, tracked: &Tracked<Value>) -> Result<Vec<String>>;

    async fn create(&self, decl: &ResourceDecl, tracked: &mut Tracked<Value>) -> Result<()>;

    /// Refresh the entry. Returns `false` if the object is gone.
    async fn read(&self, tracked: &mut Tracked<Value>) -> Result<bool>;

    async fn update(&self, decl: &ResourceDecl, tracked: &mut Tracked<Value>) -> Result<()>;

    async fn delete(&self, tracked: &mut Tracked<Value>) -> Result<()>;

    async fn import(&self, reference: &ResourceRef, filter: Option<&str>)
    -> Result<Tracked<Value>>;

    async fn lookup(
        &self,
        reference: &ResourceRef,
        filter: Option<&str>,
    ) -> Result<RemoteObject<Value>>;

    async fn list(&self, filter: Option<&str>) -> Result<Vec<RemoteObject<Value>>>;
}

pub struct Driver<G: Gateway> {
    gateway: Arc<G>,
}

impl<G: Gateway> Driver<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    fn reconciler(&self, filter: Option<&str>) -> Reconciler<G> {
        let reconciler = Reconciler::new(self.gateway.clone());
        match filter {
            Some(filter) => reconciler.with_kind_filter(filter),
            None => reconciler,
        }
    }

    fn spec(&self, decl: &ResourceDecl) -> Result<DesiredSpec<AttributesOf<G>>> {
        let attributes: AttributesOf<G> =
            serde_json::from_value(Value::Object(decl.attributes.clone())).with_context(|| {
                format!(
                    "Invalid attributes for {} '{}'",
                    <G::Kind as ObjectKind>::KEY,
                    decl.handle
                )
            })?;
        Ok(DesiredSpec::new(decl.name(), attributes)
            .with_description(decl.description.clone())
            .with_tags(decl.tags.clone()))
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Convert between two serde representations of the same data.
fn convert<T: Serialize, U: DeserializeOwned>(value: &T) -> Result<U> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

#[async_trait]
impl<G: Gateway + 'static> KindDriver for Driver<G> {
    fn key(&self) -> &'static str {
        <G::Kind as ObjectKind>::KEY
    }

    fn validate(&self, decl: &ResourceDecl) -> Result<()> {
        let spec = self.spec(decl)?;
        // Unknown keys are dropped by deserialization; anything non-empty
        // missing after a round trip was not part of the schema.
        let known = serde_json::to_value(&spec.attributes)?;
        for (key, value) in &decl.attributes {
            if known.get(key).is_none() && !is_empty(value) {
                bail!(
                    "unknown attribute '{}' for {} '{}'",
                    key,
                    self.key(),
                    decl.handle
                );
            }
        }
        Ok(())
    }

    fn diff(&self, decl: &ResourceDecl, tracked: &Tracked<Value>) -> Result<Vec<String>> {
        let Some(snapshot) = &tracked.snapshot else {
            return Ok(Vec::new());
        };
        let observed: RemoteObject<AttributesOf<G>> = convert(snapshot)?;
        Ok(self.spec(decl)?.divergent_fields(&observed))
    }

    async fn create(&self, decl: &ResourceDecl, tracked: &mut Tracked<Value>) -> Result<()> {
        let spec = self.spec(decl)?;
        let mut typed: Tracked<AttributesOf<G>> = convert(tracked)?;
        let result = self.reconciler(None).create(&mut typed, &spec).await;
        *tracked = convert(&typed)?;
        result?;
        Ok(())
    }

    async fn read(&self, tracked: &mut Tracked<Value>) -> Result<bool> {
        let mut typed: Tracked<AttributesOf<G>> = convert(tracked)?;
        let result = self.reconciler(None).read(&mut typed).await;
        *tracked = convert(&typed)?;
        Ok(matches!(result?, ReadOutcome::Present(_)))
    }

    async fn update(&self, decl: &ResourceDecl, tracked: &mut Tracked<Value>) -> Result<()> {
        let spec = self.spec(decl)?;
        let mut typed: Tracked<AttributesOf<G>> = convert(tracked)?;
        let result = self.reconciler(None).update(&mut typed, &spec).await;
        *tracked = convert(&typed)?;
        result?;
        Ok(())
    }

    async fn delete(&self, tracked: &mut Tracked<Value>) -> Result<()> {
        let mut typed: Tracked<AttributesOf<G>> = convert(tracked)?;
        let result = self.reconciler(None).delete(&mut typed).await;
        *tracked = convert(&typed)?;
        result?;
        Ok(())
    }

    async fn import(
        &self,
        reference: &ResourceRef,
        filter: Option<&str>,
    ) -> Result<Tracked<Value>> {
        let tracked = self.reconciler(filter).import(reference).await?;
        convert(&tracked)
    }

    async fn lookup(
        &self,
        reference: &ResourceRef,
        filter: Option<&str>,
    ) -> Result<RemoteObject<Value>> {
        let obj = self.reconciler(filter).lookup(reference).await?;
        convert(&obj)
    }

    async fn list(&self, filter: Option<&str>) -> Result<Vec<RemoteObject<Value>>> {
        let listing = self.reconciler(filter).list().await?;
        listing.iter().map(convert).collect()
    }
}

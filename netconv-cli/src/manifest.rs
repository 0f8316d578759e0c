//! Declarative manifest: the objects that should exist.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use netconv_core::{ResourceRef, Tag};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub resource: Vec<ResourceDecl>,
}

/// One declared object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    /// Local key of the object in the state file.
    pub handle: String,
    pub kind: String,
    /// Defaults to the handle.
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ResourceDecl {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.handle)
    }

    /// Reference used to find the object before its id is known.
    pub fn reference(&self) -> ResourceRef {
        ResourceRef::by_name(self.name())
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Parse and check the structural rules: handles are non-empty and
    /// unique. Kinds and attributes are checked against the registry later.
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;

        let mut seen = BTreeSet::new();
        for decl in &manifest.resource {
            if decl.handle.trim().is_empty() {
                bail!("resource of kind '{}' has an empty handle", decl.kind);
            }
            if !seen.insert(decl.handle.as_str()) {
                bail!("handle '{}' is declared more than once", decl.handle);
            }
        }
        Ok(manifest)
    }

    pub fn get(&self, handle: &str) -> Option<&ResourceDecl> {
        self.resource.iter().find(|decl| decl.handle == handle)
    }
}

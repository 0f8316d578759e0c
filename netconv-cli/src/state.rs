//! Local state file: one tracked entry per manifest handle.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use netconv_core::Tracked;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const STATE_VERSION: u32 = 1;

/// What netconv knows about one object. Attributes are kept as plain JSON so
/// one file can hold every kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub kind: String,
    pub tracked: Tracked<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, StateEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Load the state file. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No state file at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        let state: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("Invalid state file {}", path.display()))?;
        if state.version > STATE_VERSION {
            bail!(
                "state file {} has version {}, this netconv understands up to {}",
                path.display(),
                state.version,
                STATE_VERSION
            );
        }
        Ok(state)
    }

    /// Write the state next to its final location and rename it into place,
    /// so a crash never leaves a truncated file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        let tmp = temp_path(path);
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file {}", path.display()))?;
        debug!("Saved {} entries to {}", self.resources.len(), path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netconv_core::{Lifecycle, RemoteObject, ResourceRef, RevisionTracker};
    use serde_json::json;

    fn entry() -> StateEntry {
        let mut tracked = Tracked::new(ResourceRef::by_name("web"));
        tracked.reference.id = Some("ls-1".to_string());
        tracked.lifecycle = Lifecycle::Present;
        tracked.revision = RevisionTracker::new(Some(4));
        tracked.snapshot = Some(RemoteObject {
            id: "ls-1".to_string(),
            display_name: "web".to_string(),
            description: String::new(),
            revision: 4,
            tags: Vec::new(),
            attributes: json!({ "admin_state": "UP" }),
        });
        StateEntry {
            kind: "logical_switch".to_string(),
            tracked,
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(state, StateFile::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = StateFile::default();
        state.resources.insert("web".to_string(), entry());
        state.save(&path).unwrap();

        assert!(!dir.path().join("state.json.tmp").exists());
        assert_eq!(StateFile::load(&path).unwrap(), state);

        // Attributes sit next to the common fields, as on the wire.
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let snapshot = &raw["resources"]["web"]["tracked"]["snapshot"];
        assert_eq!(snapshot["admin_state"], json!("UP"));
        assert_eq!(snapshot["_revision"], json!(4));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{ "version": 99, "resources": {} }"#).unwrap();
        assert!(StateFile::load(&path).is_err());
    }
}

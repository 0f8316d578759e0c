//! Plan and apply: converge the state file and the remote onto a manifest.
//!
//! Every object is handled by its own future; at most `parallelism` of them
//! run at once. The operations of one object always run in order.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, bail};
use futures::stream::{self, StreamExt};
use netconv_core::{ResourceRef, Tracked};
use tracing::{debug, error, info, warn};

use crate::audit::AuditLog;
use crate::manifest::{Manifest, ResourceDecl};
use crate::registry::Registry;
use crate::state::{StateEntry, StateFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    /// Fields that differ from the last read.
    Update(Vec<String>),
    /// The declared kind changed: delete the old object, create the new one.
    Replace,
    Delete,
    Noop,
    /// The entry could not be refreshed, so nothing is known about it.
    Unreadable(String),
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update(_) => "update",
            Action::Replace => "replace",
            Action::Delete => "delete",
            Action::Noop => "none",
            Action::Unreadable(_) => "unknown",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Action::Update(fields) => fields.join(", "),
            Action::Unreadable(reason) => reason.clone(),
            _ => String::new(),
        }
    }

    fn is_change(&self) -> bool {
        !matches!(self, Action::Noop | Action::Unreadable(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub handle: String,
    pub kind: String,
    pub name: String,
    pub id: Option<String>,
    pub action: Action,
}

/// Result of one object's part of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub handle: String,
    pub kind: String,
    pub action: &'static str,
    pub id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
}

impl Report {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }

    fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    fn sort(&mut self) {
        self.outcomes.sort_by(|a, b| a.handle.cmp(&b.handle));
    }
}

/// Entries that could not be read during a refresh, with the reason.
pub type Unreadable = BTreeMap<String, String>;

enum Job {
    Create(ResourceDecl),
    Update(ResourceDecl, StateEntry),
    Replace(ResourceDecl, StateEntry),
    Delete(StateEntry),
}

pub struct Engine {
    registry: Registry,
    parallelism: usize,
    audit: AuditLog,
}

impl Engine {
    pub fn new(registry: Registry, parallelism: usize, audit: AuditLog) -> Self {
        Self {
            registry,
            parallelism: parallelism.max(1),
            audit,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Read every tracked object. Objects deleted outside netconv are dropped
    /// from the state; entries that fail to read are kept as they were.
    pub async fn refresh(&self, state: &mut StateFile) -> Unreadable {
        let entries = std::mem::take(&mut state.resources);
        info!("Refreshing {} tracked objects", entries.len());

        let results: Vec<_> = stream::iter(entries)
            .map(|(handle, entry)| self.refresh_one(handle, entry))
            .buffer_unordered(self.parallelism)
            .collect()
            .await;

        let mut unreadable = Unreadable::new();
        for (handle, entry, failure) in results {
            if let Some(entry) = entry {
                state.resources.insert(handle.clone(), entry);
            }
            if let Some(failure) = failure {
                unreadable.insert(handle, failure);
            }
        }
        unreadable
    }

    async fn refresh_one(
        &self,
        handle: String,
        mut entry: StateEntry,
    ) -> (String, Option<StateEntry>, Option<String>) {
        let driver = match self.registry.get(&entry.kind) {
            Ok(driver) => driver,
            Err(e) => {
                let failure = format!("{:#}", e);
                return (handle, Some(entry), Some(failure));
            }
        };

        let id = entry.tracked.id().map(str::to_string);
        match driver.read(&mut entry.tracked).await {
            Ok(true) => {
                debug!("{} {} is up to date", entry.kind, handle);
                (handle, Some(entry), None)
            }
            Ok(false) => {
                self.audit.drifted(&entry.kind, &handle, id.as_deref());
                (handle, None, None)
            }
            Err(e) => {
                warn!("Failed to refresh {} {}: {:#}", entry.kind, handle, e);
                let failure = format!("{:#}", e);
                (handle, Some(entry), Some(failure))
            }
        }
    }

    /// Compare the manifest with the (refreshed) state.
    pub fn plan(
        &self,
        manifest: &Manifest,
        state: &StateFile,
        unreadable: &Unreadable,
    ) -> Result<Vec<PlannedChange>> {
        self.registry.validate(manifest)?;

        let mut changes = Vec::new();
        for decl in &manifest.resource {
            let entry = state.resources.get(&decl.handle);
            let action = match entry {
                None => Action::Create,
                Some(entry) if entry.kind != decl.kind => Action::Replace,
                Some(_) if unreadable.contains_key(&decl.handle) => {
                    Action::Unreadable(unreadable[&decl.handle].clone())
                }
                Some(entry) => {
                    let fields = self.registry.get(&decl.kind)?.diff(decl, &entry.tracked)?;
                    if fields.is_empty() {
                        Action::Noop
                    } else {
                        Action::Update(fields)
                    }
                }
            };
            changes.push(PlannedChange {
                handle: decl.handle.clone(),
                kind: decl.kind.clone(),
                name: decl.name().to_string(),
                id: entry.and_then(|e| e.tracked.id().map(str::to_string)),
                action,
            });
        }

        for (handle, entry) in &state.resources {
            if manifest.get(handle).is_none() {
                changes.push(PlannedChange {
                    handle: handle.clone(),
                    kind: entry.kind.clone(),
                    name: entry
                        .tracked
                        .reference
                        .display_name()
                        .unwrap_or(handle)
                        .to_string(),
                    id: entry.tracked.id().map(str::to_string),
                    action: Action::Delete,
                });
            }
        }

        let pending = changes.iter().filter(|c| c.action.is_change()).count();
        info!("Planned {} changes for {} objects", pending, changes.len());
        Ok(changes)
    }

    /// Execute a plan. The state is updated for every object that got
    /// anywhere, including the ones that failed halfway.
    pub async fn apply(
        &self,
        manifest: &Manifest,
        state: &mut StateFile,
        plan: &[PlannedChange],
    ) -> Report {
        let mut report = Report::default();
        let mut jobs = Vec::new();

        for change in plan {
            let decl = manifest.get(&change.handle).cloned();
            let entry = state.resources.remove(&change.handle);
            let job = match (&change.action, decl, entry) {
                (Action::Noop, _, Some(entry)) => {
                    state.resources.insert(change.handle.clone(), entry);
                    continue;
                }
                (Action::Unreadable(reason), _, entry) => {
                    if let Some(entry) = entry {
                        state.resources.insert(change.handle.clone(), entry);
                    }
                    report.push(Outcome {
                        handle: change.handle.clone(),
                        kind: change.kind.clone(),
                        action: change.action.label(),
                        id: change.id.clone(),
                        error: Some(format!("skipped, refresh failed: {}", reason)),
                    });
                    continue;
                }
                (Action::Create, Some(decl), None) => Job::Create(decl),
                (Action::Update(_), Some(decl), Some(entry)) => Job::Update(decl, entry),
                (Action::Replace, Some(decl), Some(entry)) => Job::Replace(decl, entry),
                (Action::Delete, None, Some(entry)) => Job::Delete(entry),
                (action, _, entry) => {
                    if let Some(entry) = entry {
                        state.resources.insert(change.handle.clone(), entry);
                    }
                    report.push(Outcome {
                        handle: change.handle.clone(),
                        kind: change.kind.clone(),
                        action: action.label(),
                        id: change.id.clone(),
                        error: Some("plan does not match the current state".to_string()),
                    });
                    continue;
                }
            };
            jobs.push((change.handle.clone(), job));
        }

        info!("Applying {} changes", jobs.len());
        let results: Vec<_> = stream::iter(jobs)
            .map(|(handle, job)| self.run(handle, job))
            .buffer_unordered(self.parallelism)
            .collect()
            .await;

        for (handle, entry, outcome) in results {
            if let Some(entry) = entry {
                state.resources.insert(handle, entry);
            }
            if let Some(e) = &outcome.error {
                error!("{} {} failed to {}: {}", outcome.kind, outcome.handle, outcome.action, e);
            }
            report.push(outcome);
        }
        report.sort();
        report
    }

    /// Delete every tracked object.
    pub async fn destroy(&self, state: &mut StateFile) -> Report {
        let entries = std::mem::take(&mut state.resources);
        info!("Destroying {} tracked objects", entries.len());

        let results: Vec<_> = stream::iter(entries)
            .map(|(handle, entry)| self.run(handle, Job::Delete(entry)))
            .buffer_unordered(self.parallelism)
            .collect()
            .await;

        let mut report = Report::default();
        for (handle, entry, outcome) in results {
            if let Some(entry) = entry {
                state.resources.insert(handle, entry);
            }
            report.push(outcome);
        }
        report.sort();
        report
    }

    /// Bring an existing remote object under management as `handle`.
    pub async fn import(
        &self,
        state: &mut StateFile,
        handle: &str,
        kind: &str,
        reference: &ResourceRef,
        filter: Option<&str>,
    ) -> Result<StateEntry> {
        if let Some(existing) = state.resources.get(handle) {
            bail!(
                "handle '{}' already tracks {} {}",
                handle,
                existing.kind,
                existing.tracked.id().unwrap_or("-")
            );
        }

        let tracked = self.registry.get(kind)?.import(reference, filter).await?;
        let entry = StateEntry {
            kind: kind.to_string(),
            tracked,
        };
        self.audit
            .imported(kind, handle, entry.tracked.id().unwrap_or("-"));
        state.resources.insert(handle.to_string(), entry.clone());
        Ok(entry)
    }

    async fn run(&self, handle: String, job: Job) -> (String, Option<StateEntry>, Outcome) {
        match job {
            Job::Create(decl) => {
                let (entry, outcome) = self.create(&decl).await;
                (handle, entry, outcome)
            }
            Job::Update(decl, entry) => {
                let (entry, outcome) = self.update(&decl, entry).await;
                (handle, Some(entry), outcome)
            }
            Job::Delete(entry) => {
                let (entry, outcome) = self.delete(&handle, entry).await;
                (handle, entry, outcome)
            }
            Job::Replace(decl, entry) => {
                let (entry, mut outcome) = self.delete(&handle, entry).await;
                if entry.is_some() {
                    outcome.action = Action::Replace.label();
                    return (handle, entry, outcome);
                }
                let (entry, mut outcome) = self.create(&decl).await;
                outcome.action = Action::Replace.label();
                (handle, entry, outcome)
            }
        }
    }

    async fn create(&self, decl: &ResourceDecl) -> (Option<StateEntry>, Outcome) {
        let mut tracked = Tracked::new(decl.reference());
        let result = match self.registry.get(&decl.kind) {
            Ok(driver) => driver.create(decl, &mut tracked).await,
            Err(e) => Err(e),
        };

        let id = tracked.id().map(str::to_string);
        if result.is_ok() {
            if let Some(id) = &id {
                self.audit.created(&decl.kind, &decl.handle, id, decl.name());
            }
        }
        // A committed id means the object exists even if reading it back failed.
        let entry = id.as_ref().map(|_| StateEntry {
            kind: decl.kind.clone(),
            tracked,
        });
        let outcome = Outcome {
            handle: decl.handle.clone(),
            kind: decl.kind.clone(),
            action: Action::Create.label(),
            id,
            error: result.err().map(|e| format!("{:#}", e)),
        };
        (entry, outcome)
    }

    async fn update(&self, decl: &ResourceDecl, mut entry: StateEntry) -> (StateEntry, Outcome) {
        let result = match self.registry.get(&decl.kind) {
            Ok(driver) => driver.update(decl, &mut entry.tracked).await,
            Err(e) => Err(e),
        };

        let id = entry.tracked.id().map(str::to_string);
        if result.is_ok() {
            self.audit.updated(
                &decl.kind,
                &decl.handle,
                id.as_deref().unwrap_or("-"),
                entry.tracked.revision.cached(),
            );
        }
        let outcome = Outcome {
            handle: decl.handle.clone(),
            kind: decl.kind.clone(),
            action: Action::Update(Vec::new()).label(),
            id,
            error: result.err().map(|e| format!("{:#}", e)),
        };
        (entry, outcome)
    }

    async fn delete(&self, handle: &str, mut entry: StateEntry) -> (Option<StateEntry>, Outcome) {
        let id = entry.tracked.id().map(str::to_string);
        let result = match self.registry.get(&entry.kind) {
            Ok(driver) => driver.delete(&mut entry.tracked).await,
            Err(e) => Err(e),
        };

        let outcome = Outcome {
            handle: handle.to_string(),
            kind: entry.kind.clone(),
            action: Action::Delete.label(),
            id: id.clone(),
            error: result.as_ref().err().map(|e| format!("{:#}", e)),
        };
        match result {
            Ok(()) => {
                self.audit.deleted(&entry.kind, handle, id.as_deref());
                (None, outcome)
            }
            Err(_) => (Some(entry), outcome),
        }
    }
}

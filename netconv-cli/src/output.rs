use netconv_core::RemoteObject;
use serde_json::Value;
use tabled::{Table, Tabled};

use crate::engine::{Outcome, PlannedChange, Report};

#[derive(Tabled)]
pub struct PlanRow {
    #[tabled(rename = "HANDLE")]
    handle: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "ACTION")]
    action: String,
    #[tabled(rename = "DETAIL")]
    detail: String,
}

impl From<&PlannedChange> for PlanRow {
    fn from(change: &PlannedChange) -> Self {
        Self {
            handle: change.handle.clone(),
            kind: change.kind.clone(),
            name: change.name.clone(),
            id: change.id.clone().unwrap_or_else(|| "-".to_string()),
            action: change.action.label().to_string(),
            detail: change.action.detail(),
        }
    }
}

#[derive(Tabled)]
pub struct OutcomeRow {
    #[tabled(rename = "HANDLE")]
    handle: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "ACTION")]
    action: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "RESULT")]
    result: String,
}

impl From<&Outcome> for OutcomeRow {
    fn from(outcome: &Outcome) -> Self {
        Self {
            handle: outcome.handle.clone(),
            kind: outcome.kind.clone(),
            action: outcome.action.to_string(),
            id: outcome.id.clone().unwrap_or_else(|| "-".to_string()),
            result: match &outcome.error {
                Some(e) => format!("failed: {}", e),
                None => "ok".to_string(),
            },
        }
    }
}

#[derive(Tabled)]
pub struct ObjectRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "REVISION")]
    revision: i64,
    #[tabled(rename = "TAGS")]
    tags: String,
}

impl From<&RemoteObject<Value>> for ObjectRow {
    fn from(obj: &RemoteObject<Value>) -> Self {
        Self {
            id: obj.id.clone(),
            name: obj.display_name.clone(),
            revision: obj.revision,
            tags: obj
                .tags
                .iter()
                .map(|t| format!("{}={}", t.scope, t.tag))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

pub fn print_plan(plan: &[PlannedChange]) {
    if plan.is_empty() {
        println!("Nothing declared and nothing tracked");
        return;
    }
    let rows: Vec<PlanRow> = plan.iter().map(PlanRow::from).collect();
    println!("{}", Table::new(rows));
}

pub fn print_report(report: &Report) {
    if report.outcomes.is_empty() {
        println!("No changes");
        return;
    }
    let rows: Vec<OutcomeRow> = report.outcomes.iter().map(OutcomeRow::from).collect();
    println!("{}", Table::new(rows));
    println!(
        "{} succeeded, {} failed",
        report.outcomes.len() - report.failed(),
        report.failed()
    );
}

pub fn print_objects(objects: &[RemoteObject<Value>]) {
    if objects.is_empty() {
        println!("No objects found");
        return;
    }
    let rows: Vec<ObjectRow> = objects.iter().map(ObjectRow::from).collect();
    println!("{}", Table::new(rows));
}

pub fn print_object(kind: &str, obj: &RemoteObject<Value>) -> anyhow::Result<()> {
    println!("ID:          {}", obj.id);
    println!("Kind:        {}", kind);
    println!("Name:        {}", obj.display_name);
    if !obj.description.is_empty() {
        println!("Description: {}", obj.description);
    }
    println!("Revision:    {}", obj.revision);
    if !obj.tags.is_empty() {
        println!("Tags:");
        for tag in &obj.tags {
            println!("  - {}={}", tag.scope, tag.tag);
        }
    }
    if let Value::Object(attributes) = &obj.attributes {
        if !attributes.is_empty() {
            println!("Attributes:");
            println!("{}", serde_json::to_string_pretty(attributes)?);
        }
    }
    Ok(())
}

//! Desired-vs-observed comparison.
//!
//! Only what a declaration actually sets is compared. Fields the server
//! defaults (an empty display name, attributes left unset) never count as
//! drift, otherwise every plan would propose an update.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::model::{DesiredSpec, RemoteObject};

impl<A: Serialize> DesiredSpec<A> {
    /// Names of the fields whose declared value differs from `observed`.
    pub fn divergent_fields(&self, observed: &RemoteObject<A>) -> Vec<String> {
        let mut fields = Vec::new();

        if !self.display_name.is_empty() && self.display_name != observed.display_name {
            fields.push("display_name".to_string());
        }
        if self.description != observed.description {
            fields.push("description".to_string());
        }
        let desired_tags: BTreeSet<_> = self.tags.iter().collect();
        let observed_tags: BTreeSet<_> = observed.tags.iter().collect();
        if desired_tags != observed_tags {
            fields.push("tags".to_string());
        }

        let desired = serde_json::to_value(&self.attributes).unwrap_or(Value::Null);
        let observed = serde_json::to_value(&observed.attributes).unwrap_or(Value::Null);
        if let Value::Object(desired) = desired {
            for (key, want) in desired {
                let have = observed.get(&key).unwrap_or(&Value::Null);
                if !covers(have, &want) {
                    fields.push(key);
                }
            }
        }

        fields
    }

    pub fn diverges_from(&self, observed: &RemoteObject<A>) -> bool {
        !self.divergent_fields(observed).is_empty()
    }
}

/// Whether `have` satisfies every declared part of `want`. Objects are
/// compared over the declared keys only; everything else must be equal.
fn covers(have: &Value, want: &Value) -> bool {
    match (have, want) {
        (_, Value::Null) => true,
        (Value::Object(have), Value::Object(want)) => want
            .iter()
            .all(|(key, want)| covers(have.get(key).unwrap_or(&Value::Null), want)),
        (have, want) => have == want,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{LogicalSwitchAttributes, NsServiceAttributes, NsServiceElement};
    use crate::model::Tag;

    fn observed<A>(name: &str, attributes: A) -> RemoteObject<A> {
        RemoteObject {
            id: "obj-1".to_string(),
            display_name: name.to_string(),
            description: "web tier".to_string(),
            revision: 3,
            tags: vec![Tag::new("env", "prod"), Tag::new("team", "net")],
            attributes,
        }
    }

    #[test]
    fn test_server_defaults_are_not_drift() {
        let spec = DesiredSpec::new(
            "",
            LogicalSwitchAttributes {
                admin_state: Some("UP".to_string()),
                ..Default::default()
            },
        )
        .with_description("web tier")
        .with_tags(vec![Tag::new("team", "net"), Tag::new("env", "prod")]);

        let remote = observed(
            "obj-1",
            LogicalSwitchAttributes {
                admin_state: Some("UP".to_string()),
                replication_mode: Some("MTEP".to_string()),
                vlan: Some(0),
                ..Default::default()
            },
        );
        assert!(!spec.diverges_from(&remote));
    }

    #[test]
    fn test_declared_changes_are_reported() {
        let spec = DesiredSpec::new(
            "web-update",
            LogicalSwitchAttributes {
                admin_state: Some("DOWN".to_string()),
                ..Default::default()
            },
        )
        .with_description("web tier")
        .with_tags(vec![Tag::new("env", "prod")]);

        let remote = observed(
            "web",
            LogicalSwitchAttributes {
                admin_state: Some("UP".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(
            spec.divergent_fields(&remote),
            vec!["display_name", "tags", "admin_state"]
        );
    }

    #[test]
    fn test_nested_attributes_compare_declared_keys_only() {
        let element = NsServiceElement {
            resource_type: "IGMPTypeNSService".to_string(),
            ..Default::default()
        };
        let spec = DesiredSpec::new(
            "igmp",
            NsServiceAttributes {
                nsservice_element: Some(element.clone()),
                ..Default::default()
            },
        )
        .with_description("web tier")
        .with_tags(vec![Tag::new("env", "prod"), Tag::new("team", "net")]);

        let remote = observed(
            "igmp",
            NsServiceAttributes {
                default_service: Some(false),
                nsservice_element: Some(element),
            },
        );
        assert!(!spec.diverges_from(&remote));
    }
}

use serde::{Deserialize, Serialize};

use crate::gateway::ObjectKind;

pub struct MacPool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacPoolAttributes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<MacRange>,
}

/// Inclusive MAC address range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacRange {
    pub start: String,
    pub end: String,
}

impl ObjectKind for MacPool {
    type Attributes = MacPoolAttributes;

    const KEY: &'static str = "mac_pool";
    const NAME: &'static str = "MAC pool";
    const COLLECTION: &'static str = "pools/mac-pools";
}

use serde::{Deserialize, Serialize};

use crate::gateway::ObjectKind;

/// Logical switch attached to a transport zone.
pub struct LogicalSwitch;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalSwitchAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_zone_id: Option<String>,
    /// `UP` or `DOWN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state: Option<String>,
    /// `MTEP` or `SOURCE`; only meaningful on overlay transport zones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_mode: Option<String>,
    /// VLAN id, only on VLAN transport zones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_pool_id: Option<String>,
}

impl ObjectKind for LogicalSwitch {
    type Attributes = LogicalSwitchAttributes;

    const KEY: &'static str = "logical_switch";
    const NAME: &'static str = "logical switch";
    const COLLECTION: &'static str = "logical-switches";
}

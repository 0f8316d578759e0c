use serde::{Deserialize, Serialize};

use crate::gateway::ObjectKind;

/// Logical router (tier-0 or tier-1).
pub struct LogicalRouter;

impl LogicalRouter {
    pub const TIER0: &'static str = "TIER0";
    pub const TIER1: &'static str = "TIER1";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalRouterAttributes {
    /// `TIER0` or `TIER1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_cluster_id: Option<String>,
    /// `ACTIVE_ACTIVE` or `ACTIVE_STANDBY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_availability_mode: Option<String>,
    /// `PREEMPTIVE` or `NON_PREEMPTIVE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover_mode: Option<String>,
}

impl ObjectKind for LogicalRouter {
    type Attributes = LogicalRouterAttributes;

    const KEY: &'static str = "logical_router";
    const NAME: &'static str = "logical router";
    const COLLECTION: &'static str = "logical-routers";
    const FILTER_PARAM: Option<&'static str> = Some("router_type");

    fn discriminator(attributes: &Self::Attributes) -> Option<&str> {
        attributes.router_type.as_deref()
    }
}

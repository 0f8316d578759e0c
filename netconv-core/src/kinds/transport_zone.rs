use serde::{Deserialize, Serialize};

use crate::gateway::ObjectKind;

pub struct TransportZone;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportZoneAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_switch_name: Option<String>,
    /// `OVERLAY` or `VLAN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_switch_mode: Option<String>,
}

impl ObjectKind for TransportZone {
    type Attributes = TransportZoneAttributes;

    const KEY: &'static str = "transport_zone";
    const NAME: &'static str = "transport zone";
    const COLLECTION: &'static str = "transport-zones";
    const FILTER_PARAM: Option<&'static str> = Some("transport_type");

    fn discriminator(attributes: &Self::Attributes) -> Option<&str> {
        attributes.transport_type.as_deref()
    }
}

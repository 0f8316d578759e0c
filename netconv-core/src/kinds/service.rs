use serde::{Deserialize, Serialize};

use crate::gateway::ObjectKind;

/// NS service (IGMP, ICMP, L4 port set, ...). The element's resource type
/// tells the flavors apart.
pub struct NsService;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NsServiceAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_service: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsservice_element: Option<NsServiceElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NsServiceElement {
    /// e.g. `IGMPTypeNSService`, `L4PortSetNSService`, `ICMPTypeNSService`.
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l4_protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<u8>,
}

impl ObjectKind for NsService {
    type Attributes = NsServiceAttributes;

    const KEY: &'static str = "ns_service";
    const NAME: &'static str = "NS service";
    const COLLECTION: &'static str = "ns-services";

    fn discriminator(attributes: &Self::Attributes) -> Option<&str> {
        attributes
            .nsservice_element
            .as_ref()
            .map(|element| element.resource_type.as_str())
    }
}

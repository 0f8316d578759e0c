use serde::{Deserialize, Serialize};

use crate::gateway::{ApiFlavor, ObjectKind};

/// Edge or bridge high-availability cluster profile.
pub struct ClusterProfile;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfileAttributes {
    /// `EdgeHighAvailabilityProfile` or `BridgeHighAvailabilityClusterProfile`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bfd_probe_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bfd_declare_dead_multiple: Option<u32>,
}

impl ObjectKind for ClusterProfile {
    type Attributes = ClusterProfileAttributes;

    const KEY: &'static str = "cluster_profile";
    const NAME: &'static str = "cluster profile";
    const COLLECTION: &'static str = "cluster-profiles";
    const FILTER_PARAM: Option<&'static str> = Some("resource_type");

    fn discriminator(attributes: &Self::Attributes) -> Option<&str> {
        attributes.resource_type.as_deref()
    }
}

/// SpoofGuard profile, managed through the policy API.
pub struct SpoofGuardProfile;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpoofGuardProfileAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_binding_allowlist: Option<bool>,
    /// Policy path, computed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ObjectKind for SpoofGuardProfile {
    type Attributes = SpoofGuardProfileAttributes;

    const KEY: &'static str = "spoofguard_profile";
    const NAME: &'static str = "SpoofGuard profile";
    const COLLECTION: &'static str = "infra/spoofguard-profiles";
    const API: ApiFlavor = ApiFlavor::Policy;
}

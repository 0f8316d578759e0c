//! Catalogue of the remote object kinds netconv manages.
//!
//! Each kind is a zero-sized marker implementing [`ObjectKind`] plus the
//! attribute struct the API flattens next to the common fields. Attributes
//! are optional wherever the server fills in a default, so an unset field in
//! a declaration never shows up as drift.
//!
//! [`ObjectKind`]: crate::gateway::ObjectKind

mod mac_pool;
mod profile;
mod router;
mod service;
mod switch;
mod transport_zone;

pub use mac_pool::{MacPool, MacPoolAttributes, MacRange};
pub use profile::{
    ClusterProfile, ClusterProfileAttributes, SpoofGuardProfile, SpoofGuardProfileAttributes,
};
pub use router::{LogicalRouter, LogicalRouterAttributes};
pub use service::{NsService, NsServiceAttributes, NsServiceElement};
pub use switch::{LogicalSwitch, LogicalSwitchAttributes};
pub use transport_zone::{TransportZone, TransportZoneAttributes};

/// Keys of every kind in the catalogue, in manifest spelling.
pub const KIND_KEYS: &[&str] = &[
    "logical_router",
    "logical_switch",
    "cluster_profile",
    "ns_service",
    "transport_zone",
    "mac_pool",
    "spoofguard_profile",
];

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use netconv_core::kinds::{
    ClusterProfile, LogicalRouter, LogicalSwitch, MacPool, NsService, SpoofGuardProfile,
    TransportZone,
};
use netconv_core::{Gateway, ObjectKind};
use netconv_rest::{ManagerClient, RestGateway};

use crate::driver::{Driver, KindDriver};
use crate::manifest::Manifest;

/// Drivers by kind key.
#[derive(Default, Clone)]
pub struct Registry {
    drivers: BTreeMap<&'static str, Arc<dyn KindDriver>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every kind of the catalogue, talking to one manager.
    pub fn rest(client: Arc<ManagerClient>) -> Self {
        fn driver<K: ObjectKind>(client: &Arc<ManagerClient>) -> Arc<dyn KindDriver> {
            Arc::new(Driver::new(Arc::new(RestGateway::<K>::new(client.clone()))))
        }

        let mut registry = Self::new();
        for driver in [
            driver::<LogicalRouter>(&client),
            driver::<LogicalSwitch>(&client),
            driver::<ClusterProfile>(&client),
            driver::<NsService>(&client),
            driver::<TransportZone>(&client),
            driver::<MacPool>(&client),
            driver::<SpoofGuardProfile>(&client),
        ] {
            registry.insert(driver);
        }
        registry
    }

    #[cfg(test)]
    pub fn with<G: Gateway + 'static>(mut self, gateway: Arc<G>) -> Self {
        self.insert(Arc::new(Driver::new(gateway)));
        self
    }

    fn insert(&mut self, driver: Arc<dyn KindDriver>) {
        self.drivers.insert(driver.key(), driver);
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn KindDriver>> {
        match self.drivers.get(kind) {
            Some(driver) => Ok(driver.clone()),
            None => bail!(
                "unknown kind '{}', expected one of: {}",
                kind,
                self.kinds().collect::<Vec<_>>().join(", ")
            ),
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.drivers.keys().copied()
    }

    /// Check every declaration's kind and attributes before anything is sent.
    pub fn validate(&self, manifest: &Manifest) -> Result<()> {
        for decl in &manifest.resource {
            self.get(&decl.kind)?.validate(decl)?;
        }
        Ok(())
    }
}

//! Table of facade constructors, keyed by name and version.

use std::collections::HashMap;
use std::sync::Arc;

use rebootd_shared::errors::{RebootError, RebootResult};

use super::{CallerIdentity, RebootFacade};
use crate::flag::FlagStore;

/// Name the reboot facade is registered under.
pub const REBOOT_FACADE: &str = "Reboot";

/// Builds a facade for one caller.
pub type FacadeFactory =
    Arc<dyn Fn(Arc<dyn FlagStore>, CallerIdentity) -> RebootResult<RebootFacade> + Send + Sync>;

/// Registry of facade constructors.
///
/// Populated explicitly at start-up (see [`register_standard_facades`]) and
/// owned by whoever serves callers; there is no process-wide table.
pub struct FacadeRegistry {
    store: Arc<dyn FlagStore>,
    factories: HashMap<(String, u32), FacadeFactory>,
}

impl FacadeRegistry {
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self {
            store,
            factories: HashMap::new(),
        }
    }

    /// Register a constructor under `(name, version)`.
    ///
    /// # Errors
    ///
    /// `InvalidState` if that name and version are already taken.
    pub fn register(
        &mut self,
        name: &str,
        version: u32,
        factory: FacadeFactory,
    ) -> RebootResult<()> {
        let key = (name.to_string(), version);
        if self.factories.contains_key(&key) {
            return Err(RebootError::InvalidState(format!(
                "facade {} version {} is already registered",
                name, version
            )));
        }

        tracing::debug!(facade = name, version, "Registered facade");
        self.factories.insert(key, factory);
        Ok(())
    }

    /// Open facade `(name, version)` for `identity`.
    pub fn open(
        &self,
        name: &str,
        version: u32,
        identity: CallerIdentity,
    ) -> RebootResult<RebootFacade> {
        let factory = self
            .factories
            .get(&(name.to_string(), version))
            .ok_or_else(|| {
                RebootError::NotFound(format!("facade {} version {}", name, version))
            })?;
        factory(self.store.clone(), identity)
    }

    /// Registered `(name, version)` pairs, sorted.
    pub fn facades(&self) -> Vec<(String, u32)> {
        let mut keys: Vec<_> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Register every facade this crate serves.
pub fn register_standard_facades(registry: &mut FacadeRegistry) -> RebootResult<()> {
    registry.register(
        REBOOT_FACADE,
        0,
        Arc::new(
            |store: Arc<dyn FlagStore>, identity: CallerIdentity| -> RebootResult<RebootFacade> {
                Ok(RebootFacade::new(store, identity))
            },
        ),
    )
}

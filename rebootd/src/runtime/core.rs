//! Reboot runtime entry point.

use std::sync::Arc;

use crate::facade::{CallerIdentity, FacadeRegistry, REBOOT_FACADE, RebootFacade};
use crate::flag::FlagStore;
use crate::node::{Life, NodeId};
use crate::runtime::layout::FilesystemLayout;
use crate::runtime::options::RebootdOptions;
use crate::runtime::rt_impl::{RuntimeImpl, SharedRuntimeImpl};
use crate::worker::{ContainerLister, RebootMarker, RebootWorker, ShutdownExecutor};
use rebootd_shared::errors::RebootResult;

/// Version of the reboot facade this runtime hands out.
const REBOOT_FACADE_VERSION: u32 = 0;

/// RebootRuntime ties the store, the facade registry and the on-disk
/// layout together.
///
/// **Cloning**: cheap via `Arc`; all clones share the same state.
#[derive(Clone)]
pub struct RebootRuntime {
    rt_impl: SharedRuntimeImpl,
}

impl RebootRuntime {
    /// Create a runtime with the provided options.
    ///
    /// All setup (filesystem, logging, database, facades) completes before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `home_dir` is not absolute or the worker options are inconsistent
    /// - The home directory or database cannot be initialized
    pub fn new(options: RebootdOptions) -> RebootResult<Self> {
        Ok(Self {
            rt_impl: RuntimeImpl::new(options)?,
        })
    }

    /// Create a runtime with default options.
    ///
    /// ```no_run
    /// use rebootd::RebootRuntime;
    ///
    /// let runtime = RebootRuntime::with_defaults()?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn with_defaults() -> RebootResult<Self> {
        Self::new(RebootdOptions::default())
    }

    pub fn layout(&self) -> &FilesystemLayout {
        &self.rt_impl.layout
    }

    pub fn options(&self) -> &RebootdOptions {
        &self.rt_impl.options
    }

    pub fn store(&self) -> Arc<dyn FlagStore> {
        self.rt_impl.store.clone()
    }

    pub fn registry(&self) -> &FacadeRegistry {
        &self.rt_impl.registry
    }

    /// Open the reboot facade for `identity`.
    pub fn facade(&self, identity: CallerIdentity) -> RebootResult<RebootFacade> {
        self.rt_impl
            .registry
            .open(REBOOT_FACADE, REBOOT_FACADE_VERSION, identity)
    }

    // ========================================================================
    // NODE LIFECYCLE
    // ========================================================================

    /// Register a node. Returns `false` if it already existed.
    pub fn add_node(&self, id: &NodeId) -> RebootResult<bool> {
        self.rt_impl.store.add_node(id)
    }

    pub fn set_life(&self, id: &NodeId, life: Life) -> RebootResult<()> {
        self.rt_impl.store.set_life(id, life)
    }

    /// Build the execution worker for `machine`, using this runtime's marker
    /// file and worker options.
    pub fn worker(
        &self,
        machine: &NodeId,
        lister: Arc<dyn ContainerLister>,
        executor: Arc<dyn ShutdownExecutor>,
    ) -> RebootResult<RebootWorker> {
        let facade = self.facade(CallerIdentity::Machine(machine.clone()))?;
        RebootWorker::new(
            facade,
            lister,
            executor,
            RebootMarker::new(self.rt_impl.layout.marker_path()),
            self.rt_impl.options.worker.clone(),
        )
    }
}

impl std::fmt::Debug for RebootRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebootRuntime")
            .field("home_dir", &self.rt_impl.layout.home_dir())
            .finish()
    }
}

// Compile-time assertion that the runtime can be shared across tasks
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<RebootRuntime>;
};

use std::sync::Arc;

use crate::db::Database;
use crate::facade::{FacadeRegistry, register_standard_facades};
use crate::flag::{FlagStore, SqliteFlagStore};
use crate::init_logging_for;
use crate::runtime::layout::FilesystemLayout;
use crate::runtime::options::RebootdOptions;
use rebootd_shared::errors::{RebootError, RebootResult};

/// Shared via Arc; see [`RuntimeImpl`].
pub type SharedRuntimeImpl = Arc<RuntimeImpl>;

/// Runtime state. Everything here is immutable after construction or
/// synchronized internally, so no runtime-level lock is needed.
pub struct RuntimeImpl {
    /// Filesystem layout (immutable after init)
    pub(crate) layout: FilesystemLayout,
    pub(crate) options: RebootdOptions,
    /// Flag store over the runtime database
    pub(crate) store: Arc<dyn FlagStore>,
    /// Facades served by this runtime, registered at construction
    pub(crate) registry: FacadeRegistry,
}

impl RuntimeImpl {
    /// Prepare the home directory, logging and database, then register the
    /// standard facades.
    pub fn new(options: RebootdOptions) -> RebootResult<SharedRuntimeImpl> {
        options.validate()?;

        let layout = FilesystemLayout::new(options.home_dir.clone());
        layout.prepare().map_err(|e| {
            RebootError::Storage(format!(
                "Failed to initialize filesystem at {}: {}",
                layout.home_dir().display(),
                e
            ))
        })?;

        init_logging_for(&layout)?;

        let db_path = layout.db_path();
        let db = Database::open(&db_path).map_err(|e| {
            RebootError::Storage(format!(
                "Failed to initialize database at {}: {}",
                db_path.display(),
                e
            ))
        })?;

        let store: Arc<dyn FlagStore> = Arc::new(SqliteFlagStore::new(db));
        let mut registry = FacadeRegistry::new(store.clone());
        register_standard_facades(&mut registry)?;

        tracing::debug!(
            home_dir = %layout.home_dir().display(),
            facades = ?registry.facades(),
            "Initialized runtime"
        );

        Ok(Arc::new(Self {
            layout,
            options,
            store,
            registry,
        }))
    }
}

//! Reboot coordination library.
//!
//! This crate tracks "reboot requested" flags across a tree of machines and
//! nested containers, resolves them into one action per node, and runs the
//! host-side shutdown sequence.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

// Global guard for tracing-appender to keep the writer thread alive
static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

pub mod action;
pub mod facade;
pub mod flag;
pub mod node;
pub mod runtime;
pub mod util;
pub mod worker;

mod db;

pub use action::{RebootAction, resolve};
pub use db::Database;
pub use facade::{
    CallerIdentity, FacadeRegistry, RebootActionResult, RebootFacade, RebootPriority,
    register_standard_facades,
};
pub use flag::{FlagStore, FlagWatcher, InMemoryFlagStore, SqliteFlagStore};
pub use node::{ContainerType, Life, NodeId};
pub use runtime::RebootRuntime;
pub use runtime::options::{QuiesceTimeouts, RebootdOptions, WorkerOptions};
pub use worker::{RebootWorker, WorkerExit};

pub use rebootd_shared::errors::{RebootError, RebootResult};
use runtime::layout::{FilesystemLayout, filenames};

/// Initialize tracing for rebootd using the provided filesystem layout.
///
/// Logs are written to `<layout.home_dir()>/logs/rebootd.log` with daily rotation.
/// Uses the `RUST_LOG` environment variable for filtering (defaults to `info`).
/// Idempotent: subsequent calls return immediately once initialized.
pub fn init_logging_for(layout: &FilesystemLayout) -> RebootResult<()> {
    let logs_dir = layout.logs_dir();
    std::fs::create_dir_all(&logs_dir).map_err(|e| {
        RebootError::Storage(format!(
            "Failed to create logs directory {}: {}",
            logs_dir.display(),
            e
        ))
    })?;

    let _ = LOG_GUARD.get_or_init(|| {
        let file_appender = tracing_appender::rolling::daily(logs_dir, filenames::LOG);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        // A subscriber installed by the host process wins; ours is dropped.
        util::register_to_tracing(non_blocking, env_filter);

        guard
    });

    Ok(())
}

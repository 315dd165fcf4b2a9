//! Reboot flag storage.
//!
//! This module provides the store that records one "reboot requested" flag
//! per node, together with the node entities the flags belong to, and a
//! per-node change feed.
//!
//! Two implementations are provided:
//! - [`InMemoryFlagStore`]: Single-process store for testing and embedding
//! - [`SqliteFlagStore`]: Durable store backed by SQLite

mod memory;
mod sqlite;
mod watch;

pub use memory::InMemoryFlagStore;
pub use sqlite::SqliteFlagStore;
pub use watch::FlagWatcher;

pub(crate) use watch::WatchHub;

use std::collections::HashMap;

use crate::node::{Life, NodeId};
use rebootd_shared::errors::RebootResult;

/// Store of per-node reboot flags.
///
/// Every write is an atomic conditional write: it only succeeds while the
/// node exists and is not dead, and it never loses a concurrent update.
/// Callers do no locking of their own.
///
/// # Flag Lifecycle
///
/// 1. The platform registers nodes with [`add_node`](FlagStore::add_node)
/// 2. [`set_flag(id, true)`](FlagStore::set_flag) records a reboot request
/// 3. Watchers of `id` are notified once per actual change
/// 4. [`set_flag(id, false)`](FlagStore::set_flag) clears it again
pub trait FlagStore: Send + Sync {
    /// Register a node as alive.
    ///
    /// Returns `false` if it was already registered. A nested node's parent
    /// must be registered and not dead.
    fn add_node(&self, id: &NodeId) -> RebootResult<bool>;

    /// Move a node forward in its lifecycle.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown nodes, `InvalidState` for backward moves.
    fn set_life(&self, id: &NodeId, life: Life) -> RebootResult<()>;

    /// Current life of a node, `None` if it was never registered.
    fn node_life(&self, id: &NodeId) -> RebootResult<Option<Life>>;

    /// Set or clear a node's flag.
    ///
    /// Idempotent. Returns whether the stored value changed; watchers are
    /// only notified when it did.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node is unknown or dead.
    fn set_flag(&self, id: &NodeId, flag: bool) -> RebootResult<bool>;

    /// Read a node's flag. Nodes without a record read as `false`.
    fn get_flag(&self, id: &NodeId) -> RebootResult<bool>;

    /// Read several flags at once. Ids without a record are left out.
    fn get_flags(&self, ids: &[NodeId]) -> RebootResult<HashMap<NodeId, bool>>;

    /// Watch a node's flag.
    ///
    /// The first event is delivered immediately so a new watcher can compute
    /// a starting state; every later event corresponds to one change.
    fn watch(&self, id: &NodeId) -> RebootResult<FlagWatcher>;

    /// Watch a node's flag and the flags of all its ancestors.
    ///
    /// One initial event, then one event per change to any flag in the
    /// chain. This is what a node needs to notice its action changing.
    fn watch_chain(&self, id: &NodeId) -> RebootResult<FlagWatcher>;
}

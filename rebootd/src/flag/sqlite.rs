//! SQLite-backed flag store.

use std::collections::HashMap;

use rebootd_shared::errors::{RebootError, RebootResult};

use super::{FlagStore, FlagWatcher, WatchHub};
use crate::db::{Database, FlagTable};
use crate::node::{Life, NodeId};

/// Durable flag store.
///
/// Writes go through [`FlagTable`], which runs each conditional write in a
/// single transaction. Watchers are notified after the commit and only
/// when the value changed. Notifications are process-local: watchers in
/// other processes sharing the database file are not woken.
#[derive(Clone)]
pub struct SqliteFlagStore {
    table: FlagTable,
    hub: WatchHub,
}

impl SqliteFlagStore {
    pub fn new(db: Database) -> Self {
        Self {
            table: FlagTable::new(db),
            hub: WatchHub::new(),
        }
    }
}

impl FlagStore for SqliteFlagStore {
    fn add_node(&self, id: &NodeId) -> RebootResult<bool> {
        let added = self.table.add_node(id)?;
        if added {
            tracing::debug!(node_id = %id, "Registered node");
        }
        Ok(added)
    }

    fn set_life(&self, id: &NodeId, life: Life) -> RebootResult<()> {
        self.table.set_life(id, life)?;
        tracing::debug!(node_id = %id, life = %life, "Updated node life");
        Ok(())
    }

    fn node_life(&self, id: &NodeId) -> RebootResult<Option<Life>> {
        self.table.node_life(id)
    }

    fn set_flag(&self, id: &NodeId, flag: bool) -> RebootResult<bool> {
        let changed = self.table.set_flag(id, flag)?;
        if changed {
            tracing::debug!(node_id = %id, flag, "Reboot flag changed");
            self.hub.publish(id);
        }
        Ok(changed)
    }

    fn get_flag(&self, id: &NodeId) -> RebootResult<bool> {
        self.table.get_flag(id)
    }

    fn get_flags(&self, ids: &[NodeId]) -> RebootResult<HashMap<NodeId, bool>> {
        self.table.get_flags(ids)
    }

    fn watch(&self, id: &NodeId) -> RebootResult<FlagWatcher> {
        if self.table.node_life(id)?.is_none() {
            return Err(RebootError::NotFound(format!("node {}", id)));
        }
        Ok(self.hub.subscribe(std::slice::from_ref(id)))
    }

    fn watch_chain(&self, id: &NodeId) -> RebootResult<FlagWatcher> {
        if self.table.node_life(id)?.is_none() {
            return Err(RebootError::NotFound(format!("node {}", id)));
        }
        Ok(self.hub.subscribe(&id.ancestor_chain()))
    }
}

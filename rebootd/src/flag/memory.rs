//! In-memory flag store.
//!
//! Nothing survives the process. Used by tests and by embedders that keep
//! their own persistence.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use rebootd_shared::errors::{RebootError, RebootResult};

use super::{FlagStore, FlagWatcher, WatchHub};
use crate::node::{Life, NodeId};

/// In-memory flag store.
///
/// All operations run under one mutex, which makes each conditional write
/// atomic.
///
/// # Example
///
/// ```
/// use rebootd::flag::{FlagStore, InMemoryFlagStore};
/// use rebootd::node::NodeId;
///
/// let store = InMemoryFlagStore::new();
/// let machine = NodeId::machine(0);
/// store.add_node(&machine).unwrap();
///
/// assert!(store.set_flag(&machine, true).unwrap());
/// assert!(store.get_flag(&machine).unwrap());
/// ```
#[derive(Default)]
pub struct InMemoryFlagStore {
    state: Mutex<MemoryState>,
    hub: WatchHub,
}

#[derive(Default)]
struct MemoryState {
    nodes: HashMap<NodeId, Life>,
    flags: HashSet<NodeId>,
}

impl InMemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagStore for InMemoryFlagStore {
    fn add_node(&self, id: &NodeId) -> RebootResult<bool> {
        let mut state = self.state.lock();

        if let Some(parent) = id.parent() {
            match state.nodes.get(&parent) {
                Some(life) if !life.is_dead() => {}
                _ => {
                    return Err(RebootError::NotFound(format!(
                        "parent node {} of {}",
                        parent, id
                    )));
                }
            }
        }

        if state.nodes.contains_key(id) {
            return Ok(false);
        }
        state.nodes.insert(id.clone(), Life::Alive);
        Ok(true)
    }

    fn set_life(&self, id: &NodeId, life: Life) -> RebootResult<()> {
        let mut state = self.state.lock();
        let current = state
            .nodes
            .get_mut(id)
            .ok_or_else(|| RebootError::NotFound(format!("node {}", id)))?;

        if !current.can_transition_to(life) {
            return Err(RebootError::InvalidState(format!(
                "node {} cannot go from {} to {}",
                id, current, life
            )));
        }
        *current = life;
        Ok(())
    }

    fn node_life(&self, id: &NodeId) -> RebootResult<Option<Life>> {
        Ok(self.state.lock().nodes.get(id).copied())
    }

    fn set_flag(&self, id: &NodeId, flag: bool) -> RebootResult<bool> {
        let changed = {
            let mut state = self.state.lock();
            match state.nodes.get(id) {
                Some(life) if !life.is_dead() => {}
                Some(_) => return Err(RebootError::NotFound(format!("node {} is dead", id))),
                None => return Err(RebootError::NotFound(format!("node {}", id))),
            }

            if flag {
                state.flags.insert(id.clone())
            } else {
                state.flags.remove(id)
            }
        };

        if changed {
            self.hub.publish(id);
        }
        Ok(changed)
    }

    fn get_flag(&self, id: &NodeId) -> RebootResult<bool> {
        Ok(self.state.lock().flags.contains(id))
    }

    fn get_flags(&self, ids: &[NodeId]) -> RebootResult<HashMap<NodeId, bool>> {
        let state = self.state.lock();
        Ok(ids
            .iter()
            .filter(|id| state.flags.contains(*id))
            .map(|id| (id.clone(), true))
            .collect())
    }

    fn watch(&self, id: &NodeId) -> RebootResult<FlagWatcher> {
        if !self.state.lock().nodes.contains_key(id) {
            return Err(RebootError::NotFound(format!("node {}", id)));
        }
        Ok(self.hub.subscribe(std::slice::from_ref(id)))
    }

    fn watch_chain(&self, id: &NodeId) -> RebootResult<FlagWatcher> {
        if !self.state.lock().nodes.contains_key(id) {
            return Err(RebootError::NotFound(format!("node {}", id)));
        }
        Ok(self.hub.subscribe(&id.ancestor_chain()))
    }
}

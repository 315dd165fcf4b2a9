//! Single-purpose building blocks the reboot facade is composed of.
//!
//! Each piece holds the flag store and an authorization function, and
//! handles a batch of nodes with one independently authorized result per
//! node.

use std::sync::Arc;

use rebootd_shared::errors::{RebootError, RebootResult};

use super::RebootActionResult;
use super::auth::AuthFunc;
use crate::action::{RebootAction, resolve};
use crate::flag::FlagStore;
use crate::node::NodeId;

fn permission_denied(node: &NodeId) -> RebootError {
    RebootError::PermissionDenied(format!("access to node {} denied", node))
}

/// Computes the reboot action for nodes.
pub struct RebootActionGetter {
    store: Arc<dyn FlagStore>,
    can_access: AuthFunc,
}

impl RebootActionGetter {
    pub fn new(store: Arc<dyn FlagStore>, can_access: AuthFunc) -> Self {
        Self { store, can_access }
    }

    pub fn get_reboot_action(&self, nodes: &[NodeId]) -> Vec<RebootActionResult> {
        nodes
            .iter()
            .map(|node| match self.action_for(node) {
                Ok(action) => RebootActionResult::ok(action),
                Err(e) => {
                    tracing::debug!(node_id = %node, error = %e, "Failed to get reboot action");
                    RebootActionResult::err(e)
                }
            })
            .collect()
    }

    fn action_for(&self, node: &NodeId) -> RebootResult<RebootAction> {
        if !(self.can_access)(node) {
            return Err(permission_denied(node));
        }
        if self.store.node_life(node)?.is_none() {
            return Err(RebootError::NotFound(format!("node {}", node)));
        }

        let chain = node.ancestor_chain();
        let flags = self.store.get_flags(&chain)?;
        Ok(resolve(node, &chain, &flags))
    }
}

/// Sets reboot flags.
pub struct RebootRequester {
    store: Arc<dyn FlagStore>,
    can_access: AuthFunc,
}

impl RebootRequester {
    pub fn new(store: Arc<dyn FlagStore>, can_access: AuthFunc) -> Self {
        Self { store, can_access }
    }

    pub fn request_reboot(&self, nodes: &[NodeId]) -> Vec<RebootResult<()>> {
        nodes
            .iter()
            .map(|node| {
                if !(self.can_access)(node) {
                    return Err(permission_denied(node));
                }
                if self.store.set_flag(node, true)? {
                    tracing::info!(node_id = %node, "Reboot requested");
                }
                Ok(())
            })
            .collect()
    }
}

/// Clears reboot flags.
pub struct RebootFlagClearer {
    store: Arc<dyn FlagStore>,
    can_access: AuthFunc,
}

impl RebootFlagClearer {
    pub fn new(store: Arc<dyn FlagStore>, can_access: AuthFunc) -> Self {
        Self { store, can_access }
    }

    pub fn clear_reboot(&self, nodes: &[NodeId]) -> Vec<RebootResult<()>> {
        nodes
            .iter()
            .map(|node| {
                if !(self.can_access)(node) {
                    return Err(permission_denied(node));
                }
                if self.store.set_flag(node, false)? {
                    tracing::info!(node_id = %node, "Reboot flag cleared");
                }
                Ok(())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::InMemoryFlagStore;

    fn id(s: &str) -> NodeId {
        NodeId::parse(s).unwrap()
    }

    fn store() -> Arc<dyn FlagStore> {
        let store = InMemoryFlagStore::new();
        store.add_node(&id("0")).unwrap();
        store.add_node(&id("1")).unwrap();
        Arc::new(store)
    }

    fn allow_all() -> AuthFunc {
        Arc::new(|_: &NodeId| true)
    }

    #[test]
    fn test_results_follow_input_order() {
        let store = store();
        let only_zero: AuthFunc = Arc::new(|n: &NodeId| n.as_str() == "0");
        let requester = RebootRequester::new(store.clone(), only_zero);

        let results = requester.request_reboot(&[id("1"), id("0"), id("7")]);
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap_err().is_permission_denied());
        assert!(results[1].is_ok());
        assert!(results[2].as_ref().unwrap_err().is_permission_denied());

        // A denied entry does not stop the others
        assert!(store.get_flag(&id("0")).unwrap());
        assert!(!store.get_flag(&id("1")).unwrap());
    }

    #[test]
    fn test_unknown_node_is_not_found() {
        let getter = RebootActionGetter::new(store(), allow_all());
        let results = getter.get_reboot_action(&[id("9")]);
        assert_eq!(results[0].action, RebootAction::DoNothing);
        assert!(results[0].error.as_ref().unwrap().is_not_found());

        let requester = RebootRequester::new(store(), allow_all());
        assert!(requester.request_reboot(&[id("9")])[0]
            .as_ref()
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_clearer_resets_flag() {
        let store = store();
        RebootRequester::new(store.clone(), allow_all()).request_reboot(&[id("0")]);

        let clearer = RebootFlagClearer::new(store.clone(), allow_all());
        assert!(clearer.clear_reboot(&[id("0")])[0].is_ok());
        assert!(!store.get_flag(&id("0")).unwrap());

        // Clearing again is a no-op
        assert!(clearer.clear_reboot(&[id("0")])[0].is_ok());
    }
}

//! Caller identities and the authorization postures derived from them.

use std::fmt;
use std::sync::Arc;

use crate::node::NodeId;

/// Identity a facade is opened for.
///
/// Authentication happens upstream; callers arrive with an identity that
/// has already been established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    /// A machine agent acting on its own node. Owner posture.
    Machine(NodeId),
    /// A unit agent hosted on `host`. Subordinate posture.
    Unit { unit: String, host: NodeId },
}

impl CallerIdentity {
    /// Node the caller lives on: the machine itself, or the unit's host.
    pub fn machine(&self) -> &NodeId {
        match self {
            CallerIdentity::Machine(id) => id,
            CallerIdentity::Unit { host, .. } => host,
        }
    }

    /// Whether this identity holds the owner posture.
    pub fn is_owner(&self) -> bool {
        matches!(self, CallerIdentity::Machine(_))
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerIdentity::Machine(id) => write!(f, "machine {}", id),
            CallerIdentity::Unit { unit, host } => write!(f, "unit {} on {}", unit, host),
        }
    }
}

/// Decides whether a caller may touch a given node.
pub type AuthFunc = Arc<dyn Fn(&NodeId) -> bool + Send + Sync>;

/// Authorization for watch, request and get-action.
///
/// Both postures may address their own machine and nothing else.
pub(crate) fn access_own_machine(identity: &CallerIdentity) -> AuthFunc {
    let machine = identity.machine().clone();
    Arc::new(move |target: &NodeId| *target == machine)
}

/// Authorization for clearing a flag. Only the owner may clear, and only
/// its own node.
pub(crate) fn access_clear(identity: &CallerIdentity) -> AuthFunc {
    match identity {
        CallerIdentity::Machine(id) => {
            let machine = id.clone();
            Arc::new(move |target: &NodeId| *target == machine)
        }
        CallerIdentity::Unit { .. } => Arc::new(|_: &NodeId| false),
    }
}

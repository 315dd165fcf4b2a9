//! Reboot action resolution.
//!
//! A node's action is never stored. It is recomputed from the flags of the
//! node and its ancestors every time it is asked for.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// What a node should do about pending reboot requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebootAction {
    /// Neither the node nor any ancestor has requested a reboot.
    #[default]
    DoNothing,

    /// The node's own flag is set.
    Reboot,

    /// An ancestor's flag is set; the node must go down with it.
    Shutdown,
}

impl RebootAction {
    /// Whether the action requires the node to go down.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, RebootAction::DoNothing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RebootAction::DoNothing => "do-nothing",
            RebootAction::Reboot => "reboot",
            RebootAction::Shutdown => "shutdown",
        }
    }
}

impl std::str::FromStr for RebootAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "do-nothing" => Ok(RebootAction::DoNothing),
            "reboot" => Ok(RebootAction::Reboot),
            "shutdown" => Ok(RebootAction::Shutdown),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for RebootAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolve the action for `node` from pre-fetched flags.
///
/// `chain` is the node's ancestor chain (it may include the node itself,
/// which is skipped when looking at ancestors). Ids missing from `flags`
/// count as unset. A node's own flag wins over any ancestor's.
pub fn resolve(node: &NodeId, chain: &[NodeId], flags: &HashMap<NodeId, bool>) -> RebootAction {
    let is_set = |id: &NodeId| flags.get(id).copied().unwrap_or(false);

    if is_set(node) {
        return RebootAction::Reboot;
    }

    let ancestor_flagged = chain
        .iter()
        .filter(|id| id.is_ancestor_of(node))
        .any(is_set);

    if ancestor_flagged {
        RebootAction::Shutdown
    } else {
        RebootAction::DoNothing
    }
}

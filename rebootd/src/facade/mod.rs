//! Per-caller reboot API.
//!
//! A [`RebootFacade`] is opened for one [`CallerIdentity`] and exposes the
//! four reboot operations with the posture that identity implies:
//!
//! | operation        | machine (owner) | unit (subordinate) |
//! |------------------|-----------------|--------------------|
//! | watch            | own node        | host machine       |
//! | request reboot   | own node        | host machine       |
//! | get action       | own node        | host machine       |
//! | clear reboot     | own node        | never              |

mod auth;
mod common;
mod registry;

pub use auth::{AuthFunc, CallerIdentity};
pub use common::{RebootActionGetter, RebootFlagClearer, RebootRequester};
pub use registry::{FacadeFactory, FacadeRegistry, REBOOT_FACADE, register_standard_facades};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rebootd_shared::errors::{RebootError, RebootResult};

use crate::action::RebootAction;
use crate::flag::{FlagStore, FlagWatcher};
use crate::node::NodeId;

/// Per-node outcome of [`RebootFacade::get_reboot_action`].
///
/// On error `action` is left at `DoNothing`; use
/// [`into_result`](RebootActionResult::into_result) so the default is never
/// acted on by mistake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebootActionResult {
    pub action: RebootAction,
    pub error: Option<RebootError>,
}

impl RebootActionResult {
    pub fn ok(action: RebootAction) -> Self {
        Self {
            action,
            error: None,
        }
    }

    pub fn err(error: RebootError) -> Self {
        Self {
            action: RebootAction::DoNothing,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> RebootResult<RebootAction> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.action),
        }
    }
}

/// How urgently a unit wants its machine rebooted.
///
/// The facade only records the flag. The priority is carried for callers
/// that decide when to stop their own work before the machine goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebootPriority {
    /// Reboot once the current hook has finished.
    #[default]
    AfterHook,
    /// Reboot right away, interrupting the current hook.
    Now,
}

impl RebootPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebootPriority::AfterHook => "after-hook",
            RebootPriority::Now => "now",
        }
    }
}

impl FromStr for RebootPriority {
    type Err = RebootError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "after-hook" => Ok(RebootPriority::AfterHook),
            "now" => Ok(RebootPriority::Now),
            _ => Err(RebootError::InvalidArgument(format!(
                "unknown reboot priority '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for RebootPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reboot API bound to one caller.
///
/// Batched operations return one result per input node, in input order.
/// Each node is authorized and applied on its own; there is no atomicity
/// across nodes.
pub struct RebootFacade {
    identity: CallerIdentity,
    store: Arc<dyn FlagStore>,
    can_watch: AuthFunc,
    getter: RebootActionGetter,
    requester: RebootRequester,
    clearer: RebootFlagClearer,
}

impl RebootFacade {
    pub fn new(store: Arc<dyn FlagStore>, identity: CallerIdentity) -> Self {
        let can_access = auth::access_own_machine(&identity);
        let can_clear = auth::access_clear(&identity);

        Self {
            getter: RebootActionGetter::new(store.clone(), can_access.clone()),
            requester: RebootRequester::new(store.clone(), can_access.clone()),
            clearer: RebootFlagClearer::new(store.clone(), can_clear),
            can_watch: can_access,
            store,
            identity,
        }
    }

    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    /// Watch `node` for changes that may alter its action: its own flag or
    /// any ancestor's.
    ///
    /// The initial event is consumed here, so the returned watcher only
    /// yields real changes.
    pub fn watch_for_reboot_event(&self, node: &NodeId) -> RebootResult<FlagWatcher> {
        if !(self.can_watch)(node) {
            return Err(RebootError::PermissionDenied(format!(
                "{} may not watch node {}",
                self.identity, node
            )));
        }

        let mut watcher = self.store.watch_chain(node)?;
        if watcher.try_changed().is_none() {
            return Err(RebootError::Internal(format!(
                "watcher for node {} closed before its initial event",
                node
            )));
        }
        Ok(watcher)
    }

    pub fn request_reboot(&self, nodes: &[NodeId]) -> Vec<RebootResult<()>> {
        self.requester.request_reboot(nodes)
    }

    pub fn clear_reboot(&self, nodes: &[NodeId]) -> Vec<RebootResult<()>> {
        self.clearer.clear_reboot(nodes)
    }

    pub fn get_reboot_action(&self, nodes: &[NodeId]) -> Vec<RebootActionResult> {
        self.getter.get_reboot_action(nodes)
    }

    // ========================================================================
    // Single-target forms on the caller's own machine
    // ========================================================================

    pub fn watch_machine(&self) -> RebootResult<FlagWatcher> {
        self.watch_for_reboot_event(self.identity.machine())
    }

    pub fn request_machine_reboot(&self) -> RebootResult<()> {
        single(self.request_reboot(std::slice::from_ref(self.identity.machine())))?
    }

    pub fn clear_machine_reboot(&self) -> RebootResult<()> {
        single(self.clear_reboot(std::slice::from_ref(self.identity.machine())))?
    }

    pub fn machine_reboot_action(&self) -> RebootResult<RebootAction> {
        single(self.get_reboot_action(std::slice::from_ref(self.identity.machine())))
            .and_then(RebootActionResult::into_result)
    }
}

fn single<T>(results: Vec<T>) -> RebootResult<T> {
    let mut results = results.into_iter();
    match (results.next(), results.next()) {
        (Some(result), None) => Ok(result),
        _ => Err(RebootError::Internal(
            "expected exactly one result for a single-node call".into(),
        )),
    }
}

impl fmt::Debug for RebootFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RebootFacade")
            .field("identity", &self.identity)
            .finish()
    }
}

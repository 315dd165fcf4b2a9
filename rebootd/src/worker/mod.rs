//! Per-machine reboot execution.
//!
//! The worker watches its machine's reboot action. When the action becomes
//! `Reboot` or `Shutdown` it runs the shutdown sequence:
//!
//! 1. Wait (bounded) for containers on the machine to stop
//! 2. Record the host uptime in the marker file
//! 3. Clear the machine's flag
//! 4. After a short delay, reboot or halt the host
//!
//! On start the marker is checked first. A sequence that ended in a reboot
//! is finished off on the way back up; one that never took the host down
//! is issued again.

mod containers;
mod marker;
mod quiesce;
mod shutdown;

pub use containers::{
    CommandContainerLister, ContainerLister, DEFAULT_CONTAINER_PREFIX, MAX_NESTING_LEVEL,
    kvm_available, managed_prefix, supported_containers,
};
pub use marker::{MarkerRecord, MarkerState, RebootMarker, SystemUptime, UptimeSource};
pub use quiesce::{QuiesceOutcome, wait_for_containers};
pub use shutdown::{DryRunShutdown, ShutdownExecutor, SystemShutdown};

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::action::RebootAction;
use crate::facade::{CallerIdentity, RebootFacade};
use crate::node::NodeId;
use crate::runtime::options::WorkerOptions;
use rebootd_shared::errors::{RebootError, RebootResult};

/// Why [`RebootWorker::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Stopped by the caller, or the flag feed ended.
    Cancelled,
    /// The OS action was issued.
    Executed(RebootAction),
}

/// Reboot execution worker for one machine.
pub struct RebootWorker {
    node: NodeId,
    facade: RebootFacade,
    lister: Arc<dyn ContainerLister>,
    executor: Arc<dyn ShutdownExecutor>,
    marker: RebootMarker,
    uptime: Arc<dyn UptimeSource>,
    kvm_available: bool,
    options: WorkerOptions,
}

impl RebootWorker {
    /// Build a worker around an owner-posture facade.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the facade was not opened for a machine.
    pub fn new(
        facade: RebootFacade,
        lister: Arc<dyn ContainerLister>,
        executor: Arc<dyn ShutdownExecutor>,
        marker: RebootMarker,
        options: WorkerOptions,
    ) -> RebootResult<Self> {
        let node = match facade.identity() {
            CallerIdentity::Machine(id) => id.clone(),
            other => {
                return Err(RebootError::InvalidArgument(format!(
                    "reboot worker needs a machine identity, got {}",
                    other
                )));
            }
        };
        options.validate()?;

        Ok(Self {
            node,
            facade,
            lister,
            executor,
            marker,
            uptime: Arc::new(SystemUptime),
            kvm_available: kvm_available(),
            options,
        })
    }

    pub fn with_uptime_source(mut self, uptime: Arc<dyn UptimeSource>) -> Self {
        self.uptime = uptime;
        self
    }

    /// Override KVM detection.
    pub fn with_kvm_available(mut self, available: bool) -> Self {
        self.kvm_available = available;
        self
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// Finish a sequence the previous run left behind.
    ///
    /// If the host rebooted since the marker was written, the flag is
    /// cleared and the marker removed. If it did not, the previous run
    /// committed to an action that never took effect, and that action is
    /// returned so it can be issued again. Markers that do not name their
    /// action fall back to the current action; when there is nothing left
    /// to do they are dropped.
    pub fn recover(&self) -> RebootResult<Option<RebootAction>> {
        match self.marker.evaluate(self.uptime.as_ref())? {
            MarkerState::Absent => Ok(None),
            MarkerState::Completed { recorded, current } => {
                tracing::info!(
                    node_id = %self.node,
                    recorded,
                    current,
                    "Reboot completed, clearing flag"
                );
                self.facade.clear_machine_reboot()?;
                self.marker.remove()?;
                Ok(None)
            }
            MarkerState::Pending {
                recorded,
                current,
                action,
            } => {
                let action = match action {
                    Some(action) => action,
                    None => self.facade.machine_reboot_action()?,
                };
                if !action.is_actionable() {
                    tracing::warn!(
                        node_id = %self.node,
                        recorded,
                        current,
                        "Dropping reboot marker with nothing left to do"
                    );
                    self.marker.remove()?;
                    return Ok(None);
                }

                tracing::warn!(
                    node_id = %self.node,
                    recorded,
                    current,
                    action = %action,
                    "Host did not go down after the last shutdown sequence"
                );
                Ok(Some(action))
            }
        }
    }

    /// Run until the OS action is issued or `stop` fires.
    ///
    /// Dropping the sender of `stop` also stops the worker. Stopping is
    /// honored until the flag has been cleared; after that the sequence
    /// runs to completion. An interrupted sequence found on start is
    /// resumed right away.
    pub async fn run(self, mut stop: oneshot::Receiver<()>) -> RebootResult<WorkerExit> {
        if let Some(action) = self.recover()? {
            tracing::info!(node_id = %self.node, action = %action, "Resuming shutdown sequence");
            self.execute_reboot(action).await?;
            return Ok(WorkerExit::Executed(action));
        }

        let mut watcher = self.facade.watch_machine()?;
        tracing::info!(node_id = %self.node, "Reboot worker started");

        loop {
            let action = self.facade.machine_reboot_action()?;
            tracing::debug!(node_id = %self.node, action = %action, "Evaluated reboot action");

            if action.is_actionable() {
                tokio::select! {
                    _ = &mut stop => {
                        tracing::info!(node_id = %self.node, "Reboot worker stopped while quiescing");
                        return Ok(WorkerExit::Cancelled);
                    }
                    quiesced = self.quiesce() => {
                        quiesced?;
                    }
                }
                self.execute_reboot(action).await?;
                return Ok(WorkerExit::Executed(action));
            }

            tokio::select! {
                _ = &mut stop => {
                    tracing::info!(node_id = %self.node, "Reboot worker stopped");
                    return Ok(WorkerExit::Cancelled);
                }
                event = watcher.changed() => {
                    if event.is_none() {
                        tracing::info!(node_id = %self.node, "Flag feed closed, stopping");
                        return Ok(WorkerExit::Cancelled);
                    }
                }
            }
        }
    }

    /// Wait for hosted containers to stop, bounded by the timeout for this
    /// node's nesting level.
    pub async fn quiesce(&self) -> RebootResult<QuiesceOutcome> {
        let types = supported_containers(&self.node, self.kvm_available);
        let timeout = self
            .options
            .quiesce_timeouts
            .for_level(self.node.nesting_level());

        wait_for_containers(
            self.lister.clone(),
            &self.node,
            types,
            self.options.poll_interval,
            timeout,
        )
        .await
    }

    /// Commit to `action`: write the marker, clear the flag, then hand the
    /// action to the executor after the configured delay.
    pub async fn execute_reboot(&self, action: RebootAction) -> RebootResult<()> {
        match self.marker.read()? {
            Some(record) => {
                tracing::debug!(
                    node_id = %self.node,
                    recorded = record.uptime,
                    "Reusing existing reboot marker"
                );
            }
            None => self.marker.create(self.uptime.uptime()?, action)?,
        }

        self.facade.clear_machine_reboot()?;
        tracing::info!(
            node_id = %self.node,
            action = %action,
            delay_secs = self.options.action_delay.as_secs(),
            "Flag cleared, executing"
        );

        tokio::time::sleep(self.options.action_delay).await;
        self.executor.execute(action).await.map_err(|e| match e {
            RebootError::OsActionFailed(_) => e,
            other => RebootError::OsActionFailed(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::{FlagStore, InMemoryFlagStore};

    fn machine_facade(store: &Arc<dyn FlagStore>, node: &NodeId) -> RebootFacade {
        RebootFacade::new(store.clone(), CallerIdentity::Machine(node.clone()))
    }

    #[test]
    fn test_worker_rejects_unit_identity() {
        let store: Arc<dyn FlagStore> = Arc::new(InMemoryFlagStore::new());
        let facade = RebootFacade::new(
            store,
            CallerIdentity::Unit {
                unit: "app/0".into(),
                host: NodeId::machine(0),
            },
        );
        let dir = tempfile::tempdir().unwrap();
        let result = RebootWorker::new(
            facade,
            Arc::new(CommandContainerLister::default()),
            Arc::new(DryRunShutdown),
            RebootMarker::new(dir.path().join("marker")),
            WorkerOptions::default(),
        );
        assert!(matches!(result, Err(RebootError::InvalidArgument(_))));
    }

    #[test]
    fn test_worker_rejects_bad_options() {
        let store: Arc<dyn FlagStore> = Arc::new(InMemoryFlagStore::new());
        let node = NodeId::machine(0);
        let mut options = WorkerOptions::default();
        options.quiesce_timeouts.max_nested = std::time::Duration::from_secs(3600);

        let dir = tempfile::tempdir().unwrap();
        let result = RebootWorker::new(
            machine_facade(&store, &node),
            Arc::new(CommandContainerLister::default()),
            Arc::new(DryRunShutdown),
            RebootMarker::new(dir.path().join("marker")),
            options,
        );
        assert!(matches!(result, Err(RebootError::Config(_))));
    }
}

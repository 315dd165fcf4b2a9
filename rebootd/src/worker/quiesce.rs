//! Bounded wait for a node's containers to stop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::node::{ContainerType, NodeId};
use rebootd_shared::errors::{RebootError, RebootResult};

use super::containers::ContainerLister;

/// How a quiesce wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuiesceOutcome {
    /// Nothing to wait for.
    Skipped,
    /// No containers are running any more.
    Drained,
    /// The deadline passed with containers still running.
    TimedOut,
}

/// Aborts the poll loop when the wait itself is dropped.
struct PollTask(JoinHandle<RebootResult<()>>);

impl Drop for PollTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Poll `lister` until no container of `types` runs on `node`, or until
/// `timeout` elapses.
///
/// The poll loop runs as its own task and is aborted when the deadline
/// fires. A timeout is reported through the outcome; only lister failures
/// are errors.
pub async fn wait_for_containers(
    lister: Arc<dyn ContainerLister>,
    node: &NodeId,
    types: Vec<ContainerType>,
    poll_interval: Duration,
    timeout: Duration,
) -> RebootResult<QuiesceOutcome> {
    if types.is_empty() || timeout.is_zero() {
        return Ok(QuiesceOutcome::Skipped);
    }

    let poll_node = node.clone();
    let mut poller = PollTask(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            let running = lister.running_containers(&poll_node, &types).await?;
            if running.is_empty() {
                return Ok::<_, RebootError>(());
            }
            tracing::info!(
                node_id = %poll_node,
                containers = ?running,
                "Waiting for containers to shut down"
            );
        }
    }));

    tokio::select! {
        joined = &mut poller.0 => {
            joined
                .map_err(|e| RebootError::Internal(format!("container poll task failed: {}", e)))??;
            Ok(QuiesceOutcome::Drained)
        }
        _ = tokio::time::sleep(timeout) => {
            poller.0.abort();
            tracing::warn!(
                node_id = %node,
                timeout_secs = timeout.as_secs(),
                "Timed out waiting for containers to shut down"
            );
            Ok(QuiesceOutcome::TimedOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports `remaining` containers, one fewer on each call, forever if
    /// `sticky`.
    struct FakeLister {
        calls: AtomicUsize,
        remaining: usize,
        sticky: bool,
        fail: bool,
    }

    impl FakeLister {
        fn new(remaining: usize, sticky: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                remaining,
                sticky,
                fail: false,
            })
        }
    }

    #[async_trait]
    impl ContainerLister for FakeLister {
        async fn running_containers(
            &self,
            _node: &NodeId,
            _types: &[ContainerType],
        ) -> RebootResult<Vec<String>> {
            if self.fail {
                return Err(RebootError::Internal("lister broke".into()));
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let left = if self.sticky {
                self.remaining
            } else {
                self.remaining.saturating_sub(call)
            };
            Ok((0..left).map(|i| format!("juju-{}", i)).collect())
        }
    }

    fn machine() -> NodeId {
        NodeId::machine(0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains() {
        let lister = FakeLister::new(2, false);
        let outcome = wait_for_containers(
            lister.clone(),
            &machine(),
            vec![ContainerType::Lxc],
            Duration::from_secs(1),
            Duration::from_secs(600),
        )
        .await
        .unwrap();

        assert_eq!(outcome, QuiesceOutcome::Drained);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_and_stops_polling() {
        let lister = FakeLister::new(1, true);
        let start = tokio::time::Instant::now();
        let outcome = wait_for_containers(
            lister.clone(),
            &machine(),
            vec![ContainerType::Lxc],
            Duration::from_secs(1),
            Duration::from_secs(600),
        )
        .await
        .unwrap();

        assert_eq!(outcome, QuiesceOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(600));

        // The poller was aborted, so no more calls happen.
        let calls = lister.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(lister.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_skips_without_types_or_timeout() {
        let lister = FakeLister::new(1, true);
        let outcome = wait_for_containers(
            lister.clone(),
            &machine(),
            vec![],
            Duration::from_secs(1),
            Duration::from_secs(600),
        )
        .await
        .unwrap();
        assert_eq!(outcome, QuiesceOutcome::Skipped);

        let outcome = wait_for_containers(
            lister.clone(),
            &machine(),
            vec![ContainerType::Kvm],
            Duration::from_secs(1),
            Duration::ZERO,
        )
        .await
        .unwrap();
        assert_eq!(outcome, QuiesceOutcome::Skipped);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lister_error_is_returned() {
        let lister = Arc::new(FakeLister {
            calls: AtomicUsize::new(0),
            remaining: 0,
            sticky: false,
            fail: true,
        });
        let result = wait_for_containers(
            lister,
            &machine(),
            vec![ContainerType::Lxc],
            Duration::from_secs(1),
            Duration::from_secs(600),
        )
        .await;
        assert!(matches!(result, Err(RebootError::Internal(_))));
    }
}

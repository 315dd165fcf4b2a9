//! Integration tests for the reboot execution worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::oneshot;

use rebootd::worker::{
    ContainerLister, MarkerRecord, RebootMarker, ShutdownExecutor, UptimeSource,
};
use rebootd::{
    CallerIdentity, ContainerType, NodeId, RebootAction, RebootError, RebootResult,
    RebootRuntime, RebootWorker, RebootdOptions, WorkerExit, WorkerOptions,
};

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// Reports the same containers as running forever.
struct StuckContainers(Vec<String>);

#[async_trait]
impl ContainerLister for StuckContainers {
    async fn running_containers(
        &self,
        _node: &NodeId,
        _types: &[ContainerType],
    ) -> RebootResult<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Records actions instead of touching the host.
#[derive(Default)]
struct RecordingExecutor {
    executed: Mutex<Vec<RebootAction>>,
    fail: AtomicBool,
}

#[async_trait]
impl ShutdownExecutor for RecordingExecutor {
    async fn execute(&self, action: RebootAction) -> RebootResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RebootError::OsActionFailed("shutdown: permission denied".into()));
        }
        self.executed.lock().push(action);
        Ok(())
    }
}

struct FixedUptime(u64);

impl UptimeSource for FixedUptime {
    fn uptime(&self) -> RebootResult<u64> {
        Ok(self.0)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Runtime with machine `0` and container `0/lxc/0` registered.
struct TestContext {
    runtime: RebootRuntime,
    machine: NodeId,
    container: NodeId,
    executor: Arc<RecordingExecutor>,
    _temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with_executor(RecordingExecutor::default())
    }

    fn with_executor(executor: RecordingExecutor) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let options = RebootdOptions {
            home_dir: temp_dir.path().to_path_buf(),
            worker: WorkerOptions {
                action_delay: Duration::from_secs(10),
                ..Default::default()
            },
        };
        let runtime = RebootRuntime::new(options).expect("Failed to create runtime");

        let machine = NodeId::machine(0);
        let container = machine.child(ContainerType::Lxc, 0);
        runtime.add_node(&machine).unwrap();
        runtime.add_node(&container).unwrap();

        Self {
            runtime,
            machine,
            container,
            executor: Arc::new(executor),
            _temp_dir: temp_dir,
        }
    }

    fn worker(&self, node: &NodeId, lister: Arc<dyn ContainerLister>, uptime: u64) -> RebootWorker {
        self.runtime
            .worker(node, lister, self.executor.clone())
            .expect("Failed to build worker")
            .with_uptime_source(Arc::new(FixedUptime(uptime)))
            .with_kvm_available(false)
    }

    fn idle_worker(&self, node: &NodeId, uptime: u64) -> RebootWorker {
        self.worker(node, Arc::new(StuckContainers(vec![])), uptime)
    }

    fn request(&self, node: &NodeId) {
        self.runtime
            .facade(CallerIdentity::Machine(node.clone()))
            .unwrap()
            .request_machine_reboot()
            .unwrap();
    }

    fn flag(&self, node: &NodeId) -> bool {
        self.runtime.store().get_flag(node).unwrap()
    }

    fn marker(&self) -> RebootMarker {
        RebootMarker::new(self.runtime.layout().marker_path())
    }

    fn marker_record(&self) -> Option<MarkerRecord> {
        self.marker().read().unwrap()
    }

    fn executed(&self) -> Vec<RebootAction> {
        self.executor.executed.lock().clone()
    }
}

// ============================================================================
// SHUTDOWN SEQUENCE
// ============================================================================

#[tokio::test(start_paused = true)]
async fn executes_reboot_when_flag_is_set() {
    let ctx = TestContext::new();
    ctx.request(&ctx.machine);

    let (_stop_tx, stop_rx) = oneshot::channel();
    let exit = ctx.idle_worker(&ctx.machine, 100).run(stop_rx).await.unwrap();

    assert_eq!(exit, WorkerExit::Executed(RebootAction::Reboot));
    assert_eq!(ctx.executed(), vec![RebootAction::Reboot]);
    assert!(!ctx.flag(&ctx.machine));
    assert_eq!(
        ctx.marker_record(),
        Some(MarkerRecord {
            uptime: 100,
            action: Some(RebootAction::Reboot),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn reacts_to_request_after_start() {
    let ctx = TestContext::new();
    let worker = ctx.idle_worker(&ctx.machine, 100);
    let (_stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(worker.run(stop_rx));

    tokio::task::yield_now().await;
    assert!(ctx.executed().is_empty());

    ctx.request(&ctx.machine);
    let exit = handle.await.unwrap().unwrap();
    assert_eq!(exit, WorkerExit::Executed(RebootAction::Reboot));
}

#[tokio::test(start_paused = true)]
async fn container_shuts_down_with_its_machine() {
    let ctx = TestContext::new();
    ctx.request(&ctx.machine);

    let (_stop_tx, stop_rx) = oneshot::channel();
    let exit = ctx.idle_worker(&ctx.container, 100).run(stop_rx).await.unwrap();

    assert_eq!(exit, WorkerExit::Executed(RebootAction::Shutdown));
    assert_eq!(ctx.executed(), vec![RebootAction::Shutdown]);
    // Only the machine clears the machine's flag.
    assert!(ctx.flag(&ctx.machine));
}

#[tokio::test(start_paused = true)]
async fn quiesce_timeout_does_not_hang() {
    let ctx = TestContext::new();
    ctx.request(&ctx.machine);

    let stuck = Arc::new(StuckContainers(vec!["juju-machine-0-lxc-0".into()]));
    let worker = ctx.worker(&ctx.machine, stuck, 100);

    let start = tokio::time::Instant::now();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let exit = worker.run(stop_rx).await.unwrap();

    assert_eq!(exit, WorkerExit::Executed(RebootAction::Reboot));
    assert!(!ctx.flag(&ctx.machine));
    // Ten minute wait for a bare machine plus the action delay.
    assert!(start.elapsed() >= Duration::from_secs(610));
}

#[tokio::test(start_paused = true)]
async fn os_failure_is_fatal() {
    let ctx = TestContext::with_executor(RecordingExecutor {
        fail: AtomicBool::new(true),
        ..Default::default()
    });
    ctx.request(&ctx.machine);

    let (_stop_tx, stop_rx) = oneshot::channel();
    let err = ctx
        .idle_worker(&ctx.machine, 100)
        .run(stop_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, RebootError::OsActionFailed(_)));
    // The flag was cleared before the OS action was attempted.
    assert!(!ctx.flag(&ctx.machine));
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn stop_signal_cancels_idle_worker() {
    let ctx = TestContext::new();
    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(ctx.idle_worker(&ctx.machine, 100).run(stop_rx));

    tokio::task::yield_now().await;
    stop_tx.send(()).unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), WorkerExit::Cancelled);
    assert!(ctx.executed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_signal_cancels_quiesce() {
    let ctx = TestContext::new();
    ctx.request(&ctx.machine);

    let stuck = Arc::new(StuckContainers(vec!["juju-machine-0-lxc-0".into()]));
    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(ctx.worker(&ctx.machine, stuck, 100).run(stop_rx));

    tokio::time::sleep(Duration::from_secs(30)).await;
    stop_tx.send(()).unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), WorkerExit::Cancelled);
    assert!(ctx.flag(&ctx.machine));
    assert_eq!(ctx.marker_record(), None);
}

// ============================================================================
// CRASH RECOVERY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn completed_reboot_clears_flag_on_start() {
    let ctx = TestContext::new();
    ctx.request(&ctx.machine);
    ctx.marker().create(5000, RebootAction::Reboot).unwrap();

    // Uptime is now lower than recorded: the host went down.
    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(ctx.idle_worker(&ctx.machine, 30).run(stop_rx));

    tokio::task::yield_now().await;
    stop_tx.send(()).unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), WorkerExit::Cancelled);
    assert!(!ctx.flag(&ctx.machine));
    assert_eq!(ctx.marker_record(), None);
    assert!(ctx.executed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn request_after_completed_reboot_runs_again() {
    let ctx = TestContext::new();
    ctx.request(&ctx.machine);
    ctx.marker().create(5000, RebootAction::Reboot).unwrap();

    let (_stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(ctx.idle_worker(&ctx.machine, 30).run(stop_rx));

    while ctx.flag(&ctx.machine) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // A unit asks again once the machine is back.
    ctx.request(&ctx.machine);
    let exit = handle.await.unwrap().unwrap();

    assert_eq!(exit, WorkerExit::Executed(RebootAction::Reboot));
    assert_eq!(ctx.executed(), vec![RebootAction::Reboot]);
    assert_eq!(
        ctx.marker_record(),
        Some(MarkerRecord {
            uptime: 30,
            action: Some(RebootAction::Reboot),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn pending_marker_is_reused() {
    let ctx = TestContext::new();
    ctx.request(&ctx.machine);
    ctx.marker().create(50, RebootAction::Reboot).unwrap();

    // Uptime kept growing: the host never went down, so run again.
    let (_stop_tx, stop_rx) = oneshot::channel();
    let exit = ctx.idle_worker(&ctx.machine, 80).run(stop_rx).await.unwrap();

    assert_eq!(exit, WorkerExit::Executed(RebootAction::Reboot));
    assert_eq!(ctx.marker_record().map(|r| r.uptime), Some(50));
    assert!(!ctx.flag(&ctx.machine));
}

#[tokio::test(start_paused = true)]
async fn failed_os_action_is_retried_after_restart() {
    let ctx = TestContext::with_executor(RecordingExecutor {
        fail: AtomicBool::new(true),
        ..Default::default()
    });
    ctx.request(&ctx.machine);

    let (_stop_tx, stop_rx) = oneshot::channel();
    let err = ctx
        .idle_worker(&ctx.machine, 100)
        .run(stop_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, RebootError::OsActionFailed(_)));
    assert!(!ctx.flag(&ctx.machine));

    // Restarted by the supervisor; the host is still up.
    ctx.executor.fail.store(false, Ordering::SeqCst);
    let (_stop_tx, stop_rx) = oneshot::channel();
    let exit = ctx.idle_worker(&ctx.machine, 200).run(stop_rx).await.unwrap();

    assert_eq!(exit, WorkerExit::Executed(RebootAction::Reboot));
    assert_eq!(ctx.executed(), vec![RebootAction::Reboot]);
    assert_eq!(
        ctx.marker_record(),
        Some(MarkerRecord {
            uptime: 100,
            action: Some(RebootAction::Reboot),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn interrupted_container_shutdown_is_resumed() {
    let ctx = TestContext::new();
    // The machine's flag has since been cleared by the machine itself.
    ctx.marker().create(100, RebootAction::Shutdown).unwrap();

    let (_stop_tx, stop_rx) = oneshot::channel();
    let exit = ctx.idle_worker(&ctx.container, 150).run(stop_rx).await.unwrap();

    assert_eq!(exit, WorkerExit::Executed(RebootAction::Shutdown));
    assert_eq!(ctx.executed(), vec![RebootAction::Shutdown]);
}

#[tokio::test(start_paused = true)]
async fn uptime_only_marker_without_request_is_dropped() {
    let ctx = TestContext::new();
    std::fs::write(ctx.marker().path(), "100").unwrap();

    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(ctx.idle_worker(&ctx.machine, 150).run(stop_rx));

    tokio::task::yield_now().await;
    stop_tx.send(()).unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), WorkerExit::Cancelled);
    assert_eq!(ctx.marker_record(), None);
    assert!(ctx.executed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn uptime_only_marker_resumes_current_action() {
    let ctx = TestContext::new();
    ctx.request(&ctx.machine);
    std::fs::write(ctx.marker().path(), "100").unwrap();

    let (_stop_tx, stop_rx) = oneshot::channel();
    let exit = ctx.idle_worker(&ctx.container, 150).run(stop_rx).await.unwrap();

    assert_eq!(exit, WorkerExit::Executed(RebootAction::Shutdown));
    assert_eq!(ctx.marker_record().map(|r| r.uptime), Some(100));
}

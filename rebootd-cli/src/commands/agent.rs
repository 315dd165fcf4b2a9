use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use rebootd::worker::{CommandContainerLister, DryRunShutdown, ShutdownExecutor, SystemShutdown};
use rebootd::{NodeId, WorkerExit};
use tokio::sync::oneshot;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Machine this agent runs on
    pub machine: NodeId,

    /// Log the reboot instead of running shutdown(8)
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: AgentArgs, global: &GlobalFlags) -> Result<()> {
    let runtime = global.create_runtime()?;

    let executor: Arc<dyn ShutdownExecutor> = if args.dry_run {
        Arc::new(DryRunShutdown)
    } else {
        Arc::new(SystemShutdown)
    };
    let lister = Arc::new(CommandContainerLister::new(
        runtime.options().worker.container_prefix.clone(),
    ));
    let worker = runtime.worker(&args.machine, lister, executor)?;

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(());
        }
    });

    match worker.run(stop_rx).await? {
        WorkerExit::Cancelled => tracing::info!(node_id = %args.machine, "Agent stopped"),
        WorkerExit::Executed(action) => println!("{}\t{}", args.machine, action),
    }
    Ok(())
}

use anyhow::Result;
use clap::Args;
use rebootd::{NodeId, RebootPriority};

use crate::cli::{CallerFlags, GlobalFlags};

#[derive(Args, Debug)]
pub struct RequestArgs {
    #[arg(required = true)]
    pub nodes: Vec<NodeId>,

    #[command(flatten)]
    pub caller: CallerFlags,

    /// Reboot now instead of after the current hook
    #[arg(long)]
    pub now: bool,
}

pub async fn execute(args: RequestArgs, global: &GlobalFlags) -> Result<()> {
    let runtime = global.create_runtime()?;

    let priority = if args.now {
        RebootPriority::Now
    } else {
        RebootPriority::AfterHook
    };

    let results = args.caller.for_each(&runtime, &args.nodes, |facade, nodes| {
        tracing::info!(caller = %facade.identity(), %priority, "Requesting reboot");
        facade.request_reboot(nodes)
    })?;
    super::report_batch(&args.nodes, results)
}

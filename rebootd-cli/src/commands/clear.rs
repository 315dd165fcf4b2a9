use anyhow::Result;
use clap::Args;
use rebootd::NodeId;

use crate::cli::{CallerFlags, GlobalFlags};

#[derive(Args, Debug)]
pub struct ClearArgs {
    #[arg(required = true)]
    pub nodes: Vec<NodeId>,

    #[command(flatten)]
    pub caller: CallerFlags,
}

pub async fn execute(args: ClearArgs, global: &GlobalFlags) -> Result<()> {
    let runtime = global.create_runtime()?;
    let results = args
        .caller
        .for_each(&runtime, &args.nodes, |facade, nodes| facade.clear_reboot(nodes))?;
    super::report_batch(&args.nodes, results)
}

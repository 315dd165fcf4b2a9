use anyhow::Result;
use clap::Args;
use rebootd::NodeId;

use crate::cli::{CallerFlags, GlobalFlags};

#[derive(Args, Debug)]
pub struct ActionArgs {
    #[arg(required = true)]
    pub nodes: Vec<NodeId>,

    #[command(flatten)]
    pub caller: CallerFlags,

    /// Only print the actions, one per line
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(args: ActionArgs, global: &GlobalFlags) -> Result<()> {
    let runtime = global.create_runtime()?;
    let results = args.caller.for_each(&runtime, &args.nodes, |facade, nodes| {
        facade.get_reboot_action(nodes)
    })?;

    let mut failed = 0;
    for (node, result) in args.nodes.iter().zip(results) {
        match result.into_result() {
            Ok(action) if args.quiet => println!("{}", action),
            Ok(action) => println!("{}\t{}", node, action),
            Err(e) => {
                eprintln!("{}: {}", node, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} nodes failed", failed, args.nodes.len());
    }
    Ok(())
}

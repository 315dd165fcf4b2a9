pub mod action;
pub mod agent;
pub mod clear;
pub mod node;
pub mod request;

use rebootd::{NodeId, RebootResult};

/// Print per-node failures to stderr and fail if there were any.
pub(crate) fn report_batch(
    nodes: &[NodeId],
    results: Vec<RebootResult<()>>,
) -> anyhow::Result<()> {
    let mut failed = 0;
    for (node, result) in nodes.iter().zip(results) {
        if let Err(e) = result {
            eprintln!("{}: {}", node, e);
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} nodes failed", failed, nodes.len());
    }
    Ok(())
}

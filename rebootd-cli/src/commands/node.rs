use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use rebootd::{Life, NodeId};

use crate::cli::GlobalFlags;

#[derive(Subcommand, Debug)]
pub enum NodeCommand {
    /// Register one or more nodes as alive
    Add(AddArgs),

    /// Move a node forward in its lifecycle
    SetLife(SetLifeArgs),

    /// Show the life of one or more nodes
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Node ids, e.g. `0` or `0/lxc/1`
    #[arg(required = true)]
    pub nodes: Vec<NodeId>,
}

#[derive(Args, Debug)]
pub struct SetLifeArgs {
    pub node: NodeId,

    #[arg(value_enum)]
    pub life: LifeArg,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(required = true)]
    pub nodes: Vec<NodeId>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LifeArg {
    Alive,
    Dying,
    Dead,
}

impl From<LifeArg> for Life {
    fn from(arg: LifeArg) -> Self {
        match arg {
            LifeArg::Alive => Life::Alive,
            LifeArg::Dying => Life::Dying,
            LifeArg::Dead => Life::Dead,
        }
    }
}

pub async fn execute(command: NodeCommand, global: &GlobalFlags) -> Result<()> {
    let runtime = global.create_runtime()?;

    match command {
        NodeCommand::Add(args) => {
            for node in &args.nodes {
                if !runtime.add_node(node)? {
                    tracing::info!(node_id = %node, "Node already registered");
                }
            }
        }
        NodeCommand::SetLife(args) => {
            runtime.set_life(&args.node, args.life.into())?;
        }
        NodeCommand::Show(args) => {
            let store = runtime.store();
            for node in &args.nodes {
                match store.node_life(node)? {
                    Some(life) => println!("{}\t{}", node, life),
                    None => println!("{}\tunknown", node),
                }
            }
        }
    }

    Ok(())
}

//! CLI definition and argument parsing for rebootctl.
//! This module contains the main CLI structure, subcommands, and the flags
//! shared between them.

use clap::{Args, Parser, Subcommand};
use rebootd::{CallerIdentity, NodeId, RebootFacade, RebootRuntime, RebootdOptions};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "rebootctl", author, version, about = "Reboot coordination CLI")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
#[non_exhaustive]
pub enum Commands {
    /// Register nodes and change their life
    #[command(subcommand)]
    Node(crate::commands::node::NodeCommand),

    /// Ask for one or more nodes to be rebooted
    Request(crate::commands::request::RequestArgs),

    /// Withdraw reboot requests
    Clear(crate::commands::clear::ClearArgs),

    /// Show the reboot action of one or more nodes
    #[command(visible_alias = "get")]
    Action(crate::commands::action::ActionArgs),

    /// Run the reboot worker for a machine
    Agent(crate::commands::agent::AgentArgs),
}

// ============================================================================
// GLOBAL FLAGS
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// rebootd home directory
    #[arg(long, global = true, env = "REBOOTD_HOME")]
    pub home: Option<std::path::PathBuf>,

    /// JSON options file
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

impl GlobalFlags {
    pub fn options(&self) -> anyhow::Result<RebootdOptions> {
        let mut options = match &self.config {
            Some(path) => RebootdOptions::from_json_file(path)?,
            None => RebootdOptions::default(),
        };
        if let Some(home) = &self.home {
            options.home_dir = home.clone();
        }
        Ok(options)
    }

    pub fn create_runtime(&self) -> anyhow::Result<RebootRuntime> {
        RebootRuntime::new(self.options()?).map_err(Into::into)
    }
}

// ============================================================================
// CALLER FLAGS
// ============================================================================

#[derive(Args, Debug, Clone, Default)]
pub struct CallerFlags {
    /// Machine the call is made from (defaults to each target node itself)
    #[arg(long = "as", value_name = "NODE")]
    pub caller: Option<NodeId>,

    /// Act as this unit on the calling machine
    #[arg(long)]
    pub unit: Option<String>,
}

impl CallerFlags {
    /// Caller identity for an operation on `target`.
    pub fn identity(&self, target: &NodeId) -> CallerIdentity {
        let machine = self.caller.clone().unwrap_or_else(|| target.clone());
        match &self.unit {
            Some(unit) => CallerIdentity::Unit {
                unit: unit.clone(),
                host: machine,
            },
            None => CallerIdentity::Machine(machine),
        }
    }

    /// Run a batched facade call over `nodes`.
    ///
    /// With `--as` the whole batch goes through one facade. Without it each
    /// node is addressed by its own machine. Results stay in input order.
    pub fn for_each<T>(
        &self,
        runtime: &RebootRuntime,
        nodes: &[NodeId],
        call: impl Fn(&RebootFacade, &[NodeId]) -> Vec<T>,
    ) -> anyhow::Result<Vec<T>> {
        if let Some(caller) = &self.caller {
            let facade = runtime.facade(self.identity(caller))?;
            return Ok(call(&facade, nodes));
        }

        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            let facade = runtime.facade(self.identity(node))?;
            results.extend(call(&facade, std::slice::from_ref(node)));
        }
        Ok(results)
    }
}

// ============================================================================
// Tests
// ============================================================================

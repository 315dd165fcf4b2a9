//! Enumeration of containers still running under a node.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::node::{ContainerType, NodeId};
use rebootd_shared::errors::{RebootError, RebootResult};

/// Deepest nesting level that may still host containers.
pub const MAX_NESTING_LEVEL: usize = 2;

/// Namespace of the containers this system provisions.
pub const DEFAULT_CONTAINER_PREFIX: &str = "juju";

/// Lists containers of the given types that are still running on a node.
#[async_trait]
pub trait ContainerLister: Send + Sync {
    async fn running_containers(
        &self,
        node: &NodeId,
        types: &[ContainerType],
    ) -> RebootResult<Vec<String>>;
}

/// Container types `node` can host.
///
/// LXC cannot be nested inside LXC; KVM needs `/dev/kvm` on the host.
pub fn supported_containers(node: &NodeId, kvm_available: bool) -> Vec<ContainerType> {
    if node.nesting_level() >= MAX_NESTING_LEVEL {
        return Vec::new();
    }

    let mut types = Vec::new();
    if node.container_type() != Some(ContainerType::Lxc) {
        types.push(ContainerType::Lxc);
    }
    if kvm_available {
        types.push(ContainerType::Kvm);
    }
    types
}

/// Whether this host can run KVM guests.
pub fn kvm_available() -> bool {
    Path::new("/dev/kvm").exists()
}

/// Name prefix shared by the containers provisioned under `node`.
///
/// Machine `0/lxc/1` in namespace `juju` owns `juju-machine-0-lxc-1-*`.
pub fn managed_prefix(namespace: &str, node: &NodeId) -> String {
    format!("{}-machine-{}-", namespace, node.as_str().replace('/', "-"))
}

/// Lists running containers with the host's container tools.
///
/// Only containers named under the node's managed prefix are reported;
/// other guests on the host are ignored.
#[derive(Debug, Clone)]
pub struct CommandContainerLister {
    namespace: String,
}

impl Default for CommandContainerLister {
    fn default() -> Self {
        Self::new(DEFAULT_CONTAINER_PREFIX)
    }
}

impl CommandContainerLister {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn command_for(kind: ContainerType) -> (&'static str, &'static [&'static str]) {
        match kind {
            ContainerType::Lxc => ("lxc-ls", &["--running", "-1"]),
            ContainerType::Kvm => ("virsh", &["list", "--name"]),
        }
    }

    async fn list(kind: ContainerType, prefix: &str) -> RebootResult<Vec<String>> {
        let (program, args) = Self::command_for(kind);
        let output = Command::new(program).args(args).output().await.map_err(|e| {
            RebootError::Internal(format!("Failed to run {}: {}", program, e))
        })?;

        if !output.status.success() {
            return Err(RebootError::Internal(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_names(&String::from_utf8_lossy(&output.stdout), prefix))
    }
}

#[async_trait]
impl ContainerLister for CommandContainerLister {
    async fn running_containers(
        &self,
        node: &NodeId,
        types: &[ContainerType],
    ) -> RebootResult<Vec<String>> {
        let prefix = managed_prefix(&self.namespace, node);
        let mut running = Vec::new();
        for &kind in types {
            match Self::list(kind, &prefix).await {
                Ok(names) => running.extend(names),
                Err(e) => {
                    tracing::warn!(node_id = %node, container_type = %kind, error = %e, "Failed to list containers, skipping");
                }
            }
        }
        Ok(running)
    }
}

fn parse_names(output: &str, prefix: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(prefix))
        .map(String::from)
        .collect()
}

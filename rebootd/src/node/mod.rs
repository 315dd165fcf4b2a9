//! Nodes of the machine/container hierarchy.
//!
//! A node is anything that can run workloads and be rebooted: a bare machine,
//! a container on it, or a container nested inside another container.

mod id;
mod life;

pub use id::{ContainerType, NodeId};
pub use life::Life;

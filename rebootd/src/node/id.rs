//! Hierarchical node identifiers.

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use rebootd_shared::errors::{RebootError, RebootResult};

// ============================================================================
// CONTAINER TYPE
// ============================================================================

/// Container technology a nested node runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Lxc,
    Kvm,
}

impl ContainerType {
    pub const ALL: [ContainerType; 2] = [ContainerType::Lxc, ContainerType::Kvm];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Lxc => "lxc",
            ContainerType::Kvm => "kvm",
        }
    }
}

impl FromStr for ContainerType {
    type Err = RebootError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lxc" => Ok(ContainerType::Lxc),
            "kvm" => Ok(ContainerType::Kvm),
            _ => Err(RebootError::InvalidArgument(format!(
                "unknown container type '{}'. Supported: lxc, kvm",
                s
            ))),
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// NODE ID
// ============================================================================

/// Identifier of a node in the machine/container hierarchy.
///
/// Encoded as `/`-delimited segments: a machine index followed by zero or
/// more `(container-type, index)` pairs.
///
/// # Example
///
/// ```
/// use rebootd::node::{ContainerType, NodeId};
///
/// let nested = NodeId::parse("0/lxc/1/kvm/2").unwrap();
/// assert_eq!(nested.nesting_level(), 2);
/// assert_eq!(nested.container_type(), Some(ContainerType::Kvm));
/// assert_eq!(nested.parent().unwrap().as_str(), "0/lxc/1");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Parse and validate a node id.
    pub fn parse(s: &str) -> RebootResult<Self> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Check if a string is a valid node id.
    pub fn is_valid(s: &str) -> bool {
        Self::validate(s).is_ok()
    }

    fn validate(s: &str) -> RebootResult<()> {
        let invalid = |reason: &str| {
            RebootError::InvalidArgument(format!("invalid node id '{}': {}", s, reason))
        };

        let segments: Vec<&str> = s.split('/').collect();
        if segments.len() % 2 == 0 {
            return Err(invalid("expected <index>(/<container-type>/<index>)*"));
        }

        for (pos, segment) in segments.iter().enumerate() {
            if pos % 2 == 0 {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("index segments must be decimal numbers"));
                }
                if segment.len() > 1 && segment.starts_with('0') {
                    return Err(invalid("index segments must not have leading zeros"));
                }
            } else {
                segment.parse::<ContainerType>().map_err(|_| {
                    invalid(&format!("unknown container type '{}'", segment))
                })?;
            }
        }

        Ok(())
    }

    /// Id of a bare machine.
    pub fn machine(index: u32) -> Self {
        Self(index.to_string())
    }

    /// Id of a container of `kind` hosted directly on this node.
    pub fn child(&self, kind: ContainerType, index: u32) -> Self {
        Self(format!("{}/{}/{}", self.0, kind, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent node, or `None` for a bare machine.
    pub fn parent(&self) -> Option<NodeId> {
        let mut cut = self.0.rsplitn(3, '/');
        let _index = cut.next();
        let _kind = cut.next()?;
        cut.next().map(|parent| Self(parent.to_string()))
    }

    /// This node followed by every ancestor up to the root machine.
    pub fn ancestor_chain(&self) -> Vec<NodeId> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(id) = current {
            current = id.parent();
            chain.push(id);
        }
        chain
    }

    /// Number of container levels between this node and its root machine.
    pub fn nesting_level(&self) -> usize {
        self.0.split('/').count() / 2
    }

    /// Container technology of this node itself (`None` for bare machines).
    pub fn container_type(&self) -> Option<ContainerType> {
        let mut segments = self.0.rsplit('/');
        let _index = segments.next();
        segments.next().and_then(|kind| kind.parse().ok())
    }

    pub fn is_machine(&self) -> bool {
        self.nesting_level() == 0
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &NodeId) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }
}

impl FromStr for NodeId {
    type Err = RebootError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = RebootError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::validate(&value)?;
        Ok(Self(value))
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl ToSql for NodeId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.0.as_bytes())))
    }
}

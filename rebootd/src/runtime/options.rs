//! Configuration for the reboot runtime and its execution worker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::worker::DEFAULT_CONTAINER_PREFIX;
use rebootd_shared::errors::{RebootError, RebootResult};

/// Environment variable overriding the default home directory.
pub const REBOOTD_HOME_ENV: &str = "REBOOTD_HOME";

/// Runtime options.
///
/// # Example
///
/// ```no_run
/// use rebootd::runtime::options::RebootdOptions;
/// use std::path::PathBuf;
///
/// let mut options = RebootdOptions::default();
/// options.home_dir = PathBuf::from("/var/lib/rebootd");
/// options.worker.action_delay = std::time::Duration::ZERO;
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RebootdOptions {
    pub home_dir: PathBuf,
    pub worker: WorkerOptions,
}

impl Default for RebootdOptions {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            worker: WorkerOptions::default(),
        }
    }
}

impl RebootdOptions {
    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> RebootResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RebootError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let options: Self = serde_json::from_str(&content).map_err(|e| {
            RebootError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> RebootResult<()> {
        if !self.home_dir.is_absolute() {
            return Err(RebootError::Config(format!(
                "home_dir must be absolute path, got: {}",
                self.home_dir.display()
            )));
        }
        self.worker.validate()
    }
}

fn default_home_dir() -> PathBuf {
    if let Ok(home) = std::env::var(REBOOTD_HOME_ENV) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|home| home.join(".rebootd"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/rebootd"))
}

/// Options of the per-machine execution worker.
///
/// Durations are whole seconds when serialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerOptions {
    /// Interval between checks for running containers.
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Pause between clearing the flag and the OS action.
    #[serde(with = "duration_secs")]
    pub action_delay: Duration,

    pub quiesce_timeouts: QuiesceTimeouts,

    /// Namespace of managed container names. Containers outside it are
    /// not waited for.
    pub container_prefix: String,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            action_delay: Duration::from_secs(10),
            quiesce_timeouts: QuiesceTimeouts::default(),
            container_prefix: DEFAULT_CONTAINER_PREFIX.to_string(),
        }
    }
}

impl WorkerOptions {
    pub fn validate(&self) -> RebootResult<()> {
        if self.poll_interval.is_zero() {
            return Err(RebootError::Config(
                "worker.poll_interval must be at least one second".into(),
            ));
        }
        if self.container_prefix.is_empty()
            || !self
                .container_prefix
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(RebootError::Config(format!(
                "worker.container_prefix must be a non-empty name, got {:?}",
                self.container_prefix
            )));
        }
        self.quiesce_timeouts.validate()
    }
}

/// How long a node waits for its containers to stop, by nesting level.
///
/// Deeper nodes never wait longer than shallower ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuiesceTimeouts {
    /// Bare machines (level 0).
    #[serde(with = "duration_secs")]
    pub machine: Duration,

    /// Containers on a machine (level 1).
    #[serde(with = "duration_secs")]
    pub nested: Duration,

    /// Anything deeper.
    #[serde(with = "duration_secs")]
    pub max_nested: Duration,
}

impl Default for QuiesceTimeouts {
    fn default() -> Self {
        Self {
            machine: Duration::from_secs(10 * 60),
            nested: Duration::from_secs(5 * 60),
            max_nested: Duration::ZERO,
        }
    }
}

impl QuiesceTimeouts {
    pub fn for_level(&self, nesting_level: usize) -> Duration {
        match nesting_level {
            0 => self.machine,
            1 => self.nested,
            _ => self.max_nested,
        }
    }

    pub fn validate(&self) -> RebootResult<()> {
        if self.machine < self.nested || self.nested < self.max_nested {
            return Err(RebootError::Config(format!(
                "quiesce timeouts must not grow with nesting (machine {}s, nested {}s, max nested {}s)",
                self.machine.as_secs(),
                self.nested.as_secs(),
                self.max_nested.as_secs()
            )));
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

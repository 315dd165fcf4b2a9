//! Crash-recovery marker written just before the OS action.
//!
//! The marker holds the host uptime (seconds) at the moment the worker
//! committed to going down, followed by the action it committed to:
//! `<uptime> <action>`. On the next start a smaller uptime means the host
//! really rebooted; a larger or equal one means it never went down.
//!
//! Markers holding only the uptime are still read; their action is unknown.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::action::RebootAction;
use rebootd_shared::errors::{RebootError, RebootResult};

/// Source of the host's uptime in seconds.
pub trait UptimeSource: Send + Sync {
    fn uptime(&self) -> RebootResult<u64>;
}

/// Uptime as reported by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemUptime;

impl UptimeSource for SystemUptime {
    fn uptime(&self) -> RebootResult<u64> {
        Ok(sysinfo::System::uptime())
    }
}

/// Contents of a marker file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerRecord {
    pub uptime: u64,
    /// `None` for markers written without an action.
    pub action: Option<RebootAction>,
}

/// What the marker says about the last shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// No sequence was in flight.
    Absent,
    /// The host went down after the marker was written.
    Completed { recorded: u64, current: u64 },
    /// The marker was written but the host is still up.
    Pending {
        recorded: u64,
        current: u64,
        action: Option<RebootAction>,
    },
}

/// Marker file on disk.
#[derive(Debug, Clone)]
pub struct RebootMarker {
    path: PathBuf,
}

impl RebootMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `uptime` and `action` in a new marker.
    ///
    /// # Errors
    ///
    /// `InvalidState` if a marker already exists.
    pub fn create(&self, uptime: u64, action: RebootAction) -> RebootResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RebootError::Storage(format!(
                    "Failed to create marker directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RebootError::InvalidState(format!(
                    "reboot marker {} already exists",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(RebootError::Storage(format!(
                    "Failed to create reboot marker {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        write!(file, "{} {}", uptime, action)
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                RebootError::Storage(format!(
                    "Failed to write reboot marker {}: {}",
                    self.path.display(),
                    e
                ))
            })
    }

    /// Recorded contents, `None` when there is no marker.
    pub fn read(&self) -> RebootResult<Option<MarkerRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RebootError::Storage(format!(
                    "Failed to read reboot marker {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        parse_record(&content).map(Some).ok_or_else(|| {
            RebootError::Storage(format!(
                "corrupt reboot marker {}: {:?}",
                self.path.display(),
                content.trim()
            ))
        })
    }

    /// Delete the marker. Missing markers are fine.
    pub fn remove(&self) -> RebootResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RebootError::Storage(format!(
                "Failed to remove reboot marker {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    pub fn evaluate(&self, uptime: &dyn UptimeSource) -> RebootResult<MarkerState> {
        let Some(record) = self.read()? else {
            return Ok(MarkerState::Absent);
        };
        let current = uptime.uptime()?;

        if record.uptime > current {
            Ok(MarkerState::Completed {
                recorded: record.uptime,
                current,
            })
        } else {
            Ok(MarkerState::Pending {
                recorded: record.uptime,
                current,
                action: record.action,
            })
        }
    }
}

fn parse_record(content: &str) -> Option<MarkerRecord> {
    let mut fields = content.split_whitespace();
    let uptime = fields.next()?.parse::<u64>().ok()?;
    let action = match fields.next() {
        Some(action) => Some(action.parse::<RebootAction>().ok()?),
        None => None,
    };
    if fields.next().is_some() {
        return None;
    }
    Some(MarkerRecord { uptime, action })
}

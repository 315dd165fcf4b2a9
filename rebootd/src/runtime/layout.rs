//! On-disk layout under the rebootd home directory.

use std::path::{Path, PathBuf};

pub mod dirs {
    pub const DB_DIR: &str = "db";
    pub const LOGS_DIR: &str = "logs";
}

pub mod filenames {
    pub const DB: &str = "rebootd.db";
    pub const LOG: &str = "rebootd.log";
    pub const REBOOT_MARKER: &str = "reboot-state.txt";
}

/// Paths derived from the home directory.
///
/// ```text
/// <home>/
/// ├── db/rebootd.db
/// ├── logs/rebootd.log.<date>
/// └── reboot-state.txt
/// ```
#[derive(Clone, Debug)]
pub struct FilesystemLayout {
    home_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn db_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::DB_DIR)
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir().join(filenames::DB)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOGS_DIR)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.home_dir.join(filenames::REBOOT_MARKER)
    }

    /// Create the home, database and log directories.
    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.home_dir)?;
        std::fs::create_dir_all(self.db_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

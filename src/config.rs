//! Store configuration
//!
//! Controls where the database file lives and how it is written.

use std::path::{Path, PathBuf};

/// Default file name used when no path is given
pub const DEFAULT_PATH: &str = "fdstore.json";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path of the single JSON store file
    pub path: PathBuf,
    /// Persist after every mutating call made outside a transaction
    pub autosave: bool,
    /// Write indented JSON
    pub pretty: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            autosave: true,
            pretty: true,
        }
    }
}

impl DatabaseConfig {
    /// Create a config for the given store file with default options
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::default().path(path)
    }

    /// Set the store file path
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Enable or disable saving after each mutation
    pub fn autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    /// Enable or disable indented output
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

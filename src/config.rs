//! Configuration management

use std::env;
use std::path::PathBuf;

/// Library configuration
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Root directory for locally stored data
    pub data_dir: PathBuf,
    /// SQLite connection string for the snapshot store
    pub database_url: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            data_dir: PathBuf::from("data"),
            database_url: "sqlite:data/lectern.db".to_string(),
        }
    }
}

impl LibraryConfig {
    pub fn from_env() -> Self {
        LibraryConfig {
            data_dir: env::var("LECTERN_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            database_url: env::var("LECTERN_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/lectern.db".to_string()),
        }
    }

    /// Directory the filesystem blob store writes into
    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

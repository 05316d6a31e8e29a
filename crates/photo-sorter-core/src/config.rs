use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Immutable run configuration, built once at startup and passed by
/// reference into every component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the photo catalog (root/category/product/...)
    pub root: PathBuf,

    /// Whether to run without making changes
    pub dry_run: bool,

    /// Suppress informational logging
    pub quiet: bool,

    /// Force a full rebuild of every `_live` folder
    pub reprocess_all: bool,

    /// Restrict traversal to product paths containing this substring
    pub path_filter: Option<String>,

    /// Number of parallel workers for remote uploads
    pub upload_workers: usize,

    /// Namespace of the remote metadata field tracking image hashes
    pub metafield_namespace: String,

    /// Key of the remote metadata field tracking image hashes
    pub metafield_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("photos"),
            dry_run: true,
            quiet: false,
            reprocess_all: false,
            path_filter: None,
            upload_workers: 10,
            metafield_namespace: "panda".to_string(),
            metafield_key: "image_hashes".to_string(),
        }
    }
}

impl Config {
    /// Build a configuration for `root`, honouring the `DRY`, `QUIET` and
    /// `REPROCESS_ALL` environment flags.
    pub fn from_env(root: PathBuf) -> Self {
        Self {
            root,
            dry_run: env_flag("DRY"),
            quiet: env_flag("QUIET"),
            reprocess_all: env_flag("REPROCESS_ALL"),
            ..Self::default()
        }
    }

    /// Validate the configuration before a run
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::Configuration(format!(
                "catalog root is not a directory: {}",
                self.root.display()
            )));
        }
        if self.upload_workers == 0 {
            return Err(Error::Configuration(
                "upload_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).map(|v| !v.is_empty() && v != "0").unwrap_or(false)
}

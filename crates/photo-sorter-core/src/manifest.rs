//! Per-product manifest of the last prepared live set.
//!
//! Lives inside `_live` so a full reprocess wipes it along with the images.
//! Reading is tolerant: a missing or unparsable file simply means nothing
//! can be skipped on the next pass.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const MANIFEST_FILE: &str = ".meta";

/// Where a live file came from, and the content digest of that source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source: PathBuf,
    pub source_hash: String,
}

/// Live filename -> provenance of the file occupying it.
pub type LiveManifest = BTreeMap<String, ManifestEntry>;

pub fn read(live_dir: &Path) -> LiveManifest {
    fs::read_to_string(live_dir.join(MANIFEST_FILE))
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

pub fn write(live_dir: &Path, manifest: &LiveManifest) -> Result<()> {
    let raw = serde_json::to_string(manifest)?;
    fs::write(live_dir.join(MANIFEST_FILE), raw)?;
    Ok(())
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let mut manifest = LiveManifest::new();
        manifest.insert(
            "live.jpg".to_string(),
            ManifestEntry {
                source: PathBuf::from("/photos/x/y/HONEY/!HONEY 1.jpg"),
                source_hash: "abc123".to_string(),
            },
        );

        write(dir.path(), &manifest).unwrap();
        assert_eq!(read(dir.path()), manifest);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        assert!(read(dir.path()).is_empty());
    }

    #[test]
    fn test_corrupt_file_reads_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "not json{").unwrap();
        assert!(read(dir.path()).is_empty());
    }
}

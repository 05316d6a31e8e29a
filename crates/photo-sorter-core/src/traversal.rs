//! Recursive descent over the catalog tree.
//!
//! The layout contract is root/category/product: a directory two levels
//! below the root is a product directory and gets dispatched to the active
//! mode handler, after structural validation. Underscore-prefixed
//! directories are skipped, and stray files are warned about.

use log::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::structure::verify_structure;
use crate::types::{ProductDirectory, RunReport};

/// Levels below the catalog root at which product directories sit.
const PRODUCT_DIR_DEPTH: usize = 2;

/// Walk the catalog and invoke `handle` on every product directory that
/// passes structural validation. A failure aborts only that product; it is
/// logged and recorded on the report, and traversal continues.
pub fn walk<F>(config: &Config, report: &mut RunReport, mut handle: F) -> Result<()>
where
    F: FnMut(&Config, &mut RunReport, &ProductDirectory) -> Result<()>,
{
    if !config.root.is_dir() {
        return Err(Error::FileNotFound(config.root.clone()));
    }

    let walker = WalkDir::new(&config.root)
        .min_depth(1)
        .max_depth(PRODUCT_DIR_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            if e.file_type().is_dir() && name.starts_with('_') {
                debug!("Skipping underscored directory: {}", e.path().display());
                return false;
            }
            true
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Could not read directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            warn!("Found unexpected file: {}", entry.path().display());
            continue;
        }
        if entry.depth() < PRODUCT_DIR_DEPTH {
            continue;
        }

        if let Some(filter) = &config.path_filter {
            if !entry.path().to_string_lossy().contains(filter.as_str()) {
                debug!("Filtered out: {}", entry.path().display());
                continue;
            }
        }

        let product = ProductDirectory::new(entry.path());
        info!("Processing {}", product.path.display());

        let outcome = verify_structure(config, report, &product)
            .and_then(|_| handle(config, report, &product));
        if let Err(e) = outcome {
            error!("[{}] {}", product.name(), e);
            report.record(format!("{}: {}", product.path.display(), e));
        }
    }

    Ok(())
}

// -- Tests --

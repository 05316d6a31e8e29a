//! The rename pass: assigns sequential per-folder indices.
//!
//! Publish-flagged and plain files keep independent counters, so each group
//! numbers contiguously from 1. Upto variants are renamed alongside their
//! sibling and never consume an index of their own.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming;
use crate::structure::verify_post_renaming;
use crate::types::{child_dirs, image_entries, ProductDirectory, RunReport, LIVE_DIR};

/// Rename every photo in the product's subfolders to its deterministic
/// name. Returns the number of files actually renamed, which is zero when
/// the folder is already correctly named.
pub fn rename_product(
    config: &Config,
    report: &mut RunReport,
    product: &ProductDirectory,
) -> Result<usize> {
    let mut renamed = 0;
    for folder in child_dirs(&product.path)? {
        if folder == LIVE_DIR {
            continue;
        }
        renamed += rename_folder(config, &product.path.join(&folder), &folder)?;
    }

    verify_post_renaming(config, report, product)?;

    if renamed > 0 {
        info!(
            "[{}] {} {} file(s)",
            product.name(),
            if config.dry_run { "Would rename" } else { "Renamed" },
            renamed
        );
    } else {
        debug!("[{}] nothing to rename", product.name());
    }
    Ok(renamed)
}

fn rename_folder(config: &Config, dir: &Path, folder: &str) -> Result<usize> {
    let (uptos, normal) = naming::partition_uptos(image_entries(dir)?);

    let mut bang_i = 1u32;
    let mut normal_i = 1u32;
    let mut renamed = 0;

    for entry in &normal {
        let bang = entry.starts_with('!');
        let index = if bang { bang_i } else { normal_i };

        let (next, new_name) = naming::local_name(entry, folder, index);
        renamed += usize::from(rename_file(config, dir, entry, &new_name)?);

        // Uptos take the same basename and index as their source file
        for upto in naming::matching_uptos(&uptos, entry) {
            let (_, upto_name) = naming::local_name(upto, folder, index);
            renamed += usize::from(rename_file(config, dir, upto, &upto_name)?);
        }

        if bang {
            bang_i = next;
        } else {
            normal_i = next;
        }
    }

    Ok(renamed)
}

// Renaming onto an existing path or from a missing source is fatal in every
// mode: the check must hold right before the rename happens.
fn rename_file(config: &Config, dir: &Path, from: &str, to: &str) -> Result<bool> {
    if from == to {
        return Ok(false);
    }

    let old = dir.join(from);
    let new = dir.join(to);
    info!(
        "{}: {} -> {}",
        if config.dry_run { "Would rename" } else { "Renaming" },
        old.display(),
        new.display()
    );

    if !old.exists() {
        return Err(Error::Structure(format!(
            "Trying to rename from non-existent source: {}",
            old.display()
        )));
    }
    if new.exists() {
        return Err(Error::Structure(format!(
            "Trying to overwrite file: {}",
            new.display()
        )));
    }

    if !config.dry_run {
        fs::rename(&old, &new)?;
    }
    Ok(true)
}

// -- Tests --

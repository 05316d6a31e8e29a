//! The prepare pass: materialize the publish-ready set into `_live`.
//!
//! Selection is folder-driven: everything in the direct-publish role folders
//! is wanted, only `!`-flagged files elsewhere. The pass leaves `_live` as a
//! complete, minimal mirror of the wanted set, rebuilding only files whose
//! source changed since the manifest was last written.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::manifest::{self, LiveManifest, ManifestEntry};
use crate::naming;
use crate::processing::{content_hash, ImageProcessor, DESCRIPTION_KEY};
use crate::structure::{validate_has_necessary_photos, violation};
use crate::types::{
    child_dirs, image_entries, warn_duplicate_hashes, PhotoKind, ProductContext,
    ProductDirectory, RunReport, DIRECT_PUBLISH_DIRS, LIVE_DIR,
};

/// Run the prepare pass over one product directory.
pub fn prepare_product(
    config: &Config,
    report: &mut RunReport,
    processor: &dyn ImageProcessor,
    product: &ProductDirectory,
) -> Result<()> {
    let live = product.live_dir();

    if config.reprocess_all {
        clear_live(config, &live)?;
    }
    if !live.exists() && !config.dry_run {
        fs::create_dir_all(&live)?;
    }

    let wanted = select_live_photos(product)?;
    warn_duplicate_hashes(
        wanted
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.source_hash.as_str())),
    );

    let existing = image_entries(&live)?;
    let previous = manifest::read(&live);

    process_wanted(config, report, processor, &live, &wanted, &previous)?;
    remove_unwanted(config, &live, &existing, &wanted)?;

    if !config.dry_run {
        manifest::write(&live, &wanted)?;
    }

    validate_has_necessary_photos(product);
    Ok(())
}

/// Compute the wanted live set: live filename -> source path and digest.
/// Indices restart per folder; uptos ride along on their sibling's index.
fn select_live_photos(product: &ProductDirectory) -> Result<LiveManifest> {
    let mut wanted = LiveManifest::new();

    for folder in child_dirs(&product.path)? {
        if folder == LIVE_DIR {
            continue;
        }
        let dir = product.path.join(&folder);
        let ctx = ProductContext::from_sku_dir(&dir);
        let publish_all = DIRECT_PUBLISH_DIRS.contains(&folder.as_str());

        let (uptos, normal) = naming::partition_uptos(image_entries(&dir)?);
        let mut index = 0u32;
        for entry in &normal {
            if !publish_all && !entry.starts_with('!') {
                continue;
            }
            index += 1;
            insert_wanted(&mut wanted, &dir, &ctx, entry, index)?;

            for upto in naming::matching_uptos(&uptos, entry) {
                insert_wanted(&mut wanted, &dir, &ctx, upto, index)?;
            }
        }
    }

    Ok(wanted)
}

fn insert_wanted(
    wanted: &mut LiveManifest,
    dir: &Path,
    ctx: &ProductContext,
    entry: &str,
    index: u32,
) -> Result<()> {
    let source = dir.join(entry);
    wanted.insert(
        naming::live_name(entry, ctx, index),
        ManifestEntry {
            source_hash: content_hash(&source)?,
            source,
        },
    );
    Ok(())
}

fn process_wanted(
    config: &Config,
    report: &mut RunReport,
    processor: &dyn ImageProcessor,
    live: &Path,
    wanted: &LiveManifest,
    previous: &LiveManifest,
) -> Result<()> {
    for (live_name, data) in wanted {
        let dest = live.join(live_name);
        let prev = previous.get(live_name);

        if prev == Some(data) && dest.exists() {
            debug!("No changes to {}", live_name);
            continue;
        }

        rebuild(config, report, processor, &dest, live_name, data)?;
        info!(
            "{} {} image for publishing: {}",
            if config.dry_run { "Would mark" } else { "Marked" },
            if prev.is_some() { "changed" } else { "new" },
            live_name
        );
    }
    Ok(())
}

// Work on a throwaway copy so a failed resize or optimize never corrupts
// the source or leaves a half-written live file.
fn rebuild(
    config: &Config,
    report: &mut RunReport,
    processor: &dyn ImageProcessor,
    dest: &Path,
    live_name: &str,
    data: &ManifestEntry,
) -> Result<()> {
    let kind = PhotoKind::from_live_name(live_name);
    let lenient = naming::UPTO_RE.is_match(live_name);

    let ext = Path::new(live_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let tmp = tempfile::Builder::new().suffix(&ext).tempfile()?;
    fs::copy(&data.source, tmp.path())?;

    if let Err(e) = processor.validate_dimensions(tmp.path(), kind, lenient) {
        violation(config, report, format!("[{}] {}", live_name, e))?;
        return Ok(());
    }

    if !config.dry_run {
        processor.resize_if_oversized(tmp.path(), PhotoKind::MAX_SIDE)?;
        let description = processor.read_metadata_field(&data.source, DESCRIPTION_KEY)?;
        processor.optimize(tmp.path())?;
        if let Some(description) = description {
            processor.write_metadata_field(tmp.path(), DESCRIPTION_KEY, &description)?;
        }
        fs::copy(tmp.path(), dest)?;
    }
    Ok(())
}

fn remove_unwanted(
    config: &Config,
    live: &Path,
    existing: &[String],
    wanted: &LiveManifest,
) -> Result<()> {
    let unwanted: Vec<&String> = existing
        .iter()
        .filter(|name| !wanted.contains_key(*name))
        .collect();
    if unwanted.is_empty() {
        return Ok(());
    }

    info!(
        "{} {} unwanted previously-live image{}",
        if config.dry_run { "Would remove" } else { "Removing" },
        unwanted.len(),
        if unwanted.len() == 1 { "" } else { "s" }
    );
    for name in unwanted {
        debug!(
            "\t- {} {}",
            if config.dry_run { "Would remove" } else { "Removing" },
            name
        );
        if !config.dry_run {
            fs::remove_file(live.join(name))?;
        }
    }
    Ok(())
}

fn clear_live(config: &Config, live: &Path) -> Result<()> {
    if config.dry_run {
        warn!(
            "Skipping reprocessing all files while in dry-run mode -- validations may not run against the final files"
        );
    } else if live.exists() {
        fs::remove_dir_all(live)?;
        fs::create_dir(live)?;
    }
    Ok(())
}

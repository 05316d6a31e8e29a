//! Applies a reconciliation plan to one product's remote catalog entry.

use std::fs;

use log::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming;
use crate::processing::{ImageProcessor, DESCRIPTION_KEY};
use crate::sync::remote::{RemoteCatalog, UploadOpts};
use crate::sync::{compute_plan, effective_tracked, verify_converged, HashRecord};
use crate::types::{image_entries, warn_duplicate_hashes, PhotoKind, ProductDirectory, RunReport};

/// Reconcile the product's `_live` directory against the remote catalog:
/// remove changed or unexpected remote images, upload new content, record
/// the resulting hash set in the product's metadata field, then verify
/// convergence.
pub fn publish_product(
    config: &Config,
    report: &mut RunReport,
    remote: &dyn RemoteCatalog,
    processor: &dyn ImageProcessor,
    product: &ProductDirectory,
) -> Result<()> {
    let Some(product_id) = product.product_id() else {
        return Err(Error::Structure(format!(
            "{} has no numeric product id and cannot be published",
            product.name()
        )));
    };

    let live_dir = product.live_dir();
    let mut local = HashRecord::new();
    for entry in image_entries(&live_dir)? {
        let hash = crate::processing::content_hash(&live_dir.join(&entry))?;
        local.insert(entry, hash);
    }
    warn_duplicate_hashes(local.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let tracked = read_tracked(config, remote, product_id)?;
    let actual = remote.list_images(product_id)?;
    let tracked = effective_tracked(tracked, &actual);

    let plan = compute_plan(&local, &tracked, &actual);
    if plan.is_empty() {
        debug!("{} is already in sync", product.name());
        return Ok(());
    }

    if config.dry_run {
        for img in &plan.to_remove {
            info!("Would remove remote image {} from {}", img.filename, product.name());
        }
        for name in &plan.to_add {
            info!("Would upload {} to {}", name, product.name());
        }
        return Ok(());
    }

    for img in &plan.to_remove {
        debug!("Removing remote image {} from {}", img.filename, product.name());
        remote.delete_image(product_id, img.id)?;
    }

    let failures = upload_all(config, remote, processor, product, product_id, &plan.to_add)?;
    if !failures.is_empty() {
        return Err(Error::Sync(format!(
            "{} uploads failed for {}: {}",
            failures.len(),
            product.name(),
            failures.join(", ")
        )));
    }

    remote.set_metadata_field(
        product_id,
        &config.metafield_namespace,
        &config.metafield_key,
        &serde_json::to_string(&local)?,
    )?;

    let actual = remote.list_images(product_id)?;
    if !verify_converged(&local, &actual) {
        error!(
            "FATAL: {} did not converge after publishing; remote images do not match the live set",
            product.name()
        );
        report.record(format!("{} did not converge after publishing", product.name()));
    }
    Ok(())
}

fn read_tracked(
    config: &Config,
    remote: &dyn RemoteCatalog,
    product_id: u64,
) -> Result<Option<HashRecord>> {
    let raw = remote.get_metadata_field(
        product_id,
        &config.metafield_namespace,
        &config.metafield_key,
    )?;
    Ok(raw.and_then(|value| match serde_json::from_str(&value) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!("Ignoring unparsable tracked remote state: {}", err);
            None
        }
    }))
}

/// Upload the planned additions on a bounded worker pool, returning the
/// filenames that failed.
fn upload_all(
    config: &Config,
    remote: &dyn RemoteCatalog,
    processor: &dyn ImageProcessor,
    product: &ProductDirectory,
    product_id: u64,
    to_add: &[String],
) -> Result<Vec<String>> {
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.upload_workers)
        .build()
        .map_err(|e| Error::Sync(format!("could not start upload workers: {}", e)))?;

    let failures = pool.install(|| {
        to_add
            .par_iter()
            .filter_map(|name| {
                match upload_one(remote, processor, product, product_id, name) {
                    Ok(()) => {
                        info!("Uploaded {} to {}", name, product.name());
                        None
                    }
                    Err(err) => {
                        error!("Upload of {} to {} failed: {}", name, product.name(), err);
                        Some(name.clone())
                    }
                }
            })
            .collect()
    });
    Ok(failures)
}

fn upload_one(
    remote: &dyn RemoteCatalog,
    processor: &dyn ImageProcessor,
    product: &ProductDirectory,
    product_id: u64,
    name: &str,
) -> Result<()> {
    let path = product.live_dir().join(name);
    let bytes = fs::read(&path)?;

    let variant_ids = match naming::sku_token(name) {
        Some(sku) => remote
            .find_variants_by_sku(product_id, &sku)?
            .into_iter()
            .map(|v| v.id)
            .collect(),
        None => Vec::new(),
    };

    // The first editorial shot leads the product page.
    let position = (PhotoKind::from_live_name(name) == PhotoKind::Editorial
        && naming::live_index(name) == Some(1))
    .then_some(1);

    let alt_text = processor.read_metadata_field(&path, DESCRIPTION_KEY)?;

    remote.upload_image(
        product_id,
        &bytes,
        &UploadOpts {
            filename: name.to_string(),
            variant_ids,
            position,
            alt_text,
        },
    )
}

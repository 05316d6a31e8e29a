//! The mirror pass: bootstrap a local catalog tree from the remote store.
//!
//! Every remote product becomes `root/category/product` with the role
//! folders and one folder per variant SKU, and each remote image is
//! downloaded into the folder its filename token selects. Files landing in
//! a bangable folder (SKU folders and `product/`) get the `!` selection
//! prefix, since everything remote is by definition live.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use log::{error, info, warn};
use rayon::prelude::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming;
use crate::sync::remote::{RemoteCatalog, RemoteImage, RemoteProduct};
use crate::types::{PhotoKind, RunReport};

struct Download {
    url: String,
    dest: PathBuf,
}

/// Rebuild the local catalog root from the remote store. Refuses to touch
/// an existing root unless `overwrite` is set. Download failures are
/// recorded on the report; the rest of the mirror still completes.
pub fn mirror_catalog(
    config: &Config,
    report: &mut RunReport,
    remote: &dyn RemoteCatalog,
    overwrite: bool,
) -> Result<()> {
    prepare_root(config, overwrite)?;

    let products = remote.list_products()?;
    info!(
        "Mirroring {} remote products into {}",
        products.len(),
        config.root.display()
    );

    let mut downloads = Vec::new();
    for product in &products {
        downloads.extend(plan_product(config, product)?);
    }

    if config.dry_run {
        for d in &downloads {
            info!("Would download {} -> {}", d.url, d.dest.display());
        }
        return Ok(());
    }

    info!("Downloading {} images", downloads.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.upload_workers)
        .build()
        .map_err(|e| Error::Sync(format!("could not start download workers: {}", e)))?;

    let failures: Vec<String> = pool.install(|| {
        downloads
            .par_iter()
            .filter_map(|d| match fetch_one(remote, d) {
                Ok(()) => None,
                Err(e) => {
                    error!("Download of {} failed: {}", d.url, e);
                    Some(d.url.clone())
                }
            })
            .collect()
    });

    for url in failures {
        report.record(format!("download failed: {}", url));
    }
    Ok(())
}

fn prepare_root(config: &Config, overwrite: bool) -> Result<()> {
    if config.root.exists() {
        if !overwrite {
            return Err(Error::Configuration(format!(
                "catalog root already exists: {}",
                config.root.display()
            )));
        }
        if config.dry_run {
            warn!("Would clear existing catalog root: {}", config.root.display());
        } else {
            fs::remove_dir_all(&config.root)?;
        }
    }
    if !config.dry_run {
        fs::create_dir_all(&config.root)?;
    }
    Ok(())
}

/// Create one product's folders and plan its image downloads.
fn plan_product(config: &Config, product: &RemoteProduct) -> Result<Vec<Download>> {
    let dir = config
        .root
        .join(naming::category_from_vendor(&product.vendor))
        .join(naming::product_dir_name(&product.title, product.id));

    let mut buckets: BTreeMap<String, Vec<&RemoteImage>> = BTreeMap::new();
    for role in ["_editorials", "_headers", "product"] {
        buckets.insert(role.to_string(), Vec::new());
    }
    for variant in &product.variants {
        buckets.insert(naming::sku_folder(&variant.sku), Vec::new());
    }

    for img in &product.images {
        match classify(img, &buckets).and_then(|folder| buckets.get_mut(&folder)) {
            Some(bucket) => bucket.push(img),
            None => warn!(
                "No matching SKU folder for remote image {} of '{}'",
                img.filename, product.title
            ),
        }
    }

    let mut out = Vec::new();
    for (folder, images) in &mut buckets {
        let target = dir.join(folder);
        if !config.dry_run {
            fs::create_dir_all(&target)?;
        }

        let bang = if folder.starts_with('_') { "" } else { "!" };
        images.sort_by(|a, b| a.src.cmp(&b.src));
        for img in images.iter() {
            let name = format!("{}{}", bang, naming::remote_filename(&img.src));
            out.push(Download {
                url: img.src.clone(),
                dest: target.join(name),
            });
        }
    }
    Ok(out)
}

// Folder selection mirrors the live-name scheme: an embedded SKU token
// wins, then the header/editorial role words, then the plain product
// folder. A token with no variant folder means the variant was retired.
fn classify(img: &RemoteImage, buckets: &BTreeMap<String, Vec<&RemoteImage>>) -> Option<String> {
    if let Some(token) = naming::sku_token(&img.filename) {
        let folder = token.to_uppercase();
        return buckets.contains_key(&folder).then_some(folder);
    }
    Some(
        match PhotoKind::from_live_name(&img.filename) {
            PhotoKind::Header => "_headers",
            PhotoKind::Editorial => "_editorials",
            PhotoKind::Product => "product",
        }
        .to_string(),
    )
}

fn fetch_one(remote: &dyn RemoteCatalog, download: &Download) -> Result<()> {
    let bytes = remote.fetch_image(&download.url)?;
    fs::write(&download.dest, bytes)?;
    Ok(())
}

// -- Tests --

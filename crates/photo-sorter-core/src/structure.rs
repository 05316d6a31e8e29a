//! Structural validation of product directories.
//!
//! Every product directory must hold the four reserved role folders plus any
//! number of upper-case SKU folders, with no deeper nesting. Violations are
//! fatal in production mode and demoted to warnings in dry-run mode.

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming;
use crate::types::{
    child_dirs, image_entries, ProductDirectory, RunReport, DIRECT_PUBLISH_DIRS, LIVE_DIR,
    RESERVED_DIRS,
};

/// Category whose products legitimately ship without a header image.
pub const HEADER_EXEMPT_CATEGORY: &str = "xmas-shop";

/// Record a structural violation. Dry-run demotes it to a warning so the
/// rest of the catalog still gets checked; production mode returns an error
/// that aborts the current product.
pub fn violation(config: &Config, report: &mut RunReport, msg: String) -> Result<()> {
    if config.dry_run {
        warn!("{}", msg);
        report.record(msg);
        Ok(())
    } else {
        Err(Error::Structure(msg))
    }
}

/// Enforce the required folder convention on one product directory.
/// Creating missing reserved folders is the only mutation performed here.
pub fn verify_structure(
    config: &Config,
    report: &mut RunReport,
    product: &ProductDirectory,
) -> Result<()> {
    let dirs = child_dirs(&product.path)?;

    for d in RESERVED_DIRS {
        if !dirs.iter().any(|e| e == d) {
            if config.dry_run {
                debug!("Would create missing folder: {}", product.path.join(d).display());
            } else {
                fs::create_dir(product.path.join(d))?;
            }
        }
    }

    let sku_folders: Vec<String> = dirs
        .iter()
        .filter(|d| !RESERVED_DIRS.contains(&d.as_str()))
        .cloned()
        .collect();

    relocate_stray_bangs(config, report, product, &sku_folders)?;

    for entry in list_entries(&product.path)? {
        if RESERVED_DIRS.contains(&entry.as_str()) {
            continue;
        }
        let path = product.path.join(&entry);
        if path.is_dir() {
            if entry != entry.to_uppercase() {
                violation(
                    config,
                    report,
                    format!(
                        "Unexpected product folder '{}': SKU folders expected to be in all caps",
                        path.display()
                    ),
                )?;
            }
        } else if sku_folders.is_empty() {
            violation(
                config,
                report,
                format!(
                    "Found file where expecting only folders: {}. For products without SKUs, put the photos in the folder called 'product'",
                    path.display()
                ),
            )?;
        } else {
            violation(
                config,
                report,
                format!(
                    "Found file where expecting only folders: {}. File it in one of the SKU folders ({:?})",
                    path.display(),
                    sku_folders
                ),
            )?;
        }
    }

    for entry in &dirs {
        check_no_nesting(config, report, &product.path, entry)?;
    }

    for dir in DIRECT_PUBLISH_DIRS {
        check_upto_pairs(config, report, &product.path.join(dir))?;
    }

    Ok(())
}

/// Post-rename checks: upto variants must have a non-upto sibling, and SKU
/// folders should carry at least one publish-flagged file (advisory).
pub fn verify_post_renaming(
    config: &Config,
    report: &mut RunReport,
    product: &ProductDirectory,
) -> Result<()> {
    for dir in child_dirs(&product.path)? {
        if dir == LIVE_DIR || dir == "product" {
            continue;
        }
        let path = product.path.join(&dir);
        check_upto_pairs(config, report, &path)?;

        let is_sku = !RESERVED_DIRS.contains(&dir.as_str());
        if is_sku && !image_entries(&path)?.iter().any(|e| e.starts_with('!')) {
            warn!(
                "No publish-flagged ('!') files in SKU folder: {}",
                path.display()
            );
        }
    }
    Ok(())
}

/// Advisory check that the live set covers every required photo role.
pub fn validate_has_necessary_photos(product: &ProductDirectory) {
    let files = match image_entries(&product.live_dir()) {
        Ok(files) => files,
        Err(e) => {
            warn!("Could not inspect {}: {}", product.live_dir().display(), e);
            return;
        }
    };

    let header_exempt = product.category() == HEADER_EXEMPT_CATEGORY;
    if !header_exempt && !files.iter().any(|f| f.contains("header")) {
        warn!("[{}] missing required images: no header found", product.name());
    }
    if !files.iter().any(|f| f.contains("editorial")) {
        warn!("[{}] missing required images: no editorial found", product.name());
    }
    if files
        .iter()
        .all(|f| f.contains("header") || f.contains("editorial"))
    {
        warn!("[{}] missing required images: no product photos", product.name());
    }
}

// Publish-flagged files sitting in product/ belong in a SKU folder. With
// exactly one SKU folder the fix is unambiguous, so move them; otherwise
// flag the ambiguity.
fn relocate_stray_bangs(
    config: &Config,
    report: &mut RunReport,
    product: &ProductDirectory,
    sku_folders: &[String],
) -> Result<()> {
    if sku_folders.is_empty() {
        return Ok(());
    }

    let product_sub = product.path.join("product");
    for entry in list_entries(&product_sub)? {
        if !entry.starts_with('!') {
            continue;
        }
        if let [only] = sku_folders {
            warn!(
                "{} '!'-flagged file in the product folder to the only SKU folder ({}): {}",
                if config.dry_run { "Would move" } else { "Moving" },
                only,
                entry
            );
            if !config.dry_run {
                fs::rename(product_sub.join(&entry), product.path.join(only).join(&entry))?;
            }
        } else {
            violation(
                config,
                report,
                format!(
                    "Product has SKUs, so the product folder should not contain '!'-flagged files: {}",
                    product_sub.join(&entry).display()
                ),
            )?;
        }
    }
    Ok(())
}

fn check_no_nesting(
    config: &Config,
    report: &mut RunReport,
    product_path: &Path,
    entry: &str,
) -> Result<()> {
    let nested = child_dirs(&product_path.join(entry))?;
    if !nested.is_empty() {
        violation(
            config,
            report,
            format!(
                "Unexpected nested directories in {}: {:?}",
                product_path.join(entry).display(),
                nested
            ),
        )?;
    }
    Ok(())
}

fn check_upto_pairs(config: &Config, report: &mut RunReport, dir: &Path) -> Result<()> {
    let entries = image_entries(dir)?;
    for entry in &entries {
        if naming::UPTO_RE.is_match(entry) {
            let sibling = naming::strip_upto(entry);
            if !entries.contains(&sibling) {
                violation(
                    config,
                    report,
                    format!(
                        "Upto file is missing its non-upto sibling in {}: {} (expected {})",
                        dir.display(),
                        entry,
                        sibling
                    ),
                )?;
            }
        }
    }
    Ok(())
}

// All non-dot entries (files and directories) directly inside `dir`.
fn list_entries(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn live_config() -> Config {
        Config {
            dry_run: false,
            ..Config::default()
        }
    }

    fn make_product(root: &Path) -> ProductDirectory {
        let path = root.join("bottles").join("bamboo bottle - 123");
        fs::create_dir_all(&path).unwrap();
        ProductDirectory::new(path)
    }

    fn touch(path: &Path) {
        File::create(path).unwrap().write_all(b"x").unwrap();
    }

    #[test]
    fn test_creates_missing_reserved_folders() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        let mut report = RunReport::default();

        verify_structure(&live_config(), &mut report, &product).unwrap();

        for d in RESERVED_DIRS {
            assert!(product.path.join(d).is_dir(), "{} should exist", d);
        }
        assert!(report.is_success());
    }

    #[test]
    fn test_dry_run_does_not_create_folders() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        let mut report = RunReport::default();
        let config = Config {
            dry_run: true,
            ..Config::default()
        };

        verify_structure(&config, &mut report, &product).unwrap();
        assert!(!product.path.join("_live").exists());
    }

    #[test]
    fn test_lowercase_sku_folder_rejected() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        fs::create_dir(product.path.join("honey")).unwrap();
        let mut report = RunReport::default();

        let err = verify_structure(&live_config(), &mut report, &product).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn test_stray_file_rejected() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        touch(&product.path.join("loose.jpg"));
        let mut report = RunReport::default();

        let err = verify_structure(&live_config(), &mut report, &product).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn test_nested_directory_rejected() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        fs::create_dir_all(product.path.join("HONEY").join("extra")).unwrap();
        let mut report = RunReport::default();

        let err = verify_structure(&live_config(), &mut report, &product).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn test_orphan_upto_in_direct_publish_folder() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        fs::create_dir(product.path.join("_headers")).unwrap();
        touch(&product.path.join("_headers").join("header 1---upto1.jpg"));
        let mut report = RunReport::default();

        let err = verify_structure(&live_config(), &mut report, &product).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn test_paired_upto_accepted() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        fs::create_dir(product.path.join("_headers")).unwrap();
        touch(&product.path.join("_headers").join("header 1.jpg"));
        touch(&product.path.join("_headers").join("header 1---upto1.jpg"));
        let mut report = RunReport::default();

        verify_structure(&live_config(), &mut report, &product).unwrap();
        assert!(report.is_success());
    }

    #[test]
    fn test_stray_bang_moved_to_only_sku_folder() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        fs::create_dir(product.path.join("HONEY")).unwrap();
        fs::create_dir(product.path.join("product")).unwrap();
        touch(&product.path.join("product").join("!1.jpg"));
        let mut report = RunReport::default();

        verify_structure(&live_config(), &mut report, &product).unwrap();
        assert!(product.path.join("HONEY").join("!1.jpg").exists());
        assert!(!product.path.join("product").join("!1.jpg").exists());
    }

    #[test]
    fn test_stray_bang_with_multiple_sku_folders_rejected() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        fs::create_dir(product.path.join("HONEY")).unwrap();
        fs::create_dir(product.path.join("MAPLE")).unwrap();
        fs::create_dir(product.path.join("product")).unwrap();
        touch(&product.path.join("product").join("!1.jpg"));
        let mut report = RunReport::default();

        let err = verify_structure(&live_config(), &mut report, &product).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn test_dry_run_demotes_violations() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        fs::create_dir(product.path.join("honey")).unwrap();
        let mut report = RunReport::default();
        let config = Config {
            dry_run: true,
            ..Config::default()
        };

        verify_structure(&config, &mut report, &product).unwrap();
        assert!(!report.is_success());
    }

    #[test]
    fn test_post_renaming_orphan_upto_in_sku_folder() {
        let root = tempdir().unwrap();
        let product = make_product(root.path());
        fs::create_dir(product.path.join("HONEY")).unwrap();
        touch(&product.path.join("HONEY").join("!HONEY 1---upto1.jpg"));
        let mut report = RunReport::default();

        let err = verify_post_renaming(&live_config(), &mut report, &product).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }
}

//! End-to-end checks of the prepare pass against a real directory tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use photo_sorter_core::prepare::prepare_product;
use photo_sorter_core::processing::ImageProcessor;
use photo_sorter_core::{Config, PhotoKind, ProductDirectory, Result, RunReport};

/// Permissive processor that counts dimension validations, so tests can
/// observe which files were actually rebuilt.
#[derive(Default)]
struct CountingProcessor {
    validated: AtomicUsize,
}

impl ImageProcessor for CountingProcessor {
    fn validate_dimensions(&self, _path: &Path, _kind: PhotoKind, _lenient: bool) -> Result<()> {
        self.validated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resize_if_oversized(&self, _path: &Path, _max_side: u32) -> Result<()> {
        Ok(())
    }

    fn optimize(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn read_metadata_field(&self, _path: &Path, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn write_metadata_field(&self, _path: &Path, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }
}

/// Build root/drinkware/"bamboo bottle - 123456789" with a header, an
/// editorial, one flagged SKU photo and one unflagged SKU photo.
fn sample_product(root: &Path) -> PathBuf {
    let product = root.join("drinkware").join("bamboo bottle - 123456789");
    for (dir, file, content) in [
        ("_headers", "1.jpg", "header bytes"),
        ("_editorials", "1.jpg", "editorial bytes"),
        ("SKU-A", "!1.jpg", "flagged sku bytes"),
        ("SKU-A", "2.jpg", "unflagged sku bytes"),
    ] {
        let dir = product.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }
    product
}

fn live_names(live: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(live)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_prepare_builds_live_set_from_flagged_and_role_photos() {
    let root = tempfile::tempdir().unwrap();
    let product = ProductDirectory::new(sample_product(root.path()));
    let config = Config {
        dry_run: false,
        ..Config::default()
    };
    let mut report = RunReport::default();
    let processor = CountingProcessor::default();

    prepare_product(&config, &mut report, &processor, &product).unwrap();

    assert!(report.is_success());
    let names = live_names(&product.live_dir());
    assert_eq!(names.len(), 4, "three live images plus the manifest: {:?}", names);
    assert!(names.contains(&".meta".to_string()));
    assert!(names.iter().any(|n| n.contains("___header___1")));
    assert!(names.iter().any(|n| n.contains("___editorial___1")));
    assert!(names.iter().any(|n| n.contains("___sku-a___1")));
    // The unflagged SKU photo stays out of the live set
    assert_eq!(names.iter().filter(|n| n.contains("sku-a")).count(), 1);
}

#[test]
fn test_unchanged_sources_are_not_rebuilt() {
    let root = tempfile::tempdir().unwrap();
    let product = ProductDirectory::new(sample_product(root.path()));
    let config = Config {
        dry_run: false,
        ..Config::default()
    };
    let processor = CountingProcessor::default();

    let mut report = RunReport::default();
    prepare_product(&config, &mut report, &processor, &product).unwrap();
    assert_eq!(processor.validated.load(Ordering::SeqCst), 3);

    let mut report = RunReport::default();
    prepare_product(&config, &mut report, &processor, &product).unwrap();
    assert_eq!(
        processor.validated.load(Ordering::SeqCst),
        3,
        "a second pass over unchanged sources must rebuild nothing"
    );
}

#[test]
fn test_changed_source_is_rebuilt_and_dropped_flag_removes_live_file() {
    let root = tempfile::tempdir().unwrap();
    let product = ProductDirectory::new(sample_product(root.path()));
    let config = Config {
        dry_run: false,
        ..Config::default()
    };
    let processor = CountingProcessor::default();

    let mut report = RunReport::default();
    prepare_product(&config, &mut report, &processor, &product).unwrap();

    fs::write(product.path.join("_headers").join("1.jpg"), "new header bytes").unwrap();
    fs::rename(
        product.path.join("SKU-A").join("!1.jpg"),
        product.path.join("SKU-A").join("1.jpg"),
    )
    .unwrap();

    let before = processor.validated.load(Ordering::SeqCst);
    let mut report = RunReport::default();
    prepare_product(&config, &mut report, &processor, &product).unwrap();

    assert_eq!(processor.validated.load(Ordering::SeqCst), before + 1);
    let names = live_names(&product.live_dir());
    assert!(
        !names.iter().any(|n| n.contains("sku-a")),
        "unflagging a photo must remove it from the live set: {:?}",
        names
    );
}

#[test]
fn test_dry_run_touches_nothing() {
    let root = tempfile::tempdir().unwrap();
    let product = ProductDirectory::new(sample_product(root.path()));
    let config = Config {
        dry_run: true,
        ..Config::default()
    };
    let mut report = RunReport::default();
    let processor = CountingProcessor::default();

    prepare_product(&config, &mut report, &processor, &product).unwrap();

    assert!(!product.live_dir().exists());
}

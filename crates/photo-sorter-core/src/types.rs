use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Result;

/// Reserved role folders every product directory must carry.
pub const RESERVED_DIRS: [&str; 4] = ["_headers", "_editorials", "_live", "product"];

/// Role folders whose files are published without a `!` selection marker.
pub const DIRECT_PUBLISH_DIRS: [&str; 2] = ["_headers", "_editorials"];

/// Name of the folder holding the publish-ready image set.
pub const LIVE_DIR: &str = "_live";

/// Extensions handled by the rename and prepare passes.
pub const IMG_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".tiff"];

/// A product directory discovered by the walker: root/category/product.
#[derive(Debug, Clone)]
pub struct ProductDirectory {
    pub path: PathBuf,
}

impl ProductDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Folder name, e.g. "bamboo bottle - 123456789"
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Numeric product id parsed from the trailing " - <digits>" of the name
    pub fn product_id(&self) -> Option<u64> {
        self.name().rsplit(" - ").next()?.parse().ok()
    }

    /// Category folder name (the parent directory)
    pub fn category(&self) -> String {
        self.path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn live_dir(&self) -> PathBuf {
        self.path.join(LIVE_DIR)
    }
}

/// Structural role of a file, derived from the last three path segments of
/// its parent folder in reverse order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductContext {
    pub sku: String,
    pub product: String,
    pub category: String,
}

impl ProductContext {
    /// Classify a SKU-or-role folder path (root/category/product/sku).
    /// The caller guarantees the expected depth.
    pub fn from_sku_dir(path: &Path) -> Self {
        let mut parts = path
            .components()
            .rev()
            .map(|c| c.as_os_str().to_string_lossy().into_owned());

        Self {
            sku: parts.next().unwrap_or_default(),
            product: parts.next().unwrap_or_default(),
            category: parts.next().unwrap_or_default(),
        }
    }

    /// Numeric product id parsed from the product folder name
    pub fn product_id(&self) -> Option<u64> {
        self.product.rsplit(" - ").next()?.parse().ok()
    }
}

/// Semantic kind of a published photo, with per-kind dimension thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoKind {
    Header,
    Editorial,
    Product,
}

impl PhotoKind {
    /// Largest allowed side length after processing
    pub const MAX_SIDE: u32 = 2048;

    /// Select the kind from a computed live filename
    pub fn from_live_name(name: &str) -> Self {
        if name.contains("header") {
            Self::Header
        } else if name.contains("editorial") {
            Self::Editorial
        } else {
            Self::Product
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Editorial => "editorial",
            Self::Product => "product",
        }
    }

    pub fn min_width(&self) -> Option<u32> {
        match self {
            Self::Header => Some(2002),
            Self::Editorial => None,
            Self::Product => Some(960),
        }
    }

    pub fn min_height(&self) -> Option<u32> {
        match self {
            Self::Header => None,
            Self::Editorial => Some(800),
            Self::Product => Some(640),
        }
    }

    /// Expected width-to-height ratio, where the kind constrains it
    pub fn expected_ratio(&self) -> Option<f64> {
        match self {
            Self::Header => Some(2.5),
            Self::Editorial => Some(0.618),
            Self::Product => None,
        }
    }
}

/// Accumulated run-level errors; decides overall success without halting
/// traversal of sibling products.
#[derive(Debug, Default)]
pub struct RunReport {
    errors: Vec<String>,
}

impl RunReport {
    pub fn record(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// List the image files directly inside `dir`, sorted by name. Nested
/// directories and unhandled extensions are skipped with a debug log; a
/// missing directory yields an empty list.
pub fn image_entries(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if entry.path().is_dir() {
            debug!("Skipping nested folder: {}", entry.path().display());
            continue;
        }

        let ext = Path::new(&name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if IMG_EXTENSIONS.contains(&ext.as_str()) {
            out.push(name);
        } else {
            debug!("Skipping unhandled extension for: {}", name);
        }
    }

    out.sort();
    Ok(out)
}

/// List the immediate child directories of `dir`, sorted by name,
/// skipping dotfiles.
pub fn child_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && entry.path().is_dir() {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}

/// Warn when two files within the same semantic group carry identical
/// content. Reuse across groups is allowed and stays quiet.
pub fn warn_duplicate_hashes<'a, I>(entries: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut seen: HashMap<(PhotoKind, &str), &str> = HashMap::new();
    for (name, hash) in entries {
        let kind = PhotoKind::from_live_name(name);
        if let Some(prev) = seen.insert((kind, hash), name) {
            warn!("Duplicate {} content: {} matches {}", kind.label(), name, prev);
        }
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_product_id_from_folder_name() {
        let dir = ProductDirectory::new("/photos/watches/bamboo watch - 123456789");
        assert_eq!(dir.product_id(), Some(123456789));
        assert_eq!(dir.category(), "watches");
    }

    #[test]
    fn test_product_id_missing() {
        let dir = ProductDirectory::new("/photos/watches/unnumbered");
        assert_eq!(dir.product_id(), None);
    }

    #[test]
    fn test_context_from_sku_dir() {
        let ctx = ProductContext::from_sku_dir(Path::new(
            "/photos/watches/bamboo watch - 123/HONEY",
        ));
        assert_eq!(ctx.sku, "HONEY");
        assert_eq!(ctx.product, "bamboo watch - 123");
        assert_eq!(ctx.category, "watches");
        assert_eq!(ctx.product_id(), Some(123));
    }

    #[test]
    fn test_photo_kind_from_live_name() {
        assert_eq!(PhotoKind::from_live_name("x___header___1-a.jpg"), PhotoKind::Header);
        assert_eq!(
            PhotoKind::from_live_name("x___editorial___2-a.jpg"),
            PhotoKind::Editorial
        );
        assert_eq!(PhotoKind::from_live_name("x___honey___1-a.jpg"), PhotoKind::Product);
    }

    #[test]
    fn test_image_entries_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in ["b.jpg", "a.jpeg", "notes.txt", ".hidden.jpg"] {
            File::create(dir.path().join(name))
                .unwrap()
                .write_all(b"x")
                .unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();

        let entries = image_entries(dir.path()).unwrap();
        assert_eq!(entries, vec!["a.jpeg".to_string(), "b.jpg".to_string()]);
    }

    #[test]
    fn test_image_entries_missing_dir() {
        assert!(image_entries(Path::new("/does/not/exist")).unwrap().is_empty());
    }
}

//! Core functionality for curating and publishing a product photo catalog.
//!
//! This library provides the foundational components of the pipeline:
//! - Catalog traversal and structural validation
//! - Deterministic local and publishable filename computation
//! - The rename and prepare passes that maintain each product's `_live` set
//! - Content-hash reconciliation against the remote catalog

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

// -- Public Modules --
pub mod config;
pub mod logging;
pub mod manifest;
pub mod mirror;
pub mod naming;
pub mod prepare;
pub mod processing;
pub mod rename;
pub mod structure;
pub mod sync;
pub mod traversal;
pub mod types;

use processing::ImageProcessor;
use sync::remote::RemoteCatalog;

/// Main entry point for the photo pipeline passes. Each pass traverses the
/// catalog, validates structure along the way, and accumulates per-product
/// failures in the returned report rather than halting on the first one.
pub struct PhotoSorter<'a> {
    config: Config,
    processor: &'a dyn ImageProcessor,
}

impl<'a> PhotoSorter<'a> {
    pub fn new(config: Config, processor: &'a dyn ImageProcessor) -> Self {
        Self { config, processor }
    }

    /// Normalize source filenames in every product directory.
    pub fn rename(&self) -> Result<RunReport> {
        let mut report = RunReport::default();
        traversal::walk(&self.config, &mut report, |config, report, product| {
            rename::rename_product(config, report, product).map(|_| ())
        })?;
        Ok(report)
    }

    /// Rebuild each product's `_live` directory from its selected sources.
    pub fn prepare(&self) -> Result<RunReport> {
        let mut report = RunReport::default();
        traversal::walk(&self.config, &mut report, |config, report, product| {
            prepare::prepare_product(config, report, self.processor, product)
        })?;
        Ok(report)
    }

    /// Check catalog structure, upto pairing and photo coverage.
    pub fn validate(&self) -> Result<RunReport> {
        let mut report = RunReport::default();
        traversal::walk(&self.config, &mut report, |config, report, product| {
            structure::verify_post_renaming(config, report, product)?;
            structure::validate_has_necessary_photos(product);
            Ok(())
        })?;
        Ok(report)
    }

    /// Bootstrap a local catalog tree by downloading the remote catalog.
    pub fn mirror(&self, remote: &dyn RemoteCatalog, overwrite: bool) -> Result<RunReport> {
        let mut report = RunReport::default();
        mirror::mirror_catalog(&self.config, &mut report, remote, overwrite)?;
        Ok(report)
    }

    /// Reconcile every product's `_live` set against the remote catalog.
    pub fn publish(&self, remote: &dyn RemoteCatalog) -> Result<RunReport> {
        let mut report = RunReport::default();
        traversal::walk(&self.config, &mut report, |config, report, product| {
            sync::executor::publish_product(config, report, remote, self.processor, product)
        })?;
        Ok(report)
    }
}

//! Image processing collaborator.
//!
//! The engine decides *whether* an image gets validated, resized or
//! optimized; the [`ImageProcessor`] implementation decides how. Tests and
//! dry-runs substitute their own implementations behind the trait.

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::types::PhotoKind;

/// Metadata field carried across optimization (the photographer's caption).
pub const DESCRIPTION_KEY: &str = "ImageDescription";

pub trait ImageProcessor: Send + Sync {
    /// Check the image against the kind's dimension thresholds. With
    /// `lenient` set (upto variants), undersized images pass with a debug
    /// log; ratio constraints still apply.
    fn validate_dimensions(&self, path: &Path, kind: PhotoKind, lenient: bool) -> Result<()>;

    /// Shrink the image in place when either side exceeds `max_side`.
    fn resize_if_oversized(&self, path: &Path, max_side: u32) -> Result<()>;

    /// Re-encode the image in place for publishing.
    fn optimize(&self, path: &Path) -> Result<()>;

    fn read_metadata_field(&self, path: &Path, key: &str) -> Result<Option<String>>;

    fn write_metadata_field(&self, path: &Path, key: &str, value: &str) -> Result<()>;
}

/// Processor backed by the `image` crate.
pub struct RasterProcessor;

impl ImageProcessor for RasterProcessor {
    fn validate_dimensions(&self, path: &Path, kind: PhotoKind, lenient: bool) -> Result<()> {
        let (w, h) = image::image_dimensions(path)?;
        let name = path.display();

        if let Some(min_w) = kind.min_width() {
            if w < min_w {
                if lenient {
                    debug!(
                        "{} is narrower than recommended ({}), allowing it as an upto image",
                        name, min_w
                    );
                } else {
                    return Err(Error::Structure(format!(
                        "{}: width {} smaller than min allowed ({})",
                        name, w, min_w
                    )));
                }
            }
        }
        if let Some(min_h) = kind.min_height() {
            if h < min_h {
                if lenient {
                    debug!(
                        "{} is shorter than recommended ({}), allowing it as an upto image",
                        name, min_h
                    );
                } else {
                    return Err(Error::Structure(format!(
                        "{}: height {} smaller than min allowed ({})",
                        name, h, min_h
                    )));
                }
            }
        }

        if let Some(expected) = kind.expected_ratio() {
            let ratio = w as f64 / h as f64;
            if !ratio_within_tolerance(ratio, expected) {
                return Err(Error::Structure(format!(
                    "{}: dimensions {}x{} give ratio {:.3}, expected {}",
                    name, w, h, ratio, expected
                )));
            }
        }

        debug!("Photo {} is valid", name);
        Ok(())
    }

    fn resize_if_oversized(&self, path: &Path, max_side: u32) -> Result<()> {
        let (w, h) = image::image_dimensions(path)?;
        if w <= max_side && h <= max_side {
            return Ok(());
        }

        info!(
            "Shrinking {} from {}x{} to max side length of {}",
            path.display(),
            w,
            h,
            max_side
        );
        let img = image::open(path)?;
        img.resize(max_side, max_side, FilterType::Lanczos3)
            .save(path)?;
        Ok(())
    }

    fn optimize(&self, path: &Path) -> Result<()> {
        // Re-encoding strips editing-tool bloat; dedicated optimizers are a
        // backend concern, not the engine's.
        let img = image::open(path)?;
        img.save(path)?;
        debug!("Optimized {}", path.display());
        Ok(())
    }

    fn read_metadata_field(&self, path: &Path, _key: &str) -> Result<Option<String>> {
        debug!("No metadata backend for {}", path.display());
        Ok(None)
    }

    fn write_metadata_field(&self, path: &Path, key: &str, _value: &str) -> Result<()> {
        debug!("Dropping metadata field {} for {}", key, path.display());
        Ok(())
    }
}

/// Hex digest of a file's content.
pub fn content_hash(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// Ratio equality to as many decimal places as the expected value carries:
// 2.5 tolerates 0.1 either way, 0.618 tolerates 0.001.
fn ratio_within_tolerance(given: f64, expected: f64) -> bool {
    let places = expected
        .to_string()
        .split('.')
        .nth(1)
        .map(|frac| frac.len() as i32)
        .unwrap_or(0);
    let variance = 1.0 / 10f64.powi(places);
    let factor = 10f64.powi(places);
    let adjusted = (given * factor).round() / factor;

    adjusted <= expected + variance && adjusted >= expected - variance
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_ratio_tolerance_tracks_precision() {
        assert!(ratio_within_tolerance(2.47, 2.5));
        assert!(!ratio_within_tolerance(2.2, 2.5));
        assert!(ratio_within_tolerance(0.6185, 0.618));
        assert!(!ratio_within_tolerance(0.625, 0.618));
    }

    #[test]
    fn test_content_hash_is_stable_and_content_sensitive() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::File::create(&a).unwrap().write_all(b"same").unwrap();
        fs::File::create(&b).unwrap().write_all(b"same").unwrap();

        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());

        fs::File::create(&b).unwrap().write_all(b"different").unwrap();
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }
}

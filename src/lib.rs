//! PDF Shrinker Library
//!
//! Core logic for shrinking PDFs by re-encoding their images. Shared between
//! CLI and WASM targets.
//!
//! Walks the XObject resources of every page (and of every form XObject they
//! reach), decodes each image and replaces it under the same name with a JPEG
//! or lossless re-encoding. Everything else in the document is left alone.

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub mod decode;
pub mod error;
pub mod pass;
#[cfg(not(target_arch = "wasm32"))]
pub mod prompt;
pub mod transcode;
pub mod walker;

#[cfg(test)]
mod test_support;

pub use error::{Result, ShrinkError};
pub use pass::{run, run_with_log, PassReport};
pub use transcode::{transcode, LossyEncoder, TranscodePolicy, DEFAULT_QUALITY};
pub use walker::{ImageSite, ResourceDict, ResourceWalker, XObjectKind};

use lopdf::Document;

/// Image encoding mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// JPEG at the configured quality
    #[default]
    Lossy,
    /// Flate-compressed samples (the historical `--tiff` option)
    Lossless,
}

/// Options for PDF shrinking
#[derive(Debug, Clone)]
pub struct ShrinkOptions {
    /// Compression quality between 0 (smallest file) and 1 (best quality)
    pub quality: f32,
    pub mode: Mode,
    /// Drop objects left unreferenced by the replacements before saving
    pub prune_unused: bool,
}

impl Default for ShrinkOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            mode: Mode::Lossy,
            prune_unused: true,
        }
    }
}

impl ShrinkOptions {
    /// Build the policy for one pass. The quality is checked in both modes.
    pub fn policy(&self) -> Result<TranscodePolicy> {
        let lossy = TranscodePolicy::lossy(self.quality)?;
        Ok(match self.mode {
            Mode::Lossy => lossy,
            Mode::Lossless => TranscodePolicy::Lossless,
        })
    }
}

/// Convert a quality on the 0-100 scale to the 0-1 scale, clamping
pub fn quality_from_percent(percent: f32) -> f32 {
    (percent / 100.0).clamp(0.0, 1.0)
}

/// Serialize a transcoded document
fn save_to_bytes(doc: &mut Document, options: &ShrinkOptions) -> Result<Vec<u8>> {
    if options.prune_unused {
        let pruned = doc.prune_objects();
        log::debug!("Pruned {} unreferenced objects", pruned.len());
    }

    let mut output_bytes = Vec::new();
    doc.save_to(&mut output_bytes)
        .map_err(|e| ShrinkError::SaveFailed(e.to_string()))?;
    Ok(output_bytes)
}

/// Shrink PDF from bytes and return shrunken PDF bytes
pub fn shrink_pdf_bytes(
    input_bytes: &[u8],
    options: &ShrinkOptions,
) -> Result<(Vec<u8>, PassReport)> {
    let mut policy = options.policy()?;

    let mut doc = Document::load_mem(input_bytes)
        .map_err(|e| ShrinkError::InputUnreadable(e.to_string()))?;

    let report = pass::run(&mut doc, &mut policy)?;
    let output_bytes = save_to_bytes(&mut doc, options)?;

    Ok((output_bytes, report))
}

#[cfg(not(target_arch = "wasm32"))]
pub mod file_ops {
    use super::*;
    use std::fs::{self, File, OpenOptions};
    use std::path::Path;

    /// Fail unless `path` can be opened for reading
    pub fn check_input(path: &Path) -> Result<()> {
        if path.is_dir() {
            return Err(ShrinkError::InputUnreadable(format!(
                "{} is a directory",
                path.display()
            )));
        }
        File::open(path)
            .map(|_| ())
            .map_err(|e| ShrinkError::InputUnreadable(format!("{}: {}", path.display(), e)))
    }

    /// Fail unless `path` can be written. Leaves no file behind.
    pub fn check_output(path: &Path) -> Result<()> {
        let unwritable = |e: std::io::Error| {
            ShrinkError::OutputUnwritable(format!("{}: {}", path.display(), e))
        };

        if path.is_dir() {
            return Err(ShrinkError::OutputUnwritable(format!(
                "{} is a directory",
                path.display()
            )));
        }
        if path.exists() {
            OpenOptions::new().append(true).open(path).map_err(unwritable)?;
        } else {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(unwritable)?;
            fs::remove_file(path).map_err(unwritable)?;
        }
        Ok(())
    }

    /// Shrink PDF from file path to file path.
    ///
    /// The output is written only after the whole pass succeeded.
    pub fn shrink_pdf_file(
        input_path: &Path,
        output_path: &Path,
        options: &ShrinkOptions,
    ) -> Result<PassReport> {
        let mut policy = options.policy()?;
        check_input(input_path)?;
        check_output(output_path)?;

        let mut doc = Document::load(input_path)
            .map_err(|e| ShrinkError::InputUnreadable(format!("{}: {}", input_path.display(), e)))?;

        let report = pass::run(&mut doc, &mut policy)?;
        let output_bytes = save_to_bytes(&mut doc, options)?;

        fs::write(output_path, output_bytes)
            .map_err(|e| ShrinkError::OutputUnwritable(format!("{}: {}", output_path.display(), e)))?;

        Ok(report)
    }

}

//! WebAssembly bindings for the PDF Shrinker

use crate::{shrink_pdf_bytes, Mode, ShrinkOptions, DEFAULT_QUALITY};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn options(quality: Option<f32>, lossless: Option<bool>) -> ShrinkOptions {
    ShrinkOptions {
        quality: quality.unwrap_or(DEFAULT_QUALITY),
        mode: if lossless.unwrap_or(false) {
            Mode::Lossless
        } else {
            Mode::Lossy
        },
        ..Default::default()
    }
}

/// Re-encode the images in a PDF
///
/// # Arguments
/// * `pdf_bytes` - The input PDF file as a byte array
/// * `quality` - Quality between 0 and 1 (default: 0.85)
/// * `lossless` - Store images losslessly instead of as JPEG (default: false)
///
/// # Returns
/// The shrunken PDF as a byte array, or throws an error
#[wasm_bindgen]
pub fn shrink_pdf(
    pdf_bytes: &[u8],
    quality: Option<f32>,
    lossless: Option<bool>,
) -> Result<Vec<u8>, JsError> {
    let (output_bytes, _report) = shrink_pdf_bytes(pdf_bytes, &options(quality, lossless))
        .map_err(|e| JsError::new(&e.to_string()))?;

    Ok(output_bytes)
}

/// Re-encode the images in a PDF and report what was done
#[wasm_bindgen]
pub fn shrink_pdf_with_info(
    pdf_bytes: &[u8],
    quality: Option<f32>,
    lossless: Option<bool>,
) -> Result<ShrinkResultJs, JsError> {
    let (output_bytes, report) = shrink_pdf_bytes(pdf_bytes, &options(quality, lossless))
        .map_err(|e| JsError::new(&e.to_string()))?;

    Ok(ShrinkResultJs {
        pdf_bytes: output_bytes,
        pages: report.pages,
        images: report.images,
        forms: report.forms,
    })
}

/// Result of a shrink with statistics
#[wasm_bindgen]
pub struct ShrinkResultJs {
    pdf_bytes: Vec<u8>,
    pages: usize,
    images: usize,
    forms: usize,
}

#[wasm_bindgen]
impl ShrinkResultJs {
    /// Get the shrunken PDF bytes
    #[wasm_bindgen(getter)]
    pub fn pdf_bytes(&self) -> Vec<u8> {
        self.pdf_bytes.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Get the number of images that were re-encoded
    #[wasm_bindgen(getter)]
    pub fn images(&self) -> usize {
        self.images
    }

    #[wasm_bindgen(getter)]
    pub fn forms(&self) -> usize {
        self.forms
    }
}

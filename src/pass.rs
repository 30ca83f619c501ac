//! Driver for the image transcoding pass over a whole document

use crate::error::Result;
use crate::transcode::{transcode, TranscodePolicy};
use crate::walker::{ImageSite, ResourceWalker};
use lopdf::Document;

/// Counts gathered during a pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Pages scanned
    pub pages: usize,
    /// Images replaced
    pub images: usize,
    /// Distinct form XObjects walked
    pub forms: usize,
}

/// Transcode every image reachable from any page, logging one line per image.
///
/// On error the document is left partially transcoded and must not be saved.
pub fn run(doc: &mut Document, policy: &mut TranscodePolicy) -> Result<PassReport> {
    run_with_log(doc, policy, |msg| log::info!("{}", msg))
}

/// Like [`run`], with the per-image lines sent to `log`
pub fn run_with_log(
    doc: &mut Document,
    policy: &mut TranscodePolicy,
    mut log: impl FnMut(&str),
) -> Result<PassReport> {
    let mut walker = ResourceWalker::new();
    let mut report = PassReport::default();

    for (page_number, page_id) in doc.get_pages() {
        log::debug!("Scanning page {}", page_number);
        walker.walk_page(doc, page_id, &mut |doc: &mut Document, site: &ImageSite| {
            let name = site.name_str();
            log(&format!("Compressing image: {}", name));
            let replacement = transcode(doc, site.image_id, &name, policy)?;
            site.dict.replace(doc, &site.name, replacement)?;
            report.images += 1;
            Ok(())
        })?;
        report.pages += 1;
    }

    report.forms = walker.forms_walked();
    log::debug!(
        "Pass done: {} pages, {} images, {} forms",
        report.pages,
        report.images,
        report.forms
    );
    Ok(report)
}

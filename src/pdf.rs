//! Assemble purchased labels into one printable multi-page PDF.
//!
//! For each shipment id, in the caller's order: fetch (or reuse cached)
//! label bytes, normalize them for the shipment's parcel type, and render
//! one page. Pages accumulate into a single document saved at the caller's
//! path. The progress callback fires after every shipment and once more when
//! the merge completes.

use std::path::Path;

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, RawImage, RawImageData, RawImageFormat,
    XObjectTransform,
};
use tracing::{debug, info, warn};

use crate::contract::CarrierClient;
use crate::error::Result;
use crate::labels::{fetch_or_cache, LabelCache};
use crate::transform::{is_letter_kind, page_image, TARGET_DPI};

const MM_PER_INCH: f32 = 25.4;

/// Build the merged label document for the given shipment ids, preserving
/// their order exactly.
pub async fn build_labels_pdf<C>(
    client: &C,
    cache: &LabelCache,
    shipment_ids: &[String],
    out_path: &Path,
    progress: &mut dyn FnMut(&str),
) -> Result<()>
where
    C: CarrierClient + ?Sized,
{
    let mut doc = PdfDocument::new("labels");
    let mut pages = Vec::with_capacity(shipment_ids.len());

    for (index, shipment_id) in shipment_ids.iter().enumerate() {
        progress(&format!(
            "[{}/{}] {} -> page",
            index + 1,
            shipment_ids.len(),
            shipment_id
        ));

        let letter = match client.retrieve_shipment(shipment_id).await {
            Ok(shipment) => shipment
                .parcel
                .and_then(|p| p.predefined_package)
                .map(|kind| is_letter_kind(&kind))
                .unwrap_or(false),
            // Retrieval hiccups should not block the page; letter handling
            // is the safe default for this workload.
            Err(e) => {
                warn!(shipment_id, error = %e, "could not read parcel type, assuming letter");
                true
            }
        };

        let label_png = fetch_or_cache(client, cache, shipment_id, progress).await?;
        let page = page_image(&label_png, letter)?;
        pages.push(render_page(&mut doc, page));
        debug!(shipment_id, letter, "page rendered");
    }

    let pdf_bytes = doc
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut Vec::new());
    std::fs::write(out_path, pdf_bytes)?;
    progress("Merged pages into final PDF");
    info!(path = ?out_path, pages = shipment_ids.len(), "label document written");
    Ok(())
}

/// Render one page-ready RGB image as a PDF page at the target resolution.
fn render_page(doc: &mut PdfDocument, page: image::RgbImage) -> PdfPage {
    let (width_px, height_px) = page.dimensions();
    let raw = RawImage {
        pixels: RawImageData::U8(page.into_raw()),
        width: width_px as usize,
        height: height_px as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };
    let image_id = doc.add_image(&raw);

    let width_mm = Mm(width_px as f32 / TARGET_DPI as f32 * MM_PER_INCH);
    let height_mm = Mm(height_px as f32 / TARGET_DPI as f32 * MM_PER_INCH);
    let ops = vec![Op::UseXobject {
        id: image_id,
        transform: XObjectTransform {
            dpi: Some(TARGET_DPI as f32),
            ..Default::default()
        },
    }];
    PdfPage::new(width_mm, height_mm, ops)
}

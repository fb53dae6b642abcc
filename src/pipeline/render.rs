//! PDF access via pdfium: page counts, metadata and page rasterisation.
//!
//! Only the page-image transport and `inspect` touch pdfium; the inline
//! transport never loads the library, so a machine without libpdfium can
//! still generate taxonomies through Gemini.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and CPU-heavy rendering.
//! `tokio::task::spawn_blocking` keeps that work off the async worker threads.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 12,000 × 17,000 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use crate::config::{PageRange, TaxonomyConfig};
use crate::error::TaxonomyError;
use crate::output::DocumentInfo;
use crate::pipeline::input::PdfFile;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bind to libpdfium: `PDFIUM_LIB_PATH` first, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, TaxonomyError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.trim().is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                .or_else(|_| Pdfium::bind_to_library(&dir))
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| TaxonomyError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

fn open_error(name: &str, password: Option<&str>, e: PdfiumError) -> TaxonomyError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            TaxonomyError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            TaxonomyError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        TaxonomyError::CorruptPdf {
            name: name.to_string(),
            detail: err_str,
        }
    }
}

/// Rasterise the pages of `range` that exist in the document.
///
/// The range is clipped to the document and truncated to
/// `config.max_image_pages`. A range that selects no page at all is
/// [`TaxonomyError::PageOutOfRange`].
///
/// Returns `(page_index_0based, image)` tuples in page order.
pub async fn render_range(
    pdf: Arc<PdfFile>,
    config: &TaxonomyConfig,
    range: PageRange,
) -> Result<Vec<(usize, DynamicImage)>, TaxonomyError> {
    let max_pixels = config.max_rendered_pixels;
    let max_pages = config.max_image_pages;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        render_range_blocking(&pdf, max_pixels, max_pages, password.as_deref(), range)
    })
    .await
    .map_err(|e| TaxonomyError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_range_blocking(
    pdf: &PdfFile,
    max_pixels: u32,
    max_pages: usize,
    password: Option<&str>,
    range: PageRange,
) -> Result<Vec<(usize, DynamicImage)>, TaxonomyError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(&pdf.bytes, password)
        .map_err(|e| open_error(&pdf.name, password, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("{}: loaded {} pages", pdf.name, total_pages);

    let mut indices = range.to_indices(total_pages);
    if indices.is_empty() {
        return Err(TaxonomyError::PageOutOfRange {
            page: range.start.unwrap_or(1),
            total: total_pages,
        });
    }
    if indices.len() > max_pages {
        warn!(
            "{}: {} pages selected, rendering only the first {}",
            pdf.name,
            indices.len(),
            max_pages
        );
        indices.truncate(max_pages);
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(indices.len());
    for idx in indices {
        let page = pages
            .get(idx as u16)
            .map_err(|e| TaxonomyError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            TaxonomyError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push((idx, image));
    }

    Ok(results)
}

/// Read document metadata without rendering any page.
pub async fn extract_metadata(
    pdf: Arc<PdfFile>,
    password: Option<&str>,
) -> Result<DocumentInfo, TaxonomyError> {
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&pdf, pwd.as_deref()))
        .await
        .map_err(|e| TaxonomyError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf: &PdfFile,
    password: Option<&str>,
) -> Result<DocumentInfo, TaxonomyError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(&pdf.bytes, password)
        .map_err(|e| open_error(&pdf.name, password, e))?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentInfo {
        name: pdf.name.clone(),
        size_bytes: pdf.len(),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
    })
}

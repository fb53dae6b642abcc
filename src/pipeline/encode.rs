//! Encoding: PDF bytes and rendered pages → base64 payloads for model requests.
//!
//! The inline transport sends the whole PDF as base64 inside the JSON body.
//! The page-image transport sends each page as a base64 PNG wrapped in
//! `ImageData` with `detail: "high"`, so fine print and small tables survive
//! the provider's tiling.
//!
//! Data URIs (`data:application/pdf;base64,...`) are how browsers hand over an
//! uploaded file; [`parse_data_uri`] is the inverse of [`to_data_uri`].

use crate::error::TaxonomyError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Base64-encode raw bytes (standard alphabet, padded).
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Build a `data:<mime>;base64,<payload>` URI.
pub fn to_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", encode_base64(bytes))
}

/// Split a base64 data URI into its MIME type and decoded bytes.
///
/// Only the base64 form is accepted. A missing MIME type reads as
/// `text/plain`, as browsers do. Whitespace inside the payload is ignored.
pub fn parse_data_uri(uri: &str) -> Result<(String, Vec<u8>), TaxonomyError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| TaxonomyError::InvalidDataUri("missing 'data:' prefix".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| TaxonomyError::InvalidDataUri("missing ',' separator".into()))?;

    let mut params = header.split(';');
    let mime = match params.next() {
        Some(m) if !m.trim().is_empty() => m.trim().to_ascii_lowercase(),
        _ => "text/plain".to_string(),
    };
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(TaxonomyError::InvalidDataUri(
            "only base64-encoded data URIs are supported".into(),
        ));
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| TaxonomyError::InvalidDataUri(format!("bad base64 payload: {e}")))?;

    debug!("Decoded data URI: {} ({} bytes)", mime, bytes.len());
    Ok((mime, bytes))
}

/// Encode a rasterised page as a base64 PNG ready for a vision model.
///
/// PNG keeps text crisp; JPEG artefacts on rendered glyphs hurt recognition.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

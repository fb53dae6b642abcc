//! Route handlers.

use super::errors::ApiError;
use super::AppState;
use crate::config::{PageRange, TaxonomyConfig};
use crate::generate::{filter_content, generate_from_data_uri, generate_from_pdf};
use crate::output::{FilteredContent, TaxonomyResult};
use crate::pipeline::input::PdfFile;
use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}

/// JSON body of `POST /api/taxonomy/data-uri`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUriRequest {
    pub pdf_data_uri: String,
    #[serde(default)]
    pub page_start: Option<usize>,
    #[serde(default)]
    pub page_end: Option<usize>,
}

/// JSON body of `POST /api/filter`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    pub document_text: String,
}

/// `POST /api/taxonomy`: multipart upload with `file`, `pageStart`, `pageEnd`.
pub async fn taxonomy_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TaxonomyResult>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut page_start = None;
    let mut page_end = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                let is_pdf = field.content_type() == Some("application/pdf")
                    || file_name.to_ascii_lowercase().ends_with(".pdf");
                if !is_pdf {
                    return Err(ApiError::BadRequest("Please upload a valid PDF file.".into()));
                }
                let bytes = field.bytes().await?;
                upload = Some((file_name, bytes.to_vec()));
            }
            "pageStart" => page_start = parse_page_field("pageStart", &field.text().await?)?,
            "pageEnd" => page_end = parse_page_field("pageEnd", &field.text().await?)?,
            _ => {}
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("Please upload a valid PDF file.".into()))?;
    info!("Taxonomy upload: {} ({} bytes)", file_name, bytes.len());

    let config = request_config(&state, page_start, page_end)?;
    let pdf = PdfFile::from_bytes(file_name, bytes, config.max_pdf_bytes)?;
    let output = generate_from_pdf(pdf, &config).await?;
    Ok(Json(output.result))
}

/// `POST /api/taxonomy/data-uri`: JSON body carrying the PDF as a data URI.
pub async fn taxonomy_data_uri(
    State(state): State<AppState>,
    Json(request): Json<DataUriRequest>,
) -> Result<Json<TaxonomyResult>, ApiError> {
    info!("Taxonomy data-URI request ({} chars)", request.pdf_data_uri.len());
    let config = request_config(&state, request.page_start, request.page_end)?;
    let output = generate_from_data_uri(&request.pdf_data_uri, &config).await?;
    Ok(Json(output.result))
}

/// `POST /api/filter`: strip boilerplate from document text.
pub async fn filter(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Result<Json<FilteredContent>, ApiError> {
    info!("Filter request ({} chars)", request.document_text.len());
    let filtered = filter_content(&request.document_text, &state.config).await?;
    Ok(Json(filtered))
}

/// The shared config with this request's page bounds.
fn request_config(
    state: &AppState,
    page_start: Option<usize>,
    page_end: Option<usize>,
) -> Result<TaxonomyConfig, ApiError> {
    let pages = PageRange::new(page_start, page_end);
    pages.validate()?;
    let mut config = (*state.config).clone();
    config.pages = pages;
    Ok(config)
}

/// Blank means "not given"; anything else must be a positive integer.
fn parse_page_field(field: &str, value: &str) -> Result<Option<usize>, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("{field} must be a positive integer")))
}

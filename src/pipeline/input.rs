//! Input resolution: turn a user-supplied path, URL or data URI into PDF bytes.
//!
//! Every transport works from an in-memory copy of the document: the inline
//! transport base64-encodes it and pdfium loads it from a byte slice. The
//! bytes are validated here (non-empty, within the size limit, `%PDF` magic)
//! so callers get a meaningful error rather than a model or pdfium failure.

use crate::config::TaxonomyConfig;
use crate::error::TaxonomyError;
use crate::pipeline::encode::parse_data_uri;
use std::path::PathBuf;
use tracing::{debug, info};

/// A PDF held in memory.
#[derive(Debug, Clone)]
pub struct PdfFile {
    /// Display name: file name, last URL segment, or `upload.pdf`.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PdfFile {
    /// Wrap bytes after validating them against `max_bytes`.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, TaxonomyError> {
        let name = name.into();
        validate_pdf_bytes(&name, &bytes, max_bytes)?;
        Ok(Self { name, bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Check if the input string is a `data:` URI.
pub fn is_data_uri(input: &str) -> bool {
    input.starts_with("data:")
}

/// Resolve an input string to validated PDF bytes.
///
/// * `data:` URIs are decoded in place.
/// * HTTP/HTTPS URLs are downloaded with `config.download_timeout_secs`.
/// * Anything else is read as a local path.
pub async fn resolve_input(input: &str, config: &TaxonomyConfig) -> Result<PdfFile, TaxonomyError> {
    if is_data_uri(input) {
        let (_mime, bytes) = parse_data_uri(input)?;
        PdfFile::from_bytes("upload.pdf", bytes, config.max_pdf_bytes)
    } else if is_url(input) {
        download_url(input, config).await
    } else if input.trim().is_empty() {
        Err(TaxonomyError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        read_local(input, config.max_pdf_bytes).await
    }
}

/// Reject empty documents, oversized documents and non-PDF bytes.
pub fn validate_pdf_bytes(name: &str, bytes: &[u8], max_bytes: usize) -> Result<(), TaxonomyError> {
    if bytes.is_empty() {
        return Err(TaxonomyError::EmptyDocument {
            name: name.to_string(),
        });
    }
    if bytes.len() > max_bytes {
        return Err(TaxonomyError::FileTooLarge {
            name: name.to_string(),
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    if !bytes.starts_with(b"%PDF") {
        return Err(TaxonomyError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

async fn read_local(path_str: &str, max_bytes: usize) -> Result<PdfFile, TaxonomyError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(TaxonomyError::PermissionDenied { path });
        }
        Err(_) => return Err(TaxonomyError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    PdfFile::from_bytes(name, bytes, max_bytes)
}

async fn download_url(url: &str, config: &TaxonomyConfig) -> Result<PdfFile, TaxonomyError> {
    info!("Downloading PDF from: {}", url);
    let timeout_secs = config.download_timeout_secs;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TaxonomyError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            TaxonomyError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            TaxonomyError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(TaxonomyError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TaxonomyError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    PdfFile::from_bytes(name, bytes.to_vec(), config.max_pdf_bytes)
}

/// Last path segment of the URL if it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

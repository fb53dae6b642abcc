//! Error types for the edgequake-taxonomy library.
//!
//! Every failure surfaces as a [`TaxonomyError`]. Provider failures are
//! classified once, at the backend boundary, into the variants a caller can
//! act on (back off, shrink the page range, fix the key) instead of being
//! string-matched later by whoever displays them.
//!
//! Each variant belongs to an [`ErrorCategory`], which drives three things:
//!
//! * [`TaxonomyError::is_retryable`] — the generation loop retries only
//!   transient model failures (overloaded, rate-limited, timed out);
//! * [`TaxonomyError::user_message`] — the short sentence shown to an end
//!   user by the CLI and the HTTP service;
//! * the HTTP status the service maps the error to.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-taxonomy library.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a file path, an HTTP/HTTPS URL or a data URI.
    #[error("Invalid input '{input}': not a file path, a valid HTTP/HTTPS URL or a data URI")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("'{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// The document is empty (zero bytes).
    #[error("'{name}' is empty")]
    EmptyDocument { name: String },

    /// The document exceeds the configured upload limit.
    #[error("'{name}' is {size} bytes, above the {limit}-byte limit")]
    FileTooLarge { name: String, size: usize, limit: usize },

    /// A `data:` URI could not be decoded.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// The requested page bounds are inconsistent.
    #[error("Invalid page range {start}-{end}: pages are 1-indexed and start must be <= end")]
    InvalidPageRange { start: usize, end: usize },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// The selected page range does not intersect the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
The page-image transport and `inspect` need the pdfium shared library.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium, or install pdfium system-wide.\n\
  • Or use the inline-PDF transport (--transport inline) with a Gemini key.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model endpoint answered 503 / "overloaded" / "unavailable".
    #[error("Model '{provider}' is overloaded: {detail}")]
    ModelOverloaded { provider: String, detail: String },

    /// The model API returned HTTP 429 — caller should back off.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The model call exceeded its deadline.
    #[error("Model call timed out after {elapsed_ms}ms")]
    ApiTimeout { elapsed_ms: u64 },

    /// The model API returned an authentication error (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The model API returned a non-retryable error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The model answered, but with no usable content.
    #[error("Failed to generate taxonomy. The AI returned no output.")]
    EmptyResponse,

    /// The model answered with something that does not decode as a taxonomy.
    #[error("Model output is not a valid taxonomy: {detail}\nOutput starts with: {excerpt:?}")]
    MalformedResponse { detail: String, excerpt: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse grouping of [`TaxonomyError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller supplied something unusable (bad file, bad range).
    Input,
    /// The document could not be opened or rendered.
    Document,
    /// The model endpoint is busy; retrying later is expected to work.
    Overloaded,
    /// The model endpoint asked us to slow down.
    RateLimited,
    /// The model call ran out of time.
    Timeout,
    /// Credentials or provider setup are wrong.
    Configuration,
    /// The model call failed or answered with garbage.
    Model,
    /// Local I/O or an internal invariant failed.
    Internal,
}

impl TaxonomyError {
    /// Which [`ErrorCategory`] this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        use TaxonomyError::*;
        match self {
            FileNotFound { .. }
            | PermissionDenied { .. }
            | InvalidInput { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. }
            | NotAPdf { .. }
            | EmptyDocument { .. }
            | FileTooLarge { .. }
            | InvalidDataUri(_)
            | InvalidPageRange { .. }
            | PageOutOfRange { .. } => ErrorCategory::Input,
            CorruptPdf { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | RasterisationFailed { .. } => ErrorCategory::Document,
            ModelOverloaded { .. } => ErrorCategory::Overloaded,
            RateLimitExceeded { .. } => ErrorCategory::RateLimited,
            ApiTimeout { .. } => ErrorCategory::Timeout,
            ProviderNotConfigured { .. }
            | AuthError { .. }
            | PdfiumBindingFailed(_)
            | InvalidConfig(_) => ErrorCategory::Configuration,
            LlmApiError { .. } | EmptyResponse | MalformedResponse { .. } => ErrorCategory::Model,
            OutputWriteFailed { .. } | Internal(_) => ErrorCategory::Internal,
        }
    }

    /// `true` for transient model failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Overloaded | ErrorCategory::RateLimited | ErrorCategory::Timeout
        )
    }

    /// A short, user-facing explanation suitable for a UI or HTTP response.
    pub fn user_message(&self) -> String {
        use TaxonomyError::*;
        match self {
            NotAPdf { .. } | EmptyDocument { .. } | InvalidDataUri(_) => {
                "Please upload a valid PDF file.".to_string()
            }
            FileTooLarge { limit, .. } => format!(
                "The PDF is too large. The maximum size is {} MB.",
                limit / (1024 * 1024)
            ),
            FileNotFound { .. } | PermissionDenied { .. } | InvalidInput { .. } => {
                "Failed to read the file.".to_string()
            }
            DownloadFailed { .. } | DownloadTimeout { .. } => {
                "Failed to download the PDF. Check the URL and try again.".to_string()
            }
            InvalidPageRange { .. } | PageOutOfRange { .. } => self.to_string(),
            PasswordRequired { .. } | WrongPassword { .. } => {
                "The PDF is password protected. Provide the correct password.".to_string()
            }
            CorruptPdf { .. } | RasterisationFailed { .. } => {
                "The PDF could not be read. It may be corrupt.".to_string()
            }
            ModelOverloaded { .. } => {
                "The AI model is currently overloaded. Please try again in a few moments."
                    .to_string()
            }
            RateLimitExceeded { .. } => {
                "Too many requests to the AI model. Please wait a moment and try again."
                    .to_string()
            }
            ApiTimeout { .. } => {
                "The request timed out while analyzing the document. Try a smaller page range."
                    .to_string()
            }
            ProviderNotConfigured { .. } | AuthError { .. } | PdfiumBindingFailed(_) => {
                "The server is not configured correctly.".to_string()
            }
            _ => "An error occurred during taxonomy generation. Please try again.".to_string(),
        }
    }
}

/// Turn a provider failure into the matching [`TaxonomyError`] variant.
///
/// `status` is the HTTP status when the transport exposed one; it wins over
/// the message heuristics. Without a status (SDK errors only carry text) the
/// message is searched case-insensitively for the markers providers use for
/// overload, deadline, quota and credential failures.
pub fn classify_provider_failure(
    provider: &str,
    status: Option<u16>,
    message: &str,
) -> TaxonomyError {
    let detail = message.trim().to_string();
    match status {
        Some(503) => {
            return TaxonomyError::ModelOverloaded {
                provider: provider.to_string(),
                detail,
            }
        }
        Some(429) => {
            return TaxonomyError::RateLimitExceeded {
                provider: provider.to_string(),
                retry_after_secs: None,
            }
        }
        Some(401) | Some(403) => {
            return TaxonomyError::AuthError {
                provider: provider.to_string(),
                detail,
            }
        }
        Some(408) | Some(504) => return TaxonomyError::ApiTimeout { elapsed_ms: 0 },
        _ => {}
    }

    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["503", "overloaded", "unavailable"]) {
        TaxonomyError::ModelOverloaded {
            provider: provider.to_string(),
            detail,
        }
    } else if has(&["deadline exceeded", "deadline_exceeded", "timed out", "timeout"]) {
        TaxonomyError::ApiTimeout { elapsed_ms: 0 }
    } else if has(&["429", "rate limit", "rate_limit", "resource_exhausted", "quota"]) {
        TaxonomyError::RateLimitExceeded {
            provider: provider.to_string(),
            retry_after_secs: None,
        }
    } else if has(&["401", "403", "unauthorized", "permission_denied", "api key", "api_key"]) {
        TaxonomyError::AuthError {
            provider: provider.to_string(),
            detail,
        }
    } else {
        TaxonomyError::LlmApiError {
            message: format!("{provider}: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_503_is_overloaded_and_retryable() {
        let e = classify_provider_failure("gemini", Some(503), "Service Unavailable");
        assert!(matches!(e, TaxonomyError::ModelOverloaded { .. }));
        assert!(e.is_retryable());
        assert!(e.user_message().contains("overloaded"));
    }

    #[test]
    fn message_heuristics_without_status() {
        let e = classify_provider_failure("openai", None, "The model is overloaded. Try later");
        assert_eq!(e.category(), ErrorCategory::Overloaded);

        let e = classify_provider_failure("gemini", None, "4: Deadline Exceeded");
        assert_eq!(e.category(), ErrorCategory::Timeout);

        let e = classify_provider_failure("gemini", None, "RESOURCE_EXHAUSTED: quota");
        assert_eq!(e.category(), ErrorCategory::RateLimited);

        let e = classify_provider_failure("openai", None, "Incorrect API key provided");
        assert_eq!(e.category(), ErrorCategory::Configuration);
        assert!(!e.is_retryable());
    }

    #[test]
    fn status_wins_over_message() {
        let e = classify_provider_failure("gemini", Some(401), "model overloaded");
        assert!(matches!(e, TaxonomyError::AuthError { .. }));
    }

    #[test]
    fn unknown_failure_is_generic_model_error() {
        let e = classify_provider_failure("gemini", Some(400), "invalid argument");
        assert!(matches!(e, TaxonomyError::LlmApiError { .. }));
        assert!(!e.is_retryable());
        assert_eq!(
            e.user_message(),
            "An error occurred during taxonomy generation. Please try again."
        );
    }

    #[test]
    fn empty_response_display() {
        assert_eq!(
            TaxonomyError::EmptyResponse.to_string(),
            "Failed to generate taxonomy. The AI returned no output."
        );
    }

    #[test]
    fn not_a_pdf_user_message() {
        let e = TaxonomyError::NotAPdf {
            name: "cat.png".into(),
            magic: b"\x89PNG".to_vec(),
        };
        assert_eq!(e.category(), ErrorCategory::Input);
        assert_eq!(e.user_message(), "Please upload a valid PDF file.");
    }

    #[test]
    fn too_large_message_mentions_limit() {
        let e = TaxonomyError::FileTooLarge {
            name: "big.pdf".into(),
            size: 30 * 1024 * 1024,
            limit: 20 * 1024 * 1024,
        };
        assert!(e.user_message().contains("20 MB"));
    }
}

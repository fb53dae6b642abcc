//! Configuration types for taxonomy generation.
//!
//! All generation behaviour is controlled through [`TaxonomyConfig`], built
//! via its [`TaxonomyConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share a config between concurrent documents, log it, and
//! diff two runs to understand why their taxonomies differ.

use crate::error::TaxonomyError;
use crate::pipeline::backend::TaxonomyBackend;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default model for the inline-PDF (Gemini) transport.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default model for the page-image transport.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default upload limit: 20 MiB.
pub const DEFAULT_MAX_PDF_BYTES: usize = 20 * 1024 * 1024;

/// Configuration for taxonomy generation.
///
/// # Example
/// ```rust
/// use edgequake_taxonomy::{PageRange, TaxonomyConfig, Transport};
///
/// let config = TaxonomyConfig::builder()
///     .transport(Transport::InlinePdf)
///     .pages(PageRange::new(Some(1), Some(10)))
///     .max_retries(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TaxonomyConfig {
    /// How the document reaches the model. Default: [`Transport::Auto`].
    pub transport: Transport,

    /// Model identifier. If None, the transport's default model is used.
    pub model: Option<String>,

    /// LLM provider name for the page-image transport (e.g. "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider for the page-image transport.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed backend. Takes precedence over every other provider setting.
    pub backend: Option<Arc<dyn TaxonomyBackend>>,

    /// Gemini API key. If None, `GEMINI_API_KEY` then `GOOGLE_API_KEY` are read.
    pub api_key: Option<String>,

    /// Gemini REST base URL. Default: [`DEFAULT_GEMINI_BASE_URL`].
    pub api_base_url: String,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Low enough that titles stay faithful to the headings, high enough that
    /// summaries are not copied sentence-for-sentence.
    pub temperature: f32,

    /// Maximum output tokens for one taxonomy. Default: 8192.
    ///
    /// A six-level tree with summaries on every node easily passes 4 000
    /// tokens; a truncated answer is invalid JSON and therefore worthless.
    pub max_output_tokens: usize,

    /// Retry attempts on a transient model failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Per-model-call timeout in seconds. Default: 300.
    ///
    /// Whole-document analysis is one long call, unlike per-page conversion.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Reject documents larger than this many bytes. Default: 20 MiB.
    pub max_pdf_bytes: usize,

    /// Page bounds to analyse. Default: whole document.
    pub pages: PageRange,

    /// Custom prompt template. `{page_start}` / `{page_end}` are substituted.
    pub prompt_template: Option<String>,

    /// Depth to which the recursive node schema is unrolled. Range 1–10. Default: 6.
    pub schema_depth: usize,

    /// PDF user password (page-image transport and `inspect` only).
    pub password: Option<String>,

    /// Maximum rendered image edge in pixels for the page-image transport. Default: 1600.
    pub max_rendered_pixels: u32,

    /// Maximum pages rasterised for the page-image transport. Default: 50.
    ///
    /// Vision endpoints cap images per request; beyond this the range is truncated.
    pub max_image_pages: usize,

    /// Documents processed at once by [`crate::stream::generate_stream`]. Default: 4.
    pub concurrency: usize,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            model: None,
            provider_name: None,
            provider: None,
            backend: None,
            api_key: None,
            api_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: 0.2,
            max_output_tokens: 8192,
            max_retries: 2,
            retry_backoff_ms: 1000,
            api_timeout_secs: 300,
            download_timeout_secs: 120,
            max_pdf_bytes: DEFAULT_MAX_PDF_BYTES,
            pages: PageRange::default(),
            prompt_template: None,
            schema_depth: 6,
            password: None,
            max_rendered_pixels: 1600,
            max_image_pages: 50,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TaxonomyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaxonomyConfig")
            .field("transport", &self.transport)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pages", &self.pages)
            .field("schema_depth", &self.schema_depth)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl TaxonomyConfig {
    /// Create a new builder for `TaxonomyConfig`.
    pub fn builder() -> TaxonomyConfigBuilder {
        TaxonomyConfigBuilder {
            config: Self::default(),
        }
    }

    /// The Gemini API key from config or environment, if any.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Builder for [`TaxonomyConfig`].
#[derive(Debug)]
pub struct TaxonomyConfigBuilder {
    config: TaxonomyConfig,
}

impl TaxonomyConfigBuilder {
    pub fn transport(mut self, transport: Transport) -> Self {
        self.config.transport = transport;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn TaxonomyBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_pdf_bytes(mut self, bytes: usize) -> Self {
        self.config.max_pdf_bytes = bytes;
        self
    }

    pub fn pages(mut self, range: PageRange) -> Self {
        self.config.pages = range;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn schema_depth(mut self, depth: usize) -> Self {
        self.config.schema_depth = depth;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_image_pages(mut self, n: usize) -> Self {
        self.config.max_image_pages = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TaxonomyConfig, TaxonomyError> {
        let c = &self.config;
        c.pages.validate()?;
        if !(1..=10).contains(&c.schema_depth) {
            return Err(TaxonomyError::InvalidConfig(format!(
                "Schema depth must be 1–10, got {}",
                c.schema_depth
            )));
        }
        if c.max_output_tokens == 0 {
            return Err(TaxonomyError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_pdf_bytes == 0 {
            return Err(TaxonomyError::InvalidConfig("max_pdf_bytes must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(TaxonomyError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if let Some(ref template) = c.prompt_template {
            if template.trim().is_empty() {
                return Err(TaxonomyError::InvalidConfig(
                    "Prompt template must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the PDF reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    /// Inline PDF when a Gemini key is available and no other provider was
    /// named; page images otherwise. (default)
    #[default]
    Auto,
    /// Base64 PDF inlined into a Gemini `generateContent` request.
    InlinePdf,
    /// Pages rasterised to PNG and sent to any vision LLM.
    PageImages,
}

impl std::str::FromStr for Transport {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Transport::Auto),
            "inline" | "inline-pdf" | "pdf" => Ok(Transport::InlinePdf),
            "images" | "page-images" | "vision" => Ok(Transport::PageImages),
            other => Err(TaxonomyError::InvalidConfig(format!(
                "Unknown transport '{other}' (expected auto, inline or images)"
            ))),
        }
    }
}

/// Optional 1-indexed, inclusive page bounds.
///
/// Either bound may be absent: `start = None` means "from page 1",
/// `end = None` means "to the final page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl PageRange {
    pub fn new(start: Option<usize>, end: Option<usize>) -> Self {
        Self { start, end }
    }

    /// The whole document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.start.unwrap_or(1) <= 1 && self.end.is_none()
    }

    /// Reject zero bounds and inverted ranges.
    pub fn validate(&self) -> Result<(), TaxonomyError> {
        let start = self.start.unwrap_or(1);
        let end = self.end.unwrap_or(usize::MAX);
        if self.start == Some(0) || self.end == Some(0) || start > end {
            return Err(TaxonomyError::InvalidPageRange {
                start: self.start.unwrap_or(1),
                end: self.end.unwrap_or(0),
            });
        }
        Ok(())
    }

    /// Human description used for `pageRangeAnalyzed` when the model omits it.
    pub fn describe(&self) -> String {
        match (self.start, self.end) {
            (None, None) | (Some(1), None) => "all pages".to_string(),
            (Some(s), None) => format!("{s}-end"),
            (None, Some(e)) => format!("1-{e}"),
            (Some(s), Some(e)) if s == e => format!("{s}"),
            (Some(s), Some(e)) => format!("{s}-{e}"),
        }
    }

    /// Sorted 0-indexed page numbers clipped to `total_pages`.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let s = self.start.unwrap_or(1).max(1) - 1;
        let e = self.end.unwrap_or(total_pages).min(total_pages);
        (s..e).collect()
    }
}

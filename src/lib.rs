//! # edgequake-taxonomy
//!
//! Generate a hierarchical taxonomy of a PDF's content with a generative model.
//!
//! The document goes to the model whole: either inlined as base64 into a
//! Gemini request, or rasterised to page images for any vision model that
//! edgequake-llm supports. The model answers with a JSON tree of topics and
//! subtopics, each with a keyword-dense summary, a 0–100 confidence score and
//! the images and tables that belong to it. The crate owns the contract
//! around that call: prompt, response schema, retries, lenient decoding and
//! the metadata (counts, timing) attached to the result.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    local file, URL download or data URI → validated bytes
//!  ├─ 2. Request  prompt for the page range + unrolled response schema
//!  ├─ 3. Model    Gemini inline PDF, or vision LLM on rendered pages (retry)
//!  ├─ 4. Decode   strip fences and prose, lenient JSON
//!  └─ 5. Enrich   counts from the tree, processingTime
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_taxonomy::{generate_taxonomy, TaxonomyConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini when GEMINI_API_KEY is set, otherwise any vision provider from the environment
//!     let config = TaxonomyConfig::default();
//!     let output = generate_taxonomy("paper.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.result)?);
//!     eprintln!("{} topics in {}",
//!         output.result.metadata.number_of_topics,
//!         output.result.metadata.processing_time);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `pdf2taxonomy` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | off     | The `taxonomy-server` binary and [`server`] module (axum + tower-http) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-taxonomy = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod format;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageRange, TaxonomyConfig, TaxonomyConfigBuilder, Transport};
pub use error::{classify_provider_failure, ErrorCategory, TaxonomyError};
pub use format::{to_markdown, to_outline};
pub use generate::{
    filter_content, generate_from_bytes, generate_from_data_uri, generate_from_pdf,
    generate_taxonomy, generate_taxonomy_sync, generate_to_file, inspect,
};
pub use output::{
    ContentKind, DocumentInfo, FilteredContent, GenerationStats, ImageTableInfo, TaxonomyMetadata,
    TaxonomyNode, TaxonomyOutput, TaxonomyResult,
};
pub use pipeline::backend::{ModelReply, ModelRequest, TaxonomyBackend};
pub use pipeline::input::PdfFile;
pub use progress::{GenerationStage, NoopProgressCallback, ProgressCallback, TaxonomyProgressCallback};
pub use stream::{generate_stream, DocumentOutcome, TaxonomyStream};

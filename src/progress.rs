//! Progress-callback trait for generation events.
//!
//! Inject an [`Arc<dyn TaxonomyProgressCallback>`] via
//! [`crate::config::TaxonomyConfigBuilder::progress_callback`] to receive
//! events as each document moves through the pipeline. A single model call
//! gives no intermediate progress, so the events are stage transitions:
//! enough to drive a spinner with a meaningful message.
//!
//! # Example
//!
//! ```rust
//! use edgequake_taxonomy::{GenerationStage, TaxonomyConfig, TaxonomyProgressCallback};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl TaxonomyProgressCallback for PrintStages {
//!     fn on_stage(&self, document: &str, stage: GenerationStage) {
//!         eprintln!("{document}: {}", stage.label());
//!     }
//! }
//!
//! let config = TaxonomyConfig::builder()
//!     .progress_callback(Arc::new(PrintStages))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stage a document is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    /// Reading the file, downloading the URL or decoding the data URI.
    Reading,
    /// Base64-encoding the PDF or rasterising its pages.
    Encoding,
    /// Waiting for the model.
    Analyzing,
    /// Decoding the answer and computing metadata.
    Finalizing,
}

impl GenerationStage {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationStage::Reading => "reading document",
            GenerationStage::Encoding => "encoding",
            GenerationStage::Analyzing => "analyzing with model",
            GenerationStage::Finalizing => "building taxonomy",
        }
    }
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the generation pipeline as documents progress.
///
/// Implementations must be `Send + Sync`: batch generation drives several
/// documents concurrently. All methods default to no-ops.
pub trait TaxonomyProgressCallback: Send + Sync {
    /// Called once before a batch starts.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document enters the pipeline.
    fn on_document_start(&self, document: &str) {
        let _ = document;
    }

    /// Called on every stage transition.
    fn on_stage(&self, document: &str, stage: GenerationStage) {
        let _ = (document, stage);
    }

    /// Called before a retry sleeps.
    ///
    /// * `attempt`  — the retry number, starting at 1
    /// * `delay_ms` — backoff about to be slept
    fn on_retry(&self, document: &str, attempt: u32, delay_ms: u64, reason: &str) {
        let _ = (document, attempt, delay_ms, reason);
    }

    /// Called when a document's taxonomy is ready.
    fn on_document_complete(&self, document: &str, topics: usize, processing_time: &str) {
        let _ = (document, topics, processing_time);
    }

    /// Called when a document fails.
    fn on_document_error(&self, document: &str, error: &str) {
        let _ = (document, error);
    }

    /// Called once after every document of a batch has been attempted.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TaxonomyProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TaxonomyConfig`].
pub type ProgressCallback = Arc<dyn TaxonomyProgressCallback>;

//! Shared helpers for the integration tests: a scripted model backend and a
//! minimal PDF.

#![allow(dead_code)]

use edgequake_taxonomy::{
    GenerationStage, ModelReply, ModelRequest, TaxonomyBackend, TaxonomyConfig, TaxonomyError,
    TaxonomyProgressCallback,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Smallest byte string the input checks accept as a PDF.
pub const TINY_PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n";

/// A well-formed model answer: two roots, three topics, one table.
pub const GOOD_ANSWER: &str = r#"{
  "taxonomy": [
    {
      "title": "Introduction",
      "summary": "Motivation for attention-only sequence transduction.",
      "confidenceScore": 95,
      "subtopics": [
        {"title": "Background", "summary": "Recurrent and convolutional models.", "confidenceScore": 88}
      ]
    },
    {
      "title": "Results",
      "summary": "BLEU on WMT 2014 translation tasks.",
      "confidenceScore": 90,
      "image_table_info": [
        {"type": "table", "description": "BLEU scores and training cost", "pageNumber": 8}
      ]
    }
  ],
  "metadata": {"numberOfTopics": 3, "pageRangeAnalyzed": "1-15", "imagesTablesAnalyzed": 1}
}"#;

/// A backend that replays scripted replies in order and records what it was asked.
///
/// Once the script runs out every further call answers with [`GOOD_ANSWER`].
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<ModelReply, TaxonomyError>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    documents: Mutex<Vec<Option<String>>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<ModelReply, TaxonomyError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with [`GOOD_ANSWER`].
    pub fn good() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    /// Names of the documents seen, `None` for text-only requests.
    pub fn documents(&self) -> Vec<Option<String>> {
        self.documents.lock().unwrap().clone()
    }
}

impl TaxonomyBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    fn generate<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, Result<ModelReply, TaxonomyError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.documents
            .lock()
            .unwrap()
            .push(request.document.as_ref().map(|d| d.name.clone()));
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(reply(GOOD_ANSWER)));
        async move { next }.boxed()
    }
}

pub fn reply(text: &str) -> ModelReply {
    ModelReply {
        text: text.to_string(),
        input_tokens: 1200,
        output_tokens: 300,
    }
}

pub fn overloaded() -> TaxonomyError {
    TaxonomyError::ModelOverloaded {
        provider: "scripted".into(),
        detail: "503 UNAVAILABLE".into(),
    }
}

pub fn rate_limited(retry_after_secs: Option<u64>) -> TaxonomyError {
    TaxonomyError::RateLimitExceeded {
        provider: "scripted".into(),
        retry_after_secs,
    }
}

/// Config wired to `backend`, with retry delays short enough for tests.
pub fn config_with(backend: Arc<ScriptedBackend>) -> TaxonomyConfig {
    TaxonomyConfig::builder()
        .backend(backend)
        .retry_backoff_ms(5)
        .build()
        .unwrap()
}

/// `tempdir/<name>` holding [`TINY_PDF`].
pub fn write_pdf(dir: &tempfile::TempDir, name: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, TINY_PDF).unwrap();
    path.to_string_lossy().into_owned()
}

/// Progress callback that records every event as a line.
#[derive(Default)]
pub struct EventLog {
    pub events: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn lines(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, line: String) {
        self.events.lock().unwrap().push(line);
    }
}

impl TaxonomyProgressCallback for EventLog {
    fn on_batch_start(&self, total_documents: usize) {
        self.push(format!("batch_start {total_documents}"));
    }

    fn on_document_start(&self, document: &str) {
        self.push(format!("start {document}"));
    }

    fn on_stage(&self, document: &str, stage: GenerationStage) {
        self.push(format!("stage {document} {stage:?}"));
    }

    fn on_retry(&self, document: &str, attempt: u32, delay_ms: u64, _reason: &str) {
        self.push(format!("retry {document} {attempt} {delay_ms}"));
    }

    fn on_document_complete(&self, document: &str, topics: usize, _processing_time: &str) {
        self.push(format!("complete {document} {topics}"));
    }

    fn on_document_error(&self, document: &str, _error: &str) {
        self.push(format!("error {document}"));
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        self.push(format!("batch_complete {total_documents} {success_count}"));
    }
}

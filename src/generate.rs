//! Single-document generation entry points.
//!
//! Every entry point funnels into [`generate_from_pdf`]: resolve a backend,
//! build the prompt and schema, call the model (retrying transient
//! failures), decode, enrich. Use [`crate::stream::generate_stream`] for
//! batches.

use crate::config::TaxonomyConfig;
use crate::error::TaxonomyError;
use crate::output::{DocumentInfo, FilteredContent, GenerationStats, TaxonomyOutput};
use crate::pipeline::backend::{resolve_backend, ModelReply, ModelRequest, TaxonomyBackend};
use crate::pipeline::input::{self, PdfFile};
use crate::pipeline::{encode, postprocess, render};
use crate::progress::GenerationStage;
use crate::prompts;
use crate::schema;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Generate a taxonomy for a PDF given as a local path, an HTTP/HTTPS URL or
/// a `data:` URI.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use edgequake_taxonomy::{generate_taxonomy, TaxonomyConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TaxonomyConfig::default();
/// let output = generate_taxonomy("paper.pdf", &config).await?;
/// for (depth, node) in output.result.walk() {
///     println!("{}{}", "  ".repeat(depth - 1), node.title);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn generate_taxonomy(
    input_str: impl AsRef<str>,
    config: &TaxonomyConfig,
) -> Result<TaxonomyOutput, TaxonomyError> {
    let input_str = input_str.as_ref();
    let label = display_label(input_str);
    notify_start(config, &label);

    let pdf = match input::resolve_input(input_str, config).await {
        Ok(pdf) => pdf,
        Err(e) => {
            notify_error(config, &label, &e);
            return Err(e);
        }
    };
    run_document(Arc::new(pdf), config, &label).await
}

/// Generate a taxonomy for PDF bytes already in memory.
pub async fn generate_from_bytes(
    bytes: &[u8],
    config: &TaxonomyConfig,
) -> Result<TaxonomyOutput, TaxonomyError> {
    let pdf = PdfFile::from_bytes("upload.pdf", bytes.to_vec(), config.max_pdf_bytes)?;
    generate_from_pdf(pdf, config).await
}

/// Generate a taxonomy for a `data:application/pdf;base64,...` URI.
pub async fn generate_from_data_uri(
    data_uri: &str,
    config: &TaxonomyConfig,
) -> Result<TaxonomyOutput, TaxonomyError> {
    let (mime, bytes) = encode::parse_data_uri(data_uri)?;
    debug!("Data URI declares {}", mime);
    let pdf = PdfFile::from_bytes("upload.pdf", bytes, config.max_pdf_bytes)?;
    generate_from_pdf(pdf, config).await
}

/// Generate a taxonomy for an already validated [`PdfFile`].
pub async fn generate_from_pdf(
    pdf: PdfFile,
    config: &TaxonomyConfig,
) -> Result<TaxonomyOutput, TaxonomyError> {
    let label = pdf.name.clone();
    notify_start(config, &label);
    run_document(Arc::new(pdf), config, &label).await
}

/// Synchronous wrapper around [`generate_taxonomy`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_taxonomy_sync(
    input_str: impl AsRef<str>,
    config: &TaxonomyConfig,
) -> Result<TaxonomyOutput, TaxonomyError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TaxonomyError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_taxonomy(input_str, config))
}

/// Generate a taxonomy and write the `TaxonomyResult` JSON to `output_path`.
///
/// The file is written to a temp file in the same directory and persisted
/// over the destination, so readers never see a partial file.
pub async fn generate_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &TaxonomyConfig,
) -> Result<GenerationStats, TaxonomyError> {
    let output = generate_taxonomy(input_str, config).await?;
    let json = serde_json::to_string_pretty(&output.result)
        .map_err(|e| TaxonomyError::Internal(format!("serialise taxonomy: {e}")))?;
    write_atomic(output_path.as_ref(), json.as_bytes()).await?;
    Ok(output.stats)
}

/// Read PDF metadata without calling a model.
///
/// Needs pdfium but no API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &TaxonomyConfig,
) -> Result<DocumentInfo, TaxonomyError> {
    let pdf = input::resolve_input(input_str.as_ref(), config).await?;
    render::extract_metadata(Arc::new(pdf), config.password.as_deref()).await
}

/// Ask the model to strip headers, footers and boilerplate from `document_text`.
///
/// Blank text is returned as-is without a model call.
pub async fn filter_content(
    document_text: &str,
    config: &TaxonomyConfig,
) -> Result<FilteredContent, TaxonomyError> {
    if document_text.trim().is_empty() {
        return Ok(FilteredContent {
            filtered_text: String::new(),
        });
    }

    let backend = resolve_backend(config)?;
    let request = ModelRequest {
        document: None,
        prompt: prompts::filter_content_prompt(document_text),
        schema: schema::filter_response_schema(),
        pages: config.pages,
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
    };
    info!(
        "Filtering {} chars of text with {}/{}",
        document_text.len(),
        backend.name(),
        backend.model()
    );

    let (reply, _attempts) = call_with_retry(backend.as_ref(), &request, config, "documentText").await?;
    postprocess::parse_filtered(&reply.text)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_document(
    pdf: Arc<PdfFile>,
    config: &TaxonomyConfig,
    label: &str,
) -> Result<TaxonomyOutput, TaxonomyError> {
    match run_document_inner(pdf, config, label).await {
        Ok(output) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_complete(
                    label,
                    output.result.metadata.number_of_topics,
                    &output.result.metadata.processing_time,
                );
            }
            Ok(output)
        }
        Err(e) => {
            notify_error(config, label, &e);
            Err(e)
        }
    }
}

async fn run_document_inner(
    pdf: Arc<PdfFile>,
    config: &TaxonomyConfig,
    label: &str,
) -> Result<TaxonomyOutput, TaxonomyError> {
    let total_start = Instant::now();
    config.pages.validate()?;
    info!("Generating taxonomy: {} ({} bytes)", pdf.name, pdf.len());

    let backend = resolve_backend(config)?;

    notify_stage(config, label, GenerationStage::Encoding);
    let request = ModelRequest {
        document: Some(Arc::clone(&pdf)),
        prompt: prompts::taxonomy_prompt(config.prompt_template.as_deref(), &config.pages),
        schema: schema::taxonomy_response_schema(config.schema_depth),
        pages: config.pages,
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
    };
    debug!("Prompt: {} chars, schema depth {}", request.prompt.len(), config.schema_depth);

    notify_stage(config, label, GenerationStage::Analyzing);
    let model_start = Instant::now();
    let (reply, attempts) = call_with_retry(backend.as_ref(), &request, config, label).await?;
    let model_duration = model_start.elapsed();

    notify_stage(config, label, GenerationStage::Finalizing);
    let decoded = postprocess::parse_model_taxonomy(&reply.text)?;
    let result = postprocess::enrich(decoded, model_start.elapsed(), &config.pages);

    let stats = GenerationStats {
        backend: backend.name().to_string(),
        model: backend.model().to_string(),
        document_name: pdf.name.clone(),
        document_bytes: pdf.len(),
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
        attempts,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        model_duration_ms: model_duration.as_millis() as u64,
    };

    info!(
        "Taxonomy complete: {} topics, {} images/tables, depth {}, {}",
        result.metadata.number_of_topics,
        result.metadata.images_tables_analyzed,
        result.max_depth(),
        result.metadata.processing_time
    );

    Ok(TaxonomyOutput { result, stats })
}

/// Call the backend, retrying transient failures with exponential backoff.
///
/// Each attempt is bounded by `api_timeout_secs`. A rate-limit answer with a
/// `Retry-After` hint waits at least that long. Returns the reply and the
/// number of attempts made.
async fn call_with_retry(
    backend: &dyn TaxonomyBackend,
    request: &ModelRequest,
    config: &TaxonomyConfig,
    label: &str,
) -> Result<(ModelReply, u32), TaxonomyError> {
    let limit = Duration::from_secs(config.api_timeout_secs);
    let mut last_err = TaxonomyError::Internal("no attempt made".to_string());

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let mut backoff = config.retry_backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
            if let TaxonomyError::RateLimitExceeded {
                retry_after_secs: Some(secs),
                ..
            } = last_err
            {
                backoff = backoff.max(secs.saturating_mul(1000));
            }
            warn!(
                "{}: retry {}/{} after {}ms ({})",
                label, attempt, config.max_retries, backoff, last_err
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_retry(label, attempt, backoff, &last_err.to_string());
            }
            sleep(Duration::from_millis(backoff)).await;
        }

        let started = Instant::now();
        let outcome = match timeout(limit, backend.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(TaxonomyError::ApiTimeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        };

        match outcome {
            Ok(reply) if reply.text.trim().is_empty() => return Err(TaxonomyError::EmptyResponse),
            Ok(reply) => {
                debug!(
                    "{}: attempt {} ok, {} input / {} output tokens",
                    label,
                    attempt + 1,
                    reply.input_tokens,
                    reply.output_tokens
                );
                return Ok((reply, attempt + 1));
            }
            Err(e) if e.is_retryable() => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                last_err = e;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err)
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), TaxonomyError> {
    let path = path.to_path_buf();
    let contents = contents.to_vec();

    tokio::task::spawn_blocking(move || {
        let write_err = |source: std::io::Error| TaxonomyError::OutputWriteFailed {
            path: path.clone(),
            source,
        };
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(&contents).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| TaxonomyError::Internal(format!("Write task panicked: {}", e)))?
}

static UPLOAD_SEQ: AtomicUsize = AtomicUsize::new(1);

/// Short label for progress events: data URIs are not echoed in full, and
/// each gets its own `upload-<n>.pdf` so concurrent ones stay apart.
fn display_label(input_str: &str) -> String {
    if input::is_data_uri(input_str) {
        format!("upload-{}.pdf", UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed))
    } else {
        input_str.to_string()
    }
}

fn notify_start(config: &TaxonomyConfig, label: &str) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(label);
        cb.on_stage(label, GenerationStage::Reading);
    }
}

fn notify_stage(config: &TaxonomyConfig, label: &str, stage: GenerationStage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(label, stage);
    }
}

fn notify_error(config: &TaxonomyConfig, label: &str, e: &TaxonomyError) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_error(label, &e.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_labels_are_short_and_distinct() {
        let first = display_label("data:application/pdf;base64,JVBERi0x");
        let second = display_label("data:application/pdf;base64,JVBERi0x");
        assert!(first.starts_with("upload-") && first.ends_with(".pdf"), "{first}");
        assert_ne!(first, second);
        assert_eq!(display_label("paper.pdf"), "paper.pdf");
    }

    #[tokio::test]
    async fn write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/taxonomy.json");
        write_atomic(&target, b"{\"taxonomy\": []}").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{\"taxonomy\": []}");

        write_atomic(&target, b"{}").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");
        assert_eq!(std::fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
    }
}

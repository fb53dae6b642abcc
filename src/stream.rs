//! Batch generation: many documents, bounded concurrency, results as they finish.
//!
//! Each document is still a single model request; the batch only overlaps
//! documents. Outcomes arrive in completion order, each tagged with the input
//! it belongs to, and a failed document never stops the batch.

use crate::config::TaxonomyConfig;
use crate::error::TaxonomyError;
use crate::generate::generate_taxonomy;
use crate::output::TaxonomyOutput;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// The outcome for one input of a batch.
#[derive(Debug)]
pub struct DocumentOutcome {
    /// The input string as given (path, URL or data URI).
    pub input: String,
    pub result: Result<TaxonomyOutput, TaxonomyError>,
}

/// A boxed stream of per-document outcomes.
pub type TaxonomyStream = Pin<Box<dyn Stream<Item = DocumentOutcome> + Send>>;

/// Generate taxonomies for several inputs, at most `config.concurrency` at a time.
///
/// Fires `on_batch_start` immediately and `on_batch_complete` after the last
/// outcome has been yielded.
///
/// # Example
/// ```rust,no_run
/// use edgequake_taxonomy::{generate_stream, TaxonomyConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = TaxonomyConfig::default();
/// let mut outcomes = generate_stream(vec!["a.pdf", "b.pdf"], &config);
/// while let Some(outcome) = outcomes.next().await {
///     match outcome.result {
///         Ok(out) => println!("{}: {} topics", outcome.input, out.result.metadata.number_of_topics),
///         Err(e) => eprintln!("{}: {}", outcome.input, e.user_message()),
///     }
/// }
/// # }
/// ```
pub fn generate_stream<I, S>(inputs: I, config: &TaxonomyConfig) -> TaxonomyStream
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
    let total = inputs.len();
    let concurrency = config.concurrency.max(1);
    info!("Starting batch: {} documents, concurrency {}", total, concurrency);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let succeeded = Arc::new(AtomicUsize::new(0));
    let config_clone = config.clone();

    let outcomes = stream::iter(inputs.into_iter().map(move |input| {
        let cfg = config_clone.clone();
        async move {
            let result = generate_taxonomy(&input, &cfg).await;
            DocumentOutcome { input, result }
        }
    }))
    .buffer_unordered(concurrency);

    let counter = Arc::clone(&succeeded);
    let counted = outcomes.inspect(move |outcome| {
        if outcome.result.is_ok() {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    let callback = config.progress_callback.clone();
    let finish = stream::once(async move {
        let ok = succeeded.load(Ordering::Relaxed);
        info!("Batch complete: {}/{} documents succeeded", ok, total);
        if let Some(cb) = callback {
            cb.on_batch_complete(total, ok);
        }
    })
    .filter_map(|()| async { None::<DocumentOutcome> });

    Box::pin(counted.chain(finish))
}

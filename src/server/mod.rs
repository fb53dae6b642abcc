//! HTTP service exposing taxonomy generation (feature `server`).
//!
//! | Route | Body | Answer |
//! |-------|------|--------|
//! | `GET /health` | | `OK` |
//! | `POST /api/taxonomy` | multipart `file`, `pageStart`, `pageEnd` | `TaxonomyResult` |
//! | `POST /api/taxonomy/data-uri` | `{pdfDataUri, pageStart?, pageEnd?}` | `TaxonomyResult` |
//! | `POST /api/filter` | `{documentText}` | `{filteredText}` |
//!
//! Errors are `{"error": "<message>"}` with a status derived from the error
//! category (see [`errors::status_for`]).

pub mod errors;
pub mod handlers;

use crate::config::TaxonomyConfig;
use crate::error::TaxonomyError;
use crate::pipeline::backend::resolve_backend;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Room for multipart framing and form fields around the PDF itself.
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TaxonomyConfig>,
}

impl AppState {
    /// Resolve the backend once so every request reuses the same client.
    pub fn new(mut config: TaxonomyConfig) -> Result<Self, TaxonomyError> {
        let backend = resolve_backend(&config)?;
        info!("Serving with backend '{}' model '{}'", backend.name(), backend.model());
        config.backend = Some(backend);
        config.progress_callback = None;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Largest request body accepted: a base64 data URI of the largest PDF.
    pub fn body_limit(&self) -> usize {
        self.config.max_pdf_bytes / 3 * 4 + BODY_OVERHEAD_BYTES
    }
}

/// Build the router.
pub fn create_router(state: AppState) -> Router {
    let limit = state.body_limit();
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/taxonomy", post(handlers::taxonomy_upload))
        .route("/api/taxonomy/data-uri", post(handlers::taxonomy_data_uri))
        .route("/api/filter", post(handlers::filter))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until the process exits.
pub async fn run(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

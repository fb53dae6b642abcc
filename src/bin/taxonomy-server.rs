//! HTTP service binary for edgequake-taxonomy.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_taxonomy::server::{run, AppState};
use edgequake_taxonomy::{TaxonomyConfig, Transport};
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Serve taxonomy generation over HTTP.
#[derive(Parser, Debug)]
#[command(name = "taxonomy-server", version, about = "HTTP service for PDF taxonomy generation")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "TAXONOMY_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind.
    #[arg(short, long, env = "TAXONOMY_PORT", default_value_t = 8080)]
    port: u16,

    /// How documents reach the model: auto, inline or images.
    #[arg(long, env = "TAXONOMY_TRANSPORT", default_value = "auto")]
    transport: Transport,

    /// Model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision provider for the page-image transport.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini REST base URL.
    #[arg(long, env = "TAXONOMY_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Largest accepted PDF in MiB.
    #[arg(long, env = "TAXONOMY_MAX_PDF_MB", default_value_t = 20)]
    max_pdf_mb: usize,

    /// Retries on overload, rate limit or timeout.
    #[arg(long, env = "TAXONOMY_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "TAXONOMY_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Unroll depth of the recursive topic schema (1–10).
    #[arg(long, env = "TAXONOMY_SCHEMA_DEPTH", default_value_t = 6)]
    schema_depth: usize,
}

impl Args {
    fn config(&self) -> Result<TaxonomyConfig> {
        let mut builder = TaxonomyConfig::builder()
            .transport(self.transport)
            .max_pdf_bytes(self.max_pdf_mb.saturating_mul(1024 * 1024))
            .max_retries(self.max_retries)
            .api_timeout_secs(self.api_timeout)
            .schema_depth(self.schema_depth);
        if let Some(ref model) = self.model {
            builder = builder.model(model);
        }
        if let Some(ref provider) = self.provider {
            builder = builder.provider_name(provider);
        }
        if let Some(ref key) = self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(ref url) = self.api_base_url {
            builder = builder.api_base_url(url);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let args = Args::parse();
    let config = args.config()?;
    debug!(?config, "Server configuration loaded");

    let state = AppState::new(config).context("No model backend available")?;
    let addr = SocketAddr::new(args.host, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);
    run(listener, state).await
}

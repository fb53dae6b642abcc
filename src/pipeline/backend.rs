//! The model seam: one trait every generation backend implements, and the
//! resolution chain that picks a backend from a [`TaxonomyConfig`].
//!
//! Two backends ship with the crate:
//!
//! * [`GeminiBackend`] sends the PDF itself, base64-inlined, to Gemini's
//!   `generateContent` endpoint with a native response schema.
//! * [`VisionBackend`] rasterises the selected pages and sends them as images
//!   to any edgequake-llm provider, embedding the schema in the prompt.
//!
//! Callers and tests can inject their own via [`TaxonomyConfig::backend`].

use crate::config::{PageRange, TaxonomyConfig, Transport, DEFAULT_GEMINI_MODEL, DEFAULT_VISION_MODEL};
use crate::error::TaxonomyError;
use crate::pipeline::gemini::GeminiBackend;
use crate::pipeline::input::PdfFile;
use crate::pipeline::llm::VisionBackend;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// One request to the model.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// The document, if the request is about one. Content filtering sends text only.
    pub document: Option<Arc<PdfFile>>,
    /// Fully rendered instruction text.
    pub prompt: String,
    /// Expected shape of the answer.
    pub schema: Value,
    /// Pages the prompt refers to.
    pub pages: PageRange,
    pub temperature: f32,
    pub max_output_tokens: usize,
}

/// The model's raw answer.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A generative model able to answer a [`ModelRequest`].
///
/// Implementations classify their failures into [`TaxonomyError`] variants
/// (see [`crate::error::classify_provider_failure`]) so the caller's retry
/// loop can tell transient failures from permanent ones.
pub trait TaxonomyBackend: Send + Sync {
    /// Short backend label, e.g. `"gemini"`.
    fn name(&self) -> &str;

    /// Model identifier sent to the endpoint.
    fn model(&self) -> &str;

    /// Send one request. No retries: the caller owns retry policy.
    fn generate<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, Result<ModelReply, TaxonomyError>>;
}

/// Pick the backend for this configuration, most specific first.
///
/// 1. **Pre-built backend** (`config.backend`) is used as-is.
/// 2. **Transport** decides between Gemini and a vision provider. With
///    [`Transport::Auto`], Gemini wins when an API key is available and no
///    vision provider was named or injected.
/// 3. For the vision path, the provider comes from `config.provider`, then
///    `config.provider_name`, then `EDGEQUAKE_LLM_PROVIDER` +
///    `EDGEQUAKE_MODEL`, then `OPENAI_API_KEY`, then full auto-detection.
pub fn resolve_backend(config: &TaxonomyConfig) -> Result<Arc<dyn TaxonomyBackend>, TaxonomyError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let transport = match config.transport {
        Transport::Auto => {
            let vision_requested = config.provider.is_some() || config.provider_name.is_some();
            if !vision_requested && config.resolved_api_key().is_some() {
                Transport::InlinePdf
            } else {
                Transport::PageImages
            }
        }
        t => t,
    };
    debug!("Resolved transport: {:?}", transport);

    match transport {
        Transport::InlinePdf => {
            let key = config
                .resolved_api_key()
                .ok_or_else(|| TaxonomyError::ProviderNotConfigured {
                    provider: "gemini".to_string(),
                    hint: "Set GEMINI_API_KEY (or GOOGLE_API_KEY), or pass --api-key.".to_string(),
                })?;
            let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
            info!("Using Gemini inline-PDF backend, model {}", model);
            Ok(Arc::new(GeminiBackend::new(key, model, &config.api_base_url)?))
        }
        _ => {
            let (provider, label, model) = resolve_vision_provider(config)?;
            info!("Using page-image backend '{}', model {}", label, model);
            Ok(Arc::new(VisionBackend::new(provider, label, model, config)))
        }
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, TaxonomyError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        TaxonomyError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Returns the provider with its label and model name.
fn resolve_vision_provider(
    config: &TaxonomyConfig,
) -> Result<(Arc<dyn LLMProvider>, String, String), TaxonomyError> {
    if let Some(ref provider) = config.provider {
        return Ok(describe_provider(
            Arc::clone(provider),
            config.provider_name.as_deref(),
            config.model.as_deref(),
        ));
    }

    let model = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string());

    if let Some(ref name) = config.provider_name {
        return Ok((create_vision_provider(name, &model)?, name.clone(), model));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return Ok((create_vision_provider(&prov, &env_model)?, prov, env_model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return Ok((create_vision_provider("openai", &model)?, "openai".to_string(), model));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| TaxonomyError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No model provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY for the inline-PDF transport, or OPENAI_API_KEY /\n\
                ANTHROPIC_API_KEY for the page-image transport.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(describe_provider(llm_provider, None, None))
}

/// Label and model for a provider built elsewhere: explicit values win,
/// otherwise the provider reports its own.
fn describe_provider(
    provider: Arc<dyn LLMProvider>,
    label: Option<&str>,
    model: Option<&str>,
) -> (Arc<dyn LLMProvider>, String, String) {
    let label = label.unwrap_or_else(|| provider.name()).to_string();
    let model = model.unwrap_or_else(|| provider.model()).to_string();
    (provider, label, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    struct Fixed;

    impl TaxonomyBackend for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed-1"
        }

        fn generate<'a>(&'a self, _request: &'a ModelRequest) -> BoxFuture<'a, Result<ModelReply, TaxonomyError>> {
            async {
                Ok(ModelReply {
                    text: "{}".into(),
                    ..Default::default()
                })
            }
            .boxed()
        }
    }

    #[test]
    fn injected_backend_wins() {
        let config = TaxonomyConfig::builder()
            .transport(Transport::InlinePdf)
            .backend(Arc::new(Fixed))
            .build()
            .unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(backend.name(), "fixed");
        assert_eq!(backend.model(), "fixed-1");
    }

    #[test]
    fn explicit_key_selects_gemini() {
        let config = TaxonomyConfig::builder()
            .transport(Transport::InlinePdf)
            .api_key("test-key")
            .model("gemini-test")
            .build()
            .unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(backend.name(), "gemini");
        assert_eq!(backend.model(), "gemini-test");
    }

    #[test]
    fn injected_provider_reports_its_own_model() {
        let provider: Arc<dyn LLMProvider> = Arc::new(edgequake_llm::MockProvider::new());
        let config = TaxonomyConfig::builder().provider(provider).build().unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(backend.name(), "mock");
        assert_eq!(backend.model(), "mock-model");

        let provider: Arc<dyn LLMProvider> = Arc::new(edgequake_llm::MockProvider::new());
        let config = TaxonomyConfig::builder()
            .provider(provider)
            .provider_name("local")
            .model("vision-x")
            .build()
            .unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(backend.name(), "local");
        assert_eq!(backend.model(), "vision-x");
    }

    #[test]
    fn auto_with_key_prefers_gemini() {
        let config = TaxonomyConfig::builder().api_key("k").build().unwrap();
        assert_eq!(resolve_backend(&config).unwrap().name(), "gemini");
    }
}

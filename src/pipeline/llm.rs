//! Page-image backend: any edgequake-llm vision provider.
//!
//! Providers without native PDF input get the selected pages as PNG images.
//! They cannot enforce a response schema either, so the schema is appended
//! to the system prompt and the answer goes through the same lenient decoder
//! as every other backend.
//!
//! ## Message Layout
//!
//! 1. **System message**: the taxonomy (or filter) prompt plus the schema.
//! 2. **User message**: a short instruction, with every page image attached
//!    in page order. Text-only requests attach no images.

use crate::config::TaxonomyConfig;
use crate::error::{classify_provider_failure, TaxonomyError};
use crate::pipeline::backend::{ModelReply, ModelRequest, TaxonomyBackend};
use crate::pipeline::{encode, render};
use crate::prompts::{with_schema_instruction, PAGE_IMAGES_USER_TEXT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sends rendered pages to an edgequake-llm provider.
pub struct VisionBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
    model: String,
    render: TaxonomyConfig,
}

impl VisionBackend {
    /// `config` supplies the rendering settings (password, pixel cap, page cap).
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        label: impl Into<String>,
        model: impl Into<String>,
        config: &TaxonomyConfig,
    ) -> Self {
        let mut render = config.clone();
        render.backend = None;
        render.provider = None;
        render.progress_callback = None;
        Self {
            provider,
            label: label.into(),
            model: model.into(),
            render,
        }
    }

    async fn page_images(&self, request: &ModelRequest) -> Result<Vec<ImageData>, TaxonomyError> {
        let Some(ref doc) = request.document else {
            return Ok(Vec::new());
        };

        let rendered = render::render_range(Arc::clone(doc), &self.render, request.pages).await?;
        let mut images = Vec::with_capacity(rendered.len());
        for (idx, img) in &rendered {
            match encode::encode_page(img) {
                Ok(data) => images.push(data),
                Err(e) => warn!("Failed to encode page {}: {}", idx + 1, e),
            }
        }
        if images.is_empty() {
            return Err(TaxonomyError::RasterisationFailed {
                page: request.pages.start.unwrap_or(1),
                detail: "no page could be encoded".to_string(),
            });
        }
        debug!("{}: {} page images attached", doc.name, images.len());
        Ok(images)
    }

    async fn call(&self, request: &ModelRequest) -> Result<ModelReply, TaxonomyError> {
        let images = self.page_images(request).await?;
        let user_text = if images.is_empty() {
            "Respond with the JSON object now."
        } else {
            PAGE_IMAGES_USER_TEXT
        };

        let messages = vec![
            ChatMessage::system(with_schema_instruction(&request.prompt, &request.schema)),
            ChatMessage::user_with_images(user_text, images),
        ];
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_provider_failure(&self.label, None, &e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

impl TaxonomyBackend for VisionBackend {
    fn name(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, Result<ModelReply, TaxonomyError>> {
        self.call(request).boxed()
    }
}

fn build_options(request: &ModelRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_output_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageRange;

    #[test]
    fn options_follow_request() {
        let request = ModelRequest {
            document: None,
            prompt: String::new(),
            schema: serde_json::json!({}),
            pages: PageRange::all(),
            temperature: 0.2,
            max_output_tokens: 8192,
        };
        let opts = build_options(&request);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(8192));
    }
}

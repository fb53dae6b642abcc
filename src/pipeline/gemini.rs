//! Inline-PDF backend for Gemini's `generateContent` REST endpoint.
//!
//! The PDF travels base64-encoded as an `inlineData` part next to the prompt,
//! and `generationConfig.responseSchema` makes the model answer in JSON of the
//! expected shape. Gemini reads the PDF natively (text, layout and embedded
//! images), so nothing is rendered locally.

use crate::error::{classify_provider_failure, TaxonomyError};
use crate::pipeline::backend::{ModelReply, ModelRequest, TaxonomyBackend};
use crate::pipeline::encode::encode_base64;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const PROVIDER: &str = "gemini";

/// Gemini `generateContent` client.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, TaxonomyError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TaxonomyError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn call(&self, request: &ModelRequest) -> Result<ModelReply, TaxonomyError> {
        let body = build_request_body(request);
        debug!(
            "POST {} ({} document bytes)",
            self.endpoint(),
            request.document.as_ref().map_or(0, |d| d.len())
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TaxonomyError::ApiTimeout { elapsed_ms: 0 }
                } else {
                    classify_provider_failure(PROVIDER, None, &e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            let detail = error_message(&text).unwrap_or(text);
            return Err(match classify_provider_failure(PROVIDER, Some(status.as_u16()), &detail) {
                TaxonomyError::RateLimitExceeded { provider, .. } => TaxonomyError::RateLimitExceeded {
                    provider,
                    retry_after_secs: retry_after,
                },
                other => other,
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            TaxonomyError::LlmApiError {
                message: format!("{PROVIDER}: undecodable response body: {e}"),
            }
        })?;

        Ok(reply_from_response(parsed))
    }
}

impl TaxonomyBackend for GeminiBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, Result<ModelReply, TaxonomyError>> {
        self.call(request).boxed()
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn build_request_body(request: &ModelRequest) -> GenerateContentRequest {
    let mut parts = vec![Part {
        text: Some(request.prompt.clone()),
        inline_data: None,
    }];
    if let Some(ref doc) = request.document {
        parts.push(Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "application/pdf".to_string(),
                data: encode_base64(&doc.bytes),
            }),
        });
    }

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
            response_mime_type: "application/json",
            response_schema: request.schema.clone(),
        },
    }
}

/// Concatenate the text parts of the first candidate.
fn reply_from_response(response: GenerateContentResponse) -> ModelReply {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    let usage = response.usage_metadata.unwrap_or_default();

    ModelReply {
        text,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    }
}

/// `error.message` from a Google API error body.
fn error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageRange;
    use crate::pipeline::input::PdfFile;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn request(with_doc: bool) -> ModelRequest {
        ModelRequest {
            document: with_doc.then(|| {
                Arc::new(PdfFile {
                    name: "a.pdf".into(),
                    bytes: b"%PDF-1.4 test".to_vec(),
                })
            }),
            prompt: "Build the taxonomy.".into(),
            schema: json!({"type": "OBJECT"}),
            pages: PageRange::all(),
            temperature: 0.2,
            max_output_tokens: 1024,
        }
    }

    #[test]
    fn body_inlines_pdf_and_schema() {
        let body = serde_json::to_value(build_request_body(&request(true))).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Build the taxonomy.");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[1]["inlineData"]["data"], encode_base64(b"%PDF-1.4 test"));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn text_only_body_has_single_part() {
        let body = serde_json::to_value(build_request_body(&request(false))).unwrap();
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn reply_joins_text_parts() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 30}
        }))
        .unwrap();
        let reply = reply_from_response(resp);
        assert_eq!(reply.text, "{\"a\":1}");
        assert_eq!(reply.input_tokens, 120);
        assert_eq!(reply.output_tokens, 30);
    }

    #[test]
    fn no_candidates_is_empty_text() {
        let reply = reply_from_response(GenerateContentResponse::default());
        assert!(reply.text.is_empty());
    }

    #[tokio::test]
    async fn posts_to_generate_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/gemini-test:generateContent")
                    .header("x-goog-api-key", "secret")
                    .body_contains("application/pdf");
                then.status(200).json_body(json!({
                    "candidates": [{"content": {"parts": [{"text": "{\"taxonomy\": []}"}]}}],
                    "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
                }));
            })
            .await;

        let backend = GeminiBackend::new("secret", "gemini-test", &server.base_url()).unwrap();
        let reply = backend.generate(&request(true)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply.text, "{\"taxonomy\": []}");
        assert_eq!(reply.output_tokens, 5);
    }

    #[tokio::test]
    async fn maps_503_to_overloaded() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503).json_body(json!({
                    "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
                }));
            })
            .await;

        let backend = GeminiBackend::new("k", "m", &server.base_url()).unwrap();
        let err = backend.generate(&request(true)).await.unwrap_err();
        assert!(matches!(err, TaxonomyError::ModelOverloaded { ref detail, .. } if detail.contains("overloaded")));
    }

    #[tokio::test]
    async fn maps_429_with_retry_after() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).header("retry-after", "7").body("quota");
            })
            .await;

        let backend = GeminiBackend::new("k", "m", &server.base_url()).unwrap();
        let err = backend.generate(&request(false)).await.unwrap_err();
        assert!(matches!(
            err,
            TaxonomyError::RateLimitExceeded { retry_after_secs: Some(7), .. }
        ));
    }

    #[tokio::test]
    async fn maps_401_to_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(401).body("{\"error\": {\"message\": \"API key not valid\"}}");
            })
            .await;

        let backend = GeminiBackend::new("bad", "m", &server.base_url()).unwrap();
        let err = backend.generate(&request(true)).await.unwrap_err();
        assert!(matches!(err, TaxonomyError::AuthError { .. }));
    }
}

//! Model clients: the one seam between this crate and a remote LLM.
//!
//! [`ModelClient`] takes a prompt plus one inline PDF and returns free text.
//! Two implementations ship with the crate:
//!
//! * [`GeminiClient`] — talks to Gemini's `generateContent` REST endpoint
//!   directly, sending the PDF as an `inlineData` part. This is the default.
//! * [`ProviderClient`] — adapts any [`edgequake_llm::LLMProvider`]
//!   (OpenAI, Anthropic, Ollama, …) by attaching the PDF to a user message.
//!
//! Clients are constructed explicitly and shared as `Arc<dyn ModelClient>`;
//! a missing credential is reported when the client is built, not when the
//! first request fails.

use crate::error::VerifyError;
use crate::pipeline::encode::InlineData;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini REST base URL.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables searched for the Gemini credential, in order.
pub const GEMINI_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Sampling knobs forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 8192,
        }
    }
}

/// A single model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Anything that can turn `[prompt, pdf]` into free text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short provider name used in logs and error messages.
    fn name(&self) -> &str;

    /// Issue one request. `file` names the document for error reporting.
    async fn generate(
        &self,
        file: &str,
        prompt: &str,
        payload: &InlineData,
        options: &GenerationOptions,
    ) -> Result<ModelReply, VerifyError>;
}

// ── Gemini ───────────────────────────────────────────────────────────────

/// Native Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    /// Build a client with an explicit credential.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, VerifyError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(VerifyError::MissingApiKey {
                var: GEMINI_KEY_VARS[0].to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| VerifyError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Build a client from `GEMINI_API_KEY` (or `GOOGLE_API_KEY`).
    pub fn from_env(model: Option<&str>) -> Result<Self, VerifyError> {
        let key = GEMINI_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| VerifyError::MissingApiKey {
                var: GEMINI_KEY_VARS.join(" or "),
            })?;
        Self::new(key, model.unwrap_or(DEFAULT_GEMINI_MODEL))
    }

    /// Point the client at a different endpoint (proxies, regional hosts).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply a transport-level timeout to every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, VerifyError> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerifyError::Internal(format!("HTTP client: {e}")))?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: &'a InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

fn build_request<'a>(
    prompt: &'a str,
    payload: &'a InlineData,
    options: &GenerationOptions,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![RequestContent {
            role: "user",
            parts: vec![
                RequestPart::Text { text: prompt },
                RequestPart::Inline {
                    inline_data: payload,
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Finish reasons that mean the model refused to answer.
const BLOCKING_FINISH_REASONS: [&str; 5] =
    ["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Turn a successful response body into a reply.
fn parse_response(file: &str, body: &str) -> Result<ModelReply, VerifyError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| VerifyError::ApiError {
            file: file.to_string(),
            message: format!("malformed response: {e}"),
        })?;

    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(VerifyError::ApiError {
            file: file.to_string(),
            message: format!("request blocked: {reason}"),
        });
    }

    // No candidate, or one with no text, is an empty reply; the parser turns
    // it into placeholder sections.
    let candidate = response.candidates.first();
    let text: String = candidate
        .and_then(|c| c.content.as_ref())
        .into_iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        if let Some(reason) = candidate
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
        {
            return Err(VerifyError::ApiError {
                file: file.to_string(),
                message: format!("no text returned (finish reason: {reason})"),
            });
        }
        debug!("{}: model returned no text", file);
    }

    let usage = response.usage_metadata.as_ref();
    Ok(ModelReply {
        text,
        input_tokens: usage.map(|u| u.prompt_token_count).unwrap_or(0),
        output_tokens: usage.map(|u| u.candidates_token_count).unwrap_or(0),
    })
}

/// Map a non-success HTTP status to the matching error variant.
fn status_error(
    file: &str,
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> VerifyError {
    let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|env| {
            if env.error.status.is_empty() {
                env.error.message
            } else {
                format!("{} ({})", env.error.message, env.error.status)
            }
        })
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => VerifyError::AuthError {
            provider: "gemini".to_string(),
            detail,
        },
        StatusCode::TOO_MANY_REQUESTS => VerifyError::RateLimitExceeded {
            provider: "gemini".to_string(),
            retry_after_secs,
        },
        _ => VerifyError::ApiError {
            file: file.to_string(),
            message: format!("HTTP {status}: {detail}"),
        },
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        file: &str,
        prompt: &str,
        payload: &InlineData,
        options: &GenerationOptions,
    ) -> Result<ModelReply, VerifyError> {
        let body = serde_json::to_vec(&build_request(prompt, payload, options))
            .map_err(|e| VerifyError::Internal(format!("request encoding: {e}")))?;

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| VerifyError::ApiError {
                file: file.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let text = response.text().await.map_err(|e| VerifyError::ApiError {
            file: file.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(status_error(file, status, retry_after_secs, &text));
        }

        let reply = parse_response(file, &text)?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            file, reply.input_tokens, reply.output_tokens
        );
        Ok(reply)
    }
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// Adapts an [`LLMProvider`] to [`ModelClient`].
///
/// The PDF goes out as an attachment with MIME type `application/pdf`; the
/// provider must support document input for this to succeed.
pub struct ProviderClient {
    name: String,
    provider: Arc<dyn LLMProvider>,
}

impl ProviderClient {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("name", &self.name)
            .field("provider", &"<dyn LLMProvider>")
            .finish()
    }
}

#[async_trait]
impl ModelClient for ProviderClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        file: &str,
        prompt: &str,
        payload: &InlineData,
        options: &GenerationOptions,
    ) -> Result<ModelReply, VerifyError> {
        let attachment = ImageData::new(payload.data.clone(), payload.mime_type.as_str());
        let messages = vec![ChatMessage::user_with_images(prompt, vec![attachment])];
        let completion = CompletionOptions {
            temperature: Some(options.temperature),
            max_tokens: Some(options.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&completion))
            .await
            .map_err(|e| VerifyError::ApiError {
                file: file.to_string(),
                message: format!("{e}"),
            })?;

        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

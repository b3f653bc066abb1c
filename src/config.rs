//! Configuration types for a verification run.
//!
//! All run behaviour is controlled through [`VerifyConfig`], built via its
//! [`VerifyConfigBuilder`]. Keeping every knob in one struct makes it easy to
//! share a config between the CLI, a [`crate::session::Workbench`] and tests.

use crate::error::VerifyError;
use crate::pipeline::client::ModelClient;
use crate::pipeline::verify::AbsencePolicy;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Configuration for a verification run.
///
/// Built via [`VerifyConfig::builder()`] or using [`VerifyConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docverify::VerifyConfig;
///
/// let config = VerifyConfig::builder()
///     .model("gemini-2.0-flash")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 1);
/// ```
#[derive(Clone)]
pub struct VerifyConfig {
    /// Model identifier, e.g. "gemini-1.5-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Provider name ("gemini", "openai", "anthropic", …).
    /// If None along with `client`, the provider is resolved from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed client. Takes precedence over `provider_name`.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Maximum extraction calls in flight. Default: 1.
    ///
    /// 1 processes files strictly one after another. Larger values use an
    /// ordered worker pool; results are still reported in file order and the
    /// first failure still aborts the batch.
    pub concurrency: usize,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per document. Default: 8192.
    ///
    /// The reply carries the full document text, so this bounds how much of a
    /// long document survives; the key details come last in the reply.
    pub max_tokens: usize,

    /// Custom extraction prompt. If None, uses the built-in default.
    pub prompt: Option<String>,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Scoring of fields that every document lacks. Default: mismatch.
    pub absence_policy: AbsencePolicy,

    /// Optional per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            client: None,
            concurrency: 1,
            temperature: 0.1,
            max_tokens: 8192,
            prompt: None,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            absence_policy: AbsencePolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for VerifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("absence_policy", &self.absence_policy)
            .finish()
    }
}

impl VerifyConfig {
    /// Create a new builder for `VerifyConfig`.
    pub fn builder() -> VerifyConfigBuilder {
        VerifyConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`VerifyConfig`].
#[derive(Debug)]
pub struct VerifyConfigBuilder {
    config: VerifyConfig,
}

impl VerifyConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Count a field every document lacks as a match.
    pub fn absent_fields_match(mut self, v: bool) -> Self {
        self.config.absence_policy = if v {
            AbsencePolicy::Match
        } else {
            AbsencePolicy::Mismatch
        };
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<VerifyConfig, VerifyError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(VerifyError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_tokens == 0 {
            return Err(VerifyError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(VerifyError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if matches!(c.prompt.as_deref(), Some(p) if p.trim().is_empty()) {
            return Err(VerifyError::InvalidConfig(
                "Custom prompt must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

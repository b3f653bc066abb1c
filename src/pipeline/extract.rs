//! One extraction call: encode a file, ask the model, parse the reply.
//!
//! This module is intentionally thin. Prompt text lives in [`crate::prompts`]
//! and section parsing in [`crate::pipeline::parse`]; here we only sequence the
//! steps and bound the remote call with a timeout. Errors are returned, never
//! swallowed: the batch runner aborts on the first one.

use crate::config::VerifyConfig;
use crate::error::VerifyError;
use crate::intake::FileItem;
use crate::output::DocumentResult;
use crate::pipeline::client::{GenerationOptions, ModelClient, ModelReply};
use crate::pipeline::{encode, parse};
use crate::prompts::DEFAULT_EXTRACTION_PROMPT;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// A parsed document plus the cost of producing it.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: DocumentResult,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Send one file to the model and return its raw reply.
pub async fn request_reply(
    client: &Arc<dyn ModelClient>,
    item: &FileItem,
    config: &VerifyConfig,
) -> Result<ModelReply, VerifyError> {
    let payload = encode::encode_file(item).await?;
    let prompt = config.prompt.as_deref().unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    let options = GenerationOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let secs = config.api_timeout_secs;
    timeout(
        Duration::from_secs(secs),
        client.generate(&item.name, prompt, &payload, &options),
    )
    .await
    .map_err(|_| VerifyError::ApiTimeout {
        file: item.name.clone(),
        secs,
    })?
}

/// Full extraction for one file: request, then parse.
///
/// `on_reply` runs between the two steps, once the model has answered.
pub async fn extract_document(
    client: &Arc<dyn ModelClient>,
    item: &FileItem,
    config: &VerifyConfig,
    on_reply: impl FnOnce(&ModelReply),
) -> Result<Extraction, VerifyError> {
    let start = Instant::now();
    let reply = request_reply(client, item, config).await?;
    on_reply(&reply);
    let document = parse::parse_reply(&item.name, &reply.text);
    let duration = start.elapsed();

    debug!(
        "{}: {} key details, {} input tokens, {} output tokens, {:?}",
        item.name,
        document.key_details.len(),
        reply.input_tokens,
        reply.output_tokens,
        duration
    );

    Ok(Extraction {
        document,
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
        duration_ms: duration.as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::PDF_MIME;
    use crate::pipeline::encode::InlineData;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<(String, String, InlineData)>>,
        reply: String,
    }

    #[async_trait]
    impl ModelClient for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn generate(
            &self,
            file: &str,
            prompt: &str,
            payload: &InlineData,
            _options: &GenerationOptions,
        ) -> Result<ModelReply, VerifyError> {
            self.seen
                .lock()
                .unwrap()
                .push((file.to_string(), prompt.to_string(), payload.clone()));
            Ok(ModelReply {
                text: self.reply.clone(),
                input_tokens: 10,
                output_tokens: 5,
            })
        }
    }

    struct Stalled;

    #[async_trait]
    impl ModelClient for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn generate(
            &self,
            _file: &str,
            _prompt: &str,
            _payload: &InlineData,
            _options: &GenerationOptions,
        ) -> Result<ModelReply, VerifyError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ModelReply::default())
        }
    }

    fn item() -> FileItem {
        FileItem::from_bytes("id.pdf", PDF_MIME, b"%PDF-1.4 id".to_vec())
    }

    #[tokio::test]
    async fn sends_prompt_and_inline_pdf() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(vec![]),
            reply: "[SUMMARY]An ID card.[/SUMMARY]".into(),
        });
        let client: Arc<dyn ModelClient> = recorder.clone();

        let out = extract_document(&client, &item(), &VerifyConfig::default(), |_| {})
            .await
            .unwrap();
        assert_eq!(out.document.summary, "An ID card.");
        assert_eq!(out.document.full_text, "No text extracted");
        assert_eq!(out.input_tokens, 10);

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "id.pdf");
        assert_eq!(seen[0].1, DEFAULT_EXTRACTION_PROMPT);
        assert_eq!(seen[0].2.mime_type, PDF_MIME);
    }

    #[tokio::test]
    async fn prompt_override_is_used() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(vec![]),
            reply: "x".into(),
        });
        let client: Arc<dyn ModelClient> = recorder.clone();
        let config = VerifyConfig::builder().prompt("custom").build().unwrap();

        extract_document(&client, &item(), &config, |_| {}).await.unwrap();
        assert_eq!(recorder.seen.lock().unwrap()[0].1, "custom");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let client: Arc<dyn ModelClient> = Arc::new(Stalled);
        let config = VerifyConfig::builder().api_timeout_secs(5).build().unwrap();

        let err = extract_document(&client, &item(), &config, |_| {})
            .await
            .unwrap_err();
        assert!(
            matches!(err, VerifyError::ApiTimeout { secs: 5, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn non_pdf_bytes_never_reach_the_model() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(vec![]),
            reply: String::new(),
        });
        let client: Arc<dyn ModelClient> = recorder.clone();
        let fake = FileItem::from_bytes("fake.pdf", PDF_MIME, b"GIF89a".to_vec());

        let err = extract_document(&client, &fake, &VerifyConfig::default(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::NotAPdf { .. }));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}

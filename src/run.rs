//! Batch entry points: extract every document, then verify across them.
//!
//! A run is all-or-nothing. Documents are extracted in file order; the first
//! failure aborts the remaining files and no partial [`BatchOutput`] is ever
//! returned. With the default `concurrency = 1` exactly one request is in
//! flight at a time. Higher values keep a bounded, *ordered* pool so the
//! reported document order never depends on network timing.

use crate::config::VerifyConfig;
use crate::error::VerifyError;
use crate::intake::{FileItem, Intake, UploadBatch};
use crate::output::{BatchOutput, BatchStats};
use crate::pipeline::client::{GeminiClient, ModelClient, ProviderClient, DEFAULT_GEMINI_MODEL};
use crate::pipeline::extract::{self, Extraction};
use crate::pipeline::{input, verify};
use edgequake_llm::ProviderFactory;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Verify a set of local paths or URLs.
///
/// This is the primary entry point for the library: it resolves the inputs,
/// runs them through intake (non-PDFs are dropped with a warning) and
/// processes the resulting batch.
///
/// # Errors
/// - [`VerifyError::Intake`] when fewer than two PDFs remain
/// - any extraction failure, which aborts the whole batch
pub async fn verify_files<I, S>(inputs: I, config: &VerifyConfig) -> Result<BatchOutput, VerifyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items = input::resolve_items(inputs, config.download_timeout_secs).await?;
    let mut intake = Intake::new();
    let report = intake.drop_items(items)?;
    if let Some(ref warning) = report.warning {
        warn!("{} Skipped: {:?}", warning, report.rejected);
    }

    let client = resolve_client(config)?;
    verify_batch(intake.batch(), &client, config).await
}

/// Synchronous wrapper around [`verify_files`].
///
/// Creates a temporary tokio runtime internally.
pub fn verify_sync<I, S>(inputs: I, config: &VerifyConfig) -> Result<BatchOutput, VerifyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokio::runtime::Runtime::new()
        .map_err(|e| VerifyError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(verify_files(inputs, config))
}

/// Verify inputs and write the JSON report to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn verify_to_file<I, S>(
    inputs: I,
    output_path: impl AsRef<Path>,
    config: &VerifyConfig,
) -> Result<BatchOutput, VerifyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let output = verify_files(inputs, config).await?;
    write_report(&output, output_path.as_ref()).await?;
    Ok(output)
}

/// Write `output` as pretty JSON, atomically.
pub async fn write_report(output: &BatchOutput, path: &Path) -> Result<(), VerifyError> {
    let write_err = |e| VerifyError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let json = serde_json::to_vec_pretty(output)
        .map_err(|e| VerifyError::Internal(format!("report serialisation: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Extract and verify an already-accepted batch.
pub async fn verify_batch(
    batch: &UploadBatch,
    client: &Arc<dyn ModelClient>,
    config: &VerifyConfig,
) -> Result<BatchOutput, VerifyError> {
    let total_start = Instant::now();

    if !batch.is_ready() {
        return Err(VerifyError::NotEnoughFiles { found: batch.len() });
    }

    let files = batch.files();
    let total = files.len();
    info!(
        "Processing {} documents with {} (concurrency {})",
        total,
        client.name(),
        config.concurrency
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // ── Extract ──────────────────────────────────────────────────────────
    let extract_start = Instant::now();
    let extractions = if config.concurrency <= 1 {
        process_sequential(client, files, config).await?
    } else {
        process_concurrent(client, files, config).await?
    };
    let extraction_duration_ms = extract_start.elapsed().as_millis() as u64;

    // ── Verify ───────────────────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_verification_start(extractions.len());
    }

    let total_input_tokens = extractions.iter().map(|e| e.input_tokens).sum();
    let total_output_tokens = extractions.iter().map(|e| e.output_tokens).sum();
    let documents: Vec<_> = extractions.into_iter().map(|e| e.document).collect();
    let verification = verify::verify_documents(&documents, config.absence_policy);

    let matched_fields = verification.iter().filter(|v| v.matches).count();
    let stats = BatchStats {
        documents: documents.len(),
        matched_fields,
        mismatched_fields: verification.len() - matched_fields,
        total_input_tokens,
        total_output_tokens,
        extraction_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    for entry in &verification {
        debug!(
            "{}: {} ({})",
            entry.field,
            entry.status_label(),
            entry.joined_values()
        );
    }
    info!(
        "Verification complete: {}/{} fields match across {} documents, {}ms total",
        matched_fields,
        verification.len(),
        stats.documents,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(matched_fields, verification.len());
    }

    Ok(BatchOutput {
        documents,
        verification,
        stats,
    })
}

/// Extract one document, firing progress events around it.
async fn process_document(
    client: &Arc<dyn ModelClient>,
    index: usize,
    total: usize,
    item: &FileItem,
    config: &VerifyConfig,
) -> Result<Extraction, VerifyError> {
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_document_start(index, total, &item.name);
    }

    let result = extract::extract_document(client, item, config, |reply| {
        if let Some(cb) = cb {
            cb.on_document_reply(index, total, reply.text.len());
        }
    })
    .await;

    match &result {
        Ok(extraction) => {
            if let Some(cb) = cb {
                cb.on_document_complete(
                    index,
                    total,
                    &item.name,
                    extraction.document.key_details.len(),
                );
            }
        }
        Err(e) => {
            warn!("{}: extraction failed: {}", item.name, e);
            if let Some(cb) = cb {
                cb.on_document_error(index, total, &item.name, e.to_string());
            }
        }
    }

    result
}

/// One request at a time, in file order.
async fn process_sequential(
    client: &Arc<dyn ModelClient>,
    files: &[FileItem],
    config: &VerifyConfig,
) -> Result<Vec<Extraction>, VerifyError> {
    let total = files.len();
    let mut results = Vec::with_capacity(total);
    for (index, item) in files.iter().enumerate() {
        results.push(process_document(client, index, total, item, config).await?);
    }
    Ok(results)
}

/// Up to `config.concurrency` requests in flight; results stay in file order.
async fn process_concurrent(
    client: &Arc<dyn ModelClient>,
    files: &[FileItem],
    config: &VerifyConfig,
) -> Result<Vec<Extraction>, VerifyError> {
    let total = files.len();
    // Collected first: a lazy `map` over `&FileItem` makes the run future non-`Send`.
    let futures: Vec<_> = files
        .iter()
        .enumerate()
        .map(|(index, item)| process_document(client, index, total, item, config))
        .collect();
    stream::iter(futures)
        .buffered(config.concurrency)
        .try_collect()
        .await
}

// ── Client resolution ────────────────────────────────────────────────────

/// Resolve the model client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`) — used as-is. This is how tests
///    and embedding applications inject their own client.
/// 2. **Named provider** (`config.provider_name`) — `"gemini"` builds the
///    native [`GeminiClient`]; any other name goes through
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    resolved the same way as a named provider.
/// 4. **Gemini from the environment** — `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
///    A missing key is reported here, before any file is touched.
pub fn resolve_client(config: &VerifyConfig) -> Result<Arc<dyn ModelClient>, VerifyError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    if let Some(ref name) = config.provider_name {
        return create_named_client(name, config.model.as_deref(), config);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_named_client(&prov, Some(&model), config);
        }
    }

    gemini_client(config.model.as_deref(), config)
}

fn create_named_client(
    provider_name: &str,
    model: Option<&str>,
    config: &VerifyConfig,
) -> Result<Arc<dyn ModelClient>, VerifyError> {
    if provider_name.eq_ignore_ascii_case("gemini") {
        return gemini_client(model, config);
    }

    let model = model.ok_or_else(|| VerifyError::ProviderNotConfigured {
        provider: provider_name.to_string(),
        hint: "A model is required for this provider (--model).".to_string(),
    })?;
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        VerifyError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    debug!("Using {} via edgequake-llm ({})", provider_name, model);
    Ok(Arc::new(ProviderClient::new(provider_name, provider)))
}

fn gemini_client(
    model: Option<&str>,
    config: &VerifyConfig,
) -> Result<Arc<dyn ModelClient>, VerifyError> {
    let client = GeminiClient::from_env(Some(model.unwrap_or(DEFAULT_GEMINI_MODEL)))?
        .with_timeout(Duration::from_secs(config.api_timeout_secs))?;
    debug!("Using native Gemini client ({})", client.model());
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::PDF_MIME;
    use crate::pipeline::client::{GenerationOptions, ModelReply};
    use crate::pipeline::encode::InlineData;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with the file name as the Name field; fails on `fail_on`.
    struct EchoClient {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl EchoClient {
        fn new(fail_on: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail_on,
            })
        }
    }

    #[async_trait]
    impl ModelClient for EchoClient {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            file: &str,
            _prompt: &str,
            _payload: &InlineData,
            _options: &GenerationOptions,
        ) -> Result<ModelReply, VerifyError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            // Later files answer faster, so an unordered pool would reorder them.
            tokio::time::sleep(Duration::from_millis(40 - 10 * call.min(3) as u64)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on == Some(call) {
                return Err(VerifyError::ApiError {
                    file: file.to_string(),
                    message: "HTTP 500".into(),
                });
            }
            Ok(ModelReply {
                text: format!("[KEY_DETAILS]\n- Name: {file}\n[/KEY_DETAILS]"),
                input_tokens: 100,
                output_tokens: 20,
            })
        }
    }

    fn batch(n: usize) -> UploadBatch {
        let mut intake = Intake::new();
        let items = (0..n)
            .map(|i| FileItem::from_bytes(format!("doc{i}.pdf"), PDF_MIME, b"%PDF-1.4".to_vec()))
            .collect();
        intake.drop_items(items).unwrap();
        intake.batch().clone()
    }

    #[tokio::test]
    async fn sequential_run_keeps_order_and_one_call_in_flight() {
        let echo = EchoClient::new(None);
        let client: Arc<dyn ModelClient> = echo.clone();
        let out = verify_batch(&batch(3), &client, &VerifyConfig::default())
            .await
            .unwrap();

        let names: Vec<&str> = out.documents.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, vec!["doc0.pdf", "doc1.pdf", "doc2.pdf"]);
        assert_eq!(echo.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(out.stats.total_input_tokens, 300);
        assert_eq!(out.stats.documents, 3);
        assert_eq!(out.stats.matched_fields + out.stats.mismatched_fields, 4);
    }

    #[tokio::test]
    async fn concurrent_run_preserves_file_order() {
        let echo = EchoClient::new(None);
        let client: Arc<dyn ModelClient> = echo.clone();
        let config = VerifyConfig::builder().concurrency(3).build().unwrap();
        let out = verify_batch(&batch(3), &client, &config).await.unwrap();

        let names: Vec<String> = out.verification[0].values.clone();
        assert_eq!(names, vec!["doc0.pdf", "doc1.pdf", "doc2.pdf"]);
        assert!(echo.max_in_flight.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn first_failure_aborts_remaining_files() {
        let echo = EchoClient::new(Some(1));
        let client: Arc<dyn ModelClient> = echo.clone();
        let err = verify_batch(&batch(3), &client, &VerifyConfig::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("doc1.pdf"));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2, "third file must not be sent");
    }

    #[tokio::test]
    async fn undersized_batch_is_refused() {
        let client: Arc<dyn ModelClient> = EchoClient::new(None);
        let err = verify_batch(&UploadBatch::default(), &client, &VerifyConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::NotEnoughFiles { found: 0 }));
    }

    #[test]
    fn prebuilt_client_takes_priority() {
        let client: Arc<dyn ModelClient> = EchoClient::new(None);
        let config = VerifyConfig::builder().client(client).build().unwrap();
        assert_eq!(resolve_client(&config).unwrap().name(), "echo");
    }

    #[test]
    fn named_provider_without_model_is_not_configured() {
        let config = VerifyConfig::builder().provider_name("openai").build().unwrap();
        let err = resolve_client(&config).err().unwrap();
        assert!(matches!(err, VerifyError::ProviderNotConfigured { .. }));
    }

    #[tokio::test]
    async fn report_is_written_atomically() {
        let client: Arc<dyn ModelClient> = EchoClient::new(None);
        let out = verify_batch(&batch(2), &client, &VerifyConfig::default())
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        write_report(&out, &path).await.unwrap();

        let back: BatchOutput =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, out);
        assert!(!path.with_extension("json.tmp").exists());
    }
}

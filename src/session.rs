//! Interactive session state: the current batch, the last run's results and
//! the single user-facing message slot.
//!
//! [`Workbench`] is what a UI (or the CLI) drives. It owns the run lifecycle:
//!
//! ```text
//! idle ─▶ validating-input ─▶ extracting ⇄ parsing ─▶ verifying ─▶ idle
//!              │                    │          │
//!              └────────────────────┴──────────┴──▶ error slot set ─▶ idle
//! ```
//!
//! Results and verification are cleared when a run starts and published
//! together when it succeeds, so a failed run never leaves partial results.
//! The re-entrancy gate lives inside [`Workbench::process`] itself: a second
//! call while a run is in flight returns [`VerifyError::Busy`] without
//! touching any state.

use crate::config::VerifyConfig;
use crate::error::{IntakeError, VerifyError, NOT_ENOUGH_FILES_MESSAGE};
use crate::intake::{FileItem, Intake, IntakeReport, UploadBatch};
use crate::output::{BatchOutput, BatchStats, DocumentResult, VerificationEntry};
use crate::pipeline::client::ModelClient;
use crate::progress::{BatchProgressCallback, ProgressCallback};
use crate::run;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info};

/// Where the current (or last) run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    ValidatingInput,
    /// Waiting on the model for document `document` (0-based).
    Extracting { document: usize, total: usize },
    /// Parsing the reply for document `document`.
    Parsing { document: usize, total: usize },
    Verifying,
}

#[derive(Debug, Default)]
struct State {
    intake: Intake,
    results: Vec<DocumentResult>,
    verification: Vec<VerificationEntry>,
    stats: Option<BatchStats>,
    message: Option<String>,
    phase: RunPhase,
}

/// Holds the batch and the outcome of the last run.
pub struct Workbench {
    client: Arc<dyn ModelClient>,
    config: VerifyConfig,
    state: Arc<Mutex<State>>,
    processing: AtomicBool,
}

/// Clears the processing flag however the run ends (including drop).
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Forwards progress events and mirrors them into [`RunPhase`].
struct PhaseTracker {
    state: Arc<Mutex<State>>,
    inner: Option<ProgressCallback>,
}

impl PhaseTracker {
    fn set(&self, phase: RunPhase) {
        lock(&self.state).phase = phase;
    }
}

impl BatchProgressCallback for PhaseTracker {
    fn on_batch_start(&self, total: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_batch_start(total);
        }
    }

    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        self.set(RunPhase::Extracting {
            document: index,
            total,
        });
        if let Some(ref cb) = self.inner {
            cb.on_document_start(index, total, name);
        }
    }

    fn on_document_reply(&self, index: usize, total: usize, reply_len: usize) {
        self.set(RunPhase::Parsing {
            document: index,
            total,
        });
        if let Some(ref cb) = self.inner {
            cb.on_document_reply(index, total, reply_len);
        }
    }

    fn on_document_complete(&self, index: usize, total: usize, name: &str, key_details: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_document_complete(index, total, name, key_details);
        }
    }

    fn on_document_error(&self, index: usize, total: usize, name: &str, error: String) {
        if let Some(ref cb) = self.inner {
            cb.on_document_error(index, total, name, error);
        }
    }

    fn on_verification_start(&self, documents: usize) {
        self.set(RunPhase::Verifying);
        if let Some(ref cb) = self.inner {
            cb.on_verification_start(documents);
        }
    }

    fn on_batch_complete(&self, matched_fields: usize, total_fields: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_batch_complete(matched_fields, total_fields);
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Workbench {
    /// Create a workbench around an explicitly constructed client.
    pub fn new(client: Arc<dyn ModelClient>, config: VerifyConfig) -> Self {
        Self {
            client,
            config,
            state: Arc::new(Mutex::new(State::default())),
            processing: AtomicBool::new(false),
        }
    }

    /// Create a workbench, resolving the client from `config`.
    ///
    /// Fails with a typed error (e.g. [`VerifyError::MissingApiKey`]) when no
    /// client can be built.
    pub fn from_config(config: VerifyConfig) -> Result<Self, VerifyError> {
        let client = run::resolve_client(&config)?;
        Ok(Self::new(client, config))
    }

    /// Offer a new set of files.
    ///
    /// Clears the message slot, then sets it to the non-PDF warning or the
    /// rejection message as appropriate. A rejected drop keeps the old batch.
    pub fn drop_files(&self, items: Vec<FileItem>) -> Result<IntakeReport, IntakeError> {
        let mut state = lock(&self.state);
        state.message = None;
        match state.intake.drop_items(items) {
            Ok(report) => {
                state.message = report.warning.clone();
                Ok(report)
            }
            Err(e) => {
                state.message = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Process the current batch.
    ///
    /// Returns [`VerifyError::Busy`] if a run is already in flight. Any other
    /// failure is also recorded in [`Workbench::message`]; results stay empty.
    pub async fn process(&self) -> Result<BatchOutput, VerifyError> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(VerifyError::Busy);
        }
        let _guard = ProcessingGuard(&self.processing);

        let batch = {
            let mut state = lock(&self.state);
            state.phase = RunPhase::ValidatingInput;
            if !state.intake.batch().is_ready() {
                let found = state.intake.batch().len();
                state.message = Some(NOT_ENOUGH_FILES_MESSAGE.to_string());
                state.phase = RunPhase::Idle;
                return Err(VerifyError::NotEnoughFiles { found });
            }
            state.message = None;
            state.results.clear();
            state.verification.clear();
            state.stats = None;
            state.intake.batch().clone()
        };

        let mut config = self.config.clone();
        config.progress_callback = Some(Arc::new(PhaseTracker {
            state: Arc::clone(&self.state),
            inner: self.config.progress_callback.clone(),
        }));

        let outcome = run::verify_batch(&batch, &self.client, &config).await;

        let mut state = lock(&self.state);
        state.phase = RunPhase::Idle;
        match outcome {
            Ok(output) => {
                state.results = output.documents.clone();
                state.verification = output.verification.clone();
                state.stats = Some(output.stats.clone());
                info!("Published results for {} documents", output.documents.len());
                Ok(output)
            }
            Err(e) => {
                let message = e.user_message();
                error!("Processing error: {}", message);
                state.message = Some(message);
                Err(e)
            }
        }
    }

    /// True while a run is in flight.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// True when a run may be started: a ready batch and nothing in flight.
    pub fn can_process(&self) -> bool {
        !self.is_processing() && lock(&self.state).intake.batch().is_ready()
    }

    pub fn batch(&self) -> UploadBatch {
        lock(&self.state).intake.batch().clone()
    }

    pub fn results(&self) -> Vec<DocumentResult> {
        lock(&self.state).results.clone()
    }

    pub fn verification(&self) -> Vec<VerificationEntry> {
        lock(&self.state).verification.clone()
    }

    pub fn stats(&self) -> Option<BatchStats> {
        lock(&self.state).stats.clone()
    }

    /// The single user-facing warning or error, if any.
    pub fn message(&self) -> Option<String> {
        lock(&self.state).message.clone()
    }

    pub fn phase(&self) -> RunPhase {
        lock(&self.state).phase
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }
}

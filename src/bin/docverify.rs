//! CLI binary for edgequake-docverify.
//!
//! A thin shim over the library crate: the positional inputs play the role of
//! the dropped files, flags map to `VerifyConfig`, and the results are
//! printed as text or JSON.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docverify::pipeline::input;
use edgequake_docverify::report::{self, RenderOptions};
use edgequake_docverify::{
    write_report, BatchOutput, BatchProgressCallback, ProgressCallback, VerifyConfig, Workbench,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished document.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} documents  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total} documents…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, name: &str) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_document_reply(&self, _index: usize, _total: usize, _reply_len: usize) {
        self.bar.set_prefix("Parsing");
    }

    fn on_document_complete(&self, index: usize, total: usize, name: &str, key_details: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}  {}",
            green("✓"),
            index + 1,
            total,
            name,
            dim(&format!("{key_details} key details")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.set_prefix("Extracting");
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, name: &str, error: String) {
        let secs = self.elapsed_secs(index);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_verification_start(&self, _documents: usize) {
        self.bar.set_prefix("Verifying");
        self.bar.set_message("");
    }

    fn on_batch_complete(&self, matched_fields: usize, total_fields: usize) {
        self.bar.finish_and_clear();
        let mark = if matched_fields == total_fields {
            green("✔")
        } else {
            yellow("⚠")
        };
        eprintln!(
            "{} {}/{} fields match",
            mark,
            bold(&matched_fields.to_string()),
            total_fields
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Compare two identity documents
  docverify licence.pdf passport.pdf

  # Mix local files and URLs, hide the full text
  docverify --no-full-text id.pdf https://example.com/utility-bill.pdf

  # Machine-readable output, fail the shell step on any mismatch
  docverify --json --strict a.pdf b.pdf > result.json

  # Save the JSON report and use another provider
  docverify --provider openai --model gpt-4.1-mini a.pdf b.pdf -o report.json

FIELDS COMPARED:
  Name, Address, Date of Birth, Identification Number

  A field matches only when every document reports the same value. A field
  that no document mentions is a mismatch unless --absent-fields-match is set.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  GOOGLE_API_KEY          Fallback for GEMINI_API_KEY
  EDGEQUAKE_LLM_PROVIDER  Provider for edgequake-llm (openai, anthropic, …)
  EDGEQUAKE_MODEL         Model ID used with EDGEQUAKE_LLM_PROVIDER
  RUST_LOG                Overrides the log filter

EXIT STATUS:
  0  all documents processed (and, with --strict, every field matched)
  1  input, intake or processing error
  2  --strict and at least one field did not match
"#;

/// Cross-check identity fields across PDF documents using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docverify",
    version,
    about = "Cross-check identity details across PDF documents using an LLM",
    long_about = "Sends each PDF to a multimodal LLM (Google Gemini by default), extracts the \
full text, a summary and key identity details, then reports whether Name, Address, Date of Birth \
and Identification Number agree across all documents.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs (at least two PDFs).
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Also write the JSON report to this file.
    #[arg(short, long, env = "DOCVERIFY_OUTPUT")]
    output: Option<PathBuf>,

    /// Model ID (default: gemini-1.5-flash).
    #[arg(long, env = "DOCVERIFY_MODEL")]
    model: Option<String>,

    /// Provider: gemini (native), or any edgequake-llm provider name.
    #[arg(long, env = "DOCVERIFY_PROVIDER")]
    provider: Option<String>,

    /// Extraction calls in flight at once. 1 = strictly sequential.
    #[arg(short, long, env = "DOCVERIFY_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "DOCVERIFY_PROMPT")]
    prompt: Option<PathBuf>,

    /// Max output tokens per document.
    #[arg(long, env = "DOCVERIFY_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCVERIFY_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-document API timeout in seconds.
    #[arg(long, env = "DOCVERIFY_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "DOCVERIFY_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Count a field that no document reports as a match.
    #[arg(long, env = "DOCVERIFY_ABSENT_FIELDS_MATCH")]
    absent_fields_match: bool,

    /// Print the results as JSON (BatchOutput) instead of text.
    #[arg(long, env = "DOCVERIFY_JSON")]
    json: bool,

    /// Omit each document's full text from the text report.
    #[arg(long, env = "DOCVERIFY_NO_FULL_TEXT")]
    no_full_text: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCVERIFY_NO_PROGRESS")]
    no_progress: bool,

    /// Exit with status 2 when any field does not match.
    #[arg(long, env = "DOCVERIFY_STRICT")]
    strict: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCVERIFY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the report itself.
    #[arg(short, long, env = "DOCVERIFY_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and workbench ───────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let bench = Workbench::from_config(config).context("Failed to set up the model client")?;

    // ── Intake ───────────────────────────────────────────────────────────
    let items = input::resolve_items(&cli.inputs, cli.download_timeout)
        .await
        .context("Failed to read inputs")?;

    if let Err(e) = bench.drop_files(items) {
        eprintln!("{} {}", red("✘"), e);
        std::process::exit(1);
    }
    if let Some(warning) = bench.message() {
        if !cli.quiet {
            eprintln!("{} {}", yellow("⚠"), warning);
        }
    }

    // ── Process ──────────────────────────────────────────────────────────
    let output = match bench.process().await {
        Ok(output) => output,
        Err(_) => {
            let message = bench
                .message()
                .unwrap_or_else(|| "Failed to process documents: Unknown error".to_string());
            eprintln!("{} {}", red("✘"), message);
            std::process::exit(1);
        }
    };

    if let Some(ref path) = cli.output {
        write_report(&output, path)
            .await
            .context("Failed to write report")?;
        if !cli.quiet {
            eprintln!("{} report written to {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_report(&output, !cli.no_full_text).context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms total",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
            output.stats.total_duration_ms,
        );
    }

    if cli.strict && !output.all_match() {
        std::process::exit(2);
    }
    Ok(())
}

/// Map CLI args to `VerifyConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<VerifyConfig> {
    let mut builder = VerifyConfig::builder()
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .absent_fields_match(cli.absent_fields_match);

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Text report on stdout, with the verification lines coloured by status.
fn print_report(output: &BatchOutput, full_text: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "{}", bold(report::VERIFICATION_TITLE))?;
    for entry in &output.verification {
        let line = report::verification_line(entry);
        if entry.matches {
            writeln!(out, "{}", green(&line))?;
        } else {
            writeln!(out, "{}", red(&line))?;
        }
    }

    let options = RenderOptions { full_text };
    for doc in &output.documents {
        writeln!(out)?;
        out.write_all(report::render_document(doc, options).as_bytes())?;
    }
    Ok(())
}

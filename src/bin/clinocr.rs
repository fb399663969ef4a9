//! CLI binary for clinical-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RecognitionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use clinical_ocr::{
    recognize_file, recognize_to_file, AdvancedOcrResult, CorrectionDictionary, EngineKind,
    ProgressCallback, RecognitionConfig, RecognitionProgressCallback, StrategyCatalog,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

/// Terminal progress callback: one bar over the planned passes, with failed
/// passes logged above it. The bar is finished early when the orchestrator
/// stops on a confident reading.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
    verbose: bool,
}

impl CliProgressCallback {
    fn new_dynamic(verbose: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Decoding image…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
            verbose,
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} passes  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reading");
        self.bar.reset_eta();
    }
}

impl RecognitionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, planned_passes: usize) {
        self.activate_bar(planned_passes);
    }

    fn on_pass_start(&self, _pass: usize, _planned: usize, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn on_pass_complete(&self, pass: usize, planned: usize, label: &str, confidence: f32) {
        if self.verbose {
            self.bar.println(format!(
                "  {} Pass {:>3}/{:<3}  {:<40}  {}",
                green("✓"),
                pass,
                planned,
                label,
                dim(&format!("{confidence:>5.1}")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_pass_error(&self, pass: usize, planned: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Pass {:>3}/{:<3}  {}",
            red("✗"),
            pass,
            planned,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, attempted: usize, confidence: f32) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if attempted > 0 && failed == attempted {
            eprintln!("{} all {} passes failed", red("✘"), bold(&attempted.to_string()));
        } else if failed > 0 {
            eprintln!(
                "{} {} passes, confidence {}  ({} failed)",
                cyan("⚠"),
                bold(&attempted.to_string()),
                bold(&format!("{confidence:.1}")),
                red(&failed.to_string()),
            );
        } else {
            eprintln!(
                "{} {} passes, confidence {}",
                green("✔"),
                bold(&attempted.to_string()),
                bold(&format!("{confidence:.1}")),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Read a photo of a drug chart (stdout)
  clinocr chart.jpg

  # Write the corrected text to a file
  clinocr allergy-note.png -o allergy-note.txt

  # Structured JSON with confidence, warnings and per-pass stats
  clinocr --json scan.tiff > scan.json

  # Stop only at a very confident reading, but give up after 20s
  clinocr --target-confidence 95 --time-budget-ms 20000 chart.jpg

  # Run four passes at a time against a recognition service
  clinocr --engine http --engine-url http://ocr.internal/v1/recognize \
          --concurrency 4 chart.jpg

  # Custom vocabulary and strategy catalog
  clinocr --dictionary ward-terms.json --catalog fast.json chart.jpg

  # Raw engine output, no vocabulary correction
  clinocr --no-correction chart.jpg

ENGINES:
  tesseract (default)  Local tesseract binary; install tesseract-ocr first
  http                 POST {image, mode, language} → {text, confidence}

ENVIRONMENT VARIABLES:
  CLINOCR_ENGINE         tesseract | http
  CLINOCR_ENGINE_URL     Recognition service endpoint (http engine)
  CLINOCR_ENGINE_API_KEY Bearer token for the recognition service
  CLINOCR_TESSERACT_BIN  Path to the tesseract executable
  CLINOCR_LANG           Engine language code (default: eng)
  RUST_LOG               Overrides the log filter (e.g. clinical_ocr=debug)

The result is reference text for a clinician, not a substitute for reading
the original document. Low-confidence readings carry a review warning.
"#;

/// Read handwritten and printed clinical notes from images.
#[derive(Parser, Debug)]
#[command(
    name = "clinocr",
    version,
    about = "Multi-pass OCR for handwritten clinical notes",
    long_about = "Read handwritten and printed clinical notes (drug charts, allergy notes, \
consent forms) from photos and scans. Runs many preprocessing variants and layout modes, \
stops at the first confident reading, otherwise fuses all readings by confidence-weighted \
word voting, then corrects medical vocabulary.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image path or HTTP/HTTPS URL.
    input: String,

    /// Write the text to this file instead of stdout.
    #[arg(short, long, env = "CLINOCR_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON (AdvancedOcrResult) instead of text.
    #[arg(long, env = "CLINOCR_JSON")]
    json: bool,

    /// Confidence (0–100) at which a single reading ends the run.
    #[arg(long, env = "CLINOCR_TARGET_CONFIDENCE", default_value_t = 99.0)]
    target_confidence: f32,

    /// Readings below this confidence are kept but flagged low quality.
    #[arg(long, env = "CLINOCR_MIN_CONFIDENCE", default_value_t = 60.0)]
    min_confidence: f32,

    /// Readings to collect before a confident one may end the run.
    #[arg(long, env = "CLINOCR_MIN_CANDIDATES", default_value_t = 1)]
    min_candidates: usize,

    /// Skip medical vocabulary correction.
    #[arg(long, env = "CLINOCR_NO_CORRECTION")]
    no_correction: bool,

    /// Keep vocabulary correction but skip character confusion rules.
    #[arg(long, env = "CLINOCR_NO_CONFUSION_RULES")]
    no_confusion_rules: bool,

    /// Preprocessing groups run concurrently.
    #[arg(short, long, env = "CLINOCR_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Stop starting new passes after this many milliseconds.
    #[arg(long, env = "CLINOCR_TIME_BUDGET_MS")]
    time_budget_ms: Option<u64>,

    /// Reject images with more pixels than this.
    #[arg(long, env = "CLINOCR_MAX_PIXELS", default_value_t = 40_000_000)]
    max_pixels: u64,

    /// Recognition engine: tesseract or http.
    #[arg(long, env = "CLINOCR_ENGINE", default_value = "tesseract")]
    engine: EngineKind,

    /// Recognition service endpoint (http engine).
    #[arg(long, env = "CLINOCR_ENGINE_URL")]
    engine_url: Option<String>,

    /// Bearer token for the recognition service.
    #[arg(long, env = "CLINOCR_ENGINE_API_KEY", hide_env_values = true)]
    engine_api_key: Option<String>,

    /// Path to the tesseract executable.
    #[arg(long, env = "CLINOCR_TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: PathBuf,

    /// Engine language code.
    #[arg(long = "lang", env = "CLINOCR_LANG", default_value = "eng")]
    language: String,

    /// JSON correction dictionary replacing the built-in one.
    #[arg(long, env = "CLINOCR_DICTIONARY")]
    dictionary: Option<PathBuf>,

    /// JSON strategy catalog replacing the built-in one.
    #[arg(long, env = "CLINOCR_CATALOG")]
    catalog: Option<PathBuf>,

    /// Per-call engine timeout in seconds.
    #[arg(long, env = "CLINOCR_ENGINE_TIMEOUT", default_value_t = 60)]
    engine_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CLINOCR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "CLINOCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs and per-pass lines.
    #[arg(short, long, env = "CLINOCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CLINOCR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic(cli.verbose);
        Some(cb as Arc<dyn RecognitionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run recognition ──────────────────────────────────────────────────
    let result = if let Some(ref output_path) = cli.output {
        recognize_to_file(&cli.input, output_path, &config)
            .await
            .context("Recognition failed")?
    } else {
        recognize_file(&cli.input, &config)
            .await
            .context("Recognition failed")?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let text = result.best_text();
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        print_summary(&result, cli.output.as_ref(), show_progress);
    }

    Ok(())
}

/// Warnings always go to stderr; the one-line summary only when no
/// progress bar already printed one.
fn print_summary(result: &AdvancedOcrResult, output: Option<&PathBuf>, show_progress: bool) {
    for warning in &result.warnings {
        eprintln!("{} {}", cyan("⚠"), warning);
    }
    let stats = &result.stats;
    if !show_progress {
        eprintln!(
            "Read {}x{} image: {} of {} planned passes, confidence {:.1}, {}ms",
            stats.image_width,
            stats.image_height,
            stats.passes_attempted,
            stats.passes_planned,
            result.confidence,
            stats.total_duration_ms,
        );
    }
    if let Some(used) = result.preprocessing_used.as_deref() {
        eprintln!("   {}", dim(used));
    }
    if let Some(path) = output {
        eprintln!("   →  {}", bold(&path.display().to_string()));
    }
}

/// Map CLI args to `RecognitionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RecognitionConfig> {
    let mut builder = RecognitionConfig::builder()
        .target_confidence(cli.target_confidence)
        .min_confidence(cli.min_confidence)
        .min_candidates(cli.min_candidates)
        .domain_correction(!cli.no_correction)
        .confusion_rules(!cli.no_confusion_rules)
        .concurrency(cli.concurrency)
        .max_image_pixels(cli.max_pixels)
        .engine(cli.engine)
        .tesseract_bin(cli.tesseract_bin.clone())
        .language(cli.language.clone())
        .engine_timeout_secs(cli.engine_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ms) = cli.time_budget_ms {
        builder = builder.time_budget_ms(ms);
    }
    if let Some(ref url) = cli.engine_url {
        builder = builder.engine_url(url.clone());
    }
    if let Some(ref key) = cli.engine_api_key {
        builder = builder.engine_api_key(key.clone());
    }
    if let Some(ref path) = cli.dictionary {
        let dictionary = CorrectionDictionary::from_path(path)
            .with_context(|| format!("Failed to load dictionary from {}", path.display()))?;
        builder = builder.dictionary(Arc::new(dictionary));
    }
    if let Some(ref path) = cli.catalog {
        let catalog = StrategyCatalog::from_path(path)
            .with_context(|| format!("Failed to load strategy catalog from {}", path.display()))?;
        builder = builder.catalog(catalog);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

//! Configuration types for multi-pass recognition.
//!
//! All recognition behaviour is controlled through [`RecognitionConfig`],
//! built via its [`RecognitionConfigBuilder`]. The config is cheap to clone
//! (shared parts sit behind `Arc`) and is passed by reference into every
//! entry point in [`crate::recognize`].

use crate::adapter::SharedAdapter;
use crate::dictionary::CorrectionDictionary;
use crate::error::OcrError;
use crate::pipeline::strategy::StrategyCatalog;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a recognition run.
///
/// Built via [`RecognitionConfig::builder()`] or using
/// [`RecognitionConfig::default()`].
///
/// # Example
/// ```rust
/// use clinical_ocr::RecognitionConfig;
///
/// let config = RecognitionConfig::builder()
///     .target_confidence(95.0)
///     .min_candidates(3)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RecognitionConfig {
    /// Stop trying strategies once a candidate reaches this confidence. Default: 99.
    pub target_confidence: f32,

    /// Candidates below this are kept for fusion but flagged low-quality. Default: 60.
    pub min_confidence: f32,

    /// Early exit also needs at least this many candidates. Default: 1.
    ///
    /// Raising it forces several readings to be collected even when the first
    /// one is confident, so fusion has something to vote with.
    pub min_candidates: usize,

    /// Run the dictionary correction pass and fuzzy-match fused words. Default: true.
    pub domain_correction: bool,

    /// Apply the dictionary's character-confusion rules (`rn → m`, `0 → o`)
    /// during correction. Default: true.
    ///
    /// These rules also rewrite correct tokens such as `120/80`; turn them off
    /// for numeric-heavy documents.
    pub confusion_rules: bool,

    /// `(recipe, scale)` groups processed at once. Default: 1 (sequential).
    ///
    /// Each group preprocesses its own copy of the image, so memory grows
    /// roughly linearly with this value on large images.
    pub concurrency: usize,

    /// Recipes, scales and layout modes to try. Default: [`StrategyCatalog::default`].
    pub catalog: Arc<StrategyCatalog>,

    /// Wall-clock budget for the whole run in milliseconds. Default: none.
    ///
    /// When exceeded no new pass starts; the candidates collected so far are
    /// fused and a warning is attached.
    pub time_budget_ms: Option<u64>,

    /// Reject decoded images with more pixels than this. Default: 40 000 000.
    pub max_image_pixels: u64,

    /// Per-recognition-call timeout in seconds. Default: 60.
    pub engine_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Which bundled engine to build when no adapter is injected. Default: Tesseract.
    pub engine: EngineKind,

    /// Pre-constructed recognition engine. Takes precedence over `engine`.
    pub adapter: Option<SharedAdapter>,

    /// Correction vocabulary. If None, the built-in medical dictionary is used.
    pub dictionary: Option<Arc<CorrectionDictionary>>,

    /// Optional per-pass progress callback.
    pub progress_callback: Option<ProgressCallback>,

    /// Tesseract executable. Default: `tesseract` (looked up on `PATH`).
    pub tesseract_bin: PathBuf,

    /// Recognition language passed to the engine. Default: `eng`.
    pub language: String,

    /// Endpoint for [`EngineKind::Http`].
    pub engine_url: Option<String>,

    /// Bearer token for [`EngineKind::Http`].
    pub engine_api_key: Option<String>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            target_confidence: 99.0,
            min_confidence: 60.0,
            min_candidates: 1,
            domain_correction: true,
            confusion_rules: true,
            concurrency: 1,
            catalog: Arc::new(StrategyCatalog::default()),
            time_budget_ms: None,
            max_image_pixels: 40_000_000,
            engine_timeout_secs: 60,
            download_timeout_secs: 120,
            engine: EngineKind::default(),
            adapter: None,
            dictionary: None,
            progress_callback: None,
            tesseract_bin: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            engine_url: None,
            engine_api_key: None,
        }
    }
}

impl fmt::Debug for RecognitionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionConfig")
            .field("target_confidence", &self.target_confidence)
            .field("min_confidence", &self.min_confidence)
            .field("min_candidates", &self.min_candidates)
            .field("domain_correction", &self.domain_correction)
            .field("confusion_rules", &self.confusion_rules)
            .field("concurrency", &self.concurrency)
            .field("passes", &self.catalog.pass_count())
            .field("time_budget_ms", &self.time_budget_ms)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("engine", &self.engine)
            .field("adapter", &self.adapter.as_ref().map(|a| a.name().to_string()))
            .field("dictionary", &self.dictionary.as_ref().map(|d| d.len()))
            .field("tesseract_bin", &self.tesseract_bin)
            .field("language", &self.language)
            .field("engine_url", &self.engine_url)
            .field("engine_api_key", &self.engine_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RecognitionConfig {
    /// Create a new builder for `RecognitionConfig`.
    pub fn builder() -> RecognitionConfigBuilder {
        RecognitionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RecognitionConfig`].
#[derive(Debug)]
pub struct RecognitionConfigBuilder {
    config: RecognitionConfig,
}

impl RecognitionConfigBuilder {
    pub fn target_confidence(mut self, c: f32) -> Self {
        self.config.target_confidence = c;
        self
    }

    pub fn min_confidence(mut self, c: f32) -> Self {
        self.config.min_confidence = c;
        self
    }

    pub fn min_candidates(mut self, n: usize) -> Self {
        self.config.min_candidates = n.max(1);
        self
    }

    pub fn domain_correction(mut self, v: bool) -> Self {
        self.config.domain_correction = v;
        self
    }

    pub fn confusion_rules(mut self, v: bool) -> Self {
        self.config.confusion_rules = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn catalog(mut self, catalog: StrategyCatalog) -> Self {
        self.config.catalog = Arc::new(catalog);
        self
    }

    pub fn time_budget_ms(mut self, ms: u64) -> Self {
        self.config.time_budget_ms = Some(ms);
        self
    }

    pub fn max_image_pixels(mut self, px: u64) -> Self {
        self.config.max_image_pixels = px;
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn engine(mut self, kind: EngineKind) -> Self {
        self.config.engine = kind;
        self
    }

    pub fn adapter(mut self, adapter: SharedAdapter) -> Self {
        self.config.adapter = Some(adapter);
        self
    }

    pub fn dictionary(mut self, dictionary: Arc<CorrectionDictionary>) -> Self {
        self.config.dictionary = Some(dictionary);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn tesseract_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_bin = path.into();
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn engine_url(mut self, url: impl Into<String>) -> Self {
        self.config.engine_url = Some(url.into());
        self
    }

    pub fn engine_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.engine_api_key = Some(key.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RecognitionConfig, OcrError> {
        let c = &self.config;
        for (name, value) in [
            ("target confidence", c.target_confidence),
            ("minimum confidence", c.min_confidence),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(OcrError::InvalidConfig(format!(
                    "{name} must be 0–100, got {value}"
                )));
            }
        }
        if c.concurrency == 0 {
            return Err(OcrError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_image_pixels == 0 {
            return Err(OcrError::InvalidConfig(
                "Maximum image pixels must be ≥ 1".into(),
            ));
        }
        if c.engine_timeout_secs == 0 {
            return Err(OcrError::InvalidConfig(
                "Engine timeout must be ≥ 1 second".into(),
            ));
        }
        if c.language.trim().is_empty() {
            return Err(OcrError::InvalidConfig("Language must not be empty".into()));
        }
        if c.adapter.is_none() && c.engine == EngineKind::Http && c.engine_url.is_none() {
            return Err(OcrError::InvalidConfig(
                "The http engine needs an endpoint URL (--engine-url)".into(),
            ));
        }
        c.catalog.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Bundled recognition engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Local `tesseract` binary. (default)
    #[default]
    Tesseract,
    /// JSON-over-HTTP recognition service at `engine_url`.
    Http,
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tesseract" => Ok(EngineKind::Tesseract),
            "http" => Ok(EngineKind::Http),
            other => Err(format!("unknown engine '{other}' (expected tesseract or http)")),
        }
    }
}

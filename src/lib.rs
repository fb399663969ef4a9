//! # clinical-ocr
//!
//! Read handwritten and printed clinical notes (drug charts, allergy notes,
//! consent forms) from photos and scans, correcting medical vocabulary on
//! the way out.
//!
//! A single OCR pass over a phone photo of handwriting is rarely good
//! enough. This crate runs the image through many preprocessing variants
//! (binarisation, denoising, local contrast, small rotations, upscaling) and
//! engine layout modes, stops as soon as one reading is confident, and
//! otherwise fuses all readings by confidence-weighted word voting before a
//! dictionary pass fixes drug names and common misreadings.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image bytes
//!  │
//!  ├─ 1. Input      decode, enforce pixel cap
//!  ├─ 2. Strategy   recipe × scale × layout mode, in priority order
//!  ├─ 3. Prepare    scale + recipe transforms (CPU-bound, spawn_blocking)
//!  ├─ 4. Engine     Tesseract CLI / HTTP service / your own adapter
//!  ├─ 5. Fuse       weighted word voting + fuzzy vocabulary match
//!  └─ 6. Correct    confusion rules, exact dictionary, sentence casing
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clinical_ocr::{recognize_file, RecognitionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Uses the `tesseract` binary on PATH by default.
//!     let config = RecognitionConfig::default();
//!     let result = recognize_file("allergy-note.jpg", &config).await?;
//!     println!("{}", result.best_text());
//!     eprintln!("confidence {:.0}, {} passes",
//!         result.confidence,
//!         result.stats.passes_attempted);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `clinocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! clinical-ocr = { version = "0.1", default-features = false }
//! ```
//!
//! ## Engines
//!
//! | Engine | Setup |
//! |--------|-------|
//! | Tesseract (default) | `apt install tesseract-ocr` / `brew install tesseract` |
//! | HTTP | any service accepting `{image, mode}` and answering `{text, confidence}` |
//! | Custom | implement [`RecognitionAdapter`] and pass it to the config builder |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapter;
pub mod buffer;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod recognize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use adapter::{HttpEngine, LayoutMode, RawRecognition, RecognitionAdapter, TesseractCli};
pub use buffer::{ChannelLayout, PixelBuffer};
pub use config::{EngineKind, RecognitionConfig, RecognitionConfigBuilder};
pub use dictionary::{ConfusionRule, CorrectionDictionary};
pub use error::{OcrError, PassError, PreprocessError, RecognitionError};
pub use output::{AdvancedOcrResult, CandidateResult, FusedResult, RecognitionStats};
pub use pipeline::correct::DomainCorrector;
pub use pipeline::preprocess::{MorphOp, Transform};
pub use pipeline::strategy::{Recipe, StrategyCatalog};
pub use progress::{NoopProgressCallback, ProgressCallback, RecognitionProgressCallback};
pub use recognize::{
    recognize, recognize_buffer, recognize_file, recognize_sync, recognize_to_file,
    resolve_adapter,
};

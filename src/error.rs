//! Error types for the clinical-ocr library.
//!
//! Two layers of failure are kept apart:
//!
//! * [`OcrError`]: **Fatal**: the recognition job cannot start or finish
//!   (unreadable input, undecodable image, oversized image, bad config).
//!   Returned as `Err(OcrError)` from the top-level `recognize*` functions.
//!
//! * [`PassError`]: **Non-fatal**: a single strategy pass failed (a
//!   transform could not run, the engine errored or returned nothing). The
//!   orchestrator records it in [`crate::output::RecognitionStats`] and moves
//!   on to the next combination.
//!
//! [`PreprocessError`] and [`RecognitionError`] are the component-level
//! errors that the orchestrator folds into [`PassError`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the clinical-ocr library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are not an image format we can decode.
    #[error("Unsupported or corrupt image: {detail}")]
    UnsupportedImage { detail: String },

    /// The decoded image exceeds the configured pixel cap.
    #[error("Image is {width}x{height} ({pixels} px), above the limit of {limit} px\nDownscale it or raise --max-pixels.")]
    ImageTooLarge {
        width: u32,
        height: u32,
        pixels: u64,
        limit: u64,
    },

    // ── Engine / dictionary errors ────────────────────────────────────────
    /// No recognition engine could be constructed from the configuration.
    #[error("Recognition engine '{engine}' is not available.\n{hint}")]
    EngineNotConfigured { engine: String, hint: String },

    /// The correction dictionary could not be read or parsed.
    #[error("Failed to load correction dictionary '{source_name}': {detail}")]
    DictionaryLoad { source_name: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A transform could not run on the given buffer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PreprocessError {
    /// The buffer has zero width or height.
    #[error("buffer is empty ({width}x{height})")]
    EmptyBuffer { width: u32, height: u32 },

    /// A transform parameter is out of its valid domain.
    #[error("invalid parameter for {transform}: {detail}")]
    InvalidParameter {
        transform: &'static str,
        detail: String,
    },

    /// Sample data does not match the declared geometry.
    #[error("buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// The recognition engine could not produce a reading.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// Engine process or service could not be reached / launched.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// Engine ran but reported a failure.
    #[error("engine failed: {0}")]
    Failed(String),

    /// Engine did not answer within the configured timeout.
    #[error("engine timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Engine output could not be interpreted.
    #[error("unreadable engine output: {0}")]
    Malformed(String),
}

/// A non-fatal error for a single strategy pass.
///
/// Stored in [`crate::output::RecognitionStats::pass_errors`]; the job
/// continues unless every pass fails, in which case a zero-confidence
/// result is returned instead of an error.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PassError {
    /// A preprocessing recipe could not run; all modes for it were skipped.
    #[error("{recipe}@{scale}x: preprocessing failed: {detail}")]
    PreprocessingFailed {
        recipe: String,
        scale: f32,
        detail: String,
    },

    /// The engine call failed.
    #[error("{label}: recognition failed: {detail}")]
    RecognitionFailed { label: String, detail: String },

    /// The engine answered with no text.
    #[error("{label}: engine returned no text")]
    EmptyText { label: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_too_large_display() {
        let e = OcrError::ImageTooLarge {
            width: 10_000,
            height: 8_000,
            pixels: 80_000_000,
            limit: 40_000_000,
        };
        let msg = e.to_string();
        assert!(msg.contains("10000x8000"), "got: {msg}");
        assert!(msg.contains("40000000"), "got: {msg}");
    }

    #[test]
    fn engine_not_configured_display() {
        let e = OcrError::EngineNotConfigured {
            engine: "tesseract".into(),
            hint: "install tesseract-ocr".into(),
        };
        assert!(e.to_string().contains("tesseract"));
        assert!(e.to_string().contains("install"));
    }

    #[test]
    fn pass_error_display_names_the_strategy() {
        let e = PassError::PreprocessingFailed {
            recipe: "clahe_sharpen".into(),
            scale: 2.0,
            detail: "buffer is empty (0x0)".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("clahe_sharpen@2x"), "got: {msg}");
    }

    #[test]
    fn recognition_timeout_display() {
        let e = RecognitionError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}

//! Recognition engines.
//!
//! The pipeline treats the text recogniser as a black box behind
//! [`RecognitionAdapter`]: it hands over a preprocessed [`PixelBuffer`] and a
//! [`LayoutMode`] and gets back text plus a 0–100 confidence. Two adapters
//! ship with the crate:
//!
//! | Adapter | Backend |
//! |---------|---------|
//! | [`TesseractCli`] | local `tesseract` binary, TSV output |
//! | [`HttpEngine`] | JSON-over-HTTP recognition service |
//!
//! Callers can plug in anything else (a cloud OCR API, a test double) by
//! implementing the trait and passing it to
//! [`crate::config::RecognitionConfigBuilder::adapter`].

pub mod http;
pub mod tesseract;

use crate::buffer::PixelBuffer;
use crate::error::RecognitionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use http::HttpEngine;
pub use tesseract::TesseractCli;

/// Page-layout / segmentation hint passed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// One uniform block of text.
    SingleBlock,
    /// Fully automatic page segmentation.
    Auto,
    /// A single column of text of variable sizes.
    SingleColumn,
    /// Find as much text as possible in no particular order.
    SparseText,
    /// The image is a single text line.
    SingleLine,
    /// Single line, bypassing engine-specific layout heuristics.
    RawLine,
}

impl LayoutMode {
    /// The five modes tried by the default catalog, in priority order.
    pub const DEFAULT_ORDER: [LayoutMode; 5] = [
        LayoutMode::SingleBlock,
        LayoutMode::Auto,
        LayoutMode::SingleColumn,
        LayoutMode::SparseText,
        LayoutMode::SingleLine,
    ];

    /// Tesseract `--psm` value for this mode.
    pub fn tesseract_psm(self) -> u8 {
        match self {
            LayoutMode::Auto => 3,
            LayoutMode::SingleColumn => 4,
            LayoutMode::SingleBlock => 6,
            LayoutMode::SingleLine => 7,
            LayoutMode::SparseText => 11,
            LayoutMode::RawLine => 13,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutMode::SingleBlock => "single_block",
            LayoutMode::Auto => "auto",
            LayoutMode::SingleColumn => "single_column",
            LayoutMode::SparseText => "sparse_text",
            LayoutMode::SingleLine => "single_line",
            LayoutMode::RawLine => "raw_line",
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an engine returns for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecognition {
    pub text: String,
    /// Engine-reported confidence, nominally 0–100.
    pub confidence: f32,
}

/// A text recogniser the orchestrator can call.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` several
/// calls are in flight at once on the same adapter.
#[async_trait]
pub trait RecognitionAdapter: Send + Sync {
    /// Short engine name for logs and errors.
    fn name(&self) -> &str;

    async fn recognize(
        &self,
        image: &PixelBuffer,
        mode: LayoutMode,
    ) -> Result<RawRecognition, RecognitionError>;
}

/// Shared handle stored in [`crate::config::RecognitionConfig`].
pub type SharedAdapter = Arc<dyn RecognitionAdapter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psm_mapping_matches_tesseract() {
        assert_eq!(LayoutMode::SingleBlock.tesseract_psm(), 6);
        assert_eq!(LayoutMode::Auto.tesseract_psm(), 3);
        assert_eq!(LayoutMode::SingleColumn.tesseract_psm(), 4);
        assert_eq!(LayoutMode::SparseText.tesseract_psm(), 11);
        assert_eq!(LayoutMode::SingleLine.tesseract_psm(), 7);
        assert_eq!(LayoutMode::RawLine.tesseract_psm(), 13);
    }

    #[test]
    fn mode_serialises_as_snake_case() {
        let json = serde_json::to_string(&LayoutMode::SparseText).unwrap();
        assert_eq!(json, r#""sparse_text""#);
        assert_eq!(LayoutMode::SparseText.to_string(), "sparse_text");
    }

    #[test]
    fn default_order_has_distinct_modes() {
        let mut modes = LayoutMode::DEFAULT_ORDER.to_vec();
        modes.dedup();
        assert_eq!(modes.len(), 5);
    }
}

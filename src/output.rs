//! Result types produced by the recognition pipeline.

use crate::adapter::LayoutMode;
use crate::error::PassError;
use serde::{Deserialize, Serialize};

/// One engine reading of one preprocessed variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub text: String,
    /// Clamped to 0–100.
    pub confidence: f32,
    /// Recipe name from the strategy catalog.
    pub recipe: String,
    pub scale: f32,
    pub mode: LayoutMode,
    /// Confidence fell below `min_confidence`. Still eligible for fusion.
    pub low_quality: bool,
}

impl CandidateResult {
    /// `recipe@scale` label, as recorded in `preprocessing_used`.
    pub fn strategy_label(&self) -> String {
        format!("{}@{}x", self.recipe, self.scale)
    }

    /// `recipe@scale/mode` label for logs.
    pub fn pass_label(&self) -> String {
        format!("{}/{}", self.strategy_label(), self.mode)
    }
}

/// Output of fusing a non-empty candidate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub text: String,
    /// Always within 0–100.
    pub confidence: f32,
    /// Best candidate's strategy, or a `fused(...)` summary when voting ran.
    pub preprocessing_used: String,
    pub warnings: Vec<String>,
    /// Number of candidates that went into the result.
    pub source_count: usize,
}

/// Bookkeeping for one `recognize` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionStats {
    pub image_width: u32,
    pub image_height: u32,
    /// Passes the catalog would run without early exit.
    pub passes_planned: usize,
    /// Recognition calls actually made.
    pub passes_attempted: usize,
    /// Recognition calls that produced no candidate.
    pub passes_failed: usize,
    /// `(recipe, scale)` groups skipped because preprocessing failed.
    pub preprocessing_failures: usize,
    pub candidates: usize,
    pub low_quality_candidates: usize,
    /// Stopped because a candidate reached the target confidence.
    pub early_exit: bool,
    /// Stopped because the wall-clock budget ran out.
    pub budget_exhausted: bool,
    pub total_duration_ms: u64,
    /// Summed time spent in preprocessing.
    pub preprocess_duration_ms: u64,
    /// Summed time spent waiting on the engine.
    pub recognition_duration_ms: u64,
    pub pass_errors: Vec<PassError>,
}

/// Final answer returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedOcrResult {
    /// Fused (or best single) text before the text correction pass.
    pub text: String,
    pub confidence: f32,
    /// Text after domain correction; `None` when correction is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_text: Option<String>,
    /// Strategy that produced the text; `None` when nothing was recognised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocessing_used: Option<String>,
    pub warnings: Vec<String>,
    pub stats: RecognitionStats,
}

impl AdvancedOcrResult {
    /// The text callers should show: corrected when available.
    pub fn best_text(&self) -> &str {
        self.corrected_text.as_deref().unwrap_or(&self.text)
    }

    /// Zero-confidence answer for runs that yielded no candidate.
    pub fn empty(warning: impl Into<String>, stats: RecognitionStats) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            corrected_text: None,
            preprocessing_used: None,
            warnings: vec![warning.into()],
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        let c = CandidateResult {
            text: "x".into(),
            confidence: 50.0,
            recipe: "clahe_sharpen".into(),
            scale: 1.5,
            mode: LayoutMode::SparseText,
            low_quality: true,
        };
        assert_eq!(c.strategy_label(), "clahe_sharpen@1.5x");
        assert_eq!(c.pass_label(), "clahe_sharpen@1.5x/sparse_text");
    }

    #[test]
    fn best_text_prefers_corrected() {
        let mut r = AdvancedOcrResult::empty("nothing", RecognitionStats::default());
        assert_eq!(r.best_text(), "");
        r.text = "morfine".into();
        r.corrected_text = Some("Morphine".into());
        assert_eq!(r.best_text(), "Morphine");
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let r = AdvancedOcrResult::empty("no text", RecognitionStats::default());
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("corrected_text").is_none());
        assert!(json.get("preprocessing_used").is_none());
        assert_eq!(json["confidence"], 0.0);
        assert_eq!(json["warnings"][0], "no text");
    }
}

//! Integration tests for the full recognition pipeline.
//!
//! A scripted engine stands in for Tesseract so these run everywhere; see
//! `e2e.rs` for the tests against a real engine.

use async_trait::async_trait;
use clinical_ocr::pipeline::encode::encode_png;
use clinical_ocr::{
    recognize, recognize_buffer, recognize_sync, recognize_to_file, CorrectionDictionary,
    LayoutMode, PixelBuffer, RawRecognition, Recipe, RecognitionAdapter, RecognitionConfig,
    RecognitionError, RecognitionProgressCallback, StrategyCatalog,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

type Script = dyn Fn(usize) -> Result<RawRecognition, RecognitionError> + Send + Sync;

/// Engine that answers call `n` with `script(n)`.
struct ScriptedEngine {
    calls: AtomicUsize,
    modes: Mutex<Vec<LayoutMode>>,
    script: Box<Script>,
}

impl ScriptedEngine {
    fn new(
        script: impl Fn(usize) -> Result<RawRecognition, RecognitionError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    fn constant(text: &'static str, confidence: f32) -> Arc<Self> {
        Self::new(move |_| Ok(reading(text, confidence)))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionAdapter for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize(
        &self,
        _image: &PixelBuffer,
        mode: LayoutMode,
    ) -> Result<RawRecognition, RecognitionError> {
        self.modes.lock().unwrap().push(mode);
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(n)
    }
}

fn reading(text: &str, confidence: f32) -> RawRecognition {
    RawRecognition {
        text: text.to_string(),
        confidence,
    }
}

/// A grey page with a few dark strokes.
fn page() -> PixelBuffer {
    PixelBuffer::from_fn_gray(40, 24, |x, y| {
        if (x % 7 == 0 && y > 4 && y < 20) || y == 12 {
            25
        } else {
            225
        }
    })
}

/// One recipe at one scale: exactly one pass per layout mode.
fn single_group_catalog() -> StrategyCatalog {
    StrategyCatalog {
        recipes: vec![Recipe::new("original", vec![])],
        scales: vec![1.0],
        modes: LayoutMode::DEFAULT_ORDER.to_vec(),
    }
}

fn config_with(engine: Arc<ScriptedEngine>) -> clinical_ocr::RecognitionConfigBuilder {
    RecognitionConfig::builder().adapter(engine)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn confident_first_reading_ends_the_run() {
    let engine = ScriptedEngine::constant("Paracetamol 1g", 99.5);
    let config = config_with(engine.clone()).build().unwrap();
    let png = encode_png(&page()).unwrap();

    let result = recognize(&png, &config).await.unwrap();

    assert_eq!(engine.calls(), 1);
    assert_eq!(result.text, "Paracetamol 1g");
    assert_eq!(result.best_text(), "Paracetamol 1g");
    assert_eq!(result.confidence, 99.5);
    assert!(result.stats.early_exit);
    assert_eq!(result.stats.passes_planned, 200);
    assert_eq!(result.stats.passes_attempted, 1);
    assert_eq!((result.stats.image_width, result.stats.image_height), (40, 24));
    assert_eq!(result.preprocessing_used.as_deref(), Some("original@1x"));
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn disagreeing_readings_are_fused_and_flagged() {
    let engine = ScriptedEngine::new(|n| match n {
        0 => Ok(reading("BP 120/80", 70.0)),
        1 => Ok(reading("BP 12O/8O", 40.0)),
        2 => Ok(reading("BP 120/80", 85.0)),
        _ => Err(RecognitionError::Failed("no text".into())),
    });
    let config = config_with(engine.clone())
        .catalog(single_group_catalog())
        .confusion_rules(false)
        .build()
        .unwrap();

    let result = recognize_buffer(page(), &config).await.unwrap();

    assert_eq!(engine.calls(), 5);
    assert_eq!(result.text, "BP 120/80");
    assert_eq!(result.corrected_text.as_deref(), Some("Bp 120/80"));
    assert_eq!(result.confidence, 75.0);
    assert_eq!(result.stats.candidates, 3);
    assert_eq!(result.stats.low_quality_candidates, 1);
    assert_eq!(result.stats.passes_failed, 2);
    assert_eq!(result.stats.pass_errors.len(), 2);
    assert!(!result.stats.early_exit);
    assert!(result
        .preprocessing_used
        .as_deref()
        .unwrap()
        .starts_with("fused(3 readings"));
    assert!(result.warnings.iter().any(|w| w.contains("verify")));
}

#[tokio::test]
async fn layout_modes_are_tried_in_priority_order() {
    let engine = ScriptedEngine::new(|_| Err(RecognitionError::Failed("blank".into())));
    let config = config_with(engine.clone())
        .catalog(single_group_catalog())
        .build()
        .unwrap();

    recognize_buffer(page(), &config).await.unwrap();

    let modes = engine.modes.lock().unwrap().clone();
    assert_eq!(modes, LayoutMode::DEFAULT_ORDER.to_vec());
}

#[tokio::test]
async fn all_failures_yield_an_empty_result_not_an_error() {
    let engine = ScriptedEngine::new(|_| Err(RecognitionError::Failed("blank".into())));
    let config = config_with(engine)
        .catalog(single_group_catalog())
        .build()
        .unwrap();

    let result = recognize_buffer(page(), &config).await.unwrap();

    assert_eq!(result.text, "");
    assert_eq!(result.best_text(), "");
    assert_eq!(result.confidence, 0.0);
    assert!(result.corrected_text.is_none());
    assert!(result.preprocessing_used.is_none());
    assert_eq!(result.stats.passes_attempted, 5);
    assert_eq!(result.stats.passes_failed, 5);
    assert!(result.warnings[0].contains("all 5 attempted passes failed"));
}

#[tokio::test]
async fn whitespace_only_readings_do_not_count() {
    let engine = ScriptedEngine::new(|n| match n {
        0 => Ok(reading("   \n ", 97.0)),
        _ => Ok(reading("Amoxicillin 500 mg", 99.0)),
    });
    let config = config_with(engine.clone())
        .catalog(single_group_catalog())
        .build()
        .unwrap();

    let result = recognize_buffer(page(), &config).await.unwrap();

    assert_eq!(engine.calls(), 2);
    assert_eq!(result.text, "Amoxicillin 500 mg");
    assert_eq!(result.stats.passes_failed, 1);
}

#[tokio::test]
async fn drug_names_are_corrected() {
    let engine = ScriptedEngine::constant("give morfine at night", 95.0);
    let config = config_with(engine).build().unwrap();

    let result = recognize_buffer(page(), &config).await.unwrap();

    assert_eq!(result.text, "give morfine at night");
    assert_eq!(result.best_text(), "Give morphine at night");
}

#[tokio::test]
async fn correction_can_be_disabled() {
    let engine = ScriptedEngine::constant("give morfine 10 mg", 95.0);
    let config = config_with(engine)
        .domain_correction(false)
        .build()
        .unwrap();

    let result = recognize_buffer(page(), &config).await.unwrap();

    assert!(result.corrected_text.is_none());
    assert_eq!(result.best_text(), "give morfine 10 mg");
}

#[tokio::test]
async fn custom_dictionary_replaces_builtin() {
    let dictionary = CorrectionDictionary::from_json_str(
        r#"{ "corrections": { "heprin": "heparin" } }"#,
    )
    .unwrap();
    let engine = ScriptedEngine::constant("start heprin. morfine prn", 96.0);
    let config = config_with(engine)
        .dictionary(Arc::new(dictionary))
        .build()
        .unwrap();

    let result = recognize_buffer(page(), &config).await.unwrap();

    assert_eq!(result.best_text(), "Start heparin. Morfine prn");
}

#[tokio::test]
async fn progress_reports_every_attempted_pass() {
    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        completed: AtomicUsize,
        errored: AtomicUsize,
        finished: AtomicUsize,
    }
    impl RecognitionProgressCallback for Counter {
        fn on_pass_start(&self, _pass: usize, _planned: usize, _label: &str) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_pass_complete(&self, _pass: usize, _planned: usize, _label: &str, _c: f32) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_pass_error(&self, _pass: usize, _planned: usize, _error: &str) {
            self.errored.fetch_add(1, Ordering::SeqCst);
        }
        fn on_run_complete(&self, _attempted: usize, _confidence: f32) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    let counter = Arc::new(Counter::default());
    let engine = ScriptedEngine::new(|n| {
        if n % 2 == 0 {
            Ok(reading("dose given", 50.0))
        } else {
            Err(RecognitionError::Timeout { secs: 1 })
        }
    });
    let config = config_with(engine)
        .catalog(single_group_catalog())
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    recognize_buffer(page(), &config).await.unwrap();

    assert_eq!(counter.started.load(Ordering::SeqCst), 5);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 3);
    assert_eq!(counter.errored.load(Ordering::SeqCst), 2);
    assert_eq!(counter.finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn recognize_to_file_writes_best_text() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("chart.png");
    std::fs::write(&input, encode_png(&page()).unwrap()).unwrap();
    let output = dir.path().join("out/chart.txt");

    let engine = ScriptedEngine::constant("paracetemol 1g", 99.0);
    let config = config_with(engine).build().unwrap();

    let result = recognize_to_file(input.to_str().unwrap(), &output, &config)
        .await
        .unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, "Paracetamol 1g\n");
    assert_eq!(result.best_text(), "Paracetamol 1g");
    assert!(!dir.path().join("out/chart.txt.tmp").exists());
}

#[tokio::test]
async fn oversized_image_is_rejected_before_recognition() {
    let engine = ScriptedEngine::constant("never", 99.0);
    let config = config_with(engine.clone())
        .max_image_pixels(100)
        .build()
        .unwrap();
    let png = encode_png(&page()).unwrap();

    let err = recognize(&png, &config).await.unwrap_err();

    assert!(matches!(err, clinical_ocr::OcrError::ImageTooLarge { .. }));
    assert_eq!(engine.calls(), 0);
}

#[test]
fn sync_wrapper_runs_without_a_runtime() {
    let engine = ScriptedEngine::constant("Insulin 4 units", 99.0);
    let config = config_with(engine).domain_correction(false).build().unwrap();
    let png = encode_png(&page()).unwrap();

    let result = recognize_sync(&png, &config).unwrap();
    assert_eq!(result.text, "Insulin 4 units");
}

#[test]
fn concurrent_run_keeps_priority_order() {
    let engine = ScriptedEngine::new(|n| Ok(reading("warfarin 5 mg", 40.0 + n as f32 % 10.0)));
    let config = config_with(engine)
        .catalog(StrategyCatalog {
            recipes: vec![
                Recipe::new("original", vec![]),
                Recipe::new("gray", vec![clinical_ocr::Transform::Grayscale]),
            ],
            scales: vec![1.0, 2.0],
            modes: vec![LayoutMode::SingleBlock, LayoutMode::Auto],
        })
        .concurrency(4)
        .domain_correction(false)
        .build()
        .unwrap();

    let result = tokio_test::block_on(recognize_buffer(page(), &config)).unwrap();

    assert_eq!(result.stats.passes_attempted, 8);
    assert_eq!(result.stats.candidates, 8);
    assert_eq!(result.text, "warfarin 5 mg");
}

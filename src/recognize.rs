//! Top-level recognition entry points.
//!
//! [`recognize`] is the primary API: image bytes in, [`AdvancedOcrResult`]
//! out. [`recognize_file`] resolves a local path or URL first,
//! [`recognize_to_file`] also writes the corrected text atomically, and
//! [`recognize_sync`] wraps everything for callers without a runtime.

use crate::adapter::{HttpEngine, SharedAdapter, TesseractCli};
use crate::buffer::PixelBuffer;
use crate::config::{EngineKind, RecognitionConfig};
use crate::dictionary::CorrectionDictionary;
use crate::error::OcrError;
use crate::output::AdvancedOcrResult;
use crate::pipeline::correct::DomainCorrector;
use crate::pipeline::orchestrate::PassOrchestrator;
use crate::pipeline::{fusion, input};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Recognise the text in an encoded image (PNG, JPEG, TIFF, BMP, WebP).
///
/// # Returns
/// `Ok(AdvancedOcrResult)` whenever the image could be decoded, even if no
/// pass produced text; that case yields an empty, zero-confidence result
/// with a warning.
///
/// # Errors
/// Returns `Err(OcrError)` only for fatal errors:
/// - Undecodable image or one above `max_image_pixels`
/// - No usable recognition engine
/// - Dictionary that fails to load
///
/// # Example
/// ```rust,no_run
/// use clinical_ocr::{recognize, RecognitionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("drug-chart.jpg")?;
/// let result = recognize(&bytes, &RecognitionConfig::default()).await?;
/// println!("{} ({:.0}%)", result.best_text(), result.confidence);
/// # Ok(())
/// # }
/// ```
pub async fn recognize(
    bytes: &[u8],
    config: &RecognitionConfig,
) -> Result<AdvancedOcrResult, OcrError> {
    // ── Step 1: Decode (CPU-bound) ───────────────────────────────────────
    let owned = bytes.to_vec();
    let max_pixels = config.max_image_pixels;
    let buffer = tokio::task::spawn_blocking(move || input::decode(&owned, max_pixels))
        .await
        .map_err(|e| OcrError::Internal(format!("decode task failed: {e}")))??;

    recognize_buffer(buffer, config).await
}

/// Recognise an already-decoded buffer.
pub async fn recognize_buffer(
    buffer: PixelBuffer,
    config: &RecognitionConfig,
) -> Result<AdvancedOcrResult, OcrError> {
    let start = Instant::now();
    if buffer.is_empty() {
        return Err(OcrError::UnsupportedImage {
            detail: format!("image has no pixels ({}x{})", buffer.width(), buffer.height()),
        });
    }
    let pixels = buffer.width() as u64 * buffer.height() as u64;
    if pixels > config.max_image_pixels {
        return Err(OcrError::ImageTooLarge {
            width: buffer.width(),
            height: buffer.height(),
            pixels,
            limit: config.max_image_pixels,
        });
    }

    // ── Step 2: Engine and vocabulary ────────────────────────────────────
    let adapter = resolve_adapter(config).await?;
    let corrector = if config.domain_correction {
        let dictionary = resolve_dictionary(config)?;
        Some(DomainCorrector::new(dictionary).with_confusion_rules(config.confusion_rules))
    } else {
        None
    };
    info!("Starting recognition with engine '{}'", adapter.name());

    // ── Step 3: Run passes ───────────────────────────────────────────────
    let outcome = PassOrchestrator::new(adapter, config).run(buffer).await;
    let mut stats = outcome.stats;
    let mut warnings = outcome.warnings;

    // ── Step 4: Fuse ─────────────────────────────────────────────────────
    let Some(fused) = fusion::fuse(&outcome.candidates, corrector.as_ref()) else {
        let reason = if stats.passes_attempted == 0 {
            "No text recognised: no pass ran".to_string()
        } else {
            format!(
                "No text recognised: all {} attempted passes failed",
                stats.passes_attempted
            )
        };
        warn!("{}", reason);
        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        let mut result = AdvancedOcrResult::empty(reason, stats);
        result.warnings.append(&mut warnings);
        if let Some(ref cb) = config.progress_callback {
            cb.on_run_complete(result.stats.passes_attempted, 0.0);
        }
        return Ok(result);
    };
    warnings.extend(fused.warnings);

    // ── Step 5: Domain correction ────────────────────────────────────────
    let corrected_text = corrector.as_ref().map(|c| c.correct_text(&fused.text));
    if let Some(ref corrected) = corrected_text {
        if *corrected != fused.text {
            debug!("Domain correction changed the text");
        }
    }

    stats.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Recognition complete: confidence {:.1} from {} candidates via {}, {}ms",
        fused.confidence, stats.candidates, fused.preprocessing_used, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(stats.passes_attempted, fused.confidence);
    }

    Ok(AdvancedOcrResult {
        text: fused.text,
        confidence: fused.confidence,
        corrected_text,
        preprocessing_used: Some(fused.preprocessing_used),
        warnings,
        stats,
    })
}

/// Recognise an image given as a local path or HTTP(S) URL.
pub async fn recognize_file(
    input_str: impl AsRef<str>,
    config: &RecognitionConfig,
) -> Result<AdvancedOcrResult, OcrError> {
    let input_str = input_str.as_ref();
    info!("Loading input: {}", input_str);
    let bytes = input::load_bytes(input_str, config.download_timeout_secs).await?;
    recognize(&bytes, config).await
}

/// Recognise an image and write the best text directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn recognize_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &RecognitionConfig,
) -> Result<AdvancedOcrResult, OcrError> {
    let result = recognize_file(input_str, config).await?;
    let path = output_path.as_ref();
    let write_err = |e: std::io::Error| OcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("txt.tmp");
    let mut text = result.best_text().to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    tokio::fs::write(&tmp_path, text).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(result)
}

/// Synchronous wrapper around [`recognize`].
///
/// Creates a temporary tokio runtime internally.
pub fn recognize_sync(
    bytes: &[u8],
    config: &RecognitionConfig,
) -> Result<AdvancedOcrResult, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(recognize(bytes, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the recognition engine, from most-specific to least-specific.
///
/// 1. **Injected adapter** (`config.adapter`) is used as is.
/// 2. **HTTP engine** (`config.engine = Http`) posts to `config.engine_url`.
/// 3. **Tesseract** (default) is probed with `--version` first so a missing
///    install fails once with an install hint instead of once per pass.
pub async fn resolve_adapter(config: &RecognitionConfig) -> Result<SharedAdapter, OcrError> {
    if let Some(ref adapter) = config.adapter {
        return Ok(Arc::clone(adapter));
    }

    match config.engine {
        EngineKind::Http => {
            let url = config
                .engine_url
                .as_deref()
                .ok_or_else(|| OcrError::EngineNotConfigured {
                    engine: "http".into(),
                    hint: "Set --engine-url / CLINOCR_ENGINE_URL to the recognition service.".into(),
                })?;
            let mut engine = HttpEngine::new(url, config.language.clone(), config.engine_timeout_secs)
                .map_err(|e| OcrError::EngineNotConfigured {
                    engine: "http".into(),
                    hint: e.to_string(),
                })?;
            if let Some(ref key) = config.engine_api_key {
                engine = engine.with_api_key(key.clone());
            }
            Ok(Arc::new(engine))
        }
        EngineKind::Tesseract => {
            let engine = TesseractCli::new(
                config.tesseract_bin.clone(),
                config.language.clone(),
                config.engine_timeout_secs,
            );
            let version = engine.probe().await.map_err(|e| OcrError::EngineNotConfigured {
                engine: "tesseract".into(),
                hint: format!(
                    "{e}\nInstall tesseract-ocr (apt install tesseract-ocr / brew install tesseract) \
                     or point --tesseract-bin at the executable."
                ),
            })?;
            debug!("Using {}", version);
            Ok(Arc::new(engine))
        }
    }
}

fn resolve_dictionary(config: &RecognitionConfig) -> Result<Arc<CorrectionDictionary>, OcrError> {
    match config.dictionary {
        Some(ref dict) => Ok(Arc::clone(dict)),
        None => CorrectionDictionary::builtin(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_tesseract_is_reported_once() {
        let config = RecognitionConfig::builder()
            .tesseract_bin("/nonexistent/tesseract")
            .build()
            .unwrap();
        let err = resolve_adapter(&config).await.err().unwrap();
        match err {
            OcrError::EngineNotConfigured { engine, hint } => {
                assert_eq!(engine, "tesseract");
                assert!(hint.contains("tesseract-ocr"), "{hint}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn http_engine_is_built_from_config() {
        let config = RecognitionConfig::builder()
            .engine(EngineKind::Http)
            .engine_url("http://127.0.0.1:9/ocr")
            .build()
            .unwrap();
        let adapter = resolve_adapter(&config).await.unwrap();
        assert_eq!(adapter.name(), "http");
    }

    #[tokio::test]
    async fn undecodable_bytes_are_fatal() {
        let err = recognize(b"not an image", &RecognitionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedImage { .. }));
    }
}

//! Pass orchestration: run the strategy catalog against the engine.
//!
//! For every `(recipe, scale)` group the source image is scaled and pushed
//! through the recipe once on the blocking pool, then each layout mode is
//! one recognition call on that buffer. The run stops early as soon as some
//! candidate has reached the target confidence and at least
//! `min_candidates` candidates exist.
//!
//! ## Sequential vs concurrent
//!
//! With `concurrency = 1` groups run strictly one after another, which keeps
//! the early-exit promise exact: a first pass at target confidence means
//! exactly one engine call. With `concurrency > 1` up to that many groups
//! are in flight via `buffer_unordered`; early exit raises a shared stop
//! flag that every group checks before each call. The stream is still
//! polled to the end so readings from calls already in progress are kept,
//! while queued groups return without doing any work.
//!
//! Failures never abort the run. A recipe that cannot run skips its group,
//! an engine error or empty reading skips that pass, and a scale whose
//! output would exceed `max_image_pixels` is rejected before any resampling.

use super::preprocess;
use super::preprocess::geometry;
use super::strategy::{PassGroup, StrategyCatalog};
use crate::adapter::{LayoutMode, RawRecognition, SharedAdapter};
use crate::buffer::PixelBuffer;
use crate::config::RecognitionConfig;
use crate::error::{PassError, RecognitionError};
use crate::output::{CandidateResult, RecognitionStats};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything the orchestrator collected, ready for fusion.
#[derive(Debug, Clone)]
pub struct OrchestratorOutcome {
    /// Candidates in catalog priority order.
    pub candidates: Vec<CandidateResult>,
    pub stats: RecognitionStats,
    pub warnings: Vec<String>,
}

/// Drives the catalog for one image.
pub struct PassOrchestrator {
    adapter: SharedAdapter,
    catalog: Arc<StrategyCatalog>,
    target_confidence: f32,
    min_confidence: f32,
    min_candidates: usize,
    concurrency: usize,
    time_budget: Option<Duration>,
    engine_timeout: Duration,
    max_pixels: u64,
    progress: Option<ProgressCallback>,
}

/// State shared by every group of one run.
struct RunState {
    stop: AtomicBool,
    target_hit: AtomicBool,
    collected: AtomicUsize,
    deadline: Option<Instant>,
    planned: usize,
}

impl RunState {
    fn budget_spent(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct GroupOutcome {
    /// `(pass number, candidate)`; pass numbers restore priority order.
    candidates: Vec<(usize, CandidateResult)>,
    pass_errors: Vec<PassError>,
    attempted: usize,
    failed: usize,
    preprocessing_failed: bool,
    budget_exhausted: bool,
    preprocess_ms: u64,
    recognition_ms: u64,
}

impl PassOrchestrator {
    pub fn new(adapter: SharedAdapter, config: &RecognitionConfig) -> Self {
        Self {
            adapter,
            catalog: Arc::clone(&config.catalog),
            target_confidence: config.target_confidence,
            min_confidence: config.min_confidence,
            min_candidates: config.min_candidates.max(1),
            concurrency: config.concurrency.max(1),
            time_budget: config.time_budget_ms.map(Duration::from_millis),
            engine_timeout: Duration::from_secs(config.engine_timeout_secs),
            max_pixels: config.max_image_pixels,
            progress: config.progress_callback.clone(),
        }
    }

    /// Run the catalog against `source`.
    pub async fn run(&self, source: PixelBuffer) -> OrchestratorOutcome {
        let started = Instant::now();
        let state = RunState {
            stop: AtomicBool::new(false),
            target_hit: AtomicBool::new(false),
            collected: AtomicUsize::new(0),
            deadline: self.time_budget.map(|b| started + b),
            planned: self.catalog.pass_count(),
        };

        info!(
            "Recognising {}x{} image: up to {} passes ({} recipes × {} scales × {} modes), concurrency {}",
            source.width(),
            source.height(),
            state.planned,
            self.catalog.recipes.len(),
            self.catalog.scales.len(),
            self.catalog.modes.len(),
            self.concurrency
        );
        if let Some(ref cb) = self.progress {
            cb.on_run_start(state.planned);
        }

        let (width, height) = (source.width(), source.height());
        let source = Arc::new(source);
        let groups = if self.concurrency > 1 {
            self.process_concurrent(&source, &state).await
        } else {
            self.process_sequential(&source, &state).await
        };

        let mut outcome = self.merge(groups, &state);
        outcome.stats.image_width = width;
        outcome.stats.image_height = height;
        outcome.stats.total_duration_ms = started.elapsed().as_millis() as u64;

        info!(
            "Passes done: {} attempted, {} failed, {} candidates{}{} in {}ms",
            outcome.stats.passes_attempted,
            outcome.stats.passes_failed,
            outcome.stats.candidates,
            if outcome.stats.early_exit { ", early exit" } else { "" },
            if outcome.stats.budget_exhausted { ", budget exhausted" } else { "" },
            outcome.stats.total_duration_ms
        );
        outcome
    }

    // ── Drivers ──────────────────────────────────────────────────────────

    async fn process_sequential(
        &self,
        source: &Arc<PixelBuffer>,
        state: &RunState,
    ) -> Vec<GroupOutcome> {
        let mut done = Vec::new();
        for group in self.catalog.groups() {
            if state.stopped() {
                break;
            }
            let outcome = self.run_group(group, Arc::clone(source), state).await;
            let spent = outcome.budget_exhausted;
            done.push(outcome);
            if spent {
                break;
            }
        }
        done
    }

    async fn process_concurrent(
        &self,
        source: &Arc<PixelBuffer>,
        state: &RunState,
    ) -> Vec<GroupOutcome> {
        let mut done = Vec::new();
        let mut in_flight = stream::iter(
            self.catalog
                .groups()
                .map(|group| self.run_group(group, Arc::clone(source), state)),
        )
        .buffer_unordered(self.concurrency);

        // Drain fully: after a stop, queued groups return at once and
        // in-flight groups end after their current call.
        while let Some(outcome) = in_flight.next().await {
            done.push(outcome);
        }
        done
    }

    // ── One (recipe, scale) group ────────────────────────────────────────

    async fn run_group(
        &self,
        group: PassGroup<'_>,
        source: Arc<PixelBuffer>,
        state: &RunState,
    ) -> GroupOutcome {
        let mut out = GroupOutcome::default();
        let modes = &self.catalog.modes;
        let first_pass = group.index * modes.len() + 1;

        if state.stopped() {
            return out;
        }
        if state.budget_spent() {
            out.budget_exhausted = true;
            return out;
        }

        let t = Instant::now();
        let prepared = prepare(
            source,
            group.recipe.steps.clone(),
            group.scale,
            self.max_pixels,
        )
        .await;
        out.preprocess_ms += t.elapsed().as_millis() as u64;

        let buf = match prepared {
            Ok(buf) => buf,
            Err(detail) => {
                let err = PassError::PreprocessingFailed {
                    recipe: group.recipe.name.clone(),
                    scale: group.scale,
                    detail,
                };
                warn!("{}", err);
                if let Some(ref cb) = self.progress {
                    for pass in first_pass..first_pass + modes.len() {
                        cb.on_pass_error(pass, state.planned, &err.to_string());
                    }
                }
                out.preprocessing_failed = true;
                out.pass_errors.push(err);
                return out;
            }
        };
        debug!(
            "{} prepared: {}x{}",
            group.label(),
            buf.width(),
            buf.height()
        );

        for (m, &mode) in modes.iter().enumerate() {
            if state.stopped() {
                break;
            }
            if state.budget_spent() {
                out.budget_exhausted = true;
                break;
            }

            let pass = first_pass + m;
            let label = format!("{}/{}", group.label(), mode);
            if let Some(ref cb) = self.progress {
                cb.on_pass_start(pass, state.planned, &label);
            }

            out.attempted += 1;
            let t = Instant::now();
            let result = self
                .recognize_once(&buf, mode)
                .await
                .map_err(|e| PassError::RecognitionFailed {
                    label: label.clone(),
                    detail: e.to_string(),
                })
                .and_then(|raw| self.to_candidate(raw, &group, mode, &label));
            out.recognition_ms += t.elapsed().as_millis() as u64;

            match result {
                Ok(candidate) => {
                    debug!("{} → {:.1}", label, candidate.confidence);
                    if let Some(ref cb) = self.progress {
                        cb.on_pass_complete(pass, state.planned, &label, candidate.confidence);
                    }
                    self.record(state, candidate.confidence);
                    out.candidates.push((pass, candidate));
                }
                Err(err) => {
                    warn!("{}", err);
                    if let Some(ref cb) = self.progress {
                        cb.on_pass_error(pass, state.planned, &err.to_string());
                    }
                    out.failed += 1;
                    out.pass_errors.push(err);
                }
            }
        }
        out
    }

    async fn recognize_once(
        &self,
        buf: &PixelBuffer,
        mode: LayoutMode,
    ) -> Result<RawRecognition, RecognitionError> {
        tokio::time::timeout(self.engine_timeout, self.adapter.recognize(buf, mode))
            .await
            .map_err(|_| RecognitionError::Timeout {
                secs: self.engine_timeout.as_secs(),
            })?
    }

    fn to_candidate(
        &self,
        raw: RawRecognition,
        group: &PassGroup<'_>,
        mode: LayoutMode,
        label: &str,
    ) -> Result<CandidateResult, PassError> {
        let text = raw.text.trim();
        if text.is_empty() {
            return Err(PassError::EmptyText {
                label: label.to_string(),
            });
        }
        if !raw.confidence.is_finite() {
            return Err(PassError::RecognitionFailed {
                label: label.to_string(),
                detail: format!("engine reported confidence {}", raw.confidence),
            });
        }
        let confidence = raw.confidence.clamp(0.0, 100.0);
        Ok(CandidateResult {
            text: text.to_string(),
            confidence,
            recipe: group.recipe.name.clone(),
            scale: group.scale,
            mode,
            low_quality: confidence < self.min_confidence,
        })
    }

    /// Count a candidate and raise the stop flag once the exit rule holds.
    fn record(&self, state: &RunState, confidence: f32) {
        let collected = state.collected.fetch_add(1, Ordering::SeqCst) + 1;
        if confidence >= self.target_confidence {
            state.target_hit.store(true, Ordering::SeqCst);
        }
        if state.target_hit.load(Ordering::SeqCst) && collected >= self.min_candidates {
            state.stop.store(true, Ordering::SeqCst);
        }
    }

    fn merge(&self, groups: Vec<GroupOutcome>, state: &RunState) -> OrchestratorOutcome {
        let mut stats = RecognitionStats {
            passes_planned: state.planned,
            early_exit: state.stopped(),
            ..RecognitionStats::default()
        };
        let mut numbered = Vec::new();
        for g in groups {
            stats.passes_attempted += g.attempted;
            stats.passes_failed += g.failed;
            stats.preprocessing_failures += usize::from(g.preprocessing_failed);
            stats.budget_exhausted |= g.budget_exhausted;
            stats.preprocess_duration_ms += g.preprocess_ms;
            stats.recognition_duration_ms += g.recognition_ms;
            stats.pass_errors.extend(g.pass_errors);
            numbered.extend(g.candidates);
        }
        numbered.sort_by_key(|(pass, _)| *pass);
        let candidates: Vec<CandidateResult> = numbered.into_iter().map(|(_, c)| c).collect();
        stats.candidates = candidates.len();
        stats.low_quality_candidates = candidates.iter().filter(|c| c.low_quality).count();

        let mut warnings = Vec::new();
        if stats.budget_exhausted {
            let budget_ms = self.time_budget.map_or(0, |b| b.as_millis());
            warn!("Time budget of {}ms exhausted", budget_ms);
            warnings.push(format!(
                "Time budget of {budget_ms} ms exhausted after {} of {} passes",
                stats.passes_attempted, stats.passes_planned
            ));
        }
        if !candidates.is_empty() && candidates.len() < self.min_candidates {
            warnings.push(format!(
                "Only {} reading(s) collected; {} were requested",
                candidates.len(),
                self.min_candidates
            ));
        }

        OrchestratorOutcome {
            candidates,
            stats,
            warnings,
        }
    }
}

/// Scale then run the recipe on the blocking pool.
///
/// The scaled size is checked against `max_pixels` before anything is
/// allocated.
async fn prepare(
    source: Arc<PixelBuffer>,
    steps: Vec<preprocess::Transform>,
    scale: f32,
    max_pixels: u64,
) -> Result<PixelBuffer, String> {
    let (w, h) =
        geometry::scaled_size(source.width(), source.height(), scale).map_err(|e| e.to_string())?;
    let pixels = u64::from(w) * u64::from(h);
    if pixels > max_pixels {
        return Err(format!(
            "scaled size {w}x{h} ({pixels} pixels) exceeds the {max_pixels}-pixel limit"
        ));
    }

    tokio::task::spawn_blocking(move || {
        let scaled = geometry::scale(&source, scale)?;
        preprocess::apply_all(scaled, &steps)
    })
    .await
    .map_err(|e| format!("preprocessing task failed: {e}"))?
    .map_err(|e| e.to_string())
}

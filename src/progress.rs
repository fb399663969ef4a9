//! Progress-callback trait for per-pass recognition events.
//!
//! Inject an [`Arc<dyn RecognitionProgressCallback>`] via
//! [`crate::config::RecognitionConfigBuilder::progress_callback`] to follow a
//! run as the orchestrator works through the strategy catalog. The CLI uses
//! this to drive its progress bar; a host application could forward the
//! events to a channel or a log.
//!
//! # Example
//!
//! ```rust
//! use clinical_ocr::{RecognitionConfig, RecognitionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     calls: AtomicUsize,
//! }
//!
//! impl RecognitionProgressCallback for CountingCallback {
//!     fn on_pass_complete(&self, _pass: usize, _planned: usize, label: &str, confidence: f32) {
//!         self.calls.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{label}: {confidence:.1}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { calls: AtomicUsize::new(0) });
//!
//! let config = RecognitionConfig::builder()
//!     .progress_callback(counter as Arc<dyn RecognitionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it runs recognition passes.
///
/// All methods default to no-ops. With `concurrency > 1` the per-pass
/// methods may be called from several tasks at once, so shared state needs
/// `Mutex` or atomics.
pub trait RecognitionProgressCallback: Send + Sync {
    /// Called once before the first pass.
    ///
    /// # Arguments
    /// * `planned_passes`: recognition calls the catalog would make
    ///   without early exit
    fn on_run_start(&self, planned_passes: usize) {
        let _ = planned_passes;
    }

    /// Called just before a recognition call.
    ///
    /// # Arguments
    /// * `pass`:  1-indexed pass number in priority order
    /// * `label`: `recipe@scale/mode`
    fn on_pass_start(&self, pass: usize, planned_passes: usize, label: &str) {
        let _ = (pass, planned_passes, label);
    }

    /// Called when a pass produced a candidate.
    fn on_pass_complete(&self, pass: usize, planned_passes: usize, label: &str, confidence: f32) {
        let _ = (pass, planned_passes, label, confidence);
    }

    /// Called when a pass yielded nothing (preprocessing or engine failure).
    fn on_pass_error(&self, pass: usize, planned_passes: usize, error: &str) {
        let _ = (pass, planned_passes, error);
    }

    /// Called once after fusion and correction.
    ///
    /// # Arguments
    /// * `attempted`:  recognition calls actually made
    /// * `confidence`: final confidence of the returned result
    fn on_run_complete(&self, attempted: usize, confidence: f32) {
        let _ = (attempted, confidence);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl RecognitionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RecognitionConfig`].
pub type ProgressCallback = Arc<dyn RecognitionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        planned: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        final_confidence: Mutex<Option<f32>>,
    }

    impl RecognitionProgressCallback for TrackingCallback {
        fn on_run_start(&self, planned_passes: usize) {
            self.planned.store(planned_passes, Ordering::SeqCst);
        }

        fn on_pass_start(&self, _pass: usize, _planned: usize, _label: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_pass_complete(&self, _pass: usize, _planned: usize, _label: &str, _c: f32) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_pass_error(&self, _pass: usize, _planned: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _attempted: usize, confidence: f32) {
            *self.final_confidence.lock().unwrap() = Some(confidence);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(200);
        cb.on_pass_start(1, 200, "original@1x/single_block");
        cb.on_pass_complete(1, 200, "original@1x/single_block", 91.0);
        cb.on_pass_error(2, 200, "engine timed out after 60s");
        cb.on_run_complete(2, 91.0);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_run_start(10);
        assert_eq!(tracker.planned.load(Ordering::SeqCst), 10);

        tracker.on_pass_start(1, 10, "a");
        tracker.on_pass_complete(1, 10, "a", 40.0);
        tracker.on_pass_start(2, 10, "b");
        tracker.on_pass_error(2, 10, "engine failed");
        tracker.on_run_complete(2, 50.0);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.final_confidence.lock().unwrap(), Some(50.0));
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(5);
        cb.on_pass_start(1, 5, "x");
    }
}

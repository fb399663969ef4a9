//! Pipeline stages for multi-pass recognition.
//!
//! Each submodule implements one step; only [`orchestrate`] knows the order.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess × strategy ──▶ engine ──▶ fusion ──▶ correct
//! (bytes)   (recipe@scale buffers)    (modes)    (voting)   (vocabulary)
//! ```
//!
//! 1. [`input`]:      resolve a path or URL to bytes, decode, enforce the pixel cap
//! 2. [`preprocess`]: pure pixel transforms (threshold, morphology, deskew, …)
//! 3. [`strategy`]:   the recipe × scale × mode catalog in priority order
//! 4. [`orchestrate`]: run the catalog against the engine with early exit;
//!    transforms run in `spawn_blocking`
//! 5. [`encode`]:     PNG encoding for engines that take files or JSON
//! 6. [`fusion`]:     confidence-weighted word voting across candidates
//! 7. [`correct`]:    confusion rules, exact and fuzzy vocabulary correction

pub mod correct;
pub mod encode;
pub mod fusion;
pub mod input;
pub mod orchestrate;
pub mod preprocess;
pub mod strategy;

//! Result fusion: merge several candidate readings into one answer.
//!
//! ## Rules
//!
//! 1. If the best candidate (highest confidence, earliest on ties) scores at
//!    least [`BYPASS_CONFIDENCE`], it is returned as is.
//! 2. Otherwise the best candidate's words form the backbone. For word
//!    position `i`, every candidate with at least `i + 1` words casts a vote
//!    for its `i`-th word, weighted by its confidence. The heaviest word wins;
//!    on a tie the word seen first wins, and the backbone is always seen
//!    first.
//! 3. Each voted word is fuzzy-matched against the domain vocabulary when a
//!    corrector is supplied.
//! 4. Confidence is the mean candidate confidence plus [`AGREEMENT_BOOST`],
//!    capped at [`MAX_FUSED_CONFIDENCE`]. A mean below
//!    [`REVIEW_THRESHOLD`] adds a manual-review warning.
//!
//! The backbone's line breaks are kept; other whitespace collapses to a
//! single space.

use super::correct::DomainCorrector;
use crate::output::{CandidateResult, FusedResult};
use tracing::debug;

/// A single candidate at or above this confidence skips voting.
pub const BYPASS_CONFIDENCE: f32 = 90.0;

/// Added to the mean confidence of fused candidates.
pub const AGREEMENT_BOOST: f32 = 10.0;

pub const MAX_FUSED_CONFIDENCE: f32 = 99.0;

/// Mean confidence below which the result is flagged for manual review.
pub const REVIEW_THRESHOLD: f32 = 70.0;

/// Fuse `candidates`; `None` when the slice is empty.
pub fn fuse(
    candidates: &[CandidateResult],
    corrector: Option<&DomainCorrector>,
) -> Option<FusedResult> {
    let (best_idx, best) = best_candidate(candidates)?;

    if best.confidence >= BYPASS_CONFIDENCE {
        debug!(
            "Fusion bypassed: {} at {:.1}",
            best.pass_label(),
            best.confidence
        );
        return Some(FusedResult {
            text: best.text.clone(),
            confidence: best.confidence,
            preprocessing_used: best.strategy_label(),
            warnings: Vec::new(),
            source_count: 1,
        });
    }

    // Voters in tally order: backbone first, then the rest as supplied.
    let others: Vec<(Vec<&str>, f32)> = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != best_idx)
        .map(|(_, c)| (c.text.split_whitespace().collect(), c.confidence))
        .collect();

    let mut position = 0usize;
    let mut lines: Vec<String> = Vec::new();
    for backbone_line in best.text.lines() {
        let mut words: Vec<String> = Vec::new();
        for own in backbone_line.split_whitespace() {
            let winner = vote(own, best.confidence, &others, position);
            let word = match corrector {
                Some(c) => c.correct_word(winner),
                None => winner.to_string(),
            };
            words.push(word);
            position += 1;
        }
        if !words.is_empty() {
            lines.push(words.join(" "));
        }
    }

    let mean = candidates.iter().map(|c| c.confidence as f64).sum::<f64>() / candidates.len() as f64;
    let mean = mean as f32;
    let confidence = (mean + AGREEMENT_BOOST).clamp(0.0, MAX_FUSED_CONFIDENCE);

    let mut warnings = Vec::new();
    if mean < REVIEW_THRESHOLD {
        warnings.push(format!(
            "Low confidence (average {mean:.1} across {} readings): verify the text manually",
            candidates.len()
        ));
    }

    debug!(
        "Fused {} candidates → {} words @ {:.1}",
        candidates.len(),
        position,
        confidence
    );

    Some(FusedResult {
        text: lines.join("\n"),
        confidence,
        preprocessing_used: format!(
            "fused({} readings, best {})",
            candidates.len(),
            best.strategy_label()
        ),
        warnings,
        source_count: candidates.len(),
    })
}

/// Highest confidence, earliest index on ties.
fn best_candidate(candidates: &[CandidateResult]) -> Option<(usize, &CandidateResult)> {
    let mut iter = candidates.iter().enumerate();
    let first = iter.next()?;
    Some(iter.fold(first, |best, cur| {
        if cur.1.confidence > best.1.confidence {
            cur
        } else {
            best
        }
    }))
}

fn vote<'a>(
    own: &'a str,
    own_weight: f32,
    others: &'a [(Vec<&'a str>, f32)],
    position: usize,
) -> &'a str {
    let mut tally: Vec<(&str, f64)> = vec![(own, own_weight as f64)];
    for (words, weight) in others {
        let Some(&word) = words.get(position) else {
            continue;
        };
        match tally.iter_mut().find(|(w, _)| *w == word) {
            Some(entry) => entry.1 += *weight as f64,
            None => tally.push((word, *weight as f64)),
        }
    }
    tally
        .iter()
        .fold(tally[0], |best, &cur| if cur.1 > best.1 { cur } else { best })
        .0
}

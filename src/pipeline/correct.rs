//! Domain correction: fix clinical vocabulary in recognised text.
//!
//! ## Text pass ([`DomainCorrector::correct_text`])
//!
//! Applied in this order:
//! 1. Lower-case the whole text
//! 2. Character-confusion rules (`rn → m`, `0 → o`, …) on every whitespace
//!    token that is not already a canonical term
//! 3. Exact dictionary substitution (whole word, case-insensitive)
//! 4. Sentence-initial capitalisation
//!
//! Step 2 is deliberately blunt: it also rewrites tokens that were right,
//! e.g. `120/80` becomes `12o/8o`. It can be switched off with
//! [`crate::config::RecognitionConfigBuilder::confusion_rules`].
//!
//! ## Word pass ([`DomainCorrector::correct_word`])
//!
//! Fuzzy matching against the canonical terms by Levenshtein distance, used
//! by fusion on each voted word and available standalone.

use crate::dictionary::CorrectionDictionary;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::sync::Arc;

/// Share of a word's characters that may differ for a fuzzy match.
const FUZZY_RATIO: f64 = 0.3;

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").unwrap());

static RE_SENTENCE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[.!?]\s+)(\p{Ll})").unwrap());

/// Exact + fuzzy vocabulary correction backed by a shared dictionary.
#[derive(Debug, Clone)]
pub struct DomainCorrector {
    dictionary: Arc<CorrectionDictionary>,
    confusion_rules: bool,
}

impl DomainCorrector {
    pub fn new(dictionary: Arc<CorrectionDictionary>) -> Self {
        Self {
            dictionary,
            confusion_rules: true,
        }
    }

    pub fn with_confusion_rules(mut self, enabled: bool) -> Self {
        self.confusion_rules = enabled;
        self
    }

    pub fn dictionary(&self) -> &CorrectionDictionary {
        &self.dictionary
    }

    /// Full text pass. Idempotent: running it on its own output changes
    /// nothing.
    pub fn correct_text(&self, text: &str) -> String {
        let s = text.to_lowercase();
        let s = if self.confusion_rules {
            self.apply_confusions(&s)
        } else {
            s
        };
        let s = self.dictionary.substitute_exact(&s);
        capitalise_sentences(&s)
    }

    fn apply_confusions(&self, text: &str) -> String {
        RE_TOKEN
            .replace_all(text, |caps: &Captures<'_>| {
                let token = &caps[0];
                let (_, core, _) = split_punctuation(token);
                if self.dictionary.is_canonical_word(core) {
                    token.to_string()
                } else {
                    self.dictionary.apply_confusions(token)
                }
            })
            .into_owned()
    }

    /// Closest canonical term within `ceil(0.3 · len)` edits, if any.
    ///
    /// Ties go to the term that sorts first. Comparison is case-insensitive.
    pub fn fuzzy_match(&self, word: &str) -> Option<&str> {
        let word = word.to_lowercase();
        let len = word.chars().count();
        let limit = (FUZZY_RATIO * len as f64).ceil() as usize;

        let mut best: Option<(&str, usize)> = None;
        for term in self.dictionary.canonical_terms() {
            let distance = strsim::levenshtein(&word, term);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((term.as_str(), distance));
            }
        }
        best.filter(|&(_, d)| d <= limit).map(|(term, _)| term)
    }

    /// Fuzzy-correct a single token, keeping surrounding punctuation and the
    /// token's casing style. Tokens without letters come back unchanged.
    pub fn correct_word(&self, token: &str) -> String {
        let (lead, core, trail) = split_punctuation(token);
        if !core.chars().any(char::is_alphabetic) {
            return token.to_string();
        }
        match self.fuzzy_match(core) {
            Some(term) if term != core.to_lowercase() => {
                format!("{lead}{}{trail}", restore_case(core, term))
            }
            _ => token.to_string(),
        }
    }
}

/// Split `"(morfine),"` into `("(", "morfine", "),")`.
fn split_punctuation(token: &str) -> (&str, &str, &str) {
    let start = token
        .find(char::is_alphanumeric)
        .unwrap_or(token.len());
    let end = token
        .rfind(char::is_alphanumeric)
        .map(|i| i + token[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(start);
    (&token[..start], &token[start..end], &token[end..])
}

fn restore_case(original: &str, term: &str) -> String {
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        term.to_uppercase()
    } else if letters.first().is_some_and(|c| c.is_uppercase()) {
        capitalise_first(term)
    } else {
        term.to_string()
    }
}

fn capitalise_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper-case the first letter of the text and of every segment that
/// follows `.`, `!` or `?` plus whitespace.
fn capitalise_sentences(text: &str) -> String {
    RE_SENTENCE_START
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let letter = &caps[1];
            let mut upper = letter.to_uppercase();
            // Letters whose upper case does not lower back (ß → SS) stay
            // as they are so a second pass sees the same text.
            if upper.to_lowercase() != letter {
                upper = letter.to_string();
            }
            format!("{}{upper}", &whole[..whole.len() - letter.len()])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrector() -> DomainCorrector {
        DomainCorrector::new(CorrectionDictionary::builtin().unwrap())
    }

    #[test]
    fn fuzzy_fixes_near_miss() {
        let c = corrector();
        assert_eq!(c.fuzzy_match("fentanil"), Some("fentanyl"));
        assert_eq!(c.correct_word("fentanil"), "fentanyl");
    }

    #[test]
    fn fuzzy_leaves_unknown_words() {
        let c = corrector();
        assert_eq!(c.fuzzy_match("xyzzyplugh"), None);
        assert_eq!(c.correct_word("xyzzyplugh"), "xyzzyplugh");
    }

    #[test]
    fn fuzzy_skips_distant_and_letterless_tokens() {
        let c = corrector();
        assert_eq!(c.correct_word("has"), "has");
        assert_eq!(c.correct_word("BP"), "BP");
        assert_eq!(c.correct_word("120/80"), "120/80");
    }

    #[test]
    fn fuzzy_matches_short_canonical_terms() {
        let dict = CorrectionDictionary::from_json_str(r#"{"corrections":{"tabb":"tab"}}"#).unwrap();
        let c = DomainCorrector::new(Arc::new(dict));
        assert_eq!(c.fuzzy_match("tap"), Some("tab"));
        assert_eq!(c.correct_word("Tap,"), "Tab,");
        assert_eq!(c.fuzzy_match("cap"), None);
    }

    #[test]
    fn correct_word_keeps_punctuation_and_case() {
        let c = corrector();
        assert_eq!(c.correct_word("(Fentanil),"), "(Fentanyl),");
        assert_eq!(c.correct_word("MORPHNE"), "MORPHINE");
    }

    #[test]
    fn split_punctuation_edges() {
        assert_eq!(split_punctuation("(abc),"), ("(", "abc", "),"));
        assert_eq!(split_punctuation("..."), ("...", "", ""));
        assert_eq!(split_punctuation("né."), ("", "né", "."));
    }

    #[test]
    fn text_pass_applies_all_stages() {
        let c = corrector();
        let out = c.correct_text("PATIANT given MORFINE. alergy to pencillin!  rnild rash");
        assert_eq!(
            out,
            "Patient given morphine. Allergy to penicillin!  Mild rash"
        );
    }

    #[test]
    fn confusions_can_be_disabled() {
        let c = corrector().with_confusion_rules(false);
        assert_eq!(c.correct_text("bp 120/80"), "Bp 120/80");
        let c = corrector();
        assert_eq!(c.correct_text("bp 120/80"), "Bp 12o/8o");
    }

    #[test]
    fn text_pass_is_idempotent() {
        let c = corrector();
        for input in [
            "PATIANT given MORFINE. alergy to pencillin!",
            "BP 12O/8O? pateint stable.",
            "ß-blocker. straße ok",
            "   leading space. and tabs\tafter",
            "",
        ] {
            let once = c.correct_text(input);
            assert_eq!(c.correct_text(&once), once, "input: {input:?}");
        }
    }
}

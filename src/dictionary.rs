//! Read-only correction dictionary: misspelling → canonical term, plus the
//! character-confusion rules applied before exact lookup.
//!
//! The built-in medical vocabulary is embedded at compile time from
//! `data/medical_corrections.json` and parsed once per process. Custom
//! dictionaries use the same JSON shape:
//!
//! ```json
//! {
//!   "corrections": { "morfine": "morphine", "pencillin": "penicillin" },
//!   "confusions": [ { "pattern": "rn", "replacement": "m" } ]
//! }
//! ```
//!
//! A dictionary is never mutated after load; share it with `Arc`.

use crate::error::OcrError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const BUILTIN_JSON: &str = include_str!("../data/medical_corrections.json");

static BUILTIN: Lazy<Result<Arc<CorrectionDictionary>, String>> = Lazy::new(|| {
    CorrectionDictionary::from_json_str(BUILTIN_JSON)
        .map(Arc::new)
        .map_err(|e| e.to_string())
});

/// A character-level substitution applied to every non-canonical token,
/// e.g. `rn → m` for the classic handwriting/OCR confusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionRule {
    /// Regular expression (plain letters match literally).
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    corrections: BTreeMap<String, String>,
    #[serde(default)]
    confusions: Vec<ConfusionRule>,
}

/// Compiled, immutable correction tables.
#[derive(Debug)]
pub struct CorrectionDictionary {
    corrections: HashMap<String, String>,
    /// Distinct canonical terms in sorted order; the fuzzy matcher walks this.
    canonical: Vec<String>,
    /// Every whitespace-separated word of every canonical term.
    canonical_words: HashSet<String>,
    confusions: Vec<(ConfusionRule, Regex)>,
    /// All misspellings as one alternation, longest first.
    exact: Option<Regex>,
}

impl CorrectionDictionary {
    /// The embedded medical vocabulary.
    pub fn builtin() -> Result<Arc<Self>, OcrError> {
        BUILTIN
            .as_ref()
            .map(Arc::clone)
            .map_err(|detail| OcrError::DictionaryLoad {
                source_name: "<builtin>".into(),
                detail: detail.clone(),
            })
    }

    pub fn from_path(path: &Path) -> Result<Self, OcrError> {
        let json = std::fs::read_to_string(path).map_err(|e| OcrError::DictionaryLoad {
            source_name: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_json_str(&json).map_err(|e| match e {
            OcrError::DictionaryLoad { detail, .. } => OcrError::DictionaryLoad {
                source_name: path.display().to_string(),
                detail,
            },
            other => other,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, OcrError> {
        let file: DictionaryFile = serde_json::from_str(json).map_err(|e| load_error(e.to_string()))?;
        Self::from_parts(file.corrections, file.confusions)
    }

    /// Build from an in-memory table.
    ///
    /// Keys and values are lower-cased and trimmed. Identity entries are
    /// dropped. An entry whose canonical form is itself a misspelling of
    /// something else is rejected, since exact substitution would no longer
    /// be idempotent.
    pub fn from_parts(
        corrections: impl IntoIterator<Item = (String, String)>,
        confusions: Vec<ConfusionRule>,
    ) -> Result<Self, OcrError> {
        let mut table: BTreeMap<String, String> = BTreeMap::new();
        for (wrong, right) in corrections {
            let wrong = wrong.trim().to_lowercase();
            let right = right.trim().to_lowercase();
            if wrong.is_empty() || right.is_empty() {
                return Err(load_error(format!("empty entry '{wrong}' → '{right}'")));
            }
            if wrong != right {
                table.insert(wrong, right);
            }
        }

        if let Some((wrong, right)) = table.iter().find(|(_, right)| table.contains_key(*right)) {
            return Err(load_error(format!(
                "'{wrong}' → '{right}' chains into another correction"
            )));
        }

        let canonical: Vec<String> = table
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let canonical_words = canonical
            .iter()
            .flat_map(|c| c.split_whitespace().map(str::to_string))
            .collect();

        let mut compiled = Vec::with_capacity(confusions.len());
        for rule in confusions {
            if rule.pattern.is_empty() {
                return Err(load_error("confusion rule with empty pattern".into()));
            }
            let re = Regex::new(&rule.pattern)
                .map_err(|e| load_error(format!("confusion '{}': {e}", rule.pattern)))?;
            if re.is_match(&rule.replacement) {
                return Err(load_error(format!(
                    "confusion '{}' → '{}' matches its own replacement",
                    rule.pattern, rule.replacement
                )));
            }
            compiled.push((rule, re));
        }

        let exact = if table.is_empty() {
            None
        } else {
            let mut keys: Vec<&String> = table.keys().collect();
            keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
            let alternation = keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
                .map_err(|e| load_error(format!("exact pattern: {e}")))?;
            Some(re)
        };

        Ok(Self {
            corrections: table.into_iter().collect(),
            canonical,
            canonical_words,
            confusions: compiled,
            exact,
        })
    }

    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }

    /// Canonical terms in sorted order.
    pub fn canonical_terms(&self) -> &[String] {
        &self.canonical
    }

    /// Whether `word` (already lower-case) is, or is part of, a canonical term.
    pub fn is_canonical_word(&self, word: &str) -> bool {
        self.canonical_words.contains(word)
    }

    pub fn lookup(&self, misspelling: &str) -> Option<&str> {
        self.corrections
            .get(&misspelling.to_lowercase())
            .map(String::as_str)
    }

    pub fn confusion_rules(&self) -> impl Iterator<Item = &ConfusionRule> {
        self.confusions.iter().map(|(rule, _)| rule)
    }

    /// Apply every confusion rule to `token` until nothing changes.
    pub fn apply_confusions(&self, token: &str) -> String {
        let mut current = token.to_string();
        // Rules are validated not to re-match their own output, so this
        // settles quickly; the bound guards against rules feeding each other.
        for _ in 0..8 {
            let mut next = current.clone();
            for (rule, re) in &self.confusions {
                next = re.replace_all(&next, rule.replacement.as_str()).into_owned();
            }
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Whole-word, case-insensitive replacement of every known misspelling.
    pub fn substitute_exact(&self, text: &str) -> String {
        let Some(re) = &self.exact else {
            return text.to_string();
        };
        re.replace_all(text, |caps: &regex::Captures<'_>| {
            let found = &caps[0];
            self.lookup(found).unwrap_or(found).to_string()
        })
        .into_owned()
    }
}

fn load_error(detail: String) -> OcrError {
    OcrError::DictionaryLoad {
        source_name: "<json>".into(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_loads() {
        let dict = CorrectionDictionary::builtin().unwrap();
        assert!(dict.len() > 50);
        assert!(dict.canonical_terms().iter().any(|t| t == "fentanyl"));
        assert_eq!(dict.confusion_rules().count(), 2);
        let again = CorrectionDictionary::builtin().unwrap();
        assert!(Arc::ptr_eq(&dict, &again));
    }

    #[test]
    fn canonical_terms_are_sorted_and_distinct() {
        let dict = CorrectionDictionary::builtin().unwrap();
        let terms = dict.canonical_terms();
        assert!(terms.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn exact_substitution_is_whole_word_and_case_insensitive() {
        let dict = CorrectionDictionary::from_parts(
            [
                ("morfine".to_string(), "morphine".to_string()),
                ("codein".to_string(), "codeine".to_string()),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(
            dict.substitute_exact("give MORFINE and codeine, not codein."),
            "give morphine and codeine, not codeine."
        );
        assert_eq!(dict.substitute_exact("morfines"), "morfines");
    }

    #[test]
    fn longest_misspelling_wins() {
        let dict = CorrectionDictionary::from_parts(
            [
                ("pen".to_string(), "penicillin".to_string()),
                ("pen v".to_string(), "phenoxymethylpenicillin".to_string()),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(dict.substitute_exact("pen v 250"), "phenoxymethylpenicillin 250");
    }

    #[test]
    fn chained_entries_are_rejected() {
        let err = CorrectionDictionary::from_parts(
            [
                ("a1".to_string(), "b1".to_string()),
                ("b1".to_string(), "c1".to_string()),
            ],
            vec![],
        )
        .unwrap_err();
        assert!(err.to_string().contains("chains"), "{err}");
    }

    #[test]
    fn identity_entries_are_dropped() {
        let dict = CorrectionDictionary::from_parts(
            [("Insulin".to_string(), "insulin".to_string())],
            vec![],
        )
        .unwrap();
        assert!(dict.is_empty());
        assert_eq!(dict.substitute_exact("insulin"), "insulin");
    }

    #[test]
    fn confusions_reach_a_fixed_point() {
        let dict = CorrectionDictionary::from_parts(
            std::iter::empty(),
            vec![
                ConfusionRule {
                    pattern: "rn".into(),
                    replacement: "m".into(),
                },
                ConfusionRule {
                    pattern: "0".into(),
                    replacement: "o".into(),
                },
            ],
        )
        .unwrap();
        assert_eq!(dict.apply_confusions("rnorphine"), "morphine");
        assert_eq!(dict.apply_confusions("c0de"), "code");
        assert_eq!(dict.apply_confusions("morphine"), "morphine");
    }

    #[test]
    fn self_matching_confusion_is_rejected() {
        let err = CorrectionDictionary::from_parts(
            std::iter::empty(),
            vec![ConfusionRule {
                pattern: "a".into(),
                replacement: "aa".into(),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, OcrError::DictionaryLoad { .. }));
    }

    #[test]
    fn bad_json_reports_dictionary_error() {
        let err = CorrectionDictionary::from_json_str("{").unwrap_err();
        assert!(matches!(err, OcrError::DictionaryLoad { .. }));
    }

    #[test]
    fn from_path_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.json");
        std::fs::write(&path, r#"{"corrections": {"asprin": "aspirin"}}"#).unwrap();
        let dict = CorrectionDictionary::from_path(&path).unwrap();
        assert_eq!(dict.lookup("ASPRIN"), Some("aspirin"));

        let missing = dir.path().join("nope.json");
        let err = CorrectionDictionary::from_path(&missing).unwrap_err();
        assert!(err.to_string().contains("nope.json"), "{err}");
    }
}

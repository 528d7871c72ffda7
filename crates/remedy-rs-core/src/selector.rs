//! Maps a free-text answer to the prescribed medications that were not delivered.

use crate::error::RemedyCoreError;
use crate::types::{Field, Session};
use regex::Regex;

/// Whole-message answers meaning "every medication".
const ALL_EXACT: [&str; 6] = ["ninguno", "ninguna", "ningun", "ningún", "todos", "todo"];
/// Phrases meaning "every medication" anywhere in the message.
const ALL_PHRASES: [&str; 3] = [
    "no me entregaron ninguno",
    "todos los",
    "no me entregaron nada",
];

/// How a selection was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionVia {
    /// "ninguno", "todos" and friends: every candidate.
    Idiom,
    /// 1-based positions in the numbered list.
    Ordinal,
    /// Medication base names mentioned in the text.
    Name,
}

/// Why no medication could be picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The session holds no prescribed medications.
    NoCandidates,
    /// Nothing in the text pointed at a candidate.
    NoMatch,
}

/// Result of interpreting a selection answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Resolved {
        names: Vec<String>,
        /// `names` joined with ", ".
        joined: String,
        via: SelectionVia,
    },
    Unresolved {
        reason: UnresolvedReason,
    },
}

impl Selection {
    fn resolved(names: Vec<String>, via: SelectionVia) -> Self {
        let joined = names.join(", ");
        Selection::Resolved { names, joined, via }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Selection::Resolved { .. })
    }
}

/// Interprets "which medications were not delivered" answers.
#[derive(Debug, Clone)]
pub struct MedicationSelector {
    numbers: Regex,
}

impl MedicationSelector {
    pub fn new() -> Result<Self, RemedyCoreError> {
        Ok(Self {
            numbers: Regex::new(r"\d+")?,
        })
    }

    /// Resolve `text` against `candidates`. Idioms beat numbers, numbers beat names.
    pub fn select(&self, text: &str, candidates: &[String]) -> Selection {
        if candidates.is_empty() {
            return Selection::Unresolved {
                reason: UnresolvedReason::NoCandidates,
            };
        }
        let lower = text.trim().to_lowercase();

        if ALL_EXACT.contains(&lower.as_str())
            || ALL_PHRASES.iter().any(|phrase| lower.contains(phrase))
        {
            return Selection::resolved(candidates.to_vec(), SelectionVia::Idiom);
        }

        let mut by_index = Vec::new();
        for token in self.numbers.find_iter(&lower) {
            let Some(position) = token.as_str().parse::<usize>().ok() else {
                continue;
            };
            if let Some(name) = position.checked_sub(1).and_then(|idx| candidates.get(idx))
                && !by_index.contains(name)
            {
                by_index.push(name.clone());
            }
        }
        if !by_index.is_empty() {
            return Selection::resolved(by_index, SelectionVia::Ordinal);
        }

        let by_name: Vec<String> = candidates
            .iter()
            .filter(|candidate| mentions(&lower, candidate))
            .cloned()
            .collect();
        if !by_name.is_empty() {
            return Selection::resolved(by_name, SelectionVia::Name);
        }

        Selection::Unresolved {
            reason: UnresolvedReason::NoMatch,
        }
    }

    /// Select against the session's prescription and store the answer.
    pub fn apply(&self, text: &str, session: &mut Session) -> Selection {
        let selection = self.select(text, session.fields.candidate_medications());
        if let Selection::Resolved { joined, .. } = &selection {
            session.fields.set(Field::MissingMedications, joined);
        }
        selection
    }
}

/// Whether a word of the candidate's base name (text before the first `(` or
/// digit, words longer than three characters) appears in `lower`.
fn mentions(lower: &str, candidate: &str) -> bool {
    let base = candidate
        .split(|ch: char| ch == '(' || ch.is_ascii_digit())
        .next()
        .unwrap_or_default()
        .to_lowercase();
    base.split_whitespace()
        .filter(|word| word.chars().count() > 3)
        .any(|word| lower.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidates() -> Vec<String> {
        vec![
            "Losartan 50mg".to_string(),
            "Metformina (Glucophage) 850mg".to_string(),
            "Acetaminofen 500mg".to_string(),
        ]
    }

    #[test]
    fn idiom_beats_numbers() {
        let selector = MedicationSelector::new().expect("selector");
        let selection = selector.select("todos los 3", &candidates());
        assert_eq!(
            selection,
            Selection::Resolved {
                names: candidates(),
                joined: "Losartan 50mg, Metformina (Glucophage) 850mg, Acetaminofen 500mg"
                    .to_string(),
                via: SelectionVia::Idiom,
            }
        );
    }

    #[test]
    fn ordinals_drop_out_of_range_positions() {
        let selector = MedicationSelector::new().expect("selector");
        let Selection::Resolved { names, via, .. } = selector.select("el 1 y el 7 y el 3", &candidates())
        else {
            panic!("expected resolution");
        };
        assert_eq!(via, SelectionVia::Ordinal);
        assert_eq!(names, vec!["Losartan 50mg", "Acetaminofen 500mg"]);
    }

    #[test]
    fn names_match_on_base_words() {
        let selector = MedicationSelector::new().expect("selector");
        let Selection::Resolved { joined, via, .. } =
            selector.select("me faltó la METFORMINA", &candidates())
        else {
            panic!("expected resolution");
        };
        assert_eq!(via, SelectionVia::Name);
        assert_eq!(joined, "Metformina (Glucophage) 850mg");
    }

    #[test]
    fn empty_candidates_never_resolve() {
        let selector = MedicationSelector::new().expect("selector");
        assert_eq!(
            selector.select("todos", &[]),
            Selection::Unresolved {
                reason: UnresolvedReason::NoCandidates
            }
        );
    }
}

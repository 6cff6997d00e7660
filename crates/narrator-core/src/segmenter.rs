//! Sentence segmentation for highlight tracking.
//!
//! Spans are counted in `char`s over the whitespace-normalized text and assume
//! a single delimiter character between consecutive sentences. Runs such as
//! `"..."` or `"?!"` therefore drift the offsets slightly; callers that need
//! exact positions should re-locate sentences in the source text themselves.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_TERMINATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s*").unwrap());

/// One sentence of the loaded text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sentence {
    pub id: usize,
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
}

impl Sentence {
    /// Inclusive containment, matching how position events are resolved.
    pub fn contains(&self, char_index: usize) -> bool {
        self.start_char <= char_index && char_index <= self.end_char
    }
}

/// Collapse whitespace runs into single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Whitespace-delimited token count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split text into sentences on runs of `.`, `!` and `?`.
///
/// Delimiters are discarded, fragments are trimmed, and empty fragments are
/// dropped before ids are assigned.
pub fn segment(text: &str) -> Vec<Sentence> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut sentences: Vec<Sentence> = Vec::new();
    for fragment in RE_TERMINATORS.split(&normalized) {
        let trimmed = fragment.trim();
        if trimmed.is_empty() {
            continue;
        }
        let start_char = sentences.last().map(|prev| prev.end_char + 1).unwrap_or(0);
        let end_char = start_char + trimmed.chars().count();
        sentences.push(Sentence {
            id: sentences.len(),
            text: trimmed.to_string(),
            start_char,
            end_char,
        });
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = segment("Hello. World! Test?");
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "World", "Test"]);
        assert_eq!(
            sentences.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        for pair in sentences.windows(2) {
            assert!(pair[0].start_char < pair[0].end_char);
            assert!(pair[0].end_char < pair[1].start_char);
        }
    }

    #[test]
    fn empty_and_blank_text_yield_nothing() {
        assert!(segment("").is_empty());
        assert!(segment("   \n\t  ").is_empty());
        assert!(segment("...!?").is_empty());
    }

    #[test]
    fn span_arithmetic_matches_joined_length() {
        let samples = [
            "One. Two. Three.",
            "Wait... what?! Yes.",
            "No terminator at the end",
            "  Leading   and\ttrailing \n whitespace.  Second one!  ",
            "Ünïcödé sentences. Ça marche? Oui.",
        ];
        for sample in samples {
            let sentences = segment(sample);
            let joined = sentences
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let last = sentences.last().expect("sample has sentences");
            assert_eq!(joined.chars().count(), last.end_char, "sample: {sample}");
        }
    }

    #[test]
    fn ids_are_dense_after_dropping_empty_fragments() {
        let sentences = segment("Wait... what?!  Yes.");
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Wait", "what", "Yes"]);
        assert_eq!(sentences[2].id, 2);
        assert_eq!(sentences[1].start_char, sentences[0].end_char + 1);
    }

    #[test]
    fn collapses_whitespace_inside_sentences() {
        let sentences = segment("A  long\n\nline   here. Next");
        assert_eq!(sentences[0].text, "A long line here");
        assert_eq!(sentences[1].text, "Next");
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let sentence = Sentence {
            id: 0,
            text: "Hello".into(),
            start_char: 0,
            end_char: 5,
        };
        assert!(sentence.contains(0));
        assert!(sentence.contains(5));
        assert!(!sentence.contains(6));
    }

    #[test]
    fn counts_words() {
        assert_eq!(word_count("  one two\tthree\nfour "), 4);
        assert_eq!(word_count(""), 0);
    }
}

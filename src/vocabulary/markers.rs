//! Marker extraction for tutor replies
//!
//! The persona asks the model to annotate its replies with two tag forms:
//!
//! - `[VOCAB: mot - définition]`
//! - `[CORRECTION: incorrect -> correct - explication]`
//!
//! Extraction and stripping are independent passes over the original reply.

use regex::Regex;
use std::sync::LazyLock;

use super::store::EntryKind;

// The word ends at the first hyphen, so hyphenated words are cut short.
static VOCAB_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[VOCAB:\s*([^-]+)\s*-\s*([^\]]+)\]").unwrap());

static CORRECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[CORRECTION:\s*([^-]+)\s*->\s*([^-]+)\s*-\s*([^\]]+)\]").unwrap()
});

static VOCAB_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[VOCAB:[^\]]+\]").unwrap());

static CORRECTION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[CORRECTION:[^\]]+\]").unwrap());

/// One structured annotation found in a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Vocabulary {
        word: String,
        definition: String,
    },
    Correction {
        incorrect: String,
        correct: String,
        explanation: String,
    },
}

impl Marker {
    pub fn kind(&self) -> EntryKind {
        match self {
            Marker::Vocabulary { .. } => EntryKind::Vocabulary,
            Marker::Correction { .. } => EntryKind::Correction,
        }
    }

    /// Word to log: the word itself, or the corrected form
    pub fn word(&self) -> &str {
        match self {
            Marker::Vocabulary { word, .. } => word,
            Marker::Correction { correct, .. } => correct,
        }
    }

    /// Definition to log. Corrections mention the incorrect form.
    pub fn definition(&self) -> String {
        match self {
            Marker::Vocabulary { definition, .. } => definition.clone(),
            Marker::Correction {
                incorrect,
                explanation,
                ..
            } => format!("Correction de \"{}\": {}", incorrect, explanation),
        }
    }
}

/// Vocabulary tags in order of appearance
pub fn vocabulary_markers(reply: &str) -> impl Iterator<Item = Marker> + '_ {
    VOCAB_PATTERN.captures_iter(reply).map(|caps| Marker::Vocabulary {
        word: caps[1].trim().to_string(),
        definition: caps[2].trim().to_string(),
    })
}

/// Correction tags in order of appearance
pub fn correction_markers(reply: &str) -> impl Iterator<Item = Marker> + '_ {
    CORRECTION_PATTERN
        .captures_iter(reply)
        .map(|caps| Marker::Correction {
            incorrect: caps[1].trim().to_string(),
            correct: caps[2].trim().to_string(),
            explanation: caps[3].trim().to_string(),
        })
}

/// All vocabulary tags, then all correction tags
pub fn extract_markers(reply: &str) -> Vec<Marker> {
    vocabulary_markers(reply)
        .chain(correction_markers(reply))
        .collect()
}

/// Remove every tag of either form and trim the remaining text
pub fn strip_markers(reply: &str) -> String {
    let without_vocab = VOCAB_TAG.replace_all(reply, "");
    CORRECTION_TAG
        .replace_all(&without_vocab, "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str =
        "[VOCAB: bonjour - a greeting] texte [CORRECTION: je suis allé -> je suis allée - agreement]";

    #[test]
    fn test_extract_both_forms() {
        let markers = extract_markers(SAMPLE);
        assert_eq!(markers.len(), 2);

        assert_eq!(markers[0].kind(), EntryKind::Vocabulary);
        assert_eq!(markers[0].word(), "bonjour");
        assert_eq!(markers[0].definition(), "a greeting");

        assert_eq!(markers[1].kind(), EntryKind::Correction);
        assert_eq!(markers[1].word(), "je suis allée");
        assert_eq!(markers[1].definition(), "Correction de \"je suis allé\": agreement");
    }

    #[test]
    fn test_vocabulary_before_corrections_in_appearance_order() {
        let reply = "[CORRECTION: a -> b - c] [VOCAB: un - one] [VOCAB: deux - two]";
        let words: Vec<String> = extract_markers(reply).iter().map(|m| m.word().to_string()).collect();
        assert_eq!(words, vec!["un", "deux", "b"]);
    }

    #[test]
    fn test_malformed_tags_yield_nothing() {
        assert!(extract_markers("[VOCAB: sans separateur]").is_empty());
        assert!(extract_markers("[VOCAB: mot - définition").is_empty());
        assert!(extract_markers("[CORRECTION: faux vrai - pourquoi]").is_empty());
        assert!(extract_markers("Pas de marqueurs ici.").is_empty());
    }

    #[test]
    fn test_word_splits_on_first_hyphen() {
        let markers = extract_markers("[VOCAB: peut-être - maybe]");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].word(), "peut");
        assert_eq!(markers[0].definition(), "être - maybe");
    }

    #[test]
    fn test_strip_markers_keeps_prose() {
        let reply = "  Très bien ! [VOCAB: chat - cat] Tu as un chat ? [CORRECTION: je vais -> je vais bien - précision]  ";
        assert_eq!(strip_markers(reply), "Très bien !  Tu as un chat ?");
    }

    #[test]
    fn test_strip_markers_only_tags() {
        assert_eq!(strip_markers(SAMPLE), "texte");
        assert_eq!(strip_markers("[VOCAB: a - b]"), "");
    }

    #[test]
    fn test_strip_removes_malformed_tags_extraction_ignores() {
        let reply = "Salut [VOCAB: incomplet] !";
        assert!(extract_markers(reply).is_empty());
        assert_eq!(strip_markers(reply), "Salut  !");
    }
}

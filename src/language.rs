//! The language-processing collaborator: tokenization, stop words and stemming
//!
//! The pipeline only ever talks to the `Language` trait, so a binding to a real NLP toolkit can
//! replace the built-in one. The built-in one is deliberately small: it splits on unicode word
//! bounds, knows a short stop-word list per language, and strips a few common suffixes.
use unicode_segmentation::UnicodeSegmentation;
use crate::errors::*;
use crate::farm::{new_farm_set, FarmSet};

pub trait Language: Send + Sync {
    /// Split a sentence into tokens, in order
    fn tokenize(&self, text: &str) -> Vec<String>;
    /// Whether a token is a stop word in this language
    fn is_stop_word(&self, word: &str) -> bool;
    /// Reduce a token to its stem
    fn stem(&self, word: &str) -> String;
}

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

const FRENCH_STOP_WORDS: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "elles", "en", "est",
    "et", "eux", "il", "ils", "je", "la", "le", "les", "leur", "leurs", "lui", "ma", "mais",
    "me", "mes", "moi", "mon", "ne", "nos", "notre", "nous", "on", "ou", "où", "par", "pas",
    "pour", "qu", "que", "qui", "sa", "se", "ses", "son", "sur", "ta", "te", "tes", "toi", "ton",
    "tu", "un", "une", "vos", "votre", "vous", "y", "été", "être", "était", "sont", "cette",
];

// Longest first, so "ations" wins over "s".
const ENGLISH_SUFFIXES: &[&str] = &[
    "ational", "ations", "ation", "ingly", "edly", "ness", "ment", "ing", "ies", "ers", "ed",
    "ly", "es", "er", "s",
];

const FRENCH_SUFFIXES: &[&str] = &[
    "issements", "issement", "ements", "ement", "ations", "ation", "euses", "euse", "ités",
    "ité", "eux", "es", "s", "x",
];

/// Built-in language support for the codes understood by `for_code`
pub struct Builtin {
    code: String,
    stop_words: FarmSet<&'static str>,
    suffixes: &'static [&'static str],
}

impl Builtin {
    /// Look up a language by its code (`en`, `fr`)
    pub fn for_code(code: &str) -> Result<Builtin> {
        let (words, suffixes) = match code {
            "en" => (ENGLISH_STOP_WORDS, ENGLISH_SUFFIXES),
            "fr" => (FRENCH_STOP_WORDS, FRENCH_SUFFIXES),
            other => return Err(Error::Configuration(format!(
                "lang should be en or fr, not \"{}\"", other))),
        };
        let mut stop_words = new_farm_set();
        stop_words.extend(words.iter().cloned());
        Ok(Builtin { code: code.to_string(), stop_words, suffixes })
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl Language for Builtin {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_word_bounds()
            .filter(|t| !t.chars().all(char::is_whitespace))
            .map(str::to_string)
            .collect()
    }

    fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
            || self.stop_words.contains(word.to_lowercase().as_str())
    }

    fn stem(&self, word: &str) -> String {
        let chars = word.chars().count();
        for suffix in self.suffixes {
            // Always leave a stem of at least three characters
            if word.ends_with(suffix) && chars >= suffix.chars().count() + 3 {
                return word[..word.len() - suffix.len()].to_string();
            }
        }
        word.to_string()
    }
}

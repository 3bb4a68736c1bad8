//! Word-level filters applied to every token before it reaches a dictionary
use std::sync::Arc;
use regex::Regex;
use crate::errors::*;
use crate::language::Language;

/// A user hook run on each token after the built-in filters
///
/// It must return a string. Returning an empty string drops the token.
pub trait WordTransformer: Send + Sync {
    fn transform(&self, word: &str) -> String;
}

impl<F> WordTransformer for F where F: Fn(&str) -> String + Send + Sync {
    fn transform(&self, word: &str) -> String {
        self(word)
    }
}

/// Which filters to run. The order they run in is fixed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filters {
    pub remove_stop_words: bool,
    pub remove_numbers: bool,
    pub replace_digits_to_zeros: bool,
    pub remove_punctuations: bool,
    pub stem_word: bool,
    pub lowercase: bool,
}

impl Default for Filters {
    fn default() -> Self {
        Filters {
            remove_stop_words: true,
            remove_numbers: true,
            replace_digits_to_zeros: true,
            remove_punctuations: true,
            stem_word: false,
            lowercase: true,
        }
    }
}

/// Turns raw sentences into sequences of surviving tokens
#[derive(Clone)]
pub struct WordPreprocessor {
    filters: Filters,
    language: Arc<dyn Language>,
    transformer: Option<Arc<dyn WordTransformer>>,
    digits: Regex,
}

/// ASCII punctuation plus the typographic marks common in English and French text
fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || "“”—«»".contains(c)
}

impl WordPreprocessor {
    pub fn new(filters: Filters, language: Arc<dyn Language>) -> Result<Self> {
        Ok(WordPreprocessor {
            filters,
            language,
            transformer: None,
            digits: Regex::new(r"\d")?,
        })
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn WordTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Run one token through the filters. `None` means the token is dropped.
    pub fn apply(&self, word: &str) -> Option<String> {
        let f = &self.filters;
        if word.is_empty() {
            return None;
        }
        if f.remove_numbers && word.chars().all(char::is_numeric) {
            return None;
        }
        let mut word = if f.replace_digits_to_zeros {
            self.digits.replace_all(word, "0").into_owned()
        } else {
            word.to_string()
        };
        if f.remove_punctuations && word.chars().all(is_punctuation) {
            return None;
        }
        if f.remove_numbers && f.remove_punctuations
            && word.chars().all(|c| c.is_numeric() || is_punctuation(c)) {
            return None;
        }
        if f.remove_stop_words && self.language.is_stop_word(&word) {
            return None;
        }
        if f.stem_word {
            word = self.language.stem(&word);
        }
        if f.lowercase {
            word = word.to_lowercase();
        }
        if let Some(ref hook) = self.transformer {
            word = hook.transform(&word);
        }
        // Line breaks would corrupt the line-oriented dictionary files
        if word.is_empty() || word.contains(|c: char| c == '\n' || c == '\r') {
            None
        } else {
            Some(word)
        }
    }

    /// Tokenize a sentence and keep the tokens that survive `apply`
    pub fn tokens(&self, sentence: &str) -> Vec<String> {
        self.language.tokenize(sentence)
            .iter()
            .filter_map(|t| self.apply(t))
            .collect()
    }
}

//! Stopword lists
//!
//! Backed by the `stop-words` crate, with support for custom lists loaded
//! from a pipeline spec.

use rustc_hash::FxHashSet;
use stop_words::{get, LANGUAGE};

use crate::errors::{Result, SocialMeterError};

/// A case-insensitive stopword set
#[derive(Debug, Clone)]
pub struct StopwordList {
    /// Lowercased stopwords
    stopwords: FxHashSet<String>,
}

impl Default for StopwordList {
    fn default() -> Self {
        Self::english()
    }
}

impl StopwordList {
    /// The `stop-words` crate's English list
    pub fn english() -> Self {
        Self {
            stopwords: Self::load(LANGUAGE::English),
        }
    }

    /// Stopwords for a language code or name
    ///
    /// Supported languages: en, de, fr, es, it, pt, nl, sv, da, fi
    pub fn for_language(language: &str) -> Result<Self> {
        let lang = match language.to_lowercase().as_str() {
            "en" | "english" => LANGUAGE::English,
            "de" | "german" => LANGUAGE::German,
            "fr" | "french" => LANGUAGE::French,
            "es" | "spanish" => LANGUAGE::Spanish,
            "it" | "italian" => LANGUAGE::Italian,
            "pt" | "portuguese" => LANGUAGE::Portuguese,
            "nl" | "dutch" => LANGUAGE::Dutch,
            "sv" | "swedish" => LANGUAGE::Swedish,
            "da" | "danish" => LANGUAGE::Danish,
            "fi" | "finnish" => LANGUAGE::Finnish,
            other => {
                return Err(SocialMeterError::invalid_config(format!(
                    "no stopword list for language '{other}'"
                )))
            }
        };
        Ok(Self {
            stopwords: Self::load(lang),
        })
    }

    /// A custom list
    pub fn from_list<S: AsRef<str>>(words: &[S]) -> Self {
        Self {
            stopwords: words.iter().map(|w| w.as_ref().to_lowercase()).collect(),
        }
    }

    fn load(lang: LANGUAGE) -> FxHashSet<String> {
        get(lang).iter().map(|s| s.to_string()).collect()
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.stopwords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stopwords.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_stopwords() {
        let list = StopwordList::english();
        assert!(list.is_stopword("the"));
        assert!(list.is_stopword("The"));
        assert!(!list.is_stopword("sentiment"));
    }

    #[test]
    fn test_custom_list() {
        let list = StopwordList::from_list(&["RT", "via"]);
        assert!(list.is_stopword("rt"));
        assert!(list.is_stopword("Via"));
        assert!(!list.is_stopword("the"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_unknown_language() {
        assert!(StopwordList::for_language("de").is_ok());
        let err = StopwordList::for_language("klingon").unwrap_err();
        assert!(err.is_configuration());
    }
}

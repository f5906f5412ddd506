//! Concrete feature extractors.
//!
//! Every extractor is a pure `text → f64` function over the shared
//! [`Tokenizer`]; discretization happens in [`Feature`](super::Feature).

use std::sync::Arc;

use regex::Regex;

use crate::errors::Result;
use crate::nlp::{is_negation, EmoticonTable, SentimentLexicon, Tokenizer};
use crate::pipeline::traits::FeatureExtractor;

/// `#word` at the start of the text or after a non-word character.
pub(crate) const HASHTAG_PATTERN: &str = r"(^|\W)#([A-Za-z]+)";

// ─── Part-of-speech features ────────────────────────────────────────────────

/// Number of tokens tagged as adjectives.
#[derive(Debug, Clone, Default)]
pub struct AdjectiveCount {
    tokenizer: Tokenizer,
}

impl AdjectiveCount {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureExtractor for AdjectiveCount {
    fn name(&self) -> &str {
        "adjective_count"
    }

    fn extract(&self, text: &str) -> f64 {
        self.tokenizer
            .tokenize(text)
            .iter()
            .filter(|t| t.pos.is_adjective())
            .count() as f64
    }
}

/// Share of scored adjectives that are positive.
///
/// Adjectives the lexicon does not know are skipped; a score above zero
/// counts as positive and anything else as negative. Returns `0.0` when no
/// adjective is scored.
#[derive(Debug, Clone)]
pub struct AdjectiveRatio {
    tokenizer: Tokenizer,
    lexicon: Arc<dyn SentimentLexicon>,
}

impl AdjectiveRatio {
    pub fn new(lexicon: Arc<dyn SentimentLexicon>) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            lexicon,
        }
    }
}

impl FeatureExtractor for AdjectiveRatio {
    fn name(&self) -> &str {
        "adjective_ratio"
    }

    fn extract(&self, text: &str) -> f64 {
        let (mut pos, mut neg) = (0usize, 0usize);
        for token in self.tokenizer.tokenize(text) {
            if !token.pos.is_adjective() {
                continue;
            }
            match self.lexicon.polarity(&token.text) {
                Some(score) if score > 0.0 => pos += 1,
                Some(_) => neg += 1,
                None => {}
            }
        }
        let total = pos + neg;
        if total == 0 {
            0.0
        } else {
            pos as f64 / total as f64
        }
    }
}

// ─── Surface features ───────────────────────────────────────────────────────

/// Ratio of shouted words (two or more letters, all uppercase) to words.
#[derive(Debug, Clone, Default)]
pub struct ExcessiveCapitals {
    tokenizer: Tokenizer,
}

impl ExcessiveCapitals {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_shouted(word: &str) -> bool {
    let mut letters = 0;
    for c in word.chars().filter(|c| c.is_alphabetic()) {
        if !c.is_uppercase() {
            return false;
        }
        letters += 1;
    }
    letters >= 2
}

impl FeatureExtractor for ExcessiveCapitals {
    fn name(&self) -> &str {
        "excessive_capitals"
    }

    fn extract(&self, text: &str) -> f64 {
        let words = self.tokenizer.words(text);
        if words.is_empty() {
            return 0.0;
        }
        let shouted = words.iter().filter(|w| is_shouted(w)).count();
        shouted as f64 / words.len() as f64
    }
}

/// Number of runs of two or more consecutive punctuation tokens.
#[derive(Debug, Clone, Default)]
pub struct ExcessivePunctuation {
    tokenizer: Tokenizer,
}

impl ExcessivePunctuation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureExtractor for ExcessivePunctuation {
    fn name(&self) -> &str {
        "excessive_punctuation"
    }

    fn extract(&self, text: &str) -> f64 {
        let mut runs = 0usize;
        let mut current = 0usize;
        for token in self.tokenizer.tokenize(text) {
            if token.is_punctuation() {
                current += 1;
                continue;
            }
            if current > 1 {
                runs += 1;
            }
            current = 0;
        }
        if current > 1 {
            runs += 1;
        }
        runs as f64
    }
}

/// Number of `#hashtags`.
#[derive(Debug, Clone)]
pub struct HashtagCount {
    pattern: Regex,
}

impl HashtagCount {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(HASHTAG_PATTERN)?,
        })
    }
}

impl FeatureExtractor for HashtagCount {
    fn name(&self) -> &str {
        "hashtag_count"
    }

    fn extract(&self, text: &str) -> f64 {
        self.pattern.find_iter(text).count() as f64
    }
}

/// `1` when the text holds an odd number of negations, else `0`.
#[derive(Debug, Clone, Default)]
pub struct NegationParity {
    tokenizer: Tokenizer,
}

impl NegationParity {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureExtractor for NegationParity {
    fn name(&self) -> &str {
        "negation_parity"
    }

    fn extract(&self, text: &str) -> f64 {
        let negations = self
            .tokenizer
            .words(text)
            .iter()
            .filter(|w| is_negation(w))
            .count();
        (negations % 2) as f64
    }
}

/// Number of word tokens.
#[derive(Debug, Clone, Default)]
pub struct WordCount {
    tokenizer: Tokenizer,
}

impl WordCount {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureExtractor for WordCount {
    fn name(&self) -> &str {
        "word_count"
    }

    fn extract(&self, text: &str) -> f64 {
        self.tokenizer.words(text).len() as f64
    }
}

/// Sum of emoticon scores over whitespace-separated tokens.
#[derive(Debug, Clone)]
pub struct EmoticonSentiment {
    table: Arc<EmoticonTable>,
}

impl EmoticonSentiment {
    pub fn new(table: Arc<EmoticonTable>) -> Self {
        Self { table }
    }
}

impl FeatureExtractor for EmoticonSentiment {
    fn name(&self) -> &str {
        "emoticon_sentiment"
    }

    fn extract(&self, text: &str) -> f64 {
        text.split_whitespace()
            .filter_map(|tok| self.table.score(tok))
            .sum()
    }
}

//! Text transformers for the preprocess stage.
//!
//! Each transformer accepts either raw text or the token list produced by an
//! earlier transformer, so they can be chained in any order.

use std::sync::Arc;

use regex::{Captures, Regex};

use crate::errors::{Result, SocialMeterError};
use crate::nlp::{StopwordList, Tokenizer};
use crate::pipeline::traits::TextTransformer;
use crate::types::Value;

use super::extractors::HASHTAG_PATTERN;

const MENTION_PATTERN: &str = r"(^|\W)@([A-Za-z0-9_]+)";

/// Tokens of `input`: word tokens for text, the list itself for tokens.
fn words_of(tokenizer: &Tokenizer, input: &Value) -> Result<Vec<String>> {
    match input {
        Value::Text(s) => Ok(tokenizer.words(s)),
        Value::Tokens(t) => Ok(t.clone()),
        other => Err(SocialMeterError::data(format!(
            "expected text or tokens, found {other}"
        ))),
    }
}

/// Apply `f` to text, or to every token of a token list.
fn map_text(input: &Value, f: impl Fn(&str) -> String) -> Result<Value> {
    match input {
        Value::Text(s) => Ok(Value::Text(f(s))),
        Value::Tokens(t) => Ok(Value::Tokens(t.iter().map(|tok| f(tok)).collect())),
        other => Err(SocialMeterError::data(format!(
            "expected text or tokens, found {other}"
        ))),
    }
}

// ─── Symbol normalizers ─────────────────────────────────────────────────────

/// Rewrites `#funny` as `HT_FUNNY`.
#[derive(Debug, Clone)]
pub struct HashtagNormalizer {
    pattern: Regex,
}

impl HashtagNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(HASHTAG_PATTERN)?,
        })
    }
}

impl TextTransformer for HashtagNormalizer {
    fn name(&self) -> &str {
        "hashtag_normalizer"
    }

    fn transform(&self, input: &Value) -> Result<Value> {
        map_text(input, |s| {
            self.pattern
                .replace_all(s, |caps: &Captures| {
                    format!("{}HT_{}", &caps[1], caps[2].to_uppercase())
                })
                .into_owned()
        })
    }
}

/// Rewrites `@user` as `MN_USER`.
#[derive(Debug, Clone)]
pub struct MentionNormalizer {
    pattern: Regex,
}

impl MentionNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(MENTION_PATTERN)?,
        })
    }
}

impl TextTransformer for MentionNormalizer {
    fn name(&self) -> &str {
        "mention_normalizer"
    }

    fn transform(&self, input: &Value) -> Result<Value> {
        map_text(input, |s| {
            self.pattern
                .replace_all(s, |caps: &Captures| {
                    format!("{}MN_{}", &caps[1], caps[2].to_uppercase())
                })
                .into_owned()
        })
    }
}

// ─── Token producers ────────────────────────────────────────────────────────

/// Word n-grams joined by `_`.
#[derive(Debug, Clone)]
pub struct NGrams {
    n: usize,
    tokenizer: Tokenizer,
}

impl NGrams {
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(SocialMeterError::invalid_config("n-gram size must be >= 1"));
        }
        Ok(Self {
            n,
            tokenizer: Tokenizer::new(),
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }
}

impl TextTransformer for NGrams {
    fn name(&self) -> &str {
        "ngrams"
    }

    fn transform(&self, input: &Value) -> Result<Value> {
        let words = words_of(&self.tokenizer, input)?;
        Ok(Value::Tokens(
            words.windows(self.n).map(|w| w.join("_")).collect(),
        ))
    }
}

/// Drops stop words. Text stays text (re-joined by spaces), tokens stay
/// tokens.
#[derive(Debug, Clone)]
pub struct StopWordFilter {
    stopwords: Arc<StopwordList>,
}

impl StopWordFilter {
    pub fn new(stopwords: Arc<StopwordList>) -> Self {
        Self { stopwords }
    }
}

impl Default for StopWordFilter {
    fn default() -> Self {
        Self::new(Arc::new(StopwordList::english()))
    }
}

impl TextTransformer for StopWordFilter {
    fn name(&self) -> &str {
        "stop_word_filter"
    }

    fn transform(&self, input: &Value) -> Result<Value> {
        let keep = |w: &&str| !self.stopwords.is_stopword(w);
        match input {
            Value::Text(s) => Ok(Value::Text(
                s.split_whitespace().filter(keep).collect::<Vec<_>>().join(" "),
            )),
            Value::Tokens(t) => Ok(Value::Tokens(
                t.iter()
                    .map(String::as_str)
                    .filter(keep)
                    .map(str::to_owned)
                    .collect(),
            )),
            other => Err(SocialMeterError::data(format!(
                "expected text or tokens, found {other}"
            ))),
        }
    }
}

/// Splits text into word tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenizeTransform {
    tokenizer: Tokenizer,
}

impl TokenizeTransform {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextTransformer for TokenizeTransform {
    fn name(&self) -> &str {
        "tokenize"
    }

    fn transform(&self, input: &Value) -> Result<Value> {
        words_of(&self.tokenizer, input).map(Value::Tokens)
    }
}

/// Tags every token as `word/TAG`.
#[derive(Debug, Clone, Default)]
pub struct PosTagTransform {
    tokenizer: Tokenizer,
}

impl PosTagTransform {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextTransformer for PosTagTransform {
    fn name(&self) -> &str {
        "pos_tag"
    }

    fn transform(&self, input: &Value) -> Result<Value> {
        let tagged = match input {
            Value::Text(s) => self
                .tokenizer
                .tokenize(s)
                .into_iter()
                .map(|t| format!("{}/{}", t.text, t.pos.as_str()))
                .collect(),
            Value::Tokens(tokens) => tokens
                .iter()
                .map(|t| {
                    let tag = if t.chars().any(char::is_alphanumeric) {
                        self.tokenizer.guess_pos(t)
                    } else {
                        crate::types::PosTag::Punctuation
                    };
                    format!("{}/{}", t, tag.as_str())
                })
                .collect(),
            other => {
                return Err(SocialMeterError::data(format!(
                    "expected text or tokens, found {other}"
                )))
            }
        };
        Ok(Value::Tokens(tagged))
    }
}

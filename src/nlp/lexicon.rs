//! Word and emoticon sentiment tables.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use rustc_hash::FxHashMap;

use crate::errors::{Result, SocialMeterError};

/// Polarity lookup for single words.
pub trait SentimentLexicon: Send + Sync + std::fmt::Debug {
    /// `Some(score)` for a known word: positive above zero, negative
    /// otherwise. `None` when the word is not scored.
    fn polarity(&self, word: &str) -> Option<f64>;
}

/// Read `key<TAB>score` rows (or `key<TAB>pos<TAB>neg`, scored `pos - neg`).
fn read_scored_tsv<R: Read>(reader: R) -> Result<FxHashMap<String, f64>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut table = FxHashMap::default();
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let key = record.get(0).map(str::trim).unwrap_or_default();
        if key.is_empty() || key.starts_with("//") {
            continue;
        }
        let parse = |idx: usize| -> Result<f64> {
            let raw = record.get(idx).map(str::trim).unwrap_or_default();
            raw.parse::<f64>().map_err(|_| {
                SocialMeterError::corpus_row(line + 1, format!("score '{raw}' is not a number"))
            })
        };
        let score = match record.len() {
            0 | 1 => {
                return Err(SocialMeterError::corpus_row(
                    line + 1,
                    "expected a tab-separated score",
                ))
            }
            2 => parse(1)?,
            _ => parse(1)? - parse(2)?,
        };
        table.insert(key.to_string(), score);
    }
    Ok(table)
}

// ─── MemoryLexicon ──────────────────────────────────────────────────────────

/// In-memory, case-insensitive word lexicon.
#[derive(Debug, Clone, Default)]
pub struct MemoryLexicon {
    scores: FxHashMap<String, f64>,
}

impl MemoryLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(word, score)` pairs.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, f64)]) -> Self {
        Self {
            scores: pairs
                .iter()
                .map(|(w, s)| (w.as_ref().to_lowercase(), *s))
                .collect(),
        }
    }

    /// Load a TSV file of `word<TAB>score` or `word<TAB>pos<TAB>neg` rows.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let scores = read_scored_tsv(reader)?
            .into_iter()
            .map(|(w, s)| (w.to_lowercase(), s))
            .collect();
        Ok(Self { scores })
    }

    /// A small built-in list of common English opinion adjectives.
    pub fn basic_english() -> Self {
        const POSITIVE: &[&str] = &[
            "good", "great", "nice", "happy", "awesome", "amazing", "funny", "fun", "cool",
            "lovely", "beautiful", "best", "wonderful", "excellent", "fantastic", "pretty",
            "glad", "perfect", "brilliant", "delightful",
        ];
        const NEGATIVE: &[&str] = &[
            "bad", "sad", "terrible", "awful", "worst", "boring", "stupid", "ugly", "poor",
            "angry", "horrible", "dumb", "silly", "annoying", "useless", "hateful", "painful",
            "wrong", "disappointing", "miserable",
        ];
        let scores = POSITIVE
            .iter()
            .map(|w| (w.to_string(), 1.0))
            .chain(NEGATIVE.iter().map(|w| (w.to_string(), -1.0)))
            .collect();
        Self { scores }
    }

    pub fn insert(&mut self, word: &str, score: f64) {
        self.scores.insert(word.to_lowercase(), score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl SentimentLexicon for MemoryLexicon {
    fn polarity(&self, word: &str) -> Option<f64> {
        self.scores.get(&word.to_lowercase()).copied()
    }
}

// ─── EmoticonTable ──────────────────────────────────────────────────────────

/// Exact-match emoticon scores (`:)` → 1, `:(` → -1).
#[derive(Debug, Clone, Default)]
pub struct EmoticonTable {
    scores: FxHashMap<String, f64>,
}

impl EmoticonTable {
    /// Load a TSV file of `emoticon<TAB>score` rows.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(Self {
            scores: read_scored_tsv(reader)?,
        })
    }

    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, f64)]) -> Self {
        Self {
            scores: pairs
                .iter()
                .map(|(e, s)| (e.as_ref().to_string(), *s))
                .collect(),
        }
    }

    pub fn score(&self, emoticon: &str) -> Option<f64> {
        self.scores.get(emoticon).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

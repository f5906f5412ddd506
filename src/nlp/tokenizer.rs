//! Unicode-aware tokenization
//!
//! This module provides UAX #29 word segmentation tuned for short social
//! media posts: hashtags and mentions stay attached to their word,
//! contractions stay whole (`don't`), and punctuation is kept as one token
//! per character so runs like `!!!` can be counted.

use crate::types::{PosTag, Token};
use unicode_segmentation::UnicodeSegmentation;

/// A Unicode-aware tokenizer following UAX #29
#[derive(Debug, Clone)]
pub struct Tokenizer {
    /// Minimum word length to keep
    min_token_length: usize,
    /// Keep punctuation tokens in [`tokenize`](Self::tokenize) output
    keep_punctuation: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Create a new tokenizer with default settings
    pub fn new() -> Self {
        Self {
            min_token_length: 1,
            keep_punctuation: true,
        }
    }

    /// Set minimum word length
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_token_length = min_length;
        self
    }

    /// Drop punctuation tokens from the output
    pub fn without_punctuation(mut self) -> Self {
        self.keep_punctuation = false;
        self
    }

    /// Tokenize text into POS-tagged word and punctuation tokens.
    ///
    /// Whitespace is dropped, so two punctuation tokens separated only by
    /// spaces are adjacent in the output.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut pending_prefix: Option<(usize, char)> = None;

        for (start, segment) in text.split_word_bound_indices() {
            if segment.trim().is_empty() {
                self.flush_prefix(&mut pending_prefix, &mut tokens);
                continue;
            }

            if segment.chars().any(|c| c.is_alphanumeric()) {
                // Re-attach a `#`/`@` that directly precedes the word.
                let (word_start, word) = match pending_prefix.take() {
                    Some((p, c)) if p + c.len_utf8() == start => {
                        (p, &text[p..start + segment.len()])
                    }
                    other => {
                        pending_prefix = other;
                        self.flush_prefix(&mut pending_prefix, &mut tokens);
                        (start, segment)
                    }
                };
                if word.chars().count() < self.min_token_length {
                    continue;
                }
                let pos = self.guess_pos(word);
                tokens.push(Token::new(word, pos, word_start, start + segment.len()));
                continue;
            }

            self.flush_prefix(&mut pending_prefix, &mut tokens);
            let mut chars = segment.char_indices();
            while let Some((offset, c)) = chars.next() {
                let abs = start + offset;
                if (c == '#' || c == '@') && chars.as_str().is_empty() {
                    pending_prefix = Some((abs, c));
                    continue;
                }
                self.push_punct(&mut tokens, text, abs, c);
            }
        }
        self.flush_prefix(&mut pending_prefix, &mut tokens);

        tokens
    }

    fn flush_prefix(&self, pending: &mut Option<(usize, char)>, tokens: &mut Vec<Token>) {
        if let Some((abs, c)) = pending.take() {
            if self.keep_punctuation {
                let end = abs + c.len_utf8();
                tokens.push(Token::new(c.to_string(), PosTag::Punctuation, abs, end));
            }
        }
    }

    fn push_punct(&self, tokens: &mut Vec<Token>, text: &str, abs: usize, c: char) {
        if !self.keep_punctuation {
            return;
        }
        let end = abs + c.len_utf8();
        let pos = if c.is_ascii_punctuation() || is_unicode_punct(c) {
            PosTag::Punctuation
        } else {
            PosTag::Symbol
        };
        tokens.push(Token::new(&text[abs..end], pos, abs, end));
    }

    /// Word tokens only (no punctuation or symbols), as strings.
    pub fn words(&self, text: &str) -> Vec<String> {
        self.tokenize(text)
            .into_iter()
            .filter(|t| t.pos.is_word())
            .map(|t| t.text)
            .collect()
    }

    /// Basic heuristic POS tagging
    ///
    /// This is intentionally simple: suffix and closed-class lookups only.
    pub fn guess_pos(&self, word: &str) -> PosTag {
        let lower = word.to_lowercase();

        if let Some(pos) = self.function_word_pos(&lower) {
            return pos;
        }

        if lower.starts_with('#') || lower.starts_with('@') {
            return PosTag::ProperNoun;
        }

        // Numbers
        if word
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        {
            return PosTag::Numeral;
        }

        // Common adjective suffixes
        if lower.ends_with("ful")
            || lower.ends_with("less")
            || lower.ends_with("ous")
            || lower.ends_with("ive")
            || lower.ends_with("able")
            || lower.ends_with("ible")
            || lower.ends_with("al")
            || lower.ends_with("ic")
        {
            return PosTag::Adjective;
        }

        // Common verb suffixes
        if lower.ends_with("ing") || lower.ends_with("ed") || lower.ends_with("ize") {
            return PosTag::Verb;
        }

        // Common adverb suffix
        if lower.ends_with("ly") {
            return PosTag::Adverb;
        }

        // Capitalized mid-sentence words are usually names
        if word
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false)
            && word.chars().skip(1).all(|c| c.is_lowercase())
        {
            return PosTag::ProperNoun;
        }

        // Default to noun (most content words are nouns)
        PosTag::Noun
    }

    fn function_word_pos(&self, lower: &str) -> Option<PosTag> {
        let pos = match lower {
            // Determiners
            "a" | "an" | "the" | "this" | "that" | "these" | "those" | "my" | "your" | "his"
            | "her" | "its" | "our" | "their" | "some" | "any" | "each" | "every" | "no" => {
                PosTag::Determiner
            }
            // Conjunctions
            "and" | "or" | "but" | "nor" | "so" | "yet" | "if" | "because" | "while"
            | "though" | "although" | "when" | "unless" | "until" | "since" => PosTag::Conjunction,
            // Prepositions
            "of" | "to" | "in" | "for" | "on" | "with" | "at" | "from" | "by" | "about" | "as"
            | "into" | "like" | "through" | "after" | "over" | "between" | "out" | "against"
            | "during" | "without" | "before" | "under" | "around" | "among" => PosTag::Preposition,
            // Pronouns
            "i" | "you" | "he" | "she" | "it" | "we" | "they" | "me" | "him" | "us"
            | "them" | "myself" | "yourself" | "ourselves" | "themselves" => PosTag::Pronoun,
            // Auxiliaries
            "is" | "am" | "are" | "was" | "were" | "be" | "been" | "do" | "does" | "did"
            | "have" | "has" | "had" | "will" | "would" | "can" | "could" | "should" => {
                PosTag::Verb
            }
            // Very common adjectives the suffix rules miss
            "good" | "bad" | "great" | "nice" | "happy" | "sad" | "new" | "old" | "best"
            | "worst" | "awesome" | "terrible" | "awful" | "cool" | "fun" | "funny" | "poor"
            | "amazing" | "boring" | "loud" | "normal" | "wrong" | "right" | "ugly"
            | "pretty" | "lovely" | "angry" | "stupid" | "dumb" | "silly" | "little" | "big"
            | "small" | "sick" | "tired" | "sorry" | "glad" | "perfect" => PosTag::Adjective,
            // Interjections
            "lol" | "omg" | "wow" | "yay" | "ugh" | "oh" | "haha" => PosTag::Interjection,
            // Common particles
            "not" | "n't" => PosTag::Particle,
            _ => return None,
        };
        Some(pos)
    }
}

fn is_unicode_punct(c: char) -> bool {
    matches!(c,
        '\u{2010}'..='\u{2027}' |   // General Punctuation: dashes, quotes, ellipsis
        '\u{2030}'..='\u{205E}' |
        '\u{00A1}' | '\u{00BF}' |   // Inverted ! and ?
        '\u{3000}'..='\u{303F}'     // CJK Punctuation
    )
}

/// `true` for a negation token: `not`, `n't`, or a contraction ending in it.
pub fn is_negation(word: &str) -> bool {
    let lower = word.to_lowercase();
    lower == "not"
        || lower == "n't"
        || lower.ends_with("n't")
        || lower.ends_with("n\u{2019}t")
}

//! Core types for socialmeter
//!
//! This module defines the data that flows through a pipeline: the sum-typed
//! [`Value`], the ordered [`Schema`] of field names, and the schema-indexed
//! [`Item`] record that every stage reads from and writes to. It also holds
//! the token and part-of-speech types shared by the NLP helpers.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SocialMeterError};

/// Name of the raw text field. Always present in a [`Schema`].
pub const TEXT_FIELD: &str = "text";

/// Name of the classification field. Always present in a [`Schema`].
pub const CLASSIFICATION_FIELD: &str = "classification";

/// Feature-vector encoding of [`Value::NoMatch`].
pub const NO_MATCH_FEATURE: f64 = -1.0;

/// A raw input record as produced by input sources.
pub type Record = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Value
// ============================================================================

/// The value of one item field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Not written yet (or absent from the input record).
    #[default]
    Empty,
    /// A continuous feature value.
    Number(f64),
    /// A discrete label produced by a discretizer.
    Label(i64),
    Text(String),
    Tokens(Vec<String>),
    /// A discretizer had rules but none matched.
    NoMatch,
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Encode this value as one position of a feature vector.
    ///
    /// `Number` and `Label` encode as themselves and `NoMatch` as
    /// [`NO_MATCH_FEATURE`]; anything else is a data error.
    pub fn as_feature(&self) -> Result<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Label(l) => Ok(*l as f64),
            Value::NoMatch => Ok(NO_MATCH_FEATURE),
            other => Err(SocialMeterError::data(format!(
                "value {other} cannot be used as a feature"
            ))),
        }
    }

    /// Convert a JSON value from an input record.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => Value::Empty,
            Json::Bool(b) => Value::Number(if *b { 1.0 } else { 0.0 }),
            Json::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Empty),
            Json::String(s) => Value::Text(s.clone()),
            Json::Array(items) if items.iter().all(|v| v.is_string()) => Value::Tokens(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect(),
            ),
            other => Value::Text(other.to_string()),
        }
    }

    /// Convert to a plain JSON value for output.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Empty => Json::Null,
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Label(l) => Json::from(*l),
            Value::Text(s) => Json::String(s.clone()),
            Value::Tokens(t) => Json::Array(t.iter().cloned().map(Json::String).collect()),
            Value::NoMatch => Json::from(NO_MATCH_FEATURE as i64),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("<empty>"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Label(l) => write!(f, "{l}"),
            Value::Text(s) => f.write_str(s),
            Value::Tokens(t) => f.write_str(&t.join(" ")),
            Value::NoMatch => f.write_str("<no match>"),
        }
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Who owns a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Filled from the input record.
    Input,
    /// Written once by a preprocess or feature module.
    Derived,
    /// Written (and possibly overwritten) by the classifier.
    Classification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered, unique field names of an [`Item`].
///
/// A fresh schema holds `text` and `classification`; derived keys are
/// appended in module attachment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
    index: FxHashMap<String, usize>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    pub fn new() -> Self {
        let mut schema = Self {
            fields: Vec::new(),
            index: FxHashMap::default(),
        };
        schema.push(TEXT_FIELD, FieldKind::Input);
        schema.push(CLASSIFICATION_FIELD, FieldKind::Classification);
        schema
    }

    /// Add an extra field copied from input records (e.g. `id`, `user`).
    pub fn with_input_field(mut self, name: impl Into<String>) -> Result<Self> {
        self.add(name, FieldKind::Input)?;
        Ok(self)
    }

    /// Append a derived key. Fails with `DuplicateField` if it already exists.
    pub fn add_derived(&mut self, name: impl Into<String>) -> Result<usize> {
        self.add(name, FieldKind::Derived)
    }

    fn add(&mut self, name: impl Into<String>, kind: FieldKind) -> Result<usize> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(SocialMeterError::DuplicateField { field: name });
        }
        Ok(self.push(name, kind))
    }

    fn push(&mut self, name: impl Into<String>, kind: FieldKind) -> usize {
        let name = name.into();
        let idx = self.fields.len();
        self.index.insert(name.clone(), idx);
        self.fields.push(Field { name, kind });
        idx
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field names in schema order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Derived keys in attachment order.
    pub fn derived_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Derived)
            .map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Item
// ============================================================================

/// One unit of text plus its accumulated derived fields.
///
/// Values are stored by schema position. Derived fields are write-once;
/// the classification field is the only one that may be overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Item {
    /// An item with every field `Empty`.
    pub fn empty(schema: Arc<Schema>) -> Self {
        let values = vec![Value::Empty; schema.len()];
        Self { schema, values }
    }

    /// Normalize a raw record against `schema`.
    ///
    /// Input fields are copied from the record, keys the schema does not
    /// declare are dropped, and everything else starts `Empty`.
    pub fn from_record(schema: Arc<Schema>, record: &Record) -> Self {
        let mut item = Self::empty(schema);
        for (idx, field) in item.schema.fields.iter().enumerate() {
            if field.kind != FieldKind::Input {
                continue;
            }
            if let Some(raw) = record.get(&field.name) {
                item.values[idx] = Value::from_json(raw);
            }
        }
        item
    }

    /// An item whose only non-empty field is `text`.
    pub fn with_text(schema: Arc<Schema>, text: impl Into<String>) -> Self {
        let mut item = Self::empty(schema);
        if let Some(idx) = item.schema.position(TEXT_FIELD) {
            item.values[idx] = Value::Text(text.into());
        }
        item
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Value of `name`, or `None` if the schema does not declare it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.position(name).map(|idx| &self.values[idx])
    }

    pub fn get_at(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// The raw `text` field, if it holds text.
    pub fn text(&self) -> Option<&str> {
        self.get(TEXT_FIELD).and_then(Value::as_text)
    }

    /// Field `name` rendered as text: tokens are joined by spaces, `Empty`
    /// and non-text values yield `None`.
    pub fn text_at(&self, name: &str) -> Option<Cow<'_, str>> {
        match self.get(name)? {
            Value::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Tokens(t) => Some(Cow::Owned(t.join(" "))),
            _ => None,
        }
    }

    pub fn classification(&self) -> &Value {
        self.get(CLASSIFICATION_FIELD).unwrap_or(&Value::Empty)
    }

    /// Write a derived field exactly once.
    pub fn set_derived(&mut self, name: &str, value: Value) -> Result<()> {
        let idx = self.writable(name, FieldKind::Derived)?;
        if !self.values[idx].is_empty() {
            return Err(SocialMeterError::FieldConflict {
                field: name.to_string(),
            });
        }
        self.values[idx] = value;
        Ok(())
    }

    /// Fill an input field that arrived empty (e.g. a placeholder `text`).
    pub fn fill_input(&mut self, name: &str, value: Value) -> Result<()> {
        let idx = self.writable(name, FieldKind::Input)?;
        if !self.values[idx].is_empty() {
            return Err(SocialMeterError::FieldConflict {
                field: name.to_string(),
            });
        }
        self.values[idx] = value;
        Ok(())
    }

    /// Write (or overwrite) the classification field.
    pub fn set_classification(&mut self, value: Value) -> Result<()> {
        let idx = self.writable(CLASSIFICATION_FIELD, FieldKind::Classification)?;
        self.values[idx] = value;
        Ok(())
    }

    fn writable(&self, name: &str, kind: FieldKind) -> Result<usize> {
        let idx = self
            .schema
            .position(name)
            .ok_or_else(|| SocialMeterError::UnknownField {
                field: name.to_string(),
            })?;
        if self.schema.fields[idx].kind != kind {
            return Err(SocialMeterError::FieldConflict {
                field: name.to_string(),
            });
        }
        Ok(idx)
    }

    /// `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.schema.keys().zip(self.values.iter())
    }

    /// Render as a JSON object in schema order.
    pub fn into_map(self) -> Record {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect()
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// Part-of-speech tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PosTag {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Determiner,
    Preposition,
    Conjunction,
    Interjection,
    Numeral,
    Particle,
    Punctuation,
    Symbol,
    ProperNoun,
    Other,
}

impl PosTag {
    pub fn is_adjective(&self) -> bool {
        matches!(self, PosTag::Adjective)
    }

    pub fn is_word(&self) -> bool {
        !matches!(self, PosTag::Punctuation | PosTag::Symbol)
    }

    /// Universal-dependencies style tag string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PosTag::Noun => "NOUN",
            PosTag::Verb => "VERB",
            PosTag::Adjective => "ADJ",
            PosTag::Adverb => "ADV",
            PosTag::Pronoun => "PRON",
            PosTag::Determiner => "DET",
            PosTag::Preposition => "ADP",
            PosTag::Conjunction => "CCONJ",
            PosTag::Interjection => "INTJ",
            PosTag::Numeral => "NUM",
            PosTag::Particle => "PART",
            PosTag::Punctuation => "PUNCT",
            PosTag::Symbol => "SYM",
            PosTag::ProperNoun => "PROPN",
            PosTag::Other => "X",
        }
    }
}

/// A token from the input text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The surface form (original text)
    pub text: String,
    /// Part-of-speech tag
    pub pos: PosTag,
    /// Byte offset (start) in original text
    pub start: usize,
    /// Byte offset (end) in original text
    pub end: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, pos: PosTag, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            pos,
            start,
            end,
        }
    }

    pub fn is_punctuation(&self) -> bool {
        self.pos == PosTag::Punctuation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_with(keys: &[&str]) -> Arc<Schema> {
        let mut schema = Schema::new();
        for k in keys {
            schema.add_derived(*k).unwrap();
        }
        Arc::new(schema)
    }

    #[test]
    fn test_schema_always_has_text_and_classification() {
        let schema = Schema::new();
        let keys: Vec<&str> = schema.keys().collect();
        assert_eq!(keys, vec![TEXT_FIELD, CLASSIFICATION_FIELD]);
    }

    #[test]
    fn test_schema_rejects_duplicate_key() {
        let mut schema = Schema::new();
        schema.add_derived("wordcount").unwrap();
        let err = schema.add_derived("wordcount").unwrap_err();
        assert_eq!(
            err,
            SocialMeterError::DuplicateField {
                field: "wordcount".into()
            }
        );
        assert!(Schema::new().add_derived(TEXT_FIELD).is_err());
    }

    #[test]
    fn test_derived_keys_keep_attachment_order() {
        let schema = schema_with(&["b", "a", "c"]);
        let keys: Vec<&str> = schema.derived_keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_normalize_drops_unknown_and_fills_empty() {
        let schema = Arc::new(Schema::new().with_input_field("user").unwrap());
        let record: Record = serde_json::from_str(r#"{"text": "hi", "junk": 3}"#).unwrap();
        let item = Item::from_record(schema, &record);
        assert_eq!(item.text(), Some("hi"));
        assert_eq!(item.get("user"), Some(&Value::Empty));
        assert_eq!(item.get("junk"), None);
    }

    #[test]
    fn test_derived_field_is_write_once() {
        let mut item = Item::with_text(schema_with(&["wc"]), "a b");
        item.set_derived("wc", Value::Number(2.0)).unwrap();
        let err = item.set_derived("wc", Value::Number(3.0)).unwrap_err();
        assert!(matches!(err, SocialMeterError::FieldConflict { .. }));
        assert_eq!(item.get("wc"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_unknown_field_write_fails() {
        let mut item = Item::with_text(schema_with(&[]), "x");
        let err = item.set_derived("nope", Value::Number(1.0)).unwrap_err();
        assert!(matches!(err, SocialMeterError::UnknownField { .. }));
    }

    #[test]
    fn test_classification_may_be_overwritten() {
        let mut item = Item::with_text(schema_with(&[]), "x");
        item.set_classification(Value::Text("pos".into())).unwrap();
        item.set_classification(Value::Text("neg".into())).unwrap();
        assert_eq!(item.classification(), &Value::Text("neg".into()));
    }

    #[test]
    fn test_text_at_joins_tokens() {
        let mut item = Item::with_text(schema_with(&["toks"]), "x");
        item.set_derived("toks", Value::Tokens(vec!["a".into(), "b".into()]))
            .unwrap();
        assert_eq!(item.text_at("toks").as_deref(), Some("a b"));
        assert_eq!(item.text_at(CLASSIFICATION_FIELD), None);
    }

    #[test]
    fn test_feature_encoding() {
        assert_eq!(Value::Number(0.5).as_feature().unwrap(), 0.5);
        assert_eq!(Value::Label(2).as_feature().unwrap(), 2.0);
        assert_eq!(Value::NoMatch.as_feature().unwrap(), NO_MATCH_FEATURE);
        assert!(Value::Text("x".into()).as_feature().is_err());
        assert!(Value::Empty.as_feature().is_err());
    }

    #[test]
    fn test_into_map_uses_schema_order() {
        let mut item = Item::with_text(schema_with(&["wc"]), "a b");
        item.set_derived("wc", Value::Label(1)).unwrap();
        let map = item.into_map();
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(map["wc"], serde_json::json!(1));
        assert_eq!(map["text"], serde_json::json!("a b"));
    }
}

//! Labeled training corpora.
//!
//! The file format is a header line followed by comma-delimited rows with
//! the label in field 1 and the raw text in field 3. Fields follow CSV
//! quoting (`"..."`, `""` escapes). Unquoted text containing commas spills
//! into later fields; those are re-joined.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SocialMeterError};

const LABEL_COLUMN: usize = 1;
const TEXT_COLUMN: usize = 3;

/// Parallel lists of texts and their labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    texts: Vec<String>,
    labels: Vec<String>,
}

impl Corpus {
    pub fn new(texts: Vec<String>, labels: Vec<String>) -> Result<Self> {
        if texts.len() != labels.len() {
            return Err(SocialMeterError::data(format!(
                "{} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }
        Ok(Self { texts, labels })
    }

    /// Build from `(label, text)` pairs.
    pub fn from_pairs<L, T>(pairs: &[(L, T)]) -> Self
    where
        L: AsRef<str>,
        T: AsRef<str>,
    {
        let (labels, texts) = pairs
            .iter()
            .map(|(l, t)| (l.as_ref().to_string(), t.as_ref().to_string()))
            .unzip();
        Self { texts, labels }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|e| SocialMeterError::io(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a corpus. Rows short of the text column are errors, not skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut corpus = Self::default();
        for result in rdr.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            if record.len() <= TEXT_COLUMN {
                return Err(SocialMeterError::corpus_row(
                    line,
                    format!(
                        "expected at least {} fields, found {}",
                        TEXT_COLUMN + 1,
                        record.len()
                    ),
                ));
            }
            let label = record[LABEL_COLUMN].trim();
            if label.is_empty() {
                return Err(SocialMeterError::corpus_row(line, "empty label"));
            }
            let text = record
                .iter()
                .skip(TEXT_COLUMN)
                .collect::<Vec<_>>()
                .join(",");
            corpus.push(label, text.trim());
        }
        Ok(corpus)
    }

    pub fn push(&mut self, label: impl Into<String>, text: impl Into<String>) {
        self.labels.push(label.into());
        self.texts.push(text.into());
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Self {
        let (texts, labels) = indices
            .iter()
            .filter_map(|&i| Some((self.texts.get(i)?.clone(), self.labels.get(i)?.clone())))
            .unzip();
        Self { texts, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ItemID,Sentiment,SentimentSource,SentimentText\n\
                          1,0,Sentiment140,is so sad for my APL friend\n\
                          2,1,Sentiment140,\"  omg, its already 7:30 :O  \"\n";

    #[test]
    fn test_reads_label_and_text_columns() {
        let corpus = Corpus::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.labels(), &["0".to_string(), "1".to_string()]);
        assert_eq!(corpus.texts()[0], "is so sad for my APL friend");
        assert_eq!(corpus.texts()[1], "omg, its already 7:30 :O");
    }

    #[test]
    fn test_quoted_fields_are_unescaped() {
        let data = "a,b,c,d\n1,\"0\",src,\"he said \"\"hi\"\"\"\n2,1,src,plain, with a comma\n";
        let corpus = Corpus::from_reader(data.as_bytes()).unwrap();
        assert_eq!(corpus.labels(), &["0".to_string(), "1".to_string()]);
        assert_eq!(corpus.texts()[0], "he said \"hi\"");
        assert_eq!(corpus.texts()[1], "plain, with a comma");
    }

    #[test]
    fn test_short_row_is_surfaced() {
        let data = "a,b,c,d\n1,0,src,fine\n2,1\n";
        match Corpus::from_reader(data.as_bytes()).unwrap_err() {
            SocialMeterError::CorpusRow { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_header_only_is_empty() {
        let corpus = Corpus::from_reader("a,b,c,d\n".as_bytes()).unwrap();
        assert!(corpus.is_empty());
    }

    #[test]
    fn test_mismatched_lengths() {
        assert!(Corpus::new(vec!["x".into()], Vec::new()).unwrap_err().is_data());
    }

    #[test]
    fn test_subset_keeps_pairs() {
        let corpus = Corpus::from_pairs(&[("0", "a"), ("1", "b"), ("0", "c")]);
        let sub = corpus.subset(&[2, 0]);
        assert_eq!(sub.texts(), &["c".to_string(), "a".to_string()]);
        assert_eq!(sub.labels(), &["0".to_string(), "0".to_string()]);
    }
}

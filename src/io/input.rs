//! Input sources.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{Result, SocialMeterError};
use crate::pipeline::traits::{InputSource, Intake};
use crate::types::{Record, TEXT_FIELD};

/// Fields used as `text` when a record has none, in order of preference.
const TEXT_ALIASES: &[&str] = &["message", "story"];

/// Copy the first alias into `text` if the record lacks it.
pub fn fill_text_alias(record: &mut Record) {
    if record.contains_key(TEXT_FIELD) {
        return;
    }
    if let Some(value) = TEXT_ALIASES.iter().find_map(|k| record.get(*k)).cloned() {
        record.insert(TEXT_FIELD.to_string(), value);
    }
}

/// Replays a fixed list of records.
///
/// The records are kept, so the same source can be started repeatedly.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<Record>,
}

impl MemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// One record per text, each with only a `text` field.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let records = texts
            .iter()
            .map(|t| {
                let mut r = Record::new();
                r.insert(
                    TEXT_FIELD.to_string(),
                    serde_json::Value::String(t.as_ref().to_string()),
                );
                r
            })
            .collect();
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl InputSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn start(&mut self, intake: Intake) -> Result<()> {
        for record in &self.records {
            let mut record = record.clone();
            fill_text_alias(&mut record);
            if !intake.send(record) {
                debug!("pipeline stopped receiving");
                break;
            }
        }
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn InputSource> {
        Box::new(self.clone())
    }
}

/// Reads newline-delimited JSON objects from a file.
///
/// Blank lines are ignored and lines that are not JSON objects are skipped
/// with a warning.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputSource for JsonLinesSource {
    fn name(&self) -> &str {
        "json_lines"
    }

    fn start(&mut self, intake: Intake) -> Result<()> {
        let file = File::open(&self.path)
            .map_err(|e| SocialMeterError::io(format!("{}: {e}", self.path.display())))?;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut record: Record = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(err) => {
                    warn!(line = index + 1, error = %err, "skipping malformed record");
                    continue;
                }
            };
            fill_text_alias(&mut record);
            if !intake.send(record) {
                debug!("pipeline stopped receiving");
                break;
            }
        }
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn InputSource> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc;

    fn collect(source: &mut dyn InputSource) -> Vec<Record> {
        let (tx, rx) = mpsc::channel();
        source.start(Intake::new(tx)).unwrap();
        rx.into_iter().collect()
    }

    #[test]
    fn test_memory_source_replays() {
        let mut source = MemorySource::from_texts(&["a", "b"]);
        assert_eq!(collect(&mut source).len(), 2);
        assert_eq!(collect(&mut source).len(), 2);
    }

    #[test]
    fn test_text_alias_fill() {
        let mut r: Record = serde_json::from_str(r#"{"story": "went out", "id": 3}"#).unwrap();
        fill_text_alias(&mut r);
        assert_eq!(r["text"], "went out");

        let mut r: Record =
            serde_json::from_str(r#"{"text": "kept", "message": "ignored"}"#).unwrap();
        fill_text_alias(&mut r);
        assert_eq!(r["text"], "kept");
    }

    #[test]
    fn test_json_lines_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text": "first"}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"message": "second"}}"#).unwrap();
        writeln!(file, "[1, 2]").unwrap();
        file.flush().unwrap();

        let mut source = JsonLinesSource::new(file.path());
        let records = collect(&mut source);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["text"], "second");
    }

    #[test]
    fn test_json_lines_missing_file() {
        let mut source = JsonLinesSource::new("/definitely/not/here.jsonl");
        let (tx, _rx) = mpsc::channel();
        let err = source.start(Intake::new(tx)).unwrap_err();
        assert!(matches!(err, SocialMeterError::Io { .. }));
    }
}

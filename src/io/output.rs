//! Output sinks.
//!
//! | Sink | Returns item | Effect |
//! |------|--------------|--------|
//! | [`DictFormatSink`] | yes | guarantees a `text` field |
//! | [`ConsoleSink`] | yes | prints `[classification] text` |
//! | [`CollectSink`] | yes | stores a copy in shared memory |
//! | [`CsvSink`] | no | appends `(text, classification)` rows |

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{Result, SocialMeterError};
use crate::pipeline::traits::Sink;
use crate::types::{Item, Value, TEXT_FIELD};

/// Placeholder written when an item reaches the output without text.
pub const MISSING_TEXT: &str = "(text not found)";

/// Ensures every item carries a `text` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct DictFormatSink;

impl DictFormatSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for DictFormatSink {
    fn name(&self) -> &str {
        "dict_format"
    }

    fn consume(&mut self, mut item: Item) -> Result<Option<Item>> {
        if item.get(TEXT_FIELD).map_or(true, Value::is_empty) {
            item.fill_input(TEXT_FIELD, Value::Text(MISSING_TEXT.to_string()))?;
        }
        Ok(Some(item))
    }

    fn boxed_clone(&self) -> Box<dyn Sink> {
        Box::new(*self)
    }
}

/// Prints one line per item to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    /// `[classification] text`
    pub fn format(item: &Item) -> String {
        format!("[{}] {}", item.classification(), item.text().unwrap_or(""))
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn consume(&mut self, item: Item) -> Result<Option<Item>> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", Self::format(&item))?;
        Ok(Some(item))
    }

    fn boxed_clone(&self) -> Box<dyn Sink> {
        Box::new(*self)
    }
}

/// Stores a copy of every item. Clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    items: Arc<Mutex<Vec<Item>>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Item>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the collected items.
    pub fn items(&self) -> Vec<Item> {
        self.lock().clone()
    }

    /// Drain the collected items.
    pub fn take(&self) -> Vec<Item> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Sink for CollectSink {
    fn name(&self) -> &str {
        "collect"
    }

    fn consume(&mut self, item: Item) -> Result<Option<Item>> {
        self.lock().push(item.clone());
        Ok(Some(item))
    }

    fn boxed_clone(&self) -> Box<dyn Sink> {
        Box::new(self.clone())
    }
}

/// Appends `(text, classification)` rows to a CSV file and consumes items.
///
/// The file is opened on first use; a header is written if it is empty.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| SocialMeterError::io(format!("{}: {e}", self.path.display())))?;
            let is_new = file.metadata()?.len() == 0;
            let mut writer = csv::Writer::from_writer(file);
            if is_new {
                writer.write_record([TEXT_FIELD, "classification"])?;
            }
            self.writer = Some(writer);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| SocialMeterError::internal("csv writer missing after open"))
    }
}

impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn consume(&mut self, item: Item) -> Result<Option<Item>> {
        let text = item.text().unwrap_or("").to_string();
        let classification = item.classification().to_string();
        let writer = self.writer()?;
        writer.write_record([text.as_str(), classification.as_str()])?;
        writer.flush()?;
        Ok(None)
    }

    fn boxed_clone(&self) -> Box<dyn Sink> {
        Box::new(Self::new(self.path.clone()))
    }
}

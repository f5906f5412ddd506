//! External collaborators: training corpora, credentials, input sources
//! and output sinks.

pub mod corpus;
pub mod credentials;
pub mod input;
pub mod output;

pub use corpus::Corpus;
pub use credentials::{
    load_credentials, parse_credentials, Credentials, GraphCredentials, TwitterCredentials,
};
pub use input::{fill_text_alias, JsonLinesSource, MemorySource};
pub use output::{CollectSink, ConsoleSink, CsvSink, DictFormatSink, MISSING_TEXT};

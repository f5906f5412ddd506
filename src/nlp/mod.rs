//! NLP primitives shared by feature extractors and text transformers.

pub mod lexicon;
pub mod stopwords;
pub mod tokenizer;

pub use lexicon::{EmoticonTable, MemoryLexicon, SentimentLexicon};
pub use stopwords::StopwordList;
pub use tokenizer::{is_negation, Tokenizer};

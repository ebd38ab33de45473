//! Record store parsing and data source handling.

mod parser;
mod source;

pub use parser::{Parser, ParserConfig};
pub use source::{Record, RecordSet, SourceMetadata};

//! Extracting source collections into the intermediate file

mod collections;
mod source;

pub use collections::CollectionExtractor;
pub use source::{DocumentCursor, DocumentSource};

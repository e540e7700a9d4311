//! Core ETL (Extract, Transform, Load) abstractions
//!
//! Each migration stage is assembled from these traits: a reader that
//! extracts records, a transformer that reshapes them, and a writer that
//! loads them into the next file or the target table.

mod extract;
mod load;
mod pipeline;
mod transform;

pub use extract::Extractor;
pub use load::Loader;
pub use pipeline::{Pipeline, PipelineSummary};
pub use transform::{IdentityTransformer, Transformer};

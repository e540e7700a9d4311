//! Reshaping source documents into target records
//!
//! The transform stage reads `extracted_data.json`, applies a
//! [`FieldMapping`] through [`RecordReshaper`], and writes the results with
//! [`TransformOutputWriter`].

mod mapping;
mod record;
mod reshaper;
mod writer;

pub use mapping::{FieldMapping, PromotedFields, UnknownDiscriminatorPolicy};
pub use record::{Reshaped, TransformError, TransformedRecord};
pub use reshaper::RecordReshaper;
pub use writer::TransformOutputWriter;

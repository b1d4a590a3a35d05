//! Normalization of document-database values into plain table cells
//!
//! Two steps run on every loaded table:
//!
//! - **extraction** removes a designated nested column and materializes
//!   it as a table of its own
//! - **conversion** rewrites object-id, date and cross-reference columns
//!   cell by cell, leaving unrecognized shapes untouched

pub mod encoded;
pub mod extract;
pub mod rules;

pub use encoded::{EncodedValue, Shape};
pub use extract::{ExtractConfig, ExtractMode, Extractor};
pub use rules::{normalize, NormalizeRules, Rule};

//! # Docflat - Document Export Flattening
//!
//! Turns gzip-compressed, newline-delimited JSON exports from a document
//! database into flat tables.
//!
//! ## Modules
//!
//! - **loader**: read an export into a [`Table`], falling back to
//!   line-by-line parsing when the file has stray header lines or bad rows
//! - **normalize**: collapse `$oid`, `$date` and `$id`/`$ref` wrappers and
//!   split nested columns into their own tables
//! - **pipeline**: load, extract and normalize per configured source
//!
//! ## Quick Start
//!
//! ```rust
//! use docflat::loader::load_bytes;
//! use docflat::normalize::{normalize, NormalizeRules};
//! use docflat::Cell;
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let content = b"users.json.gz\n{\"_id\":{\"$oid\":\"abc123\"}}\n{\"_id\":{\"$oid\":\"def456\"}}\n";
//! let table = load_bytes("users", "users.json", content).table;
//! let table = normalize(table, &NormalizeRules::default())?;
//!
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.get(0, "_id"), Some(&Cell::Json(json!("abc123"))));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod types;
pub mod writer;

// Re-export commonly used types for convenience
pub use config::{PipelineConfig, SourceConfig};
pub use error::{ConfigError, LoadError, NormalizeError, PipelineError};
pub use loader::{load, load_table, LoadReport, LoadStrategy};
pub use normalize::{normalize, EncodedValue, ExtractConfig, ExtractMode, Extractor, NormalizeRules};
pub use pipeline::{Pipeline, PipelineOutput};
pub use types::{Cell, CellKind, CrossRef, Record, Table};

/// Main entry point: run one source file through the pipeline
pub fn process_source(source: &SourceConfig, config: &PipelineConfig) -> error::Result<PipelineOutput> {
    Pipeline::new(config).run_source(source)
}

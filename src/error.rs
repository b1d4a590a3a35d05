use std::path::PathBuf;
use thiserror::Error;

/// Failure to read a source file at all. Malformed lines never end up here.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read source {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A rule met a cell already rewritten into some other kind
    #[error("column '{column}' row {row}: expected {expected} input, found {found} cell")]
    StructuralMismatch {
        column: String,
        row: usize,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("normalizing '{table}': {source}")]
    Normalize {
        table: String,
        #[source]
        source: NormalizeError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

use crate::error::ConfigError;
use crate::loader::{base_name, table_name};
use crate::normalize::{ExtractConfig, NormalizeRules};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One input file and how to split it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Table name, e.g. "receipts"
    pub name: String,

    /// Path to the gzip-compressed export
    pub path: PathBuf,

    /// Nested column to pull out into its own table
    #[serde(default)]
    pub nested_column: Option<String>,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        SourceConfig {
            name: name.into(),
            path: path.into(),
            nested_column: None,
        }
    }

    pub fn with_nested_column(mut self, column: impl Into<String>) -> Self {
        self.nested_column = Some(column.into());
        self
    }

    /// The receipts, users and brands exports under `data_dir`
    pub fn defaults_in<P: AsRef<Path>>(data_dir: P) -> Vec<SourceConfig> {
        let dir = data_dir.as_ref();
        vec![
            SourceConfig::new("receipts", dir.join("receipts.json.gz")).with_nested_column("rewardsReceiptItemList"),
            SourceConfig::new("users", dir.join("users.json.gz")),
            SourceConfig::new("brands", dir.join("brands.json.gz")).with_nested_column("cpg"),
        ]
    }

    /// Config for an arbitrary file, named after its base name.
    ///
    /// If a default source carries the same name, its nested column is reused.
    pub fn for_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let base = base_name(path);
        let name = table_name(&base).to_string();
        let nested_column = SourceConfig::defaults_in("")
            .into_iter()
            .find(|s| s.name == name)
            .and_then(|s| s.nested_column);

        SourceConfig {
            name,
            path: path.to_path_buf(),
            nested_column,
        }
    }
}

/// Everything the pipeline needs, loadable from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub rules: NormalizeRules,
    pub extract: ExtractConfig,
    pub sources: Vec<SourceConfig>,
}

pub const DEFAULT_DATA_DIR: &str = "data/input_data";

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            rules: NormalizeRules::default(),
            extract: ExtractConfig::default(),
            sources: SourceConfig::defaults_in(DEFAULT_DATA_DIR),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file; omitted fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ExtractMode;

    #[test]
    fn test_default_sources() {
        let config = PipelineConfig::default();
        let names: Vec<&str> = config.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["receipts", "users", "brands"]);
        assert_eq!(config.sources[0].path, Path::new("data/input_data/receipts.json.gz"));
        assert_eq!(config.sources[2].nested_column.as_deref(), Some("cpg"));
        assert_eq!(config.rules.oid_columns, vec!["_id", "userId", "brand_id"]);
        assert_eq!(config.rules.date_columns.len(), 7);
    }

    #[test]
    fn test_for_path_reuses_known_nested_column() {
        let source = SourceConfig::for_path("/tmp/exports/receipts.json.gz");
        assert_eq!(source.name, "receipts");
        assert_eq!(source.nested_column.as_deref(), Some("rewardsReceiptItemList"));

        let other = SourceConfig::for_path("events.json.gz");
        assert_eq!(other.name, "events");
        assert_eq!(other.nested_column, None);
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docflat.json");
        std::fs::write(
            &path,
            r#"{
                "rules": {"date_columns": ["createdAt"]},
                "extract": {"mode": "explode"},
                "sources": [{"name": "events", "path": "events.json.gz"}]
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.rules.date_columns, vec!["createdAt"]);
        assert_eq!(config.rules.oid_columns, vec!["_id", "userId", "brand_id"]);
        assert_eq!(config.extract.mode, ExtractMode::Explode);
        assert!(config.extract.include_parent_ids);
        assert_eq!(config.sources, vec![SourceConfig::new("events", "events.json.gz")]);
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PipelineConfig::from_file(&path), Err(ConfigError::Parse { .. })));
    }
}

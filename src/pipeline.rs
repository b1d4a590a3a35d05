use crate::config::{PipelineConfig, SourceConfig};
use crate::error::{PipelineError, Result};
use crate::loader;
use crate::normalize::{Extractor, NormalizeRules};
use crate::types::Table;
use tracing::info;

/// The tables produced from one source file
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub primary: Table,
    /// The extracted nested column, if the source has one configured and present
    pub extracted: Option<Table>,
}

impl PipelineOutput {
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        std::iter::once(&self.primary).chain(self.extracted.as_ref())
    }
}

/// Load, extract and normalize source files
pub struct Pipeline {
    rules: NormalizeRules,
    extractor: Extractor,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Pipeline {
            rules: config.rules.clone(),
            extractor: Extractor::new(config.extract.clone()),
        }
    }

    pub fn run_source(&self, source: &SourceConfig) -> Result<PipelineOutput> {
        let mut primary = loader::load(&source.path)?.table;
        primary.name = source.name.clone();

        let extracted = source
            .nested_column
            .as_deref()
            .and_then(|column| self.extractor.extract(&mut primary, column));

        let primary = self.normalize(primary)?;
        let extracted = extracted.map(|table| self.normalize(table)).transpose()?;

        info!(
            source = %source.name,
            rows = primary.len(),
            extracted_rows = ?extracted.as_ref().map(Table::len),
            "Normalized source"
        );

        Ok(PipelineOutput { primary, extracted })
    }

    /// Run every source in order; one failure does not stop the others
    pub fn run_all<'a>(
        &self,
        sources: &'a [SourceConfig],
    ) -> Vec<(&'a SourceConfig, Result<PipelineOutput>)> {
        sources
            .iter()
            .map(|source| (source, self.run_source(source)))
            .collect()
    }

    fn normalize(&self, mut table: Table) -> Result<Table> {
        self.rules
            .apply(&mut table)
            .map_err(|source| PipelineError::Normalize {
                table: table.name.clone(),
                source,
            })?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::write_gz;
    use crate::normalize::{ExtractConfig, ExtractMode};
    use crate::types::{Cell, CrossRef};
    use serde_json::json;

    #[test]
    fn test_users_with_header_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gz(
            dir.path(),
            "users.json.gz",
            "users.json.gz\n{\"_id\":{\"$oid\":\"abc123\"}}\n{\"_id\":{\"$oid\":\"def456\"}}\n",
        );

        let pipeline = Pipeline::new(&PipelineConfig::default());
        let output = pipeline.run_source(&SourceConfig::for_path(&path)).unwrap();

        assert!(output.extracted.is_none());
        let ids: Vec<_> = output.primary.column_values("_id").collect();
        assert_eq!(ids, vec![Some(&Cell::Json(json!("abc123"))), Some(&Cell::Json(json!("def456")))]);
    }

    #[test]
    fn test_brands_cpg_is_extracted_and_converted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gz(
            dir.path(),
            "brands.json.gz",
            concat!(
                "{\"_id\":{\"$oid\":\"b1\"},\"name\":\"A\",\"cpg\":{\"$id\":{\"$oid\":\"c1\"},\"$ref\":\"Cogs\"}}\n",
                "{\"_id\":{\"$oid\":\"b2\"},\"name\":\"B\",\"cpg\":{\"$id\":{\"$oid\":\"c2\"},\"$ref\":\"Cpgs\"}}\n",
            ),
        );

        let pipeline = Pipeline::new(&PipelineConfig::default());
        let output = pipeline.run_source(&SourceConfig::for_path(&path)).unwrap();

        assert!(!output.primary.has_column("cpg"));
        let cpg = output.extracted.unwrap();
        assert_eq!(cpg.name, "brands_cpg");
        assert_eq!(cpg.get(0, "cpg").and_then(Cell::as_reference), Some(&CrossRef::new("c1", "Cogs")));
        assert_eq!(cpg.get(1, "_parent_id"), Some(&Cell::Json(json!("b2"))));
        assert_eq!(
            cpg.value_counts("cpg", Some("ref_collection")),
            vec![("Cogs".to_string(), 1), ("Cpgs".to_string(), 1)]
        );
    }

    #[test]
    fn test_receipts_items_exploded_and_dated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gz(
            dir.path(),
            "receipts.json.gz",
            concat!(
                "{\"_id\":{\"$oid\":\"r1\"},\"userId\":\"u1\",\"purchaseDate\":{\"$date\":1609687531000},",
                "\"rewardsReceiptItemList\":[{\"barcode\":\"4011\",\"finishedDate\":{\"$date\":1609687532000}}]}\n",
                "not json at all\n",
                "{\"_id\":{\"$oid\":\"r2\"},\"userId\":\"u2\"}\n",
            ),
        );

        let config = PipelineConfig {
            extract: ExtractConfig {
                mode: ExtractMode::Explode,
                ..ExtractConfig::default()
            },
            ..PipelineConfig::default()
        };
        let output = Pipeline::new(&config).run_source(&SourceConfig::for_path(&path)).unwrap();

        assert_eq!(output.primary.len(), 2);
        let purchased = output.primary.get(0, "purchaseDate").and_then(Cell::as_timestamp).unwrap();
        assert_eq!(purchased.timestamp(), 1609687531);

        let items = output.extracted.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items.get(0, "_parent_id"), Some(&Cell::Json(json!("r1"))));
        let finished = items.get(0, "finishedDate").and_then(Cell::as_timestamp).unwrap();
        assert_eq!(finished.timestamp(), 1609687532);
    }

    #[test]
    fn test_brand_cpg_survives_explode() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gz(
            dir.path(),
            "brands.json.gz",
            concat!(
                "{\"_id\":{\"$oid\":\"b1\"},\"cpg\":{\"$id\":{\"$oid\":\"c1\"},\"$ref\":\"Cogs\"}}\n",
                "{\"_id\":{\"$oid\":\"b2\"},\"cpg\":{\"$id\":{\"$oid\":\"c2\"},\"$ref\":\"Cpgs\"}}\n",
            ),
        );

        let config = PipelineConfig {
            extract: ExtractConfig {
                mode: ExtractMode::Explode,
                ..ExtractConfig::default()
            },
            ..PipelineConfig::default()
        };
        let output = Pipeline::new(&config).run_source(&SourceConfig::for_path(&path)).unwrap();

        let cpg = output.extracted.unwrap();
        assert_eq!(cpg.name, "brands_cpg");
        assert_eq!(cpg.len(), 2);
        assert_eq!(
            cpg.value_counts("cpg", Some("ref_collection")),
            vec![("Cogs".to_string(), 1), ("Cpgs".to_string(), 1)]
        );
    }

    #[test]
    fn test_run_all_continues_past_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        write_gz(dir.path(), "users.json.gz", "{\"_id\":{\"$oid\":\"u1\"}}\n");

        let sources = SourceConfig::defaults_in(dir.path());
        let results = Pipeline::new(&PipelineConfig::default()).run_all(&sources);

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0].1, Err(PipelineError::Load(_))));
        assert_eq!(results[1].1.as_ref().unwrap().primary.len(), 1);
        assert!(results[2].1.is_err());
    }
}

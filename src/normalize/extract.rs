use crate::normalize::encoded::{EncodedValue, Shape};
use crate::types::{Cell, Record, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// How a nested column is turned into its own table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// One row per parent row, holding the nested value under its column name
    #[default]
    Column,
    /// One row per array element; object elements spread into columns.
    /// A non-array value becomes a single row under its column name.
    Explode,
}

/// Configuration for the extraction step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub mode: ExtractMode,

    /// Whether to link extracted rows back to their parent row
    pub include_parent_ids: bool,

    /// Column holding the parent's row index
    pub parent_row_column: String,

    /// Column holding the parent's `_id` (when the parent has one)
    pub parent_id_column: String,

    /// Column holding the element's position in its array (explode mode)
    pub item_index_column: String,

    /// Parent column whose value is copied into `parent_id_column`
    pub parent_key: String,

    /// Column name for scalar array elements (explode mode)
    pub value_column: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            mode: ExtractMode::Column,
            include_parent_ids: true,
            parent_row_column: String::from("_parent_row"),
            parent_id_column: String::from("_parent_id"),
            item_index_column: String::from("_item_idx"),
            parent_key: String::from("_id"),
            value_column: String::from("value"),
        }
    }
}

/// Pulls designated nested columns out of their parent tables
pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Extractor { config }
    }

    /// Remove `column` from `table` and materialize it as a new table.
    ///
    /// Returns `None` when the table has no such column. The new table is
    /// named `<parent>_<column>` and keeps parent row order.
    pub fn extract(&self, table: &mut Table, column: &str) -> Option<Table> {
        if !table.has_column(column) {
            return None;
        }

        let parent_ids: Vec<Option<String>> = table
            .column_values(&self.config.parent_key)
            .map(|cell| cell.and_then(parent_id))
            .collect();
        let nested = table.take_column(column);

        let mut extracted = Table::new(format!("{}_{}", table.name, column));
        for (row, (cell, parent)) in nested.into_iter().zip(parent_ids).enumerate() {
            match self.config.mode {
                ExtractMode::Column => {
                    let mut record = Record::new();
                    record.insert(column.to_string(), cell);
                    self.link(&mut record, row, parent.as_deref(), None);
                    extracted.push_record(record);
                }
                ExtractMode::Explode => match cell {
                    Cell::Json(Value::Array(items)) => {
                        for (idx, item) in items.into_iter().enumerate() {
                            let mut record: Record = match item {
                                Value::Object(obj) => obj.into_iter().map(|(k, v)| (k, Cell::Json(v))).collect(),
                                scalar => Record::from([(self.config.value_column.clone(), Cell::Json(scalar))]),
                            };
                            self.link(&mut record, row, parent.as_deref(), Some(idx));
                            extracted.push_record(record);
                        }
                    }
                    cell if cell.is_null() => {}
                    cell => {
                        let mut record = Record::from([(column.to_string(), cell)]);
                        self.link(&mut record, row, parent.as_deref(), None);
                        extracted.push_record(record);
                    }
                },
            }
        }

        Some(extracted)
    }

    /// Add linkage columns, leaving any key the record already carries alone
    fn link(&self, record: &mut Record, row: usize, parent: Option<&str>, item: Option<usize>) {
        if !self.config.include_parent_ids {
            return;
        }

        let links = [
            (&self.config.parent_row_column, Some(Value::from(row))),
            (&self.config.parent_id_column, parent.map(Value::from)),
            (&self.config.item_index_column, item.map(Value::from)),
        ];
        for (key, value) in links {
            let Some(value) = value else { continue };
            if record.contains_key(key.as_str()) {
                debug!(column = %key, row, "Extracted row already has linkage column, keeping its value");
                continue;
            }
            record.insert(key.clone(), Cell::Json(value));
        }
    }
}

/// Plain string id of a parent key cell, whether or not it was normalized yet
fn parent_id(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Json(Value::String(s)) => Some(s.clone()),
        Cell::Json(Value::Number(n)) => Some(n.to_string()),
        Cell::Json(value) => match EncodedValue::decode_as(value, Shape::ObjectId) {
            EncodedValue::ObjectId(oid) => Some(oid),
            _ => None,
        },
        _ => None,
    }
}

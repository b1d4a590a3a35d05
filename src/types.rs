use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A pointer into another collection, collapsed from `{"$id": .., "$ref": ..}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrossRef {
    pub ref_id: String,
    pub ref_collection: String,
}

impl CrossRef {
    pub fn new(ref_id: impl Into<String>, ref_collection: impl Into<String>) -> Self {
        CrossRef {
            ref_id: ref_id.into(),
            ref_collection: ref_collection.into(),
        }
    }
}

/// A single table cell.
///
/// Freshly loaded tables only hold `Json` cells. Normalization rewrites
/// cells of configured columns into `Timestamp` or `Reference`; object ids
/// collapse back into a plain `Json` string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Json(Value),
    Timestamp(DateTime<Utc>),
    Reference(CrossRef),
}

impl Cell {
    pub fn null() -> Self {
        Cell::Json(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Json(Value::Null))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Cell::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Cell::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&CrossRef> {
        match self {
            Cell::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Short name of the cell kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Json(_) => "json",
            Cell::Timestamp(_) => "timestamp",
            Cell::Reference(_) => "reference",
        }
    }

    /// Look up a named sub-field (object key, or `ref_id`/`ref_collection`)
    pub fn field(&self, name: &str) -> Option<Cell> {
        match self {
            Cell::Json(Value::Object(obj)) => obj.get(name).cloned().map(Cell::Json),
            Cell::Reference(r) => match name {
                "ref_id" => Some(Cell::Json(Value::String(r.ref_id.clone()))),
                "ref_collection" => Some(Cell::Json(Value::String(r.ref_collection.clone()))),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        Cell::Json(value)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Json(Value::String(s)) => f.write_str(s),
            Cell::Json(v) => write!(f, "{}", v),
            Cell::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Cell::Reference(r) => write!(f, "{}:{}", r.ref_collection, r.ref_id),
        }
    }
}

/// Kind of a cell or raw JSON value, as reported in profiles and load errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
    Timestamp,
    Reference,
}

impl CellKind {
    pub fn of(cell: &Cell) -> Self {
        match cell {
            Cell::Json(value) => CellKind::of_json(value),
            Cell::Timestamp(_) => CellKind::Timestamp,
            Cell::Reference(_) => CellKind::Reference,
        }
    }

    pub fn of_json(value: &Value) -> Self {
        match value {
            Value::Null => CellKind::Null,
            Value::Bool(_) => CellKind::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => CellKind::Integer,
            Value::Number(_) => CellKind::Number,
            Value::String(_) => CellKind::String,
            Value::Array(_) => CellKind::Array,
            Value::Object(_) => CellKind::Object,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CellKind::Null => "null",
            CellKind::Boolean => "boolean",
            CellKind::Integer => "integer",
            CellKind::Number => "number",
            CellKind::String => "string",
            CellKind::Array => "array",
            CellKind::Object => "object",
            CellKind::Timestamp => "timestamp",
            CellKind::Reference => "reference",
        }
    }
}

/// One row: column name to cell
pub type Record = BTreeMap<String, Cell>;

/// An ordered sequence of records sharing a (loose) set of columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Table name, e.g. "receipts", "receipts_rewardsReceiptItemList"
    pub name: String,

    /// Union of all keys seen, in first-seen order
    columns: Vec<String>,

    rows: Vec<Record>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Build a table from parsed JSON objects, in order
    pub fn from_records<I>(name: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = Map<String, Value>>,
    {
        let mut table = Table::new(name);
        for record in records {
            table.push_object(record);
        }
        table
    }

    /// Append a parsed JSON object as a new row
    pub fn push_object(&mut self, obj: Map<String, Value>) {
        let record = obj.into_iter().map(|(k, v)| (k, Cell::Json(v))).collect();
        self.push_record(record);
    }

    /// Append a row, extending the column set with any new keys
    pub fn push_record(&mut self, record: Record) {
        for key in record.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// Cell at (row, column); `None` when the row lacks the key
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Every row's value for `column`, `None` where absent
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = Option<&'a Cell>> + 'a {
        self.rows.iter().map(move |r| r.get(column))
    }

    /// Rewrite every present cell of `column` in row order.
    ///
    /// The closure gets the row index and the owned cell and returns its
    /// replacement. Rows lacking the column are left alone.
    pub fn map_column<F, E>(&mut self, column: &str, mut f: F) -> Result<(), E>
    where
        F: FnMut(usize, Cell) -> Result<Cell, E>,
    {
        for (idx, row) in self.rows.iter_mut().enumerate() {
            if let Some(cell) = row.remove(column) {
                let converted = f(idx, cell)?;
                row.insert(column.to_string(), converted);
            }
        }
        Ok(())
    }

    /// Remove `column` from the table, returning each row's value in order.
    ///
    /// Rows that lacked the column yield a null cell, so the result always
    /// has exactly `self.len()` entries.
    pub fn take_column(&mut self, column: &str) -> Vec<Cell> {
        self.columns.retain(|c| c != column);
        self.rows
            .iter_mut()
            .map(|row| row.remove(column).unwrap_or_else(Cell::null))
            .collect()
    }

    /// A copy of the first `n` rows
    pub fn head(&self, n: usize) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Count distinct rendered values of `column` (or of a sub-field of it).
    ///
    /// Absent and null cells are skipped. Sorted by descending count, ties
    /// by value.
    pub fn value_counts(&self, column: &str, field: Option<&str>) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for cell in self.column_values(column).flatten() {
            let rendered = match field {
                Some(name) => match cell.field(name) {
                    Some(sub) if !sub.is_null() => sub.to_string(),
                    _ => continue,
                },
                None if cell.is_null() => continue,
                None => cell.to_string(),
            };
            *counts.entry(rendered).or_insert(0) += 1;
        }

        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Serializable view of one row with keys in column order
    pub fn row_view(&self, row: usize) -> Option<RowView<'_>> {
        self.rows.get(row).map(|record| RowView {
            columns: &self.columns,
            record,
        })
    }
}

/// Borrowed row that serializes its cells in table column order
pub struct RowView<'a> {
    columns: &'a [String],
    record: &'a Record,
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let present = self.columns.iter().filter(|c| self.record.contains_key(*c));
        let mut map = serializer.serialize_map(None)?;
        for column in present {
            map.serialize_entry(column, &self.record[column])?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_cell_kind_agrees_for_json_and_cells() {
        for (value, kind) in [
            (json!(null), CellKind::Null),
            (json!(3), CellKind::Integer),
            (json!(1.5), CellKind::Number),
            (json!("s"), CellKind::String),
            (json!({"k": 1}), CellKind::Object),
        ] {
            assert_eq!(CellKind::of_json(&value), kind);
            assert_eq!(CellKind::of(&Cell::Json(value)), kind);
        }
        assert_eq!(CellKind::of(&Cell::Reference(CrossRef::new("a", "Cogs"))).as_str(), "reference");
        assert_eq!(serde_json::to_value(CellKind::Integer).unwrap(), json!(CellKind::Integer.as_str()));
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let table = Table::from_records(
            "users",
            vec![
                obj(json!({"a": 2})),
                obj(json!({"b": 1, "a": 2})),
                obj(json!({"c": 3})),
                obj(json!({"a": 4, "d": null})),
            ],
        );

        assert_eq!(table.shape(), (4, 4));
        assert_eq!(table.columns(), &["a", "b", "c", "d"]);
        assert_eq!(table.get(2, "a"), None);
        assert_eq!(table.get(3, "a"), Some(&Cell::Json(json!(4))));
    }

    #[test]
    fn test_take_column_is_total_and_ordered() {
        let mut table = Table::from_records(
            "receipts",
            vec![
                obj(json!({"id": 1, "items": [1]})),
                obj(json!({"id": 2})),
                obj(json!({"id": 3, "items": [3, 4]})),
            ],
        );

        let taken = table.take_column("items");
        assert_eq!(taken, vec![Cell::Json(json!([1])), Cell::null(), Cell::Json(json!([3, 4]))]);
        assert!(!table.has_column("items"));
        assert!(table.rows().iter().all(|r| !r.contains_key("items")));
    }

    #[test]
    fn test_value_counts_with_field() {
        let mut table = Table::new("brands_cpg");
        for (id, coll) in [("a", "Cogs"), ("b", "Cpgs"), ("c", "Cogs")] {
            let mut record = Record::new();
            record.insert("cpg".to_string(), Cell::Reference(CrossRef::new(id, coll)));
            table.push_record(record);
        }

        let counts = table.value_counts("cpg", Some("ref_collection"));
        assert_eq!(counts, vec![("Cogs".to_string(), 2), ("Cpgs".to_string(), 1)]);
    }

    #[test]
    fn test_cell_serialization() {
        let ts = DateTime::from_timestamp(1609687531, 0).unwrap();
        assert_eq!(serde_json::to_value(Cell::Timestamp(ts)).unwrap(), json!("2021-01-03T15:25:31Z"));
        assert_eq!(
            serde_json::to_value(Cell::Reference(CrossRef::new("x", "Cogs"))).unwrap(),
            json!({"ref_id": "x", "ref_collection": "Cogs"})
        );
    }

    #[test]
    fn test_row_view_keeps_column_order() {
        let table = Table::from_records("t", vec![obj(json!({"z": 1})), obj(json!({"a": 2, "z": 3}))]);
        assert_eq!(table.columns(), &["z", "a"]);
        let line = serde_json::to_string(&table.row_view(1).unwrap()).unwrap();
        assert_eq!(line, r#"{"z":3,"a":2}"#);
    }
}

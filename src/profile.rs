//! Best-effort column profiling
//!
//! Accumulates per-column statistics in a single pass over a table: how
//! many rows carry the column, which value kinds appear, and whether every
//! string shares a recognizable format.

use crate::types::{Cell, Table};
pub use crate::types::CellKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

static ISO_DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

static ISO_DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static OBJECT_ID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// Statistics for one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub column: String,
    /// Rows carrying the column at all
    pub present: usize,
    /// Rows carrying a non-null value
    pub non_null: usize,
    pub kinds: BTreeMap<CellKind, usize>,
    /// Shared format of all string values, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
}

#[derive(Debug, Default)]
struct StringStats {
    format_counts: HashMap<&'static str, usize>,
    total_count: usize,
}

impl StringStats {
    fn add_string(&mut self, s: &str) {
        self.total_count += 1;
        if let Some(format) = detect_format(s) {
            *self.format_counts.entry(format).or_insert(0) += 1;
        }
    }

    fn get_format(&self) -> Option<&'static str> {
        // Only report a format every string had
        if self.format_counts.len() != 1 {
            return None;
        }
        self.format_counts
            .iter()
            .next()
            .filter(|(_, count)| **count == self.total_count)
            .map(|(format, _)| *format)
    }
}

/// Profile every column of `table`, in column order
pub fn profile_table(table: &Table) -> Vec<ColumnProfile> {
    table
        .columns()
        .iter()
        .map(|column| profile_column(table, column))
        .collect()
}

fn profile_column(table: &Table, column: &str) -> ColumnProfile {
    let mut present = 0;
    let mut non_null = 0;
    let mut kinds = BTreeMap::new();
    let mut strings = StringStats::default();

    for cell in table.column_values(column).flatten() {
        present += 1;
        if !cell.is_null() {
            non_null += 1;
        }
        *kinds.entry(CellKind::of(cell)).or_insert(0) += 1;
        if let Cell::Json(Value::String(s)) = cell {
            strings.add_string(s);
        }
    }

    ColumnProfile {
        column: column.to_string(),
        present,
        non_null,
        kinds,
        format: strings.get_format(),
    }
}

/// Detect if a string matches a known format
fn detect_format(value: &str) -> Option<&'static str> {
    let len = value.len();
    if len == 0 {
        return None;
    }

    if len > 6 && (value.starts_with("http://") || value.starts_with("https://")) {
        return Some("uri");
    }
    if len == 24 && OBJECT_ID_REGEX.is_match(value) {
        return Some("object-id");
    }
    if len == 10 && ISO_DATE_REGEX.is_match(value) {
        return Some("date");
    }
    if len >= 19 && ISO_DATETIME_REGEX.is_match(value) {
        return Some("date-time");
    }
    if len == 36 && UUID_REGEX.is_match(&value.to_lowercase()) {
        return Some("uuid");
    }
    if value.contains('@') && EMAIL_REGEX.is_match(value) {
        return Some("email");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CrossRef, Record};
    use serde_json::{json, Map};

    fn table(rows: Vec<Value>) -> Table {
        Table::from_records(
            "t",
            rows.into_iter().map(|v| match v {
                Value::Object(obj) => obj,
                _ => Map::new(),
            }),
        )
    }

    #[test]
    fn test_object_id_format_and_counts() {
        let t = table(vec![
            json!({"_id": "5ff1e194b6a9d73a3a9f1052", "role": "consumer"}),
            json!({"_id": "5ff1e1eacfcf6c399c274ae6", "role": null}),
            json!({"_id": "5ff1e1e8cfcf6c399c274ad9"}),
        ]);

        let profiles = profile_table(&t);
        assert_eq!(profiles[0].column, "_id");
        assert_eq!(profiles[0].format, Some("object-id"));
        assert_eq!(profiles[0].non_null, 3);

        let role = &profiles[1];
        assert_eq!(role.present, 2);
        assert_eq!(role.non_null, 1);
        assert_eq!(role.kinds.get(&CellKind::Null), Some(&1));
        assert_eq!(role.format, None);
    }

    #[test]
    fn test_mixed_formats_report_none() {
        let t = table(vec![json!({"v": "2021-01-01"}), json!({"v": "someone@example.com"})]);
        assert_eq!(profile_table(&t)[0].format, None);
    }

    #[test]
    fn test_converted_cells_have_their_own_kinds() {
        let mut t = Table::new("t");
        let mut record = Record::new();
        record.insert("cpg".to_string(), Cell::Reference(CrossRef::new("a", "Cogs")));
        t.push_record(record);

        let profiles = profile_table(&t);
        assert_eq!(profiles[0].kinds.get(&CellKind::Reference), Some(&1));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("2021-01-03T15:25:31Z"), Some("date-time"));
        assert_eq!(detect_format("https://example.com/logo.png"), Some("uri"));
        assert_eq!(detect_format("550e8400-e29b-41d4-a716-446655440000"), Some("uuid"));
        assert_eq!(detect_format("hello"), None);
    }
}

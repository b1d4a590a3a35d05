use crate::error::NormalizeError;
use crate::normalize::encoded::{EncodedValue, Shape};
use crate::types::{Cell, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Which columns hold which encoded shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeRules {
    /// Columns collapsed from `{"$oid": S}` to `S`
    pub oid_columns: Vec<String>,

    /// Columns converted from `{"$date": ms}` to a UTC timestamp
    pub date_columns: Vec<String>,

    /// Column converted from `{"$id", "$ref"}` to a reference pair
    pub ref_column: Option<String>,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        NormalizeRules {
            oid_columns: ["_id", "userId", "brand_id"].map(String::from).to_vec(),
            date_columns: [
                "createdDate",
                "lastLogin",
                "purchaseDate",
                "dateScanned",
                "finishedDate",
                "modifyDate",
                "pointsAwardedDate",
            ]
            .map(String::from)
            .to_vec(),
            ref_column: Some(String::from("cpg")),
        }
    }
}

/// The conversion applied to one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    ObjectId,
    Date,
    Reference,
}

impl Rule {
    fn input_kind(self) -> &'static str {
        match self {
            Rule::ObjectId => "object id",
            Rule::Date => "date",
            Rule::Reference => "reference",
        }
    }

    fn shape(self) -> Shape {
        match self {
            Rule::ObjectId => Shape::ObjectId,
            Rule::Date => Shape::Date,
            Rule::Reference => Shape::CrossRef,
        }
    }

    /// Convert the cell at `row` of `column`.
    ///
    /// Json cells are rewritten only when they carry this rule's shape;
    /// other marker keys beside it are ignored and anything else passes
    /// through. A cell a previous run already converted for this rule is
    /// returned as-is. A cell converted by a *different* rule is a
    /// structural mismatch.
    pub fn convert(self, column: &str, row: usize, cell: Cell) -> Result<Cell, NormalizeError> {
        match (self, cell) {
            (rule, Cell::Json(value)) => Ok(rule.convert_json(value)),
            (Rule::Date, cell @ Cell::Timestamp(_)) => Ok(cell),
            (Rule::Reference, cell @ Cell::Reference(_)) => Ok(cell),
            (rule, cell) => Err(NormalizeError::StructuralMismatch {
                column: column.to_string(),
                row,
                expected: rule.input_kind(),
                found: cell.kind(),
            }),
        }
    }

    fn convert_json(self, value: Value) -> Cell {
        match EncodedValue::decode_as(&value, self.shape()) {
            EncodedValue::ObjectId(oid) => Cell::Json(Value::String(oid)),
            EncodedValue::Date(ts) => Cell::Timestamp(ts),
            EncodedValue::CrossRef(r) => Cell::Reference(r),
            EncodedValue::Plain => Cell::Json(value),
        }
    }
}

impl NormalizeRules {
    /// Every (column, rule) pair in application order
    pub fn column_rules(&self) -> impl Iterator<Item = (&str, Rule)> {
        let oids = self.oid_columns.iter().map(|c| (c.as_str(), Rule::ObjectId));
        let dates = self.date_columns.iter().map(|c| (c.as_str(), Rule::Date));
        let refs = self.ref_column.iter().map(|c| (c.as_str(), Rule::Reference));
        oids.chain(dates).chain(refs)
    }

    /// Rewrite the configured columns of `table` in place.
    ///
    /// Columns missing from the table are skipped.
    pub fn apply(&self, table: &mut Table) -> Result<(), NormalizeError> {
        for (column, rule) in self.column_rules() {
            if !table.has_column(column) {
                debug!(table = %table.name, column, "Column not present, skipping");
                continue;
            }

            table.map_column(column, |row, cell| rule.convert(column, row, cell))?;
        }
        Ok(())
    }
}

/// Normalize a table with the given rules, returning it
pub fn normalize(mut table: Table, rules: &NormalizeRules) -> Result<Table, NormalizeError> {
    rules.apply(&mut table)?;
    Ok(table)
}

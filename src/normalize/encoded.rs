//! Decoding of document-database extended JSON wrappers
//!
//! A raw cell is decoded into exactly one [`EncodedValue`] variant. Partial
//! or malformed wrappers decode as [`EncodedValue::Plain`] so that callers
//! pass them through untouched. [`EncodedValue::decode_as`] looks for one
//! shape only, ignoring any other marker keys present alongside it.

use crate::types::CrossRef;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

const OID: &str = "$oid";
const DATE: &str = "$date";
const NUMBER_LONG: &str = "$numberLong";
const REF_ID: &str = "$id";
const REF_COLLECTION: &str = "$ref";

/// One of the recognized wrapper shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    ObjectId,
    Date,
    CrossRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncodedValue {
    /// `{"$oid": "<hex>"}`
    ObjectId(String),
    /// `{"$date": <millis>}`
    Date(DateTime<Utc>),
    /// `{"$id": {"$oid": ..} | "..", "$ref": "<collection>"}`
    CrossRef(CrossRef),
    /// Anything else
    Plain,
}

impl EncodedValue {
    /// Decode a cell. Cross references win over object ids, which win over dates.
    pub fn decode(value: &Value) -> Self {
        let Value::Object(obj) = value else {
            return EncodedValue::Plain;
        };

        [Shape::CrossRef, Shape::ObjectId, Shape::Date]
            .into_iter()
            .map(|shape| decode_shape(obj, shape))
            .find(|decoded| *decoded != EncodedValue::Plain)
            .unwrap_or(EncodedValue::Plain)
    }

    /// Decode a cell as `shape` only; `Plain` unless that shape matches
    pub fn decode_as(value: &Value, shape: Shape) -> Self {
        match value {
            Value::Object(obj) => decode_shape(obj, shape),
            _ => EncodedValue::Plain,
        }
    }
}

fn decode_shape(obj: &Map<String, Value>, shape: Shape) -> EncodedValue {
    let decoded = match shape {
        Shape::ObjectId => decode_object_id(obj).map(EncodedValue::ObjectId),
        Shape::Date => obj.get(DATE).and_then(decode_date).map(EncodedValue::Date),
        Shape::CrossRef => decode_cross_ref(obj).map(EncodedValue::CrossRef),
    };
    decoded.unwrap_or(EncodedValue::Plain)
}

fn decode_object_id(obj: &Map<String, Value>) -> Option<String> {
    obj.get(OID)?.as_str().map(str::to_string)
}

fn decode_cross_ref(obj: &Map<String, Value>) -> Option<CrossRef> {
    let collection = obj.get(REF_COLLECTION)?.as_str()?;
    let id = match obj.get(REF_ID)? {
        Value::String(s) => s.clone(),
        Value::Object(inner) => inner.get(OID)?.as_str()?.to_string(),
        _ => return None,
    };
    Some(CrossRef::new(id, collection))
}

/// Milliseconds since the epoch, in any of the shapes exports use
fn decode_date(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => {
            if let Some(ms) = n.as_i64() {
                DateTime::from_timestamp_millis(ms)
            } else {
                let ms = n.as_f64()?;
                if !ms.is_finite() || ms.abs() > i64::MAX as f64 {
                    return None;
                }
                DateTime::from_timestamp_millis(ms.trunc() as i64)
            }
        }
        Value::Object(inner) => {
            let ms = inner.get(NUMBER_LONG)?.as_str()?.parse::<i64>().ok()?;
            DateTime::from_timestamp_millis(ms)
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

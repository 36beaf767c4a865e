// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Rows and primary keys.
//!
//! A row is a JSON object as delivered by the server. Primary keys are
//! detected per row from a short list of conventional field names.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// A single table row.
pub type Row = serde_json::Map<String, Value>;

/// A detected primary key value.
///
/// Integral numbers normalize to `Int`, so `7` and `7.0` are the same key.
/// `Float` holds the bit pattern of a finite, non-integral number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimaryKey {
    Int(i64),
    Uint(u64),
    Float(u64),
    Str(String),
}

impl PrimaryKey {
    /// Converts a JSON value into a key. Only strings and numbers qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(PrimaryKey::Str(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(PrimaryKey::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(PrimaryKey::Uint(u))
                } else {
                    n.as_f64().map(PrimaryKey::from_f64)
                }
            }
            _ => None,
        }
    }

    fn from_f64(f: f64) -> Self {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
            PrimaryKey::Int(f as i64)
        } else {
            PrimaryKey::Float(f.to_bits())
        }
    }

    /// The key as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::Int(i) => Value::from(*i),
            PrimaryKey::Uint(u) => Value::from(*u),
            PrimaryKey::Float(bits) => Value::from(f64::from_bits(*bits)),
            PrimaryKey::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(i) => write!(f, "{i}"),
            PrimaryKey::Uint(u) => write!(f, "{u}"),
            PrimaryKey::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            PrimaryKey::Str(s) => f.write_str(s),
        }
    }
}

impl Serialize for PrimaryKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl From<i64> for PrimaryKey {
    fn from(v: i64) -> Self {
        PrimaryKey::Int(v)
    }
}

impl From<i32> for PrimaryKey {
    fn from(v: i32) -> Self {
        PrimaryKey::Int(i64::from(v))
    }
}

impl From<u32> for PrimaryKey {
    fn from(v: u32) -> Self {
        PrimaryKey::Int(i64::from(v))
    }
}

impl From<u64> for PrimaryKey {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => PrimaryKey::Int(i),
            Err(_) => PrimaryKey::Uint(v),
        }
    }
}

impl From<f64> for PrimaryKey {
    fn from(v: f64) -> Self {
        PrimaryKey::from_f64(v)
    }
}

impl From<&str> for PrimaryKey {
    fn from(v: &str) -> Self {
        PrimaryKey::Str(v.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(v: String) -> Self {
        PrimaryKey::Str(v)
    }
}

/// Fixed key fields tried, in order, for reference tables. The table-named
/// `<table>_id` field is tried last.
pub const REFERENCE_KEY_FIELDS: &[&str] = &["id", "desc_id", "type_id"];

/// Key fields tried, in order, for live tables.
pub const LIVE_KEY_FIELDS: &[&str] = &["id", "entity_id", "player_id"];

/// Detects a reference row's primary key.
///
/// Tries `id`, `desc_id`, `type_id` and then `<table>_id`. The first field
/// holding a string or number wins; other values are skipped.
pub fn detect_primary_key(table: &str, row: &Row) -> Option<PrimaryKey> {
    let table_field = format!("{table}_id");
    REFERENCE_KEY_FIELDS
        .iter()
        .copied()
        .chain(std::iter::once(table_field.as_str()))
        .find_map(|field| row.get(field).and_then(PrimaryKey::from_value))
}

/// Returns the first of `fields` holding a string or number.
pub fn key_from_fields(fields: &[&str], row: &Row) -> Option<PrimaryKey> {
    fields.iter().find_map(|field| row.get(*field).and_then(PrimaryKey::from_value))
}

#[cfg(test)]
#[path = "row_tests.rs"]
mod tests;

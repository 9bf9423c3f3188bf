//! Core value types: source columns, raw cursor values, and encoded cells.

use chrono::{NaiveDate, NaiveDateTime};

/// Interned style identifier, an index into the current file's
/// [`StyleRegistry`](crate::style::StyleRegistry). 0 is the default style.
pub type StyleId = u32;

/// One column of the source result set.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Column name as reported by the cursor.
    pub name: String,
    /// Declared source type name (e.g. "VARCHAR", "BIGINT"). Matched
    /// case-insensitively; the ordinal is the position in the column list.
    pub type_name: String,
}

impl Column {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, type_name: T) -> Self {
        Column { name: name.into(), type_name: type_name.into() }
    }
}

/// A raw per-column value scanned from the cursor.
///
/// Most drivers hand back the textual/byte form for everything except
/// temporal types, which arrive pre-parsed.
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    Null,
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// A typed cell value ready for serialization.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    /// Null source value. Still emitted when styled so the cell keeps
    /// its background.
    Empty,
    String(String),
    Int(i64),
    Float(f64),
    /// Display-ready rendering of a temporal value (e.g. "2024-01-02").
    /// Serialized like a string; the tag records that formatting already
    /// happened upstream.
    Formatted(String),
}

/// One encoded cell. The style id is resolved at write time by the
/// paginated writer, not at construction time.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: StyleId,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Cell { value, style: 0 }
    }
}

impl From<CellValue> for Cell {
    fn from(value: CellValue) -> Self {
        Cell::new(value)
    }
}

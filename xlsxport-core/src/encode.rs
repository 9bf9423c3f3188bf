//! Conversion of raw cursor values into typed cells.

use std::fmt::Write as _;

use tracing::warn;

use crate::cell::{Cell, CellValue, Column, RawValue};
use crate::error::{ExportError, Result};

/// Converts one raw column value plus its declared source type name into
/// a typed, display-ready cell value.
///
/// The string-like branch tries to parse the text as an integer first so
/// numeric columns stored as text come out right-aligned as numbers in
/// the spreadsheet. This heuristic is intentional but lossy: zero-padded
/// identifiers like "007" lose their padding.
pub struct CellEncoder {
    columns: Vec<Column>,
    // Uppercased type names, parallel to `columns`.
    type_names: Vec<String>,
}

impl CellEncoder {
    pub fn new(columns: Vec<Column>) -> Self {
        let type_names = columns
            .iter()
            .map(|c| c.type_name.to_ascii_uppercase())
            .collect();
        CellEncoder { columns, type_names }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Encode a full row. Any per-value failure aborts the export.
    pub fn encode_row(&self, row: &[RawValue]) -> Result<Vec<Cell>> {
        row.iter()
            .enumerate()
            .map(|(i, raw)| self.encode(raw, i).map(Cell::new))
            .collect()
    }

    /// Encode one value under the declared type of column `index`.
    pub fn encode(&self, raw: &RawValue, index: usize) -> Result<CellValue> {
        let column = &self.columns[index];
        let type_name = self.type_names[index].as_str();

        if *raw == RawValue::Null {
            return Ok(CellValue::Empty);
        }

        match type_name {
            // Text-carried types: prefer an integer rendering when the
            // text parses cleanly.
            "CHAR" | "VARCHAR" | "TEXT" | "TIME" | "YEAR" => {
                let text = Self::expect_text(raw, column)?;
                Ok(match text.parse::<i64>() {
                    Ok(v) => CellValue::Int(v),
                    Err(_) => CellValue::String(text),
                })
            }

            "BINARY" | "VARBINARY" | "BLOB" | "BIT" | "GEOMETRY" => {
                let bytes = Self::expect_bytes(raw, column)?;
                let mut hex = String::with_capacity(2 + bytes.len() * 2);
                hex.push_str("0x");
                for b in bytes {
                    let _ = write!(hex, "{b:02X}");
                }
                Ok(CellValue::String(hex))
            }

            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => {
                let text = Self::expect_text(raw, column)?;
                text.parse::<i64>().map(CellValue::Int).map_err(|_| {
                    ExportError::MalformedInteger {
                        column: column.name.clone(),
                        value: text.clone(),
                    }
                })
            }

            "DECIMAL" | "FLOAT" | "DOUBLE" => {
                let text = Self::expect_text(raw, column)?;
                text.parse::<f64>().map(CellValue::Float).map_err(|_| {
                    ExportError::MalformedFloat {
                        column: column.name.clone(),
                        value: text.clone(),
                    }
                })
            }

            "DATE" => Ok(match raw {
                RawValue::Date(d) => CellValue::Formatted(d.format("%Y-%m-%d").to_string()),
                RawValue::DateTime(dt) => {
                    CellValue::Formatted(dt.format("%Y-%m-%d").to_string())
                }
                // Some drivers deliver dates pre-rendered as text.
                _ => CellValue::Formatted(Self::expect_text(raw, column)?),
            }),

            "DATETIME" | "TIMESTAMP" => Ok(match raw {
                RawValue::DateTime(dt) => {
                    CellValue::Formatted(dt.format("%Y-%m-%d %H:%M:%S").to_string())
                }
                RawValue::Date(d) => CellValue::Formatted(d.format("%Y-%m-%d").to_string()),
                _ => CellValue::Formatted(Self::expect_text(raw, column)?),
            }),

            "JSON" => Ok(CellValue::String(Self::expect_text(raw, column)?)),

            _ => match raw {
                RawValue::Bytes(bytes) => {
                    warn!(
                        column = %column.name,
                        type_name = %column.type_name,
                        "untested database type, passing value through as text"
                    );
                    Ok(CellValue::String(
                        String::from_utf8_lossy(bytes).into_owned(),
                    ))
                }
                _ => Err(ExportError::UnsupportedType {
                    column: column.name.clone(),
                    type_name: column.type_name.clone(),
                }),
            },
        }
    }

    fn expect_text(raw: &RawValue, column: &Column) -> Result<String> {
        Self::expect_bytes(raw, column).map(|b| String::from_utf8_lossy(b).into_owned())
    }

    fn expect_bytes<'a>(raw: &'a RawValue, column: &Column) -> Result<&'a [u8]> {
        match raw {
            RawValue::Bytes(b) => Ok(b),
            _ => Err(ExportError::UnsupportedType {
                column: column.name.clone(),
                type_name: column.type_name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn encoder(type_name: &str) -> CellEncoder {
        CellEncoder::new(vec![Column::new("c1", type_name)])
    }

    fn bytes(s: &str) -> RawValue {
        RawValue::Bytes(s.as_bytes().to_vec())
    }

    #[test]
    fn test_varchar_numeric_text_becomes_int() {
        let enc = encoder("VARCHAR");
        assert_eq!(enc.encode(&bytes("123"), 0).unwrap(), CellValue::Int(123));
    }

    #[test]
    fn test_varchar_non_numeric_stays_string() {
        let enc = encoder("VARCHAR");
        assert_eq!(
            enc.encode(&bytes("12a"), 0).unwrap(),
            CellValue::String("12a".to_string())
        );
    }

    #[test]
    fn test_null_is_empty_for_any_type() {
        for ty in ["VARCHAR", "BIGINT", "DOUBLE", "DATE", "BLOB", "POINT"] {
            let enc = encoder(ty);
            assert_eq!(enc.encode(&RawValue::Null, 0).unwrap(), CellValue::Empty);
        }
    }

    #[test]
    fn test_blob_renders_as_uppercase_hex() {
        let enc = encoder("BLOB");
        assert_eq!(
            enc.encode(&RawValue::Bytes(vec![0xAB, 0xCD]), 0).unwrap(),
            CellValue::String("0xABCD".to_string())
        );
    }

    #[test]
    fn test_bit_renders_as_hex() {
        let enc = encoder("BIT");
        assert_eq!(
            enc.encode(&RawValue::Bytes(vec![0x01]), 0).unwrap(),
            CellValue::String("0x01".to_string())
        );
    }

    #[test]
    fn test_int_parses_and_rejects() {
        let enc = encoder("INT");
        assert_eq!(enc.encode(&bytes("-42"), 0).unwrap(), CellValue::Int(-42));
        assert!(matches!(
            enc.encode(&bytes("4x2"), 0),
            Err(ExportError::MalformedInteger { .. })
        ));
    }

    #[test]
    fn test_decimal_parses_and_rejects() {
        let enc = encoder("DECIMAL");
        assert_eq!(
            enc.encode(&bytes("3.25"), 0).unwrap(),
            CellValue::Float(3.25)
        );
        assert!(matches!(
            enc.encode(&bytes("3,25"), 0),
            Err(ExportError::MalformedFloat { .. })
        ));
    }

    #[test]
    fn test_date_formats_iso() {
        let enc = encoder("DATE");
        let date = RawValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(
            enc.encode(&date, 0).unwrap(),
            CellValue::Formatted("2024-01-02".to_string())
        );
    }

    #[test]
    fn test_datetime_formats_with_time() {
        let enc = encoder("TIMESTAMP");
        let dt: NaiveDateTime = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            enc.encode(&RawValue::DateTime(dt), 0).unwrap(),
            CellValue::Formatted("2024-01-02 03:04:05".to_string())
        );
    }

    #[test]
    fn test_year_parses_as_int() {
        let enc = encoder("YEAR");
        assert_eq!(enc.encode(&bytes("1999"), 0).unwrap(), CellValue::Int(1999));
    }

    #[test]
    fn test_json_passes_through_verbatim() {
        let enc = encoder("JSON");
        assert_eq!(
            enc.encode(&bytes("{\"a\": 1}"), 0).unwrap(),
            CellValue::String("{\"a\": 1}".to_string())
        );
    }

    #[test]
    fn test_untested_type_with_bytes_is_recoverable() {
        let enc = encoder("SET");
        assert_eq!(
            enc.encode(&bytes("a,b"), 0).unwrap(),
            CellValue::String("a,b".to_string())
        );
    }

    #[test]
    fn test_untested_type_without_bytes_aborts() {
        let enc = encoder("POINT");
        let date = RawValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(matches!(
            enc.encode(&date, 0),
            Err(ExportError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_type_names_match_case_insensitively() {
        let enc = encoder("varchar");
        assert_eq!(enc.encode(&bytes("5"), 0).unwrap(), CellValue::Int(5));
    }

    #[test]
    fn test_encode_row_collects_all_columns() {
        let enc = CellEncoder::new(vec![
            Column::new("id", "BIGINT"),
            Column::new("name", "VARCHAR"),
        ]);
        let cells = enc
            .encode_row(&[bytes("7"), bytes("alice")])
            .unwrap();
        assert_eq!(cells[0].value, CellValue::Int(7));
        assert_eq!(cells[1].value, CellValue::String("alice".to_string()));
    }
}

//! Coordinate conversion, XML escaping, and fast cell serialization.

use std::borrow::Cow;

use crate::cell::{Cell, CellValue};

/// Convert column number (1-indexed) to letters (e.g., 1 -> "A", 28 -> "AB").
pub fn column_to_letter(column: u32) -> String {
    let mut result = String::new();
    let mut col = column;

    while col > 0 {
        col -= 1;
        let letter = (b'A' + (col % 26) as u8) as char;
        result.insert(0, letter);
        col /= 26;
    }

    result
}

/// Create a cell coordinate string from row and column (1-indexed).
pub fn coordinate_from_row_col(row: u32, column: u32) -> String {
    format!("{}{}", column_to_letter(column), row)
}

/// Escape the five XML special characters.
pub fn escape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Append one `<c>` element for a cell at (row, column) to the row XML.
///
/// Numbers go through itoa/ryu to avoid formatting overhead on large
/// exports; strings are written as inline strings so no shared-string
/// table has to be kept in memory.
pub fn write_cell(xml: &mut String, row: u32, column: u32, cell: &Cell) {
    // Unstyled empty cells carry no information.
    if cell.style == 0 && cell.value == CellValue::Empty {
        return;
    }

    xml.push_str("<c r=\"");
    xml.push_str(&coordinate_from_row_col(row, column));
    xml.push('"');
    if cell.style != 0 {
        let mut buf = itoa::Buffer::new();
        xml.push_str(" s=\"");
        xml.push_str(buf.format(cell.style));
        xml.push('"');
    }

    match &cell.value {
        CellValue::Empty => {
            xml.push_str("/>");
        }
        CellValue::Int(v) => {
            let mut buf = itoa::Buffer::new();
            xml.push_str("><v>");
            xml.push_str(buf.format(*v));
            xml.push_str("</v></c>");
        }
        CellValue::Float(v) => {
            let mut buf = ryu::Buffer::new();
            xml.push_str("><v>");
            xml.push_str(buf.format(*v));
            xml.push_str("</v></c>");
        }
        CellValue::String(s) | CellValue::Formatted(s) => {
            xml.push_str(" t=\"inlineStr\"><is><t");
            if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
                xml.push_str(" xml:space=\"preserve\"");
            }
            xml.push('>');
            xml.push_str(&escape_xml(s));
            xml.push_str("</t></is></c>");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_to_letter() {
        assert_eq!(column_to_letter(1), "A");
        assert_eq!(column_to_letter(26), "Z");
        assert_eq!(column_to_letter(27), "AA");
        assert_eq!(column_to_letter(28), "AB");
        assert_eq!(column_to_letter(16384), "XFD");
    }

    #[test]
    fn test_coordinate_from_row_col() {
        assert_eq!(coordinate_from_row_col(1, 1), "A1");
        assert_eq!(coordinate_from_row_col(10, 28), "AB10");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("plain"), "plain");
        assert_eq!(escape_xml("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn test_write_cell_int() {
        let mut xml = String::new();
        write_cell(&mut xml, 3, 2, &Cell { value: CellValue::Int(42), style: 0 });
        assert_eq!(xml, "<c r=\"B3\"><v>42</v></c>");
    }

    #[test]
    fn test_write_cell_string_with_style() {
        let mut xml = String::new();
        write_cell(&mut xml, 1, 1, &Cell { value: CellValue::String("hi".into()), style: 2 });
        assert_eq!(xml, "<c r=\"A1\" s=\"2\" t=\"inlineStr\"><is><t>hi</t></is></c>");
    }

    #[test]
    fn test_write_cell_preserves_whitespace() {
        let mut xml = String::new();
        write_cell(&mut xml, 1, 1, &Cell { value: CellValue::String(" x ".into()), style: 0 });
        assert!(xml.contains("xml:space=\"preserve\""));
    }

    #[test]
    fn test_write_cell_skips_unstyled_empty() {
        let mut xml = String::new();
        write_cell(&mut xml, 1, 1, &Cell { value: CellValue::Empty, style: 0 });
        assert!(xml.is_empty());

        write_cell(&mut xml, 1, 1, &Cell { value: CellValue::Empty, style: 3 });
        assert_eq!(xml, "<c r=\"A1\" s=\"3\"/>");
    }
}

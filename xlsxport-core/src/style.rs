//! Range-rule style configuration and the workbook style registry.
//!
//! Styling is configured as compact rule strings of the form
//! `range:value`, comma-separated, where `range` is a single 1-based
//! index `n` or an inclusive span `n-m`. Example: `"1:10,2-7:40"` sets
//! index 1 to 10 and indices 2 through 7 to 40. Rules are expanded in
//! declaration order; when two rules cover the same index the later one
//! wins.

use std::collections::HashMap;

use crate::error::{ExportError, Result};

/// Text alignment properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Alignment {
    /// Horizontal alignment: left, center, right, fill, justify, etc.
    pub horizontal: Option<String>,
    /// Vertical alignment: top, center, bottom.
    pub vertical: Option<String>,
}

/// Font properties. Only the attributes the rule language can set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Font {
    /// Font color as ARGB hex (e.g., "FFFF0000").
    pub color: Option<String>,
}

/// Cell fill properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fill {
    /// Pattern type: solid, gray125, etc.
    pub pattern_type: Option<String>,
    /// Foreground color as ARGB hex.
    pub fg_color: Option<String>,
}

impl Fill {
    /// Create a solid fill with the specified color.
    pub fn solid<S: Into<String>>(color: S) -> Self {
        Fill {
            pattern_type: Some("solid".to_string()),
            fg_color: Some(color.into()),
        }
    }
}

/// Concrete style descriptor for one cell, resolved from the rule maps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellStyle {
    pub font: Option<Font>,
    pub fill: Option<Fill>,
    pub alignment: Option<Alignment>,
}

/// The seven rule strings consumed by the core, already split out of
/// whatever flag/config layer sits upstream. Empty strings mean "no
/// rules for this attribute".
#[derive(Clone, Debug, Default)]
pub struct StyleRuleStrings {
    pub col_width: String,
    pub col_align: String,
    pub row_height: String,
    pub row_bg_color: String,
    pub col_bg_color: String,
    pub row_font_color: String,
    pub col_font_color: String,
}

/// Parsed per-row and per-column attribute maps plus style resolution.
///
/// Column widths stay as ranges because the sheet writer emits them as
/// `<col>` elements; everything else is expanded to index -> value maps.
#[derive(Clone, Debug, Default)]
pub struct StyleRules {
    col_width: Vec<(u32, u32, f64)>,
    row_height: HashMap<u32, f64>,
    col_align: HashMap<u32, String>,
    row_bg_color: HashMap<u32, String>,
    col_bg_color: HashMap<u32, String>,
    row_font_color: HashMap<u32, String>,
    col_font_color: HashMap<u32, String>,
}

impl StyleRules {
    /// Parse all rule strings. Any syntax error aborts before a single
    /// row is processed.
    pub fn parse(rules: &StyleRuleStrings) -> Result<Self> {
        let mut out = StyleRules::default();

        for (min, max, value) in parse_entries(&rules.col_width)? {
            let width = parse_number(&rules.col_width, &value)?;
            out.col_width.push((min, max, width));
        }
        for (min, max, value) in parse_entries(&rules.row_height)? {
            let height = parse_number(&rules.row_height, &value)?;
            for i in min..=max {
                out.row_height.insert(i, height);
            }
        }
        expand_into(&mut out.col_align, parse_entries(&rules.col_align)?);
        expand_into(&mut out.row_bg_color, normalized(parse_entries(&rules.row_bg_color)?));
        expand_into(&mut out.col_bg_color, normalized(parse_entries(&rules.col_bg_color)?));
        expand_into(&mut out.row_font_color, normalized(parse_entries(&rules.row_font_color)?));
        expand_into(&mut out.col_font_color, normalized(parse_entries(&rules.col_font_color)?));

        Ok(out)
    }

    /// Column width ranges, in declaration order.
    pub fn col_widths(&self) -> &[(u32, u32, f64)] {
        &self.col_width
    }

    /// Configured height for a 1-based physical sheet row, if any.
    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row_height.get(&row).copied()
    }

    /// Resolve the concrete style for a (row, column) pair, both 1-based.
    ///
    /// Alignment defaults to "left" unless a column rule overrides it
    /// (alignment has no row-level form). Colors apply the column rule
    /// first; a row rule covering the same index overwrites it.
    pub fn resolve(&self, row: u32, col: u32) -> CellStyle {
        let horizontal = self
            .col_align
            .get(&col)
            .cloned()
            .unwrap_or_else(|| "left".to_string());

        let mut style = CellStyle {
            alignment: Some(Alignment {
                horizontal: Some(horizontal),
                vertical: Some("center".to_string()),
            }),
            ..Default::default()
        };

        if let Some(color) = self.col_bg_color.get(&col) {
            style.fill = Some(Fill::solid(color.clone()));
        }
        if let Some(color) = self.row_bg_color.get(&row) {
            style.fill = Some(Fill::solid(color.clone()));
        }

        if let Some(color) = self.col_font_color.get(&col) {
            style.font = Some(Font { color: Some(color.clone()) });
        }
        if let Some(color) = self.row_font_color.get(&row) {
            style.font = Some(Font { color: Some(color.clone()) });
        }

        style
    }
}

/// Split one rule string into (min, max, value) triples.
fn parse_entries(input: &str) -> Result<Vec<(u32, u32, String)>> {
    let mut list = Vec::new();
    if input.is_empty() {
        return Ok(list);
    }

    for entry in input.split(',') {
        let (range, value) = entry
            .split_once(':')
            .ok_or_else(|| ExportError::RuleSyntax(entry.to_string()))?;

        let (min_str, max_str) = match range.split_once('-') {
            Some((min, max)) => (min, max),
            None => (range, range),
        };
        let min: u32 = min_str
            .parse()
            .map_err(|_| ExportError::RuleSyntax(entry.to_string()))?;
        let max: u32 = max_str
            .parse()
            .map_err(|_| ExportError::RuleSyntax(entry.to_string()))?;

        list.push((min, max, value.to_string()));
    }

    Ok(list)
}

fn parse_number(rule: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| ExportError::RuleSyntax(rule.to_string()))
}

fn expand_into(map: &mut HashMap<u32, String>, entries: Vec<(u32, u32, String)>) {
    for (min, max, value) in entries {
        for i in min..=max {
            map.insert(i, value.clone());
        }
    }
}

fn normalized(mut entries: Vec<(u32, u32, String)>) -> Vec<(u32, u32, String)> {
    for entry in &mut entries {
        entry.2 = normalize_color(&entry.2);
    }
    entries
}

/// Normalize a color token to the ARGB hex form styles.xml expects.
/// Accepts "RRGGBB" or "#RRGGBB"; 8-digit tokens pass through.
pub fn normalize_color(token: &str) -> String {
    let hex = token.trim_start_matches('#').to_ascii_uppercase();
    if hex.len() == 6 {
        format!("FF{hex}")
    } else {
        hex
    }
}

/// A cell format entry (cellXf) referencing interned fonts and fills.
#[derive(Clone, Debug, Default, PartialEq)]
struct CellXf {
    font_id: usize,
    fill_id: usize,
    alignment: Option<Alignment>,
    apply_font: bool,
    apply_fill: bool,
    apply_alignment: bool,
}

/// Registry of all styles in one output file.
///
/// Excel stores styles as separate arrays of fonts and fills, then
/// cellXfs that combine them by index. The registry interns descriptors
/// so that the style id handed back for identical (row, column) rule
/// outcomes is reused across millions of cells.
#[derive(Clone, Debug)]
pub struct StyleRegistry {
    fonts: Vec<Font>,
    fills: Vec<Fill>,
    cell_xfs: Vec<CellXf>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleRegistry {
    /// Create a registry pre-seeded with the entries Excel requires.
    pub fn new() -> Self {
        StyleRegistry {
            // Default font (index 0).
            fonts: vec![Font::default()],
            // Excel requires at least two fills (none and gray125).
            fills: vec![
                Fill::default(),
                Fill {
                    pattern_type: Some("gray125".to_string()),
                    fg_color: None,
                },
            ],
            // Default cell format (xf index 0).
            cell_xfs: vec![CellXf::default()],
        }
    }

    fn get_or_add_font(&mut self, font: &Font) -> usize {
        if let Some(idx) = self.fonts.iter().position(|f| f == font) {
            idx
        } else {
            let idx = self.fonts.len();
            self.fonts.push(font.clone());
            idx
        }
    }

    fn get_or_add_fill(&mut self, fill: &Fill) -> usize {
        if let Some(idx) = self.fills.iter().position(|f| f == fill) {
            idx
        } else {
            let idx = self.fills.len();
            self.fills.push(fill.clone());
            idx
        }
    }

    /// Intern a style descriptor, returning its reusable xf index.
    pub fn get_or_add(&mut self, style: &CellStyle) -> u32 {
        let font_id = style.font.as_ref().map(|f| self.get_or_add_font(f)).unwrap_or(0);
        let fill_id = style.fill.as_ref().map(|f| self.get_or_add_fill(f)).unwrap_or(0);

        let xf = CellXf {
            font_id,
            fill_id,
            alignment: style.alignment.clone(),
            apply_font: style.font.is_some(),
            apply_fill: style.fill.is_some(),
            apply_alignment: style.alignment.is_some(),
        };

        if let Some(idx) = self.cell_xfs.iter().position(|x| x == &xf) {
            idx as u32
        } else {
            let idx = self.cell_xfs.len();
            self.cell_xfs.push(xf);
            idx as u32
        }
    }

    /// Serialize the registry as the content of xl/styles.xml.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\n",
        );

        xml.push_str(&format!("<fonts count=\"{}\">", self.fonts.len()));
        for font in &self.fonts {
            xml.push_str("<font><sz val=\"11\"/><name val=\"Calibri\"/>");
            if let Some(color) = &font.color {
                xml.push_str(&format!("<color rgb=\"{color}\"/>"));
            }
            xml.push_str("</font>");
        }
        xml.push_str("</fonts>\n");

        xml.push_str(&format!("<fills count=\"{}\">", self.fills.len()));
        for fill in &self.fills {
            match (&fill.pattern_type, &fill.fg_color) {
                (Some(pattern), Some(color)) => xml.push_str(&format!(
                    "<fill><patternFill patternType=\"{pattern}\"><fgColor rgb=\"{color}\"/></patternFill></fill>"
                )),
                (Some(pattern), None) => xml.push_str(&format!(
                    "<fill><patternFill patternType=\"{pattern}\"/></fill>"
                )),
                _ => xml.push_str("<fill><patternFill patternType=\"none\"/></fill>"),
            }
        }
        xml.push_str("</fills>\n");

        xml.push_str(
            "<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>\n\
             <cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>\n",
        );

        xml.push_str(&format!("<cellXfs count=\"{}\">", self.cell_xfs.len()));
        for xf in &self.cell_xfs {
            xml.push_str(&format!(
                "<xf numFmtId=\"0\" fontId=\"{}\" fillId=\"{}\" borderId=\"0\" xfId=\"0\"",
                xf.font_id, xf.fill_id
            ));
            if xf.apply_font {
                xml.push_str(" applyFont=\"1\"");
            }
            if xf.apply_fill {
                xml.push_str(" applyFill=\"1\"");
            }
            if xf.apply_alignment {
                xml.push_str(" applyAlignment=\"1\"");
            }
            match &xf.alignment {
                Some(align) => {
                    xml.push('>');
                    xml.push_str("<alignment");
                    if let Some(h) = &align.horizontal {
                        xml.push_str(&format!(" horizontal=\"{h}\""));
                    }
                    if let Some(v) = &align.vertical {
                        xml.push_str(&format!(" vertical=\"{v}\""));
                    }
                    xml.push_str("/></xf>");
                }
                None => xml.push_str("/>"),
            }
        }
        xml.push_str("</cellXfs>\n");

        xml.push_str(
            "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>\n\
             </styleSheet>",
        );

        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(build: impl FnOnce(&mut StyleRuleStrings)) -> StyleRules {
        let mut strings = StyleRuleStrings::default();
        build(&mut strings);
        StyleRules::parse(&strings).unwrap()
    }

    #[test]
    fn test_parse_span_and_single_index() {
        let r = rules(|s| s.col_width = "1:10,2-4:20".to_string());
        assert_eq!(r.col_widths(), &[(1, 1, 10.0), (2, 4, 20.0)]);
    }

    #[test]
    fn test_parse_missing_separator_is_syntax_error() {
        let mut strings = StyleRuleStrings::default();
        strings.row_height = "abc".to_string();
        match StyleRules::parse(&strings) {
            Err(ExportError::RuleSyntax(entry)) => assert_eq!(entry, "abc"),
            other => panic!("expected RuleSyntax, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_non_integer_bound_is_syntax_error() {
        let mut strings = StyleRuleStrings::default();
        strings.col_align = "x-2:center".to_string();
        assert!(matches!(
            StyleRules::parse(&strings),
            Err(ExportError::RuleSyntax(_))
        ));
    }

    #[test]
    fn test_parse_bad_numeric_value_is_syntax_error() {
        let mut strings = StyleRuleStrings::default();
        strings.col_width = "1:wide".to_string();
        assert!(matches!(
            StyleRules::parse(&strings),
            Err(ExportError::RuleSyntax(_))
        ));
    }

    #[test]
    fn test_later_rule_wins_on_overlap() {
        let r = rules(|s| s.row_height = "1-5:10,3:25".to_string());
        assert_eq!(r.row_height(2), Some(10.0));
        assert_eq!(r.row_height(3), Some(25.0));
        assert_eq!(r.row_height(6), None);
    }

    #[test]
    fn test_alignment_defaults_to_left() {
        let r = rules(|s| s.col_align = "2:center".to_string());
        let default = r.resolve(1, 1);
        assert_eq!(
            default.alignment.unwrap().horizontal.as_deref(),
            Some("left")
        );
        let overridden = r.resolve(1, 2);
        assert_eq!(
            overridden.alignment.unwrap().horizontal.as_deref(),
            Some("center")
        );
    }

    #[test]
    fn test_row_color_overrides_column_color() {
        let r = rules(|s| {
            s.col_bg_color = "1:00FF00".to_string();
            s.row_bg_color = "3:FF0000".to_string();
        });
        // Column rule alone.
        let style = r.resolve(1, 1);
        assert_eq!(style.fill.unwrap().fg_color.as_deref(), Some("FF00FF00"));
        // Row and column both target (3, 1): row wins.
        let style = r.resolve(3, 1);
        assert_eq!(style.fill.unwrap().fg_color.as_deref(), Some("FFFF0000"));
    }

    #[test]
    fn test_font_color_precedence_matches_fill() {
        let r = rules(|s| {
            s.col_font_color = "2:0000FF".to_string();
            s.row_font_color = "5:FFFFFF".to_string();
        });
        assert_eq!(
            r.resolve(1, 2).font.unwrap().color.as_deref(),
            Some("FF0000FF")
        );
        assert_eq!(
            r.resolve(5, 2).font.unwrap().color.as_deref(),
            Some("FFFFFFFF")
        );
    }

    #[test]
    fn test_normalize_color() {
        assert_eq!(normalize_color("ff0000"), "FFFF0000");
        assert_eq!(normalize_color("#FF0000"), "FFFF0000");
        assert_eq!(normalize_color("80FF0000"), "80FF0000");
    }

    #[test]
    fn test_registry_interns_identical_styles() {
        let mut registry = StyleRegistry::new();
        let style = CellStyle {
            fill: Some(Fill::solid("FFFF0000")),
            ..Default::default()
        };
        let a = registry.get_or_add(&style);
        let b = registry.get_or_add(&style);
        assert_eq!(a, b);
        assert_ne!(a, 0);

        let other = CellStyle {
            fill: Some(Fill::solid("FF00FF00")),
            ..Default::default()
        };
        assert_ne!(registry.get_or_add(&other), a);
    }

    #[test]
    fn test_styles_xml_contains_interned_entries() {
        let mut registry = StyleRegistry::new();
        registry.get_or_add(&CellStyle {
            font: Some(Font { color: Some("FFFF0000".to_string()) }),
            fill: Some(Fill::solid("FF00FF00")),
            alignment: Some(Alignment {
                horizontal: Some("center".to_string()),
                vertical: Some("center".to_string()),
            }),
        });
        let xml = registry.to_xml();
        assert!(xml.contains("<color rgb=\"FFFF0000\"/>"));
        assert!(xml.contains("<fgColor rgb=\"FF00FF00\"/>"));
        assert!(xml.contains("horizontal=\"center\""));
        assert!(xml.contains("<cellXfs count=\"2\">"));
    }
}

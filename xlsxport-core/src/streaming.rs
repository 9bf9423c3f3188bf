//! Streaming xlsx container writer.
//!
//! One `StreamingWorkbook` owns one output file. Rows are serialized
//! straight into the zip as they arrive and are never held in memory;
//! only one sheet may be open at a time because sheet parts are zip
//! entries written sequentially. Workbook metadata (including final
//! sheet names and the style table) is written at close, which is what
//! makes end-of-run sheet renaming possible at all.
//!
//! The zip streams into a sibling temp file; persisting moves it to the
//! target path (or pipes it through an ECMA-376 agile encryptor when a
//! password is set). A file that failed mid-write therefore never
//! appears under the target name.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ms_offcrypto_writer::Ecma376AgileWriter;
use tempfile::NamedTempFile;
use zip::write::{ExtendedFileOptions, FileOptions};
use zip::{CompressionMethod, ZipWriter};

use crate::cell::Cell;
use crate::error::{ExportError, Result};
use crate::style::{CellStyle, StyleRegistry};
use crate::utils::{escape_xml, write_cell};

/// Streaming state for the currently open sheet.
pub struct SheetStream {
    current_row: u32,
    col_widths: Vec<(u32, u32, f64)>,
    data_started: bool,
}

impl SheetStream {
    /// Number of rows written to this sheet so far.
    pub fn current_row(&self) -> u32 {
        self.current_row
    }
}

/// A write-only workbook that streams data directly to disk.
pub struct StreamingWorkbook {
    zip: ZipWriter<BufWriter<NamedTempFile>>,
    options: FileOptions<'static, ExtendedFileOptions>,
    password: Option<String>,
    styles: StyleRegistry,
    sheets: Vec<String>,
    sheet_open: bool,
}

impl StreamingWorkbook {
    /// Create a workbook whose temp file lives in `dir` (the directory
    /// the final output will be persisted into).
    pub fn create(dir: &Path, password: Option<String>) -> Result<Self> {
        let temp = NamedTempFile::new_in(dir)?;
        let writer = BufWriter::with_capacity(1024 * 1024, temp); // 1MB buffer
        let zip = ZipWriter::new(writer);

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(1)); // Fast compression

        Ok(StreamingWorkbook {
            zip,
            options,
            password,
            styles: StyleRegistry::new(),
            sheets: Vec::new(),
            sheet_open: false,
        })
    }

    /// Number of sheets created so far (open or finished).
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Intern a style descriptor into this file's registry.
    pub fn intern_style(&mut self, style: &CellStyle) -> u32 {
        self.styles.get_or_add(style)
    }

    /// Create a new sheet. Returns a [`SheetStream`] handle for writing rows.
    pub fn create_sheet(&mut self, name: &str) -> Result<SheetStream> {
        if self.sheet_open {
            return Err(ExportError::custom(
                "must finish current sheet before creating a new one",
            ));
        }

        self.sheets.push(name.to_string());
        let idx = self.sheets.len();
        self.sheet_open = true;

        let path = format!("xl/worksheets/sheet{idx}.xml");
        self.zip.start_file(&path, self.options.clone())?;
        self.zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
"#,
        )?;

        Ok(SheetStream {
            current_row: 0,
            col_widths: Vec::new(),
            data_started: false,
        })
    }

    /// Set a column width range for the open sheet. Must be called
    /// before the first row because `<cols>` precedes `<sheetData>` in
    /// the sheet part.
    pub fn set_col_width(
        &mut self,
        sheet: &mut SheetStream,
        min: u32,
        max: u32,
        width: f64,
    ) -> Result<()> {
        if sheet.data_started {
            return Err(ExportError::custom(
                "column widths must be set before any row is written",
            ));
        }
        sheet.col_widths.push((min, max, width));
        Ok(())
    }

    /// Append a row of already style-resolved cells to the open sheet.
    pub fn append_row(
        &mut self,
        sheet: &mut SheetStream,
        cells: &[Cell],
        height: Option<f64>,
    ) -> Result<()> {
        if !self.sheet_open {
            return Err(ExportError::custom("no sheet is open"));
        }
        self.ensure_sheet_data(sheet)?;

        sheet.current_row += 1;
        let row_num = sheet.current_row;

        let mut row_xml = match height {
            Some(h) => format!("<row r=\"{row_num}\" ht=\"{h}\" customHeight=\"1\">"),
            None => format!("<row r=\"{row_num}\">"),
        };

        for (col_idx, cell) in cells.iter().enumerate() {
            write_cell(&mut row_xml, row_num, (col_idx + 1) as u32, cell);
        }

        row_xml.push_str("</row>\n");
        self.zip.write_all(row_xml.as_bytes())?;

        Ok(())
    }

    fn ensure_sheet_data(&mut self, sheet: &mut SheetStream) -> Result<()> {
        if sheet.data_started {
            return Ok(());
        }

        if !sheet.col_widths.is_empty() {
            let mut cols = String::from("<cols>");
            for (min, max, width) in &sheet.col_widths {
                cols.push_str(&format!(
                    "<col min=\"{min}\" max=\"{max}\" width=\"{width}\" customWidth=\"1\"/>"
                ));
            }
            cols.push_str("</cols>\n");
            self.zip.write_all(cols.as_bytes())?;
        }

        self.zip.write_all(b"<sheetData>\n")?;
        sheet.data_started = true;
        Ok(())
    }

    /// Finalize the open sheet so the next one can be created.
    pub fn finish_sheet(&mut self, sheet: &mut SheetStream) -> Result<()> {
        if !self.sheet_open {
            return Ok(());
        }
        // An empty sheet still needs its sheetData element.
        self.ensure_sheet_data(sheet)?;

        self.zip.write_all(b"</sheetData>\n")?;
        self.zip.write_all(
            br#"<pageMargins left="0.75" right="0.75" top="1" bottom="1" header="0.5" footer="0.5"/>
</worksheet>"#,
        )?;

        self.sheet_open = false;
        Ok(())
    }

    /// Replace the sequence names with the configured base name: a
    /// single sheet takes the base as-is, multiple sheets get `-1`,
    /// `-2`, ... suffixes in creation order.
    pub fn rename_sheets(&mut self, base: &str) {
        if self.sheets.len() <= 1 {
            if let Some(first) = self.sheets.first_mut() {
                *first = base.to_string();
            }
        } else {
            for (i, name) in self.sheets.iter_mut().enumerate() {
                *name = format!("{}-{}", base, i + 1);
            }
        }
    }

    /// Finalize the last sheet, write workbook metadata, and persist to
    /// `target`. Consumes the workbook; a persisted file is never
    /// revisited.
    pub fn close(mut self, sheet: &mut SheetStream, target: &Path) -> Result<PathBuf> {
        self.finish_sheet(sheet)?;

        self.write_content_types()?;
        self.write_rels()?;
        self.write_doc_props()?;
        self.write_workbook_xml()?;
        self.write_workbook_rels()?;
        self.write_styles_xml()?;

        let buffer = self.zip.finish()?;
        let temp = buffer.into_inner().map_err(|e| e.into_error())?;

        match &self.password {
            Some(password) => {
                let mut plain = temp.reopen()?;
                let out = File::create(target)?;
                let mut encryptor =
                    Ecma376AgileWriter::create(&mut rand::rng(), password, out)
                        .map_err(|e| ExportError::Encryption(e.to_string()))?;
                std::io::copy(&mut plain, &mut encryptor)?;
                encryptor
                    .into_inner()
                    .map_err(|e| ExportError::Encryption(e.to_string()))?;
            }
            None => {
                temp.persist(target).map_err(|e| ExportError::Io(e.error))?;
            }
        }

        Ok(target.to_path_buf())
    }

    fn write_content_types(&mut self) -> Result<()> {
        self.zip
            .start_file("[Content_Types].xml", self.options.clone())?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
"#,
        );

        for i in 0..self.sheets.len() {
            content.push_str(&format!(
                "<Override PartName=\"/xl/worksheets/sheet{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\n",
                i + 1
            ));
        }

        content.push_str("</Types>");
        self.zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_rels(&mut self) -> Result<()> {
        self.zip.start_file("_rels/.rels", self.options.clone())?;
        self.zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#,
        )?;
        Ok(())
    }

    fn write_doc_props(&mut self) -> Result<()> {
        self.zip
            .start_file("docProps/core.xml", self.options.clone())?;
        self.zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/">
<dc:creator>xlsxport</dc:creator>
</cp:coreProperties>"#,
        )?;

        self.zip
            .start_file("docProps/app.xml", self.options.clone())?;
        self.zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>xlsxport</Application>
</Properties>"#,
        )?;
        Ok(())
    }

    fn write_workbook_xml(&mut self) -> Result<()> {
        self.zip
            .start_file("xl/workbook.xml", self.options.clone())?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
"#,
        );

        for (i, name) in self.sheets.iter().enumerate() {
            content.push_str(&format!(
                "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>\n",
                escape_xml(name),
                i + 1,
                i + 1
            ));
        }

        content.push_str("</sheets>\n</workbook>");
        self.zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_workbook_rels(&mut self) -> Result<()> {
        self.zip
            .start_file("xl/_rels/workbook.xml.rels", self.options.clone())?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#,
        );

        for i in 0..self.sheets.len() {
            content.push_str(&format!(
                "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{}.xml\"/>\n",
                i + 1,
                i + 1
            ));
        }

        content.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\n",
            self.sheets.len() + 1
        ));

        content.push_str("</Relationships>");
        self.zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_styles_xml(&mut self) -> Result<()> {
        self.zip
            .start_file("xl/styles.xml", self.options.clone())?;
        let xml = self.styles.to_xml();
        self.zip.write_all(xml.as_bytes())?;
        Ok(())
    }
}

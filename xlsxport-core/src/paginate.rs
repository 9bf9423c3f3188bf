//! The paginated writer: sheet and file rotation over budgets.
//!
//! Budgets are checked on every row, file first, then sheet: a row that
//! would exceed the file budget closes and persists the whole current
//! file (renaming its sheets first) before a fresh one is opened, so a
//! sheet rotation never lands in a file that is already over budget.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cell::{Cell, CellValue};
use crate::error::{ExportError, Result};
use crate::streaming::{SheetStream, StreamingWorkbook};
use crate::style::StyleRules;

/// Row budgets driving rotation.
#[derive(Clone, Copy, Debug)]
pub struct ExportLimits {
    /// Maximum rows per sheet, including the header row when one is
    /// set. Required, must be > 0.
    pub max_sheet_rows: u64,
    /// Maximum data rows per output file. `None` means unbounded.
    pub max_file_rows: Option<u64>,
}

impl Default for ExportLimits {
    fn default() -> Self {
        ExportLimits {
            max_sheet_rows: 1_000_000,
            max_file_rows: None,
        }
    }
}

/// Owns the current output file and sheet, rotating both when their
/// budgets are exceeded.
///
/// Counters: the sheet counter includes the header row; the file and
/// total counters count data rows only, which keeps the derived file
/// index `ceil(total / file_budget)` exact.
pub struct PaginatedWriter {
    output: PathBuf,
    dir: PathBuf,
    password: Option<String>,
    sheet_base: Option<String>,
    limits: ExportLimits,
    rules: StyleRules,
    header: Vec<CellValue>,

    workbook: Option<StreamingWorkbook>,
    sheet: Option<SheetStream>,
    // Target path the open file will persist to, fixed at open time.
    current_target: PathBuf,
    sheet_rows: u64,
    file_rows: u64,
    total_rows: u64,
    sheets_written: usize,
    files_written: usize,
}

impl PaginatedWriter {
    /// Create the first file and its first sheet.
    pub fn open(
        output: &Path,
        password: Option<String>,
        sheet_base: Option<String>,
        limits: ExportLimits,
        rules: StyleRules,
    ) -> Result<Self> {
        if limits.max_sheet_rows == 0 {
            return Err(ExportError::custom("sheet row budget must be greater than zero"));
        }

        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut writer = PaginatedWriter {
            current_target: output.to_path_buf(),
            output: output.to_path_buf(),
            dir,
            password,
            sheet_base,
            limits,
            rules,
            header: Vec::new(),
            workbook: None,
            sheet: None,
            sheet_rows: 0,
            file_rows: 0,
            total_rows: 0,
            sheets_written: 0,
            files_written: 0,
        };
        writer.open_file()?;
        Ok(writer)
    }

    /// Store the header; when non-empty it is re-emitted as row 1 of
    /// every sheet and occupies one slot of the sheet budget.
    pub fn set_header(&mut self, header: Vec<CellValue>) -> Result<()> {
        if !header.is_empty() && self.limits.max_sheet_rows < 2 {
            return Err(ExportError::custom(
                "sheet row budget leaves no room for data below the header",
            ));
        }
        self.header = header;
        Ok(())
    }

    /// Data rows written so far, across all sheets and files.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Sheets created so far, across all files.
    pub fn sheets_written(&self) -> usize {
        let open = self.workbook.as_ref().map_or(0, |wb| wb.sheet_count());
        self.sheets_written + open
    }

    /// Files persisted plus the one currently open.
    pub fn files_written(&self) -> usize {
        self.files_written + usize::from(self.workbook.is_some())
    }

    /// Write one data row, rotating file and/or sheet first when a
    /// budget would be exceeded.
    pub fn add_row(&mut self, mut cells: Vec<Cell>) -> Result<()> {
        if self.workbook.is_none() {
            return Err(ExportError::custom("writer is closed"));
        }

        if let Some(budget) = self.limits.max_file_rows {
            if self.file_rows + 1 > budget {
                self.rotate_file()?;
            }
        }

        let header_rows = u64::from(self.sheet_rows == 0 && !self.header.is_empty());
        if self.sheet_rows + header_rows + 1 > self.limits.max_sheet_rows {
            self.rotate_sheet()?;
        }

        if self.sheet_rows == 0 && !self.header.is_empty() {
            self.write_header()?;
        }

        let row_num = (self.sheet_rows + 1) as u32;
        let workbook = self.workbook.as_mut().unwrap_or_else(|| unreachable!());
        for (i, cell) in cells.iter_mut().enumerate() {
            let style = self.rules.resolve(row_num, (i + 1) as u32);
            cell.style = workbook.intern_style(&style);
        }
        let sheet = self.sheet.as_mut().unwrap_or_else(|| unreachable!());
        workbook.append_row(sheet, &cells, self.rules.row_height(row_num))?;

        self.sheet_rows += 1;
        self.file_rows += 1;
        self.total_rows += 1;
        Ok(())
    }

    /// Flush the current sheet, rename all sheets in the current file,
    /// and persist it.
    pub fn close(&mut self) -> Result<()> {
        if self.workbook.is_none() {
            return Ok(());
        }
        self.close_file()
    }

    fn write_header(&mut self) -> Result<()> {
        let workbook = self.workbook.as_mut().unwrap_or_else(|| unreachable!());
        let mut cells = Vec::with_capacity(self.header.len());
        for (i, value) in self.header.iter().enumerate() {
            let style = self.rules.resolve(1, (i + 1) as u32);
            cells.push(Cell {
                value: value.clone(),
                style: workbook.intern_style(&style),
            });
        }
        let sheet = self.sheet.as_mut().unwrap_or_else(|| unreachable!());
        workbook.append_row(sheet, &cells, self.rules.row_height(1))?;
        self.sheet_rows += 1;
        Ok(())
    }

    fn open_file(&mut self) -> Result<()> {
        let mut workbook = StreamingWorkbook::create(&self.dir, self.password.clone())?;
        let mut sheet = workbook.create_sheet("Sheet1")?;
        Self::apply_col_widths(&self.rules, &mut workbook, &mut sheet)?;
        self.workbook = Some(workbook);
        self.sheet = Some(sheet);
        self.sheet_rows = 0;
        self.file_rows = 0;
        Ok(())
    }

    fn rotate_sheet(&mut self) -> Result<()> {
        let workbook = self.workbook.as_mut().unwrap_or_else(|| unreachable!());
        let mut old = self.sheet.take().unwrap_or_else(|| unreachable!());
        workbook.finish_sheet(&mut old)?;

        let name = format!("Sheet{}", workbook.sheet_count() + 1);
        debug!(sheet = %name, "rotating to a new sheet");
        let mut sheet = workbook.create_sheet(&name)?;
        Self::apply_col_widths(&self.rules, workbook, &mut sheet)?;
        self.sheet = Some(sheet);
        self.sheet_rows = 0;
        Ok(())
    }

    fn rotate_file(&mut self) -> Result<()> {
        self.close_file()?;
        self.current_target = self.derived_target()?;
        debug!(
            total_rows = self.total_rows,
            file = %self.current_target.display(),
            "rotating to a new output file"
        );
        self.open_file()
    }

    fn close_file(&mut self) -> Result<()> {
        let mut workbook = self.workbook.take().unwrap_or_else(|| unreachable!());
        let mut sheet = self.sheet.take().unwrap_or_else(|| unreachable!());

        // Renaming happens exactly once per file, after its last sheet
        // exists; earlier the suffix count would be wrong.
        if let Some(base) = &self.sheet_base {
            workbook.rename_sheets(base);
        }

        self.sheets_written += workbook.sheet_count();
        workbook.close(&mut sheet, &self.current_target)?;
        self.files_written += 1;
        debug!(file = %self.current_target.display(), "persisted output file");
        Ok(())
    }

    /// Path for the file a rotation opens: the configured target with
    /// `-<N>` inserted before the extension, where
    /// `N = ceil(total_rows / file_budget)` at rotation time. The first
    /// file keeps the configured name.
    fn derived_target(&self) -> Result<PathBuf> {
        let budget = self
            .limits
            .max_file_rows
            .unwrap_or_else(|| unreachable!("file rotation without a budget"));

        let index = self.total_rows.div_ceil(budget);
        let stem = self
            .output
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ExportError::custom("output path has no file name"))?;
        let name = match self.output.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}-{index}.{ext}"),
            None => format!("{stem}-{index}"),
        };
        Ok(self.dir.join(name))
    }

    fn apply_col_widths(
        rules: &StyleRules,
        workbook: &mut StreamingWorkbook,
        sheet: &mut SheetStream,
    ) -> Result<()> {
        for &(min, max, width) in rules.col_widths() {
            workbook.set_col_width(sheet, min, max, width)?;
        }
        Ok(())
    }
}

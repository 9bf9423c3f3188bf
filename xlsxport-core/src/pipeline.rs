//! The export pipeline: cursor -> encoder -> paginated writer.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::cell::{CellValue, Column, RawValue};
use crate::encode::CellEncoder;
use crate::error::Result;
use crate::paginate::{ExportLimits, PaginatedWriter};
use crate::style::{StyleRuleStrings, StyleRules};

/// The row cursor the pipeline consumes. The query has already been
/// executed upstream; the cursor is read strictly in order, once.
pub trait RowSource {
    /// Ordered column names and declared type names.
    fn columns(&self) -> &[Column];

    /// Scan the next row, or `None` when the cursor is exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<RawValue>>>;
}

/// Configuration consumed by the core, already parsed upstream.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Output path; file rotation derives `<stem>-<N>.<ext>` siblings.
    pub output: PathBuf,
    /// Optional password; output becomes an ECMA-376 encrypted container.
    pub password: Option<String>,
    /// Custom sheet base name applied during end-of-file renaming.
    pub sheet_name: Option<String>,
    /// Maximum rows per sheet, header included.
    pub max_sheet_rows: u64,
    /// Maximum data rows per output file; `None` means one file.
    pub max_file_rows: Option<u64>,
    /// Style rule strings.
    pub styles: StyleRuleStrings,
    /// Sleep after every `batch_size` written rows; 0 disables throttling.
    pub batch_size: usize,
    /// How long each throttling pause lasts.
    pub delay: Duration,
}

impl ExportConfig {
    pub fn new<P: Into<PathBuf>>(output: P) -> Self {
        ExportConfig {
            output: output.into(),
            password: None,
            sheet_name: None,
            max_sheet_rows: 1_000_000,
            max_file_rows: None,
            styles: StyleRuleStrings::default(),
            batch_size: 10_000,
            delay: Duration::from_secs(1),
        }
    }
}

/// What an export run produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    /// Data rows written (headers excluded).
    pub rows: u64,
    /// Sheets created across all files.
    pub sheets: usize,
    /// Output files persisted.
    pub files: usize,
}

/// Periodic pause after N rows to bound load on the upstream source.
/// Admission control only; correctness does not depend on it.
struct Throttle {
    batch_size: usize,
    delay: Duration,
    pending: usize,
}

impl Throttle {
    fn new(batch_size: usize, delay: Duration) -> Self {
        Throttle { batch_size, delay, pending: 0 }
    }

    fn tick(&mut self) {
        if self.batch_size == 0 || self.delay.is_zero() {
            return;
        }
        self.pending += 1;
        if self.pending >= self.batch_size {
            std::thread::sleep(self.delay);
            self.pending = 0;
        }
    }
}

/// Drives the cursor to completion through the encoder into the writer.
///
/// Failure policy: any rule syntax, encode, or write failure aborts the
/// whole export; there is no row-level recovery. The writer is closed on
/// both the success and the abort path, so sheets flushed before an
/// abort survive on disk (partial output is not cleaned up).
pub struct ExportPipeline<S> {
    source: S,
    config: ExportConfig,
}

impl<S: RowSource> ExportPipeline<S> {
    pub fn new(source: S, config: ExportConfig) -> Self {
        ExportPipeline { source, config }
    }

    pub fn run(mut self) -> Result<ExportSummary> {
        // Style strings are validated before the first row is pulled.
        let rules = StyleRules::parse(&self.config.styles)?;

        let columns = self.source.columns().to_vec();
        let encoder = CellEncoder::new(columns.clone());

        let mut writer = PaginatedWriter::open(
            &self.config.output,
            self.config.password.clone(),
            self.config.sheet_name.clone(),
            ExportLimits {
                max_sheet_rows: self.config.max_sheet_rows,
                max_file_rows: self.config.max_file_rows,
            },
            rules,
        )?;
        writer.set_header(
            columns
                .iter()
                .map(|c| CellValue::String(c.name.clone()))
                .collect(),
        )?;

        let mut throttle = Throttle::new(self.config.batch_size, self.config.delay);
        let result = Self::drive(&mut self.source, &encoder, &mut writer, &mut throttle);

        // Guaranteed-release path: close even after an abort so
        // already-written sheets are not lost.
        let closed = writer.close();
        result?;
        closed?;

        let summary = ExportSummary {
            rows: writer.total_rows(),
            sheets: writer.sheets_written(),
            files: writer.files_written(),
        };
        info!(
            rows = summary.rows,
            sheets = summary.sheets,
            files = summary.files,
            "export completed"
        );
        Ok(summary)
    }

    fn drive(
        source: &mut S,
        encoder: &CellEncoder,
        writer: &mut PaginatedWriter,
        throttle: &mut Throttle,
    ) -> Result<()> {
        while let Some(row) = source.next_row()? {
            let cells = encoder.encode_row(&row)?;
            writer.add_row(cells)?;
            throttle.tick();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_disabled_by_zero_batch() {
        let mut throttle = Throttle::new(0, Duration::from_secs(60));
        // Would hang for a minute if the batch guard were missing.
        for _ in 0..5 {
            throttle.tick();
        }
    }

    #[test]
    fn test_throttle_counts_and_resets() {
        let mut throttle = Throttle::new(3, Duration::from_millis(1));
        for _ in 0..7 {
            throttle.tick();
        }
        assert_eq!(throttle.pending, 1);
    }
}

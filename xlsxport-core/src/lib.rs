//! Streaming, paginated, style-aware xlsx export core.
//!
//! One-shot batch exporter that streams the result set of a single
//! query into one or more xlsx files, bounding memory regardless of row
//! count. Rows are pulled from an already-open cursor ([`RowSource`]),
//! converted to typed cells ([`CellEncoder`]), styled from compact
//! range rules ([`StyleRules`]), and written through a rotating writer
//! ([`PaginatedWriter`]) that starts a new sheet or a new file whenever
//! a row budget would be exceeded.
//!
//! ```no_run
//! use xlsxport_core::{Column, ExportConfig, ExportPipeline, RawValue, RowSource};
//! # struct Cursor(Vec<Column>);
//! # impl RowSource for Cursor {
//! #     fn columns(&self) -> &[Column] { &self.0 }
//! #     fn next_row(&mut self) -> xlsxport_core::Result<Option<Vec<RawValue>>> { Ok(None) }
//! # }
//! # let cursor = Cursor(vec![Column::new("id", "BIGINT")]);
//!
//! let mut config = ExportConfig::new("report.xlsx");
//! config.sheet_name = Some("orders".to_string());
//! config.styles.col_width = "2-4:20".to_string();
//!
//! let summary = ExportPipeline::new(cursor, config).run()?;
//! println!("{} rows in {} sheets", summary.rows, summary.sheets);
//! # Ok::<(), xlsxport_core::ExportError>(())
//! ```

pub mod cell;
pub mod encode;
pub mod error;
pub mod paginate;
pub mod pipeline;
pub mod streaming;
pub mod style;
pub mod utils;

pub use cell::{Cell, CellValue, Column, RawValue, StyleId};
pub use encode::CellEncoder;
pub use error::{ExportError, Result};
pub use paginate::{ExportLimits, PaginatedWriter};
pub use pipeline::{ExportConfig, ExportPipeline, ExportSummary, RowSource};
pub use streaming::{SheetStream, StreamingWorkbook};
pub use style::{CellStyle, StyleRegistry, StyleRuleStrings, StyleRules};

//! Error types for the export pipeline.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ExportError>;

/// All failure modes of an export run.
///
/// Every variant except the untested-type warning (which is logged, not
/// raised) terminates the run; there are no retries anywhere in the core.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Underlying I/O failure during write, flush, or persist.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container-format failure from the zip layer.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Malformed style range entry, e.g. a missing `:` separator or a
    /// range bound that is not an integer. Raised before any row is
    /// processed.
    #[error("invalid style rule entry '{0}'")]
    RuleSyntax(String),

    /// An integer-typed column carried text that does not parse as i64.
    #[error("column '{column}': malformed integer value '{value}'")]
    MalformedInteger { column: String, value: String },

    /// A fractional-typed column carried text that does not parse as f64.
    #[error("column '{column}': malformed float value '{value}'")]
    MalformedFloat { column: String, value: String },

    /// A value of an unrecognized declared type with no text form.
    #[error("column '{column}': unsupported database type '{type_name}'")]
    UnsupportedType { column: String, type_name: String },

    /// Failure while wrapping the output in an encrypted container.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Catch-all for invariant violations (misuse of the writer API).
    #[error("{0}")]
    Custom(String),
}

impl ExportError {
    /// Create a custom error from any message.
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        ExportError::Custom(msg.into())
    }
}

//! Error types for the document model and format translation

use thiserror::Error;

/// Hard errors surfaced to callers of the editing API.
///
/// Codec failures (I/O, corrupt containers, malformed XML) travel as `anyhow::Error` with
/// context attached; these model errors stay downcastable from them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SheetError {
    /// Write into (or creation of) a non-anchor cell of a merged region
    #[error(
        "cell R{row}C{col} lies inside the merged region anchored at R{anchor_row}C{anchor_col}"
    )]
    MergeCell {
        row: u32,
        col: u32,
        anchor_row: u32,
        anchor_col: u32,
    },
    /// Address outside the representable 65,535 x 256 grid
    #[error("address R{row}C{col} is outside the 65535-row by 256-column grid")]
    AddressFormat { row: u32, col: u32 },
    #[error("worksheet '{0}' already exists")]
    DuplicateWorksheet(String),
    #[error("worksheet '{0}' not found")]
    WorksheetNotFound(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
}

pub type Result<T> = std::result::Result<T, SheetError>;

/// A value from one schema that has no faithful counterpart in the other.
///
/// These never abort a load or save; the codec substitutes a documented default and records a
/// [`Diagnostic`](crate::Diagnostic).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("unparseable border '{0}'")]
    Border(String),
    #[error("unsupported number format '{0}'")]
    NumberFormat(String),
    #[error("unknown paper size {0}")]
    PaperSize(String),
    #[error("unparseable length '{0}'")]
    Length(String),
    #[error("unsupported line style '{0}'")]
    LineStyle(String),
    #[error("unsupported value '{value}' for {attribute}")]
    Attribute { attribute: String, value: String },
}

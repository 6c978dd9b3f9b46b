use std::io;

use thiserror::Error;

use crate::model::SourceKind;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("{kind} extraction failed: {message}")]
    SourceUnavailable { kind: SourceKind, message: String },

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("failed to read DOCX: {0}")]
    Docx(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("no pages available after applying selection")]
    NoPagesSelected,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("table has no columns")]
    NoColumns,

    #[error("table has no data rows")]
    NoRows,

    #[error("header at column {0} is empty")]
    EmptyHeader(usize),

    #[error("duplicate header '{0}'")]
    DuplicateHeader(String),

    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("column '{0}' not found")]
    UnknownColumn(String),

    #[error("row index {index} is out of range for {len} rows")]
    RowOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("table id hint is empty")]
    EmptyIdHint,

    #[error("table id '{0}' does not start with a known source prefix")]
    UnknownSource(String),

    #[error(transparent)]
    Invalid(#[from] TableError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Excel write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("table '{0}' not found")]
    NotFound(String),

    #[error("no tables to export")]
    NoTables,

    #[error("{count} tables selected, a CSV payload holds exactly one table")]
    MultipleTables { count: usize },

    #[error("could not encode table '{table_id}': {message}")]
    Encoding { table_id: String, message: String },

    #[error("invalid table '{table_id}' in document: {error}")]
    InvalidTable { table_id: String, error: TableError },
}

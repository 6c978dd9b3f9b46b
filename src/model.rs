use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::TableError;

pub type RawCell = Option<String>;

pub(crate) fn is_blank(cell: &RawCell) -> bool {
    cell.as_deref().is_none_or(|text| text.trim().is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    #[must_use]
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn from_text_rows<I, R, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|cell| Some(cell.into())).collect())
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(is_blank))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedTable {
    pub id_hint: String,
    pub table: RawTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "camelot")]
    Lattice,
    #[serde(rename = "pdfplumber")]
    Stream,
    #[serde(rename = "python-docx")]
    Docx,
}

impl SourceKind {
    pub const ALL: [Self; 3] = [Self::Lattice, Self::Stream, Self::Docx];

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Lattice => "camelot",
            Self::Stream => "pdfplumber",
            Self::Docx => "python-docx",
        }
    }

    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Lattice => "camelot",
            Self::Stream => "pdfplumber",
            Self::Docx => "docx",
        }
    }

    #[must_use]
    pub fn from_id_hint(id_hint: &str) -> Option<Self> {
        let prefix = id_hint.split('_').next()?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.id_prefix() == prefix)
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub table_id: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub source: SourceKind,
}

impl Table {
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Checks the invariants a table must hold before it can be exported:
    /// non-empty unique headers, at least one row, every row as wide as the headers.
    pub fn validate(&self) -> Result<(), TableError> {
        if self.headers.is_empty() {
            return Err(TableError::NoColumns);
        }

        let mut seen = HashSet::with_capacity(self.headers.len());
        for (index, header) in self.headers.iter().enumerate() {
            if header.trim().is_empty() {
                return Err(TableError::EmptyHeader(index));
            }
            if !seen.insert(header.as_str()) {
                return Err(TableError::DuplicateHeader(header.clone()));
            }
        }

        if self.rows.is_empty() {
            return Err(TableError::NoRows);
        }

        let expected = self.headers.len();
        if let Some((row, found)) = self
            .rows
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, width)| *width != expected)
        {
            return Err(TableError::RowWidth {
                row,
                expected,
                found,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    NoTablesFound,
    Failed,
}

impl ExtractionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoTablesFound => "no_tables_found",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub tables: Vec<Table>,
    pub file_name: String,
    pub status: ExtractionStatus,
    pub extraction_method: Option<SourceKind>,
    pub error: Option<String>,
}

impl ExtractionResult {
    #[must_use]
    pub fn from_tables(
        file_name: impl Into<String>,
        tables: Vec<Table>,
        extraction_method: Option<SourceKind>,
    ) -> Self {
        let status = if tables.is_empty() {
            ExtractionStatus::NoTablesFound
        } else {
            ExtractionStatus::Success
        };

        Self {
            tables,
            file_name: file_name.into(),
            status,
            extraction_method,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(
        file_name: impl Into<String>,
        error: impl Display,
        extraction_method: Option<SourceKind>,
    ) -> Self {
        Self {
            tables: Vec::new(),
            file_name: file_name.into(),
            status: ExtractionStatus::Failed,
            extraction_method,
            error: Some(error.to_string()),
        }
    }

    #[must_use]
    pub fn table(&self, table_id: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.table_id == table_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    pub const SUPPORTED_EXTENSIONS: [&'static str; 3] = ["pdf", "docx", "doc"];

    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" => Some(Self::Docx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

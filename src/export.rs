use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::csv_out::table_to_csv;
use crate::error::ExportError;
use crate::json_out::to_json;
use crate::model::{ExtractionResult, Table};
use crate::xlsx_out::to_xlsx;

pub const JSON_FILE_NAME: &str = "extraction_result.json";
pub const XLSX_FILE_NAME: &str = "extracted_tables.xlsx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Xlsx,
}

impl ExportFormat {
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json => "application/json",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Xlsx => "xlsx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "xlsx" | "excel" => Ok(Self::Xlsx),
            other => Err(format!(
                "unknown export format '{other}', expected csv, json or xlsx"
            )),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

pub fn select_tables<'a>(
    tables: &'a [Table],
    table_id: Option<&str>,
) -> Result<Vec<&'a Table>, ExportError> {
    if tables.is_empty() {
        return Err(ExportError::NoTables);
    }

    match table_id {
        None => Ok(tables.iter().collect()),
        Some(id) => tables
            .iter()
            .find(|table| table.table_id == id)
            .map(|table| vec![table])
            .ok_or_else(|| ExportError::NotFound(id.to_string())),
    }
}

/// CSV holds a single table, so a CSV export of a result with several tables
/// needs a `table_id`.
pub fn export(
    result: &ExtractionResult,
    format: ExportFormat,
    table_id: Option<&str>,
) -> Result<ExportPayload, ExportError> {
    let selected = select_tables(&result.tables, table_id)?;

    let (bytes, file_name) = match format {
        ExportFormat::Csv => {
            let [table] = selected.as_slice() else {
                return Err(ExportError::MultipleTables {
                    count: selected.len(),
                });
            };
            (
                table_to_csv(table, b',')?.into_bytes(),
                format!("{}.csv", table.table_id),
            )
        }
        ExportFormat::Json => {
            let filtered;
            let scoped = if table_id.is_some() {
                filtered = ExtractionResult {
                    tables: selected.into_iter().cloned().collect(),
                    ..result.clone()
                };
                &filtered
            } else {
                result
            };
            (to_json(scoped)?, JSON_FILE_NAME.to_string())
        }
        ExportFormat::Xlsx => {
            let tables = selected.into_iter().cloned().collect::<Vec<_>>();
            (to_xlsx(&tables)?, XLSX_FILE_NAME.to_string())
        }
    };

    Ok(ExportPayload {
        bytes,
        file_name,
        mime_type: format.mime_type(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table_number: usize,
    pub table_id: String,
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub export_timestamp: DateTime<Utc>,
    pub total_tables: usize,
    pub tables: Vec<TableSummary>,
}

#[must_use]
pub fn export_summary(tables: &[Table]) -> ExportSummary {
    export_summary_at(tables, Utc::now())
}

#[must_use]
pub fn export_summary_at(tables: &[Table], timestamp: DateTime<Utc>) -> ExportSummary {
    ExportSummary {
        export_timestamp: timestamp,
        total_tables: tables.len(),
        tables: tables
            .iter()
            .enumerate()
            .map(|(index, table)| TableSummary {
                table_number: index + 1,
                table_id: table.table_id.clone(),
                rows: table.row_count(),
                columns: table.column_count(),
                column_names: table.headers.clone(),
            })
            .collect(),
    }
}

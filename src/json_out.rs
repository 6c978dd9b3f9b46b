use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::model::{ExtractionResult, ExtractionStatus, SourceKind, Table};

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    tables: Vec<TableRef<'a>>,
    file_name: &'a str,
    status: ExtractionStatus,
    extraction_method: Option<SourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct TableRef<'a> {
    table_id: &'a str,
    source: SourceKind,
    headers: &'a [String],
    rows: Vec<IndexMap<&'a str, &'a str>>,
}

fn ensure_valid(table: &Table) -> Result<(), ExportError> {
    table.validate().map_err(|error| ExportError::InvalidTable {
        table_id: table.table_id.clone(),
        error,
    })
}

impl<'a> TableRef<'a> {
    fn new(table: &'a Table) -> Result<Self, ExportError> {
        ensure_valid(table)?;
        let rows = table
            .rows
            .iter()
            .map(|row| {
                table
                    .headers
                    .iter()
                    .map(String::as_str)
                    .zip(row.iter().map(String::as_str))
                    .collect()
            })
            .collect();

        Ok(Self {
            table_id: &table.table_id,
            source: table.source,
            headers: &table.headers,
            rows,
        })
    }
}

#[derive(Deserialize)]
struct Envelope {
    tables: Vec<TableRecord>,
    file_name: String,
    status: ExtractionStatus,
    #[serde(default)]
    extraction_method: Option<SourceKind>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TableRecord {
    table_id: String,
    source: SourceKind,
    headers: Vec<String>,
    rows: Vec<IndexMap<String, Option<String>>>,
}

impl TableRecord {
    fn into_table(self) -> Result<Table, ExportError> {
        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                self.headers
                    .iter()
                    .map(|header| row.swap_remove(header).flatten().unwrap_or_default())
                    .collect()
            })
            .collect();

        let table = Table {
            table_id: self.table_id,
            headers: self.headers,
            rows,
            source: self.source,
        };
        ensure_valid(&table)?;
        Ok(table)
    }
}

pub fn to_json(result: &ExtractionResult) -> Result<Vec<u8>, ExportError> {
    let tables = result
        .tables
        .iter()
        .map(TableRef::new)
        .collect::<Result<Vec<_>, _>>()?;
    let envelope = EnvelopeRef {
        tables,
        file_name: &result.file_name,
        status: result.status,
        extraction_method: result.extraction_method,
        error: result.error.as_deref(),
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

pub fn from_json(bytes: &[u8]) -> Result<ExtractionResult, ExportError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    let tables = envelope
        .tables
        .into_iter()
        .map(TableRecord::into_table)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ExtractionResult {
        tables,
        file_name: envelope.file_name,
        status: envelope.status,
        extraction_method: envelope.extraction_method,
        error: envelope.error,
    })
}

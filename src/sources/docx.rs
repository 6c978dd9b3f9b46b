use std::fs;
use std::iter;
use std::path::Path;

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, TableCellContent, TableChild,
    TableRowChild,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::ExtractError;
use crate::model::{RawCell, RawTable, SourceKind, SourcedTable};
use crate::sources::TableSource;

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();

    for child in &paragraph.children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => {
                for child in &link.children {
                    if let ParagraphChild::Run(run) = child {
                        for run_child in &run.children {
                            if let RunChild::Text(t) = run_child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    text
}

fn cell_text(children: &[TableCellContent]) -> RawCell {
    let text = children
        .iter()
        .filter_map(|child| match child {
            TableCellContent::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    (!text.is_empty()).then_some(text)
}

// Layout keys of `w:tcPr`. docx-rs keeps them private but serializes them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellLayout {
    #[serde(default)]
    grid_span: Option<usize>,
    #[serde(default)]
    vertical_merge: Option<String>,
}

impl CellLayout {
    fn of(cell: &docx_rs::TableCell) -> Self {
        serde_json::to_value(&cell.property)
            .and_then(serde_json::from_value)
            .unwrap_or_default()
    }

    fn span(&self) -> usize {
        self.grid_span.unwrap_or(1).max(1)
    }

    fn continues_merge(&self) -> bool {
        self.vertical_merge.as_deref() == Some("continue")
    }
}

// One entry per grid column: a spanned cell repeats its text and a vertical
// merge continuation repeats the text of the cell above.
fn raw_table(table: &docx_rs::Table) -> RawTable {
    let mut rows: Vec<Vec<RawCell>> = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let TableChild::TableRow(row) = row;
        let mut cells = Vec::with_capacity(row.cells.len());
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell;
            let layout = CellLayout::of(cell);
            let text = if layout.continues_merge() {
                rows.last()
                    .and_then(|above| above.get(cells.len()))
                    .cloned()
                    .flatten()
            } else {
                cell_text(&cell.children)
            };
            cells.extend(iter::repeat_n(text, layout.span()));
        }
        rows.push(cells);
    }

    RawTable::new(rows)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocxSource;

impl DocxSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn read_bytes(&self, bytes: &[u8]) -> Result<Vec<SourcedTable>, ExtractError> {
        let document = docx_rs::read_docx(bytes)
            .map_err(|error| ExtractError::Docx(format!("failed to parse document: {error}")))?;

        let tables = document
            .document
            .children
            .iter()
            .filter_map(|child| match child {
                DocumentChild::Table(table) => Some(raw_table(table)),
                _ => None,
            })
            .enumerate()
            .map(|(index, table)| SourcedTable {
                id_hint: format!("{}_table_{index}", SourceKind::Docx.id_prefix()),
                table,
            })
            .collect::<Vec<_>>();

        debug!(tables = tables.len(), "docx tables read");
        Ok(tables)
    }
}

impl TableSource for DocxSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Docx
    }

    fn read_tables(&self, path: &Path) -> Result<Vec<SourcedTable>, ExtractError> {
        let bytes = fs::read(path)?;
        self.read_bytes(&bytes)
    }
}

use std::path::Path;

use tracing::debug;

use crate::error::ExtractError;
use crate::model::{PageText, RawTable, SourceKind, SourcedTable};
use crate::options::{ExtractOptions, PageSelection};
use crate::sources::TableSource;
use crate::sources::pdf_text::read_page_texts;
use crate::table_parse::{modal_width, soft_split_line_into_cells, split_line_into_cells};

#[allow(clippy::cast_precision_loss)]
fn table_confidence(rows: &[Vec<String>]) -> f32 {
    if rows.len() < 2 {
        return 0.0;
    }

    let modal = modal_width(rows);
    if modal == 0 {
        return 0.0;
    }

    let consistent =
        rows.iter().filter(|row| row.len() == modal).count() as f32 / rows.len() as f32;
    let max_width = rows.iter().map(Vec::len).max().unwrap_or(modal);
    let min_width = rows.iter().map(Vec::len).min().unwrap_or(modal);
    let uniformity = if max_width == 0 {
        0.0
    } else {
        1.0 - ((max_width - min_width) as f32 / max_width as f32)
    };

    (consistent * 0.75 + uniformity * 0.25).clamp(0.0, 1.0)
}

fn line_cells(line: &str, min_cols: usize) -> Option<Vec<String>> {
    let cells = split_line_into_cells(line);
    if cells.len() >= min_cols {
        return Some(cells);
    }

    let soft_cells = soft_split_line_into_cells(line);
    let has_numeric = soft_cells
        .iter()
        .any(|cell| cell.chars().any(|ch| ch.is_ascii_digit()));
    let looks_like_sentence = ['.', '!', '?']
        .iter()
        .any(|punctuation| line.trim_end().ends_with(*punctuation));

    (soft_cells.len() >= min_cols && !looks_like_sentence && (has_numeric || soft_cells.len() <= 6))
        .then_some(soft_cells)
}

pub(crate) fn detect_tables_in_page(page: &PageText, min_cols: usize) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut current_rows: Vec<Vec<String>> = Vec::new();

    let flush_current = |rows: &mut Vec<Vec<String>>, tables: &mut Vec<Vec<Vec<String>>>| {
        if rows.len() >= 2 {
            debug!(
                page = page.page_number,
                rows = rows.len(),
                confidence = table_confidence(rows),
                "borderless table candidate"
            );
            tables.push(std::mem::take(rows));
        } else {
            rows.clear();
        }
    };

    for line in page.text.lines() {
        match line_cells(line, min_cols) {
            Some(cells) => current_rows.push(cells),
            None => flush_current(&mut current_rows, &mut tables),
        }
    }

    flush_current(&mut current_rows, &mut tables);
    tables
}

#[derive(Debug, Clone)]
pub struct StreamSource {
    pages: Option<PageSelection>,
    min_cols: usize,
}

impl StreamSource {
    #[must_use]
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            pages: options.pages.clone(),
            min_cols: options.min_cols.max(2),
        }
    }
}

impl TableSource for StreamSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Stream
    }

    fn read_tables(&self, path: &Path) -> Result<Vec<SourcedTable>, ExtractError> {
        let pages = read_page_texts(path, self.pages.as_ref())?;

        let mut tables = Vec::new();
        for page in &pages {
            let page_index = page.page_number.saturating_sub(1);
            for (index, rows) in detect_tables_in_page(page, self.min_cols)
                .into_iter()
                .enumerate()
            {
                tables.push(SourcedTable {
                    id_hint: format!(
                        "{}_page_{page_index}_table_{index}",
                        SourceKind::Stream.id_prefix()
                    ),
                    table: RawTable::from_text_rows(rows),
                });
            }
        }

        Ok(tables)
    }
}

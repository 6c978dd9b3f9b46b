use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::NormalizeError;
use crate::model::{RawTable, SourceKind, Table};
use crate::table_parse::{fit_row, is_blank_row};

#[must_use]
pub fn normalize(raw: &RawTable, id_hint: &str) -> Option<Table> {
    match try_normalize(raw, id_hint) {
        Ok(table) => table,
        Err(error) => {
            warn!(table_id = id_hint, %error, "skipping table that could not be normalized");
            None
        }
    }
}

/// `Ok(None)` means the table was empty after cleaning, which is not an error.
pub fn try_normalize(raw: &RawTable, id_hint: &str) -> Result<Option<Table>, NormalizeError> {
    if id_hint.trim().is_empty() {
        return Err(NormalizeError::EmptyIdHint);
    }
    let source = SourceKind::from_id_hint(id_hint)
        .ok_or_else(|| NormalizeError::UnknownSource(id_hint.to_string()))?;

    let mut remaining = raw.rows.iter().filter(|row| !is_blank_row(row));
    let Some(header_row) = remaining.next() else {
        debug!(table_id = id_hint, "raw table is blank");
        return Ok(None);
    };

    let width = header_row.len();
    let header_cells = fit_row(header_row, width);
    let data_rows = remaining
        .map(|row| fit_row(row, width))
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect::<Vec<_>>();

    if data_rows.is_empty() {
        debug!(table_id = id_hint, "raw table has a header row but no data rows");
        return Ok(None);
    }

    let kept_columns = (0..width)
        .filter(|&column| {
            !header_cells[column].trim().is_empty()
                || data_rows.iter().any(|row| !row[column].trim().is_empty())
        })
        .collect::<Vec<_>>();

    let headers = kept_columns
        .iter()
        .enumerate()
        .map(|(position, &column)| {
            let name = header_cells[column].trim();
            if name.is_empty() {
                format!("col_{position}")
            } else {
                name.to_string()
            }
        })
        .collect::<Vec<_>>();

    let rows = data_rows
        .into_iter()
        .map(|row| {
            kept_columns
                .iter()
                .map(|&column| row[column].clone())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let table = Table {
        table_id: id_hint.to_string(),
        headers: dedupe_headers(headers),
        rows,
        source,
    };
    table.validate()?;

    Ok(Some(table))
}

pub(crate) fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut used = HashSet::with_capacity(headers.len());
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());

    for header in headers {
        let seen = occurrences.entry(header.clone()).or_insert(0);
        let mut k = *seen;
        let mut candidate = if k == 0 {
            header.clone()
        } else {
            format!("{header}_{k}")
        };
        while used.contains(&candidate) {
            k += 1;
            candidate = format!("{header}_{k}");
        }
        *seen = k + 1;

        used.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{dedupe_headers, normalize, try_normalize};
    use crate::error::NormalizeError;
    use crate::model::{RawTable, SourceKind};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[test]
    fn normalizes_clean_table() {
        let raw = RawTable::from_text_rows([["Name", "Age"], ["Ana", "30"], ["Bo", "25"]]);
        let table = normalize(&raw, "docx_table_0").expect("table should survive");

        assert_eq!(table.table_id, "docx_table_0");
        assert_eq!(table.headers, strings(&["Name", "Age"]));
        assert_eq!(
            table.rows,
            vec![strings(&["Ana", "30"]), strings(&["Bo", "25"])]
        );
        assert_eq!(table.source, SourceKind::Docx);
    }

    #[test]
    fn suffixes_duplicate_headers() {
        let raw = RawTable::from_text_rows([["Q1", "Q1", "Q2"], ["1", "2", "3"]]);
        let table = normalize(&raw, "camelot_table_0").expect("table should survive");
        assert_eq!(table.headers, strings(&["Q1", "Q1_1", "Q2"]));
    }

    #[test]
    fn dedupe_avoids_collisions_with_existing_names() {
        let deduped = dedupe_headers(strings(&["a", "a", "a_1", "a"]));
        assert_eq!(deduped, strings(&["a", "a_1", "a_1_1", "a_2"]));

        let unique = deduped.iter().collect::<std::collections::HashSet<_>>();
        assert_eq!(unique.len(), deduped.len());
    }

    #[test]
    fn fills_blank_headers_with_positional_names() {
        let raw = RawTable::new(vec![
            vec![Some(" Item ".to_string()), None, Some(String::new())],
            vec![
                Some("pen".to_string()),
                Some("3".to_string()),
                Some("1.5".to_string()),
            ],
        ]);
        let table = normalize(&raw, "pdfplumber_page_0_table_0").expect("table should survive");
        assert_eq!(table.headers, strings(&["Item", "col_1", "col_2"]));
        assert_eq!(table.source, SourceKind::Stream);
    }

    #[test]
    fn drops_blank_rows_and_columns() {
        let raw = RawTable::new(vec![
            vec![None, None, None],
            vec![
                Some("Name".to_string()),
                None,
                Some("Score".to_string()),
            ],
            vec![Some(" ".to_string()), None, None],
            vec![Some("Ana".to_string()), None, Some("9".to_string())],
        ]);
        let table = normalize(&raw, "docx_table_1").expect("table should survive");
        assert_eq!(table.headers, strings(&["Name", "Score"]));
        assert_eq!(table.rows, vec![strings(&["Ana", "9"])]);
    }

    #[test]
    fn positional_header_names_follow_pruned_columns() {
        let raw = RawTable::new(vec![
            vec![None, Some("A".to_string()), None, None],
            vec![None, Some("1".to_string()), None, Some("x".to_string())],
        ]);
        let table = normalize(&raw, "docx_table_0").expect("table should survive");
        assert_eq!(table.headers, strings(&["A", "col_1"]));
        assert_eq!(table.rows, vec![strings(&["1", "x"])]);
    }

    #[test]
    fn truncates_long_rows_and_pads_short_rows() {
        let raw = RawTable::new(vec![
            vec![Some("a".to_string()), Some("b".to_string())],
            vec![
                Some("1".to_string()),
                Some("2".to_string()),
                Some("3".to_string()),
            ],
            vec![Some("4".to_string())],
        ]);
        let table = normalize(&raw, "camelot_table_1").expect("table should survive");

        assert_eq!(table.rows, vec![strings(&["1", "2"]), strings(&["4", ""])]);
        assert!(table.rows.iter().all(|row| row.len() == table.headers.len()));
    }

    #[test]
    fn row_emptied_by_truncation_is_dropped() {
        let raw = RawTable::new(vec![
            vec![Some("a".to_string())],
            vec![None, Some("overflow".to_string())],
            vec![Some("kept".to_string())],
        ]);
        let table = normalize(&raw, "docx_table_0").expect("table should survive");
        assert_eq!(table.rows, vec![strings(&["kept"])]);
    }

    #[test]
    fn all_blank_table_is_absent() {
        let raw = RawTable::new(vec![
            vec![None, Some(String::new())],
            vec![Some("   ".to_string()), None],
        ]);
        assert_eq!(normalize(&raw, "docx_table_0"), None);
        assert_eq!(try_normalize(&raw, "docx_table_0"), Ok(None));
    }

    #[test]
    fn header_only_table_is_absent() {
        let raw = RawTable::from_text_rows([["Name", "Age"]]);
        assert_eq!(normalize(&raw, "docx_table_0"), None);
    }

    #[test]
    fn preserves_unicode_cells() {
        let raw = RawTable::from_text_rows([["名前", "Straße"], ["花子", "Größe"]]);
        let table = normalize(&raw, "docx_table_0").expect("table should survive");
        assert_eq!(table.headers, strings(&["名前", "Straße"]));
        assert_eq!(table.rows[0], strings(&["花子", "Größe"]));
    }

    #[test]
    fn rejects_unusable_id_hints() {
        let raw = RawTable::from_text_rows([["a"], ["1"]]);
        assert_eq!(
            try_normalize(&raw, " "),
            Err(NormalizeError::EmptyIdHint)
        );
        assert_eq!(
            try_normalize(&raw, "excel_sheet_0"),
            Err(NormalizeError::UnknownSource("excel_sheet_0".to_string()))
        );
        assert_eq!(normalize(&raw, "excel_sheet_0"), None);
    }
}

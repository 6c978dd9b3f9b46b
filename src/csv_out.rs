use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{Terminator, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::ExportError;
use crate::model::Table;

fn ensure_valid(table: &Table) -> Result<(), ExportError> {
    table.validate().map_err(|error| ExportError::InvalidTable {
        table_id: table.table_id.clone(),
        error,
    })
}

fn write_table<W: Write>(writer: W, table: &Table, delimiter: u8) -> Result<W, ExportError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    writer
        .into_inner()
        .map_err(|error| ExportError::Io(error.into_error()))
}

pub fn table_to_csv(table: &Table, delimiter: u8) -> Result<String, ExportError> {
    ensure_valid(table)?;
    let bytes = write_table(Vec::<u8>::new(), table, delimiter)?;
    String::from_utf8(bytes).map_err(|error| ExportError::Encoding {
        table_id: table.table_id.clone(),
        message: error.to_string(),
    })
}

pub fn to_csv(tables: &[Table], dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    to_csv_with_delimiter(tables, dir, b',')
}

pub fn to_csv_with_delimiter(
    tables: &[Table],
    dir: &Path,
    delimiter: u8,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for table in tables {
        if table.rows.is_empty() {
            debug!(table_id = %table.table_id, "skipping empty table");
            continue;
        }
        ensure_valid(table)?;
        if table.table_id.is_empty()
            || table.table_id.contains(['/', '\\'])
            || table.table_id.starts_with('.')
        {
            return Err(ExportError::Encoding {
                table_id: table.table_id.clone(),
                message: "table id cannot be used as a file name".to_string(),
            });
        }

        let path = dir.join(format!("{}.csv", table.table_id));
        let staging = NamedTempFile::new_in(dir)?;
        let staging = write_table(staging, table, delimiter)?;
        staging.persist(&path).map_err(|error| error.error)?;

        info!(table_id = %table.table_id, path = %path.display(), "wrote CSV");
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::{table_to_csv, to_csv};
    use crate::error::ExportError;
    use crate::model::{SourceKind, Table};

    fn table(id: &str, headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            table_id: id.to_string(),
            headers: headers.iter().map(|header| (*header).to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
                .collect(),
            source: SourceKind::Stream,
        }
    }

    #[test]
    fn quotes_only_fields_that_need_it() {
        let table = table(
            "pdfplumber_page_0_table_0",
            &["Item", "Note"],
            &[&["a,b", "say \"hi\""], &["line\nbreak", "plain"]],
        );
        assert_eq!(
            table_to_csv(&table, b',').expect("csv should render"),
            "Item,Note\n\"a,b\",\"say \"\"hi\"\"\"\n\"line\nbreak\",plain\n"
        );
    }

    #[test]
    fn honours_custom_delimiter() {
        let table = table("docx_table_0", &["a", "b"], &[&["1", "2"]]);
        assert_eq!(
            table_to_csv(&table, b';').expect("csv should render"),
            "a;b\n1;2\n"
        );
    }

    #[test]
    fn writes_one_file_per_table_and_skips_empty_ones() {
        let dir = tempdir().expect("tempdir should be created");
        let out = dir.path().join("nested");
        let tables = vec![
            table("docx_table_0", &["Name", "Age"], &[&["Ana", "30"]]),
            table("docx_table_1", &["Empty"], &[]),
            table("docx_table_2", &["Städte"], &[&["Zürich"]]),
        ];

        let written = to_csv(&tables, &out).expect("csv export should succeed");
        assert_eq!(
            written,
            vec![out.join("docx_table_0.csv"), out.join("docx_table_2.csv")]
        );
        assert_eq!(
            std::fs::read_to_string(&written[1]).expect("csv should be readable"),
            "Städte\nZürich\n"
        );
        assert!(!out.join("docx_table_1.csv").exists());
    }

    #[test]
    fn rejects_ragged_tables() {
        let mut broken = table("docx_table_0", &["a", "b"], &[&["1", "2"]]);
        broken.rows.push(vec!["3".to_string()]);
        assert!(matches!(
            table_to_csv(&broken, b','),
            Err(ExportError::InvalidTable { .. })
        ));
    }

    #[test]
    fn rejects_ids_that_are_not_file_names() {
        let dir = tempdir().expect("tempdir should be created");
        for id in ["", "../escape", ".hidden"] {
            let tables = vec![table(id, &["a"], &[&["1"]])];
            assert!(
                matches!(to_csv(&tables, dir.path()), Err(ExportError::Encoding { .. })),
                "id {id:?} should be rejected"
            );
        }
        assert!(!dir.path().join(".csv").exists());
        assert_eq!(
            std::fs::read_dir(dir.path())
                .expect("dir should be readable")
                .count(),
            0
        );
    }
}

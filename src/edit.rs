use std::collections::HashSet;

use crate::error::TableError;
use crate::model::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEdit {
    RenameColumn { from: String, to: String },
    AddColumn { name: String },
    DeleteColumn { name: String },
    AddRow,
    DeleteRow { index: usize },
    SetCell {
        row: usize,
        column: String,
        value: String,
    },
    DropEmptyRows,
}

fn column(table: &Table, name: &str) -> Result<usize, TableError> {
    table
        .column_index(name)
        .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
}

fn row_in_range(table: &Table, index: usize) -> Result<(), TableError> {
    if index < table.rows.len() {
        Ok(())
    } else {
        Err(TableError::RowOutOfRange {
            index,
            len: table.rows.len(),
        })
    }
}

pub fn apply_edit(table: &Table, edit: TableEdit) -> Result<Table, TableError> {
    let mut edited = table.clone();

    match edit {
        TableEdit::RenameColumn { from, to } => {
            let index = column(&edited, &from)?;
            edited.headers[index] = to.trim().to_string();
        }
        TableEdit::AddColumn { name } => {
            edited.headers.push(name.trim().to_string());
            for row in &mut edited.rows {
                row.push(String::new());
            }
        }
        TableEdit::DeleteColumn { name } => {
            let index = column(&edited, &name)?;
            edited.headers.remove(index);
            for row in &mut edited.rows {
                row.remove(index);
            }
        }
        TableEdit::AddRow => {
            let width = edited.column_count();
            edited.rows.push(vec![String::new(); width]);
        }
        TableEdit::DeleteRow { index } => {
            row_in_range(&edited, index)?;
            edited.rows.remove(index);
        }
        TableEdit::SetCell { row, column: name, value } => {
            row_in_range(&edited, row)?;
            let index = column(&edited, &name)?;
            edited.rows[row][index] = value;
        }
        TableEdit::DropEmptyRows => {
            edited
                .rows
                .retain(|row| row.iter().any(|cell| !cell.trim().is_empty()));
        }
    }

    edited.validate()?;
    Ok(edited)
}

#[must_use]
pub fn default_column_name(table: &Table) -> String {
    let mut n = table.column_count() + 1;
    loop {
        let candidate = format!("New_Column_{n}");
        if table.column_index(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

#[must_use]
pub fn duplicate_row_count(table: &Table) -> usize {
    let mut seen = HashSet::with_capacity(table.rows.len());
    table.rows.iter().filter(|row| !seen.insert(*row)).count()
}

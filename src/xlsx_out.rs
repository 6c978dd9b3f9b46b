use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::debug;

use crate::error::ExportError;
use crate::model::Table;

fn cell_position(table: &Table, row: usize, column: usize) -> Result<(u32, u16), ExportError> {
    let overflow = |axis: &str| ExportError::Encoding {
        table_id: table.table_id.clone(),
        message: format!("{axis} index exceeds the worksheet limit"),
    };
    let row = u32::try_from(row).map_err(|_| overflow("row"))?;
    let column = u16::try_from(column).map_err(|_| overflow("column"))?;
    Ok((row, column))
}

fn write_table(worksheet: &mut Worksheet, table: &Table, header: &Format) -> Result<(), ExportError> {
    for (column, name) in table.headers.iter().enumerate() {
        let (row, column) = cell_position(table, 0, column)?;
        worksheet.write_string_with_format(row, column, name, header)?;
    }

    for (row_index, cells) in table.rows.iter().enumerate() {
        for (column, value) in cells.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let (row, column) = cell_position(table, row_index + 1, column)?;
            worksheet.write_string(row, column, value)?;
        }
    }

    Ok(())
}

pub fn to_xlsx(tables: &[Table]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let mut sheets = 0_usize;
    for table in tables {
        if table.rows.is_empty() {
            continue;
        }
        table.validate().map_err(|error| ExportError::InvalidTable {
            table_id: table.table_id.clone(),
            error,
        })?;

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(format!("Table_{}", sheets + 1))?;
        write_table(worksheet, table, &header)?;
        sheets += 1;
    }

    if sheets == 0 {
        return Err(ExportError::NoTables);
    }

    debug!(sheets, "built workbook");
    Ok(workbook.save_to_buffer()?)
}

use std::fs::File;
use std::path::Path;

use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

const CELL_WIDTH: i64 = 120;
const ROW_HEIGHT: i64 = 24;
const GRID_LEFT: i64 = 50;
const GRID_TOP: i64 = 760;

fn save_pdf(path: &Path, pages: Vec<Vec<Operation>>) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut page_ids: Vec<ObjectId> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<_>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)?;
    Ok(())
}

/// One text line per entry, drawn top-down with a fixed leading.
pub fn create_test_pdf(path: &Path, pages: &[Vec<&str>]) -> Result<(), Box<dyn std::error::Error>> {
    let pages = pages
        .iter()
        .map(|lines| {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("TL", vec![16.into()]),
                Operation::new("Td", vec![50.into(), 780.into()]),
            ];

            for (index, line) in lines.iter().enumerate() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                if index + 1 < lines.len() {
                    operations.push(Operation::new("T*", vec![]));
                }
            }
            operations.push(Operation::new("ET", vec![]));
            operations
        })
        .collect();

    save_pdf(path, pages)
}

/// A single page holding one bordered grid with a text cell per entry.
pub fn create_ruled_pdf(path: &Path, rows: &[Vec<&str>]) -> Result<(), Box<dyn std::error::Error>> {
    let columns = i64::try_from(rows.iter().map(Vec::len).max().unwrap_or(0))?;
    let row_count = i64::try_from(rows.len())?;
    let right = GRID_LEFT + columns * CELL_WIDTH;
    let bottom = GRID_TOP - row_count * ROW_HEIGHT;

    let mut operations = Vec::new();
    for line in 0..=row_count {
        let y = GRID_TOP - line * ROW_HEIGHT;
        operations.push(Operation::new("m", vec![GRID_LEFT.into(), y.into()]));
        operations.push(Operation::new("l", vec![right.into(), y.into()]));
    }
    for line in 0..=columns {
        let x = GRID_LEFT + line * CELL_WIDTH;
        operations.push(Operation::new("m", vec![x.into(), GRID_TOP.into()]));
        operations.push(Operation::new("l", vec![x.into(), bottom.into()]));
    }
    operations.push(Operation::new("S", vec![]));

    for (row_index, row) in rows.iter().enumerate() {
        let row_index = i64::try_from(row_index)?;
        for (column_index, text) in row.iter().enumerate() {
            let column_index = i64::try_from(column_index)?;
            let x = GRID_LEFT + column_index * CELL_WIDTH + 4;
            let y = GRID_TOP - (row_index + 1) * ROW_HEIGHT + 8;
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![x.into(), y.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]);
        }
    }

    save_pdf(path, vec![operations])
}

/// A Word document with the given tables, each preceded by a paragraph.
pub fn create_docx(path: &Path, tables: &[Vec<Vec<&str>>]) -> Result<(), Box<dyn std::error::Error>> {
    let mut docx = Docx::new();
    for (index, rows) in tables.iter().enumerate() {
        docx = docx
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!("Table {index}"))))
            .add_table(Table::new(
                rows.iter()
                    .map(|row| {
                        TableRow::new(
                            row.iter()
                                .map(|text| {
                                    TableCell::new().add_paragraph(
                                        Paragraph::new().add_run(Run::new().add_text(*text)),
                                    )
                                })
                                .collect(),
                        )
                    })
                    .collect(),
            ));
    }

    let file = File::create(path)?;
    docx.build().pack(file)?;
    Ok(())
}

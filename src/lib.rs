mod csv_out;
mod edit;
mod error;
mod export;
mod extract;
mod json_out;
mod model;
mod normalize;
mod options;
pub mod sources;
mod store;
mod table_parse;
mod xlsx_out;

use std::path::Path;

pub use csv_out::{table_to_csv, to_csv, to_csv_with_delimiter};
pub use edit::{TableEdit, apply_edit, default_column_name, duplicate_row_count};
pub use error::{ExportError, ExtractError, NormalizeError, TableError};
pub use export::{
    ExportFormat, ExportPayload, ExportSummary, JSON_FILE_NAME, TableSummary, XLSX_FILE_NAME,
    export, export_summary, export_summary_at, select_tables,
};
pub use extract::TableExtractor;
pub use json_out::{from_json, to_json};
pub use model::{
    DocumentKind, ExtractionResult, ExtractionStatus, RawCell, RawTable, SourceKind,
    SourcedTable, Table,
};
pub use normalize::{normalize, try_normalize};
pub use options::{ExtractOptions, PageSelection};
pub use sources::TableSource;
pub use store::{DEFAULT_TTL_SECONDS, ExtractionId, ExtractionStore, ExtractionSummary};
pub use xlsx_out::to_xlsx;

#[must_use]
pub fn extract_tables(path: &Path, options: &ExtractOptions) -> ExtractionResult {
    TableExtractor::new(options.clone()).extract(path)
}

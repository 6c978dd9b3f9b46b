use std::path::Path;

use crate::error::ExtractError;
use crate::model::{SourceKind, SourcedTable};

mod docx;
mod lattice;
pub(crate) mod pdf_text;
mod stream;

pub use docx::DocxSource;
pub use lattice::LatticeSource;
pub use stream::StreamSource;

/// Returning an empty vector means the document was readable but held no
/// tables this source recognises.
pub trait TableSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn read_tables(&self, path: &Path) -> Result<Vec<SourcedTable>, ExtractError>;
}

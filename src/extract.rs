use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::model::{DocumentKind, ExtractionResult, SourceKind, SourcedTable, Table};
use crate::normalize::normalize;
use crate::options::ExtractOptions;
use crate::sources::{DocxSource, LatticeSource, StreamSource, TableSource};

pub struct TableExtractor {
    options: ExtractOptions,
    pdf_strategies: Vec<Box<dyn TableSource>>,
    docx_source: Box<dyn TableSource>,
}

impl TableExtractor {
    #[must_use]
    pub fn new(options: ExtractOptions) -> Self {
        let pdf_strategies: Vec<Box<dyn TableSource>> = vec![
            Box::new(LatticeSource::new(&options)),
            Box::new(StreamSource::new(&options)),
        ];
        Self {
            options,
            pdf_strategies,
            docx_source: Box::new(DocxSource::new()),
        }
    }

    #[must_use]
    pub fn with_sources(
        options: ExtractOptions,
        pdf_strategies: Vec<Box<dyn TableSource>>,
        docx_source: Box<dyn TableSource>,
    ) -> Self {
        Self {
            options,
            pdf_strategies,
            docx_source,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn classify(path: &Path) -> Result<DocumentKind, ExtractError> {
        let extension = path.extension().and_then(|ext| ext.to_str());
        extension
            .and_then(DocumentKind::from_extension)
            .ok_or_else(|| ExtractError::UnsupportedFormat {
                extension: extension.map_or_else(|| "<none>".to_string(), |ext| format!(".{ext}")),
            })
    }

    /// Never fails: problems are reported through the result's status and error.
    #[must_use]
    pub fn extract(&self, path: &Path) -> ExtractionResult {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.extract_named(path, &file_name)
    }

    #[must_use]
    pub fn extract_upload(&self, path: &Path, original_name: &str) -> ExtractionResult {
        self.extract_named(path, original_name)
    }

    fn extract_named(&self, path: &Path, file_name: &str) -> ExtractionResult {
        if let Err(error) = self.options.validate() {
            return ExtractionResult::failed(file_name, error, None);
        }

        let kind = match Self::classify(Path::new(file_name)) {
            Ok(kind) => kind,
            Err(error) => {
                warn!(file = file_name, %error, "rejecting document");
                return ExtractionResult::failed(file_name, error, None);
            }
        };

        info!(file = file_name, ?kind, "extracting tables");
        let strategies: Vec<&dyn TableSource> = match kind {
            DocumentKind::Pdf => self.pdf_strategies.iter().map(AsRef::as_ref).collect(),
            DocumentKind::Docx => vec![self.docx_source.as_ref()],
        };

        let result = run_chain(&strategies, path, file_name);
        info!(
            file = file_name,
            status = result.status.as_str(),
            tables = result.tables.len(),
            method = result.extraction_method.map(SourceKind::tag),
            "extraction finished"
        );
        result
    }
}

impl Default for TableExtractor {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

fn read_guarded(source: &dyn TableSource, path: &Path) -> Result<Vec<SourcedTable>, ExtractError> {
    catch_unwind(AssertUnwindSafe(|| source.read_tables(path))).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "source panicked".to_string());
        Err(ExtractError::SourceUnavailable {
            kind: source.kind(),
            message,
        })
    })
}

fn run_chain(strategies: &[&dyn TableSource], path: &Path, file_name: &str) -> ExtractionResult {
    let mut last_kind = None;
    let mut last_error = None;

    for source in strategies {
        let kind = source.kind();
        last_kind = Some(kind);

        match read_guarded(*source, path) {
            Ok(raw_tables) if !raw_tables.is_empty() => {
                debug!(method = kind.tag(), raw_tables = raw_tables.len(), "source produced tables");
                let tables = normalize_all(&raw_tables);
                return ExtractionResult::from_tables(file_name, tables, Some(kind));
            }
            Ok(_) => {
                debug!(method = kind.tag(), "source found no tables");
                last_error = None;
            }
            Err(error) => {
                warn!(method = kind.tag(), %error, "source failed");
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(error) => ExtractionResult::failed(file_name, error, last_kind),
        None => ExtractionResult::from_tables(file_name, Vec::new(), last_kind),
    }
}

fn normalize_all(raw_tables: &[SourcedTable]) -> Vec<Table> {
    let mut seen = HashSet::new();
    raw_tables
        .iter()
        .filter_map(|raw| normalize(&raw.table, &raw.id_hint))
        .filter(|table| {
            let fresh = seen.insert(table.table_id.clone());
            if !fresh {
                warn!(table_id = %table.table_id, "dropping table with duplicate id");
            }
            fresh
        })
        .collect()
}

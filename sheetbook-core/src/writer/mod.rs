//! SpreadsheetML and ODS writers for a [`Workbook`]

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub mod markup;
pub mod ods_writer;
pub mod xml_writer;

use self::markup::MarkupWriter;
use self::ods_writer::OdsWriter;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::format::{FileFormat, WRITE_ORDER, WriteState, advance};
use crate::model::Workbook;

/// A target format. Styles are emitted before worksheets, and nothing reaches the
/// destination until `finish` returns the complete document.
pub trait WorkbookWriter {
    fn emit_styles(&mut self, diagnostics: &mut Diagnostics) -> Result<()>;
    fn emit_worksheets(&mut self, diagnostics: &mut Diagnostics) -> Result<()>;
    fn finish(self) -> Result<Vec<u8>>;
}

/// Write a workbook to a file path, choosing the format by extension.
///
/// The document is rendered in memory first, so a failed save leaves no partial output.
/// Returns what could not be carried over exactly.
pub fn write_workbook<P: AsRef<Path>>(workbook: &Workbook, path: P) -> Result<Vec<Diagnostic>> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path);
    debug!(path = %path.display(), %format, "writing workbook");

    let mut diagnostics = Diagnostics::new();
    let bytes = match format {
        FileFormat::Markup => emit(MarkupWriter::new(workbook), &mut diagnostics),
        FileFormat::Ods => emit(OdsWriter::new(workbook), &mut diagnostics),
    }
    .with_context(|| format!("Failed to render {}", path.display()))?;

    fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(
        path = %path.display(),
        bytes = bytes.len(),
        diagnostics = diagnostics.len(),
        "workbook saved"
    );
    Ok(diagnostics.into_vec())
}

/// Drive a writer through the save phases
pub(crate) fn emit<W: WorkbookWriter>(mut writer: W, diagnostics: &mut Diagnostics) -> Result<Vec<u8>> {
    let mut state = WriteState::Idle;
    advance(&mut state, WriteState::EmittingStyles, &WRITE_ORDER)?;
    writer.emit_styles(diagnostics)?;
    advance(&mut state, WriteState::EmittingWorksheets, &WRITE_ORDER)?;
    writer.emit_worksheets(diagnostics)?;
    let bytes = writer.finish()?;
    advance(&mut state, WriteState::Flushed, &WRITE_ORDER)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use crate::reader::read_workbook;

    fn sample() -> Workbook {
        let mut workbook = Workbook::new();
        let sheet = workbook.create_worksheet("Sheet1").unwrap();
        sheet.create_cell(2, 2).unwrap().set_value("Hello");
        sheet.create_cell(3, 3).unwrap().set_value("=SUM(A1:A2)");
        workbook
    }

    #[test]
    fn test_write_markup_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xml");
        let diagnostics = write_workbook(&sample(), &path).unwrap();
        assert!(diagnostics.is_empty());

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("<?mso-application progid=\"Excel.Sheet\"?>"));
        assert!(text.contains("ss:Formula=\"=SUM(R1C1:R2C1)\""));

        let reloaded = read_workbook(&path, &CodecConfig::default()).unwrap().unwrap();
        let sheet = reloaded.worksheet("Sheet1").unwrap();
        assert_eq!(sheet.cell(2, 2).unwrap().unwrap().value().to_string(), "Hello");
    }

    #[test]
    fn test_write_ods_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.ods");
        write_workbook(&sample(), &path).unwrap();

        let reloaded = read_workbook(&path, &CodecConfig::default()).unwrap().unwrap();
        let sheet = reloaded.worksheet("Sheet1").unwrap();
        assert_eq!(
            sheet.cell(3, 3).unwrap().unwrap().formula_a1().as_deref(),
            Some("=SUM(A1:A2)")
        );
    }

    #[test]
    fn test_unwritable_destination_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("book.ods");
        let err = write_workbook(&sample(), &path).unwrap_err();
        assert!(err.to_string().contains("Failed to write"));
    }
}

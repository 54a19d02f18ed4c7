//! SpreadsheetML and ODS readers producing a [`Workbook`]

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

pub mod markup;
pub mod ods_parser;
pub mod xml_parser;

use self::markup::MarkupReader;
use self::ods_parser::OdsReader;
use crate::config::CodecConfig;
use crate::diagnostic::{DiagnosticKind, DiagnosticScope, Diagnostics};
use crate::format::{FileFormat, READ_ORDER, ReadState, advance};
use crate::model::Workbook;

/// A source format. Styles are read completely before any worksheet, so that cell style
/// references can be checked against the finished registry.
pub trait WorkbookReader {
    fn read_styles(&mut self, workbook: &mut Workbook, diagnostics: &mut Diagnostics) -> Result<()>;
    fn read_worksheets(&mut self, workbook: &mut Workbook, diagnostics: &mut Diagnostics)
    -> Result<()>;
}

/// Read a workbook from a file path, choosing the format by extension.
///
/// A file that cannot be opened gives `Ok(None)`; a file that opens but is not a valid
/// document is an error.
pub fn read_workbook<P: AsRef<Path>>(path: P, config: &CodecConfig) -> Result<Option<Workbook>> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot open workbook");
            return Ok(None);
        }
    };

    let format = FileFormat::from_path(path);
    debug!(path = %path.display(), %format, "reading workbook");
    let mut workbook = Workbook::with_config(config.clone());
    let mut diagnostics = Diagnostics::new();
    match format {
        FileFormat::Markup => {
            let mut reader = MarkupReader::new(BufReader::new(file), &mut diagnostics)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            build(&mut reader, &mut workbook, &mut diagnostics)?;
        }
        FileFormat::Ods => {
            let mut archive = ZipArchive::new(file)
                .with_context(|| format!("Failed to open zip archive {}", path.display()))?;
            let mut reader = OdsReader::new(&mut archive)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            build(&mut reader, &mut workbook, &mut diagnostics)?;
        }
    }

    check_percentages(&workbook, &mut diagnostics);
    debug!(
        sheets = workbook.worksheets().len(),
        styles = workbook.styles().len(),
        diagnostics = diagnostics.len(),
        "workbook loaded"
    );
    workbook.set_diagnostics(diagnostics);
    Ok(Some(workbook))
}

/// Drive a reader through the load phases
pub(crate) fn build<W: WorkbookReader>(
    reader: &mut W,
    workbook: &mut Workbook,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let mut state = ReadState::Idle;
    advance(&mut state, ReadState::ReadingStyles, &READ_ORDER)?;
    reader.read_styles(workbook, diagnostics)?;
    advance(&mut state, ReadState::ReadingWorksheets, &READ_ORDER)?;
    reader.read_worksheets(workbook, diagnostics)?;
    advance(&mut state, ReadState::Built, &READ_ORDER)
}

/// Flag cells typed `Percentage` whose style does not format as one
fn check_percentages(workbook: &Workbook, diagnostics: &mut Diagnostics) {
    for sheet in workbook.worksheets() {
        for (position, cell) in sheet.table.cells() {
            let conflict = cell
                .infer_data_type(workbook.styles())
                .is_some_and(|inference| inference.conflict);
            if conflict {
                diagnostics.warn(
                    DiagnosticKind::PercentageMismatch,
                    DiagnosticScope::Cell(sheet.name().to_string(), position),
                    "percentage value without a percentage number format",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BOOK: &str = r#"<?xml version="1.0"?>
<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet"
 xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
 <Worksheet ss:Name="S">
  <Table>
   <Row><Cell><Data ss:Type="Percentage">0.5</Data></Cell></Row>
  </Table>
 </Worksheet>
</Workbook>"#;

    #[test]
    fn test_missing_file_reads_as_none() {
        let result = read_workbook("/nonexistent/book.xml", &CodecConfig::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_markup_file_with_percentage_mismatch() {
        let mut file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        file.write_all(BOOK.as_bytes()).unwrap();

        let workbook = read_workbook(file.path(), &CodecConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(workbook.worksheet_names(), vec!["S"]);
        let mismatches: Vec<_> = workbook
            .diagnostics()
            .filter(|d| d.kind == DiagnosticKind::PercentageMismatch)
            .collect();
        assert_eq!(mismatches.len(), 1);
    }

    #[test]
    fn test_corrupt_package_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".ods").tempfile().unwrap();
        file.write_all(b"not a zip").unwrap();
        assert!(read_workbook(file.path(), &CodecConfig::default()).is_err());
    }
}

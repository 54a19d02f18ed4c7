//! sheetbook: spreadsheet document model with SpreadsheetML and ODS codecs
//!
//! A [`Workbook`] is loaded from SpreadsheetML 2003 XML or an OpenDocument spreadsheet,
//! edited in memory and saved to either format. The format is chosen by file extension.

pub mod address;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod format;
pub mod model;
pub mod node;
pub mod reader;
pub mod writer;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub use address::CellPos;
pub use config::{CodecConfig, MergePolicy};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticScope, Severity};
pub use error::{ConversionError, SheetError};
pub use format::FileFormat;
pub use model::{
    Cell, CellValue, Range, Row, Column, StyleId, StyleRegistry, StyleSpec, Table, Workbook,
    Worksheet,
};

/// Load a workbook with the default configuration.
///
/// A file that cannot be opened gives `Ok(None)`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Workbook>> {
    reader::read_workbook(path, &CodecConfig::default())
}

/// Save a workbook, returning what the target format could not carry exactly
pub fn save_as<P: AsRef<Path>>(workbook: &Workbook, path: P) -> Result<Vec<Diagnostic>> {
    writer::write_workbook(workbook, path)
}

/// Editing session over any number of open workbooks, one of which is active
#[derive(Debug, Default)]
pub struct Document {
    config: CodecConfig,
    workbooks: Vec<Workbook>,
    active: usize,
}

impl Document {
    /// Create a session with default configuration
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    /// Create a session whose workbooks use `config`
    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            config,
            workbooks: Vec::new(),
            active: 0,
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Load a file and make it the active workbook. A file that cannot be opened leaves
    /// the session unchanged and gives `Ok(None)`.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<Option<&mut Workbook>> {
        let path = path.as_ref();
        let Some(workbook) = reader::read_workbook(path, &self.config)? else {
            return Ok(None);
        };
        info!(path = %path.display(), sheets = workbook.worksheets().len(), "workbook opened");
        Ok(Some(self.push(workbook)))
    }

    /// Add an empty workbook and make it active
    pub fn new_workbook(&mut self) -> &mut Workbook {
        let workbook = Workbook::with_config(self.config.clone());
        self.push(workbook)
    }

    fn push(&mut self, workbook: Workbook) -> &mut Workbook {
        self.workbooks.push(workbook);
        self.active = self.workbooks.len() - 1;
        &mut self.workbooks[self.active]
    }

    pub fn workbooks(&self) -> &[Workbook] {
        &self.workbooks
    }

    pub fn active_workbook(&self) -> Option<&Workbook> {
        self.workbooks.get(self.active)
    }

    pub fn active_workbook_mut(&mut self) -> Option<&mut Workbook> {
        self.workbooks.get_mut(self.active)
    }

    /// Switch the active workbook by position
    pub fn set_active(&mut self, index: usize) -> bool {
        if index < self.workbooks.len() {
            self.active = index;
            true
        } else {
            false
        }
    }

    /// Save the active workbook
    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Diagnostic>> {
        let workbook = self
            .active_workbook()
            .context("No active workbook to save")?;
        writer::write_workbook(workbook, path)
    }
}

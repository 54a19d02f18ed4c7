//! The workbook: ordered worksheets plus the shared style registry

use super::styles::StyleRegistry;
use super::style::StyleId;
use super::worksheet::Worksheet;
use crate::config::{CodecConfig, MergePolicy};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::error::{Result, SheetError};
use std::collections::HashSet;
use tracing::{debug, info};

/// A workbook document
#[derive(Debug, Clone)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
    styles: StyleRegistry,
    active: usize,
    config: CodecConfig,
    diagnostics: Diagnostics,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::with_config(CodecConfig::default())
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            worksheets: Vec::new(),
            styles: StyleRegistry::with_prefix(config.global.style_id_prefix.clone()),
            active: 0,
            config,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Append a worksheet named `name`
    pub fn create_worksheet(&mut self, name: &str) -> Result<&mut Worksheet> {
        if self.worksheet(name).is_some() {
            return Err(SheetError::DuplicateWorksheet(name.to_string()));
        }
        let policy = self.config.merge_policy_for(name);
        debug!(sheet = name, ?policy, "created worksheet");
        self.worksheets.push(Worksheet::with_policy(name, policy));
        let last = self.worksheets.len() - 1;
        Ok(&mut self.worksheets[last])
    }

    pub fn worksheets(&self) -> &[Worksheet] {
        &self.worksheets
    }

    pub fn worksheets_mut(&mut self) -> impl Iterator<Item = &mut Worksheet> {
        self.worksheets.iter_mut()
    }

    pub fn worksheet_names(&self) -> Vec<&str> {
        self.worksheets.iter().map(|ws| ws.name()).collect()
    }

    pub fn worksheet(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|ws| ws.name() == name)
    }

    pub fn worksheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.worksheets.iter_mut().find(|ws| ws.name() == name)
    }

    pub fn worksheet_at(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// A worksheet and the style registry, borrowed mutably together
    pub fn sheet_and_styles_mut(
        &mut self,
        name: &str,
    ) -> Option<(&mut Worksheet, &mut StyleRegistry)> {
        let sheet = self.worksheets.iter_mut().find(|ws| ws.name() == name)?;
        Some((sheet, &mut self.styles))
    }

    pub fn remove_worksheet(&mut self, name: &str) -> Result<Worksheet> {
        let index = self.position(name)?;
        let removed = self.worksheets.remove(index);
        if self.active > index || self.active >= self.worksheets.len() {
            self.active = self.active.saturating_sub(1);
        }
        Ok(removed)
    }

    /// Rename a worksheet; the merge policy configured for the new name takes effect
    pub fn rename_worksheet(&mut self, from: &str, to: &str) -> Result<()> {
        let index = self.position(from)?;
        if from != to && self.worksheet(to).is_some() {
            return Err(SheetError::DuplicateWorksheet(to.to_string()));
        }
        let policy = self.config.merge_policy_for(to);
        let sheet = &mut self.worksheets[index];
        sheet.set_name(to);
        sheet.table.set_merge_policy(policy);
        Ok(())
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_worksheet(&self) -> Option<&Worksheet> {
        self.worksheets.get(self.active)
    }

    pub fn active_worksheet_mut(&mut self) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(self.active)
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        self.active = self.position(name)?;
        Ok(())
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name() == name)
            .ok_or_else(|| SheetError::WorksheetNotFound(name.to_string()))
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleRegistry {
        &mut self.styles
    }

    /// Apply one merge policy to every worksheet
    pub fn set_merge_policy(&mut self, policy: MergePolicy) {
        self.config.global.merge_policy = policy;
        self.config.sheets.clear();
        for sheet in &mut self.worksheets {
            sheet.table.set_merge_policy(policy);
        }
    }

    /// Style IDs referenced by any table, row, column or cell
    pub fn used_style_ids(&self) -> HashSet<StyleId> {
        let mut used = HashSet::new();
        for sheet in &self.worksheets {
            let table = &sheet.table;
            used.extend(table.style_id.iter().cloned());
            for column in table.columns() {
                used.extend(column.style_id.iter().cloned());
            }
            for row in table.rows() {
                used.extend(row.style_id.iter().cloned());
                for cell in row.cells() {
                    used.extend(cell.style_id().cloned());
                }
            }
        }
        used
    }

    /// Remove styles nothing references. Running it twice removes nothing the second time.
    pub fn clear_unused_styles(&mut self) -> Vec<StyleId> {
        let used = self.used_style_ids();
        let removed = self.styles.clear_unused(&used);
        if !removed.is_empty() {
            info!(count = removed.len(), "cleared unused styles");
        }
        removed
    }

    /// Anomalies recovered while this workbook was loaded
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub(crate) fn set_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.diagnostics = diagnostics;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SheetConfig;
    use crate::model::style::StyleSpec;

    #[test]
    fn test_duplicate_names_rejected() {
        let mut workbook = Workbook::new();
        workbook.create_worksheet("Sheet1").unwrap();
        assert_eq!(
            workbook.create_worksheet("Sheet1").unwrap_err(),
            SheetError::DuplicateWorksheet("Sheet1".to_string())
        );
        workbook.create_worksheet("Sheet2").unwrap();
        assert_eq!(workbook.worksheet_names(), vec!["Sheet1", "Sheet2"]);
    }

    #[test]
    fn test_rename_remove_and_active() {
        let mut workbook = Workbook::new();
        workbook.create_worksheet("A").unwrap();
        workbook.create_worksheet("B").unwrap();
        workbook.create_worksheet("C").unwrap();

        workbook.set_active("C").unwrap();
        assert_eq!(workbook.active_worksheet().map(|ws| ws.name()), Some("C"));

        assert!(workbook.rename_worksheet("A", "B").is_err());
        workbook.rename_worksheet("A", "First").unwrap();
        assert!(workbook.worksheet("First").is_some());

        workbook.remove_worksheet("B").unwrap();
        assert_eq!(workbook.active_worksheet().map(|ws| ws.name()), Some("C"));
        assert!(matches!(
            workbook.remove_worksheet("B"),
            Err(SheetError::WorksheetNotFound(_))
        ));
    }

    #[test]
    fn test_sheet_policy_override() {
        let mut config = CodecConfig::default();
        config.sheets.insert(
            "Strict".to_string(),
            SheetConfig {
                merge_policy: Some(MergePolicy::Strict),
            },
        );
        let mut workbook = Workbook::with_config(config);
        let strict = workbook.create_worksheet("Strict").unwrap();
        assert_eq!(strict.table.merge_policy(), MergePolicy::Strict);
        let loose = workbook.create_worksheet("Loose").unwrap();
        assert_eq!(loose.table.merge_policy(), MergePolicy::Redirect);

        workbook.rename_worksheet("Strict", "Relaxed").unwrap();
        let relaxed = workbook.worksheet("Relaxed").unwrap();
        assert_eq!(relaxed.table.merge_policy(), MergePolicy::Redirect);
        workbook.rename_worksheet("Loose", "Strict").unwrap();
        let strict = workbook.worksheet("Strict").unwrap();
        assert_eq!(strict.table.merge_policy(), MergePolicy::Strict);
    }

    #[test]
    fn test_clear_unused_styles_idempotent() {
        let mut workbook = Workbook::new();
        workbook.create_worksheet("Sheet1").unwrap();
        let unused = workbook
            .styles_mut()
            .get_or_create(StyleSpec::new().with_number_format("0.000"));

        let (sheet, styles) = workbook.sheet_and_styles_mut("Sheet1").unwrap();
        let used = sheet
            .get_cell(1, 1)
            .unwrap()
            .set_style(styles, StyleSpec::new().with_number_format("0%"));

        assert_eq!(workbook.clear_unused_styles(), vec![unused]);
        assert!(workbook.styles().contains(&used));
        assert!(workbook.clear_unused_styles().is_empty());
        assert_eq!(workbook.styles().len(), 2);
    }
}

//! Worksheets with their print options and page breaks

use super::cell::Cell;
use super::range::Range;
use super::table::Table;
use crate::config::MergePolicy;
use crate::error::Result;

/// A named sheet: cell grid plus optional print settings
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    name: String,
    pub table: Table,
    pub options: Option<WorksheetOptions>,
    pub page_breaks: Option<PageBreaks>,
    pub hidden: bool,
    /// Structure protection flag; carried through both formats, never enforced
    pub protected: bool,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn with_policy(name: impl Into<String>, policy: MergePolicy) -> Self {
        Self {
            name: name.into(),
            table: Table::with_policy(policy),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn get_cell(&mut self, row: u32, col: u32) -> Result<&mut Cell> {
        self.table.get_cell(row, col)
    }

    pub fn create_cell(&mut self, row: u32, col: u32) -> Result<&mut Cell> {
        self.table.create_cell(row, col)
    }

    pub fn cell(&self, row: u32, col: u32) -> Result<Option<&Cell>> {
        self.table.cell(row, col)
    }

    /// Rectangular block starting at `(row, col)`
    pub fn get_range(&self, row: u32, col: u32, height: u32, width: u32) -> Result<Range> {
        Range::new(row, col, height, width)
    }

    pub fn merge_cell(&mut self, row: u32, col: u32, down: u32, across: u32) -> Result<()> {
        self.table.merge_cell(row, col, down, across)
    }

    pub fn options_mut(&mut self) -> &mut WorksheetOptions {
        self.options.get_or_insert_with(WorksheetOptions::default)
    }

    pub fn page_breaks_mut(&mut self) -> &mut PageBreaks {
        self.page_breaks.get_or_insert_with(PageBreaks::default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "Portrait",
            Orientation::Landscape => "Landscape",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Portrait" | "portrait" => Some(Orientation::Portrait),
            "Landscape" | "landscape" => Some(Orientation::Landscape),
            _ => None,
        }
    }
}

/// Paper sizes the codec can translate between formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaperSize {
    #[default]
    A4,
    A3,
}

impl PaperSize {
    /// Excel paper size index
    pub fn excel_index(&self) -> u32 {
        match self {
            PaperSize::A3 => 8,
            PaperSize::A4 => 9,
        }
    }

    pub fn from_excel_index(index: u32) -> Option<Self> {
        match index {
            8 => Some(PaperSize::A3),
            9 => Some(PaperSize::A4),
            _ => None,
        }
    }

    /// Portrait width and height in centimetres
    pub fn dimensions_cm(&self) -> (f64, f64) {
        match self {
            PaperSize::A4 => (21.0, 29.7),
            PaperSize::A3 => (29.7, 42.0),
        }
    }
}

/// Page margins in inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMargins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            top: 1.0,
            bottom: 1.0,
            left: 0.75,
            right: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    pub orientation: Orientation,
    pub center_horizontal: bool,
    pub center_vertical: bool,
    pub margins: PageMargins,
    /// Header margin in inches
    pub header_margin: f64,
    /// Footer margin in inches
    pub footer_margin: f64,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            center_horizontal: false,
            center_vertical: false,
            margins: PageMargins::default(),
            header_margin: 0.5,
            footer_margin: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Print {
    /// Raw Excel index, kept as read so unknown sizes survive a native round trip
    pub paper_size_index: Option<u32>,
    pub fit_width: Option<u32>,
    pub fit_height: Option<u32>,
    /// Zoom in percent
    pub scale: Option<u32>,
    pub gridlines: bool,
}

impl Print {
    /// Translatable paper size; unknown indices fall back to A4
    pub fn paper_size(&self) -> PaperSize {
        self.paper_size_index
            .and_then(PaperSize::from_excel_index)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorksheetOptions {
    pub page_setup: PageSetup,
    pub print: Print,
    /// Scale to `fit_width` x `fit_height` pages instead of `scale`
    pub fit_to_page: bool,
    pub selected: bool,
}

/// Manual page breaks: the 1-based row or column that starts a new page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBreaks {
    row_breaks: Vec<u32>,
    column_breaks: Vec<u32>,
}

impl PageBreaks {
    pub fn row_breaks(&self) -> &[u32] {
        &self.row_breaks
    }

    pub fn column_breaks(&self) -> &[u32] {
        &self.column_breaks
    }

    pub fn add_row_break(&mut self, row: u32) {
        if let Err(i) = self.row_breaks.binary_search(&row) {
            self.row_breaks.insert(i, row);
        }
    }

    pub fn add_column_break(&mut self, col: u32) {
        if let Err(i) = self.column_breaks.binary_search(&col) {
            self.column_breaks.insert(i, col);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_breaks.is_empty() && self.column_breaks.is_empty()
    }
}

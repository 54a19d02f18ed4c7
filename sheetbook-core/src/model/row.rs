//! Row and column descriptors

use super::cell::Cell;
use super::indexed::{self, Indexed};
use super::style::StyleId;

/// A row holding a sparse sequence of cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    index: Option<u32>,
    /// Height in points
    pub height: Option<f64>,
    pub hidden: bool,
    pub auto_fit_height: bool,
    pub style_id: Option<StyleId>,
    pub(crate) cells: Vec<Cell>,
}

impl Indexed for Row {
    fn index(&self) -> Option<u32> {
        self.index
    }

    fn set_index(&mut self, index: Option<u32>) {
        self.index = index;
    }
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cells paired with their logical column
    pub fn cells_with_columns(&self) -> impl Iterator<Item = (u32, &Cell)> {
        indexed::logical_indices(&self.cells)
            .into_iter()
            .zip(self.cells.iter())
    }

    pub fn cell(&self, col: u32) -> Option<&Cell> {
        let lookup = indexed::find_by_index(&self.cells, col);
        lookup.found.then(|| &self.cells[lookup.position])
    }

    /// Last column occupied, including merge spans
    pub fn last_column(&self) -> u32 {
        indexed::last_position(&self.cells)
    }

    /// True when the row carries nothing worth storing on its own
    pub fn is_plain(&self) -> bool {
        self.cells.is_empty()
            && self.height.is_none()
            && !self.hidden
            && !self.auto_fit_height
            && self.style_id.is_none()
    }
}

/// A column descriptor; `span` repeats it over following columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Column {
    index: Option<u32>,
    /// Width in points
    pub width: Option<f64>,
    pub hidden: bool,
    pub auto_fit_width: bool,
    pub style_id: Option<StyleId>,
    span: u32,
}

impl Indexed for Column {
    fn index(&self) -> Option<u32> {
        self.index
    }

    fn set_index(&mut self, index: Option<u32>) {
        self.index = index;
    }

    fn span(&self) -> u32 {
        self.span
    }

    fn set_span(&mut self, span: u32) {
        self.span = span;
    }
}

impl Column {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(width: f64) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    pub fn span(&self) -> u32 {
        self.span
    }

    pub(crate) fn set_repeat(&mut self, span: u32) {
        self.span = span;
    }

    /// Same attributes, ignoring position and span
    pub fn same_format(&self, other: &Column) -> bool {
        self.width == other.width
            && self.hidden == other.hidden
            && self.auto_fit_width == other.auto_fit_width
            && self.style_id == other.style_id
    }
}

//! Cells, their typed data and value conversions

use super::indexed::Indexed;
use super::style::{StyleId, StyleSpec};
use super::styles::StyleRegistry;
use crate::address::{self, CellPos};
use std::fmt;

/// Type tag of a cell's data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    String,
    Number,
    Percentage,
    DateTime,
    Boolean,
    Error,
}

impl DataType {
    /// Name used by the native markup `Type` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "String",
            DataType::Number => "Number",
            DataType::Percentage => "Percentage",
            DataType::DateTime => "DateTime",
            DataType::Boolean => "Boolean",
            DataType::Error => "Error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "String" => Some(DataType::String),
            "Number" => Some(DataType::Number),
            "Percentage" => Some(DataType::Percentage),
            "DateTime" => Some(DataType::DateTime),
            "Boolean" => Some(DataType::Boolean),
            "Error" => Some(DataType::Error),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Number | DataType::Percentage)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw cell data as stored in the markup: lexical value plus type tag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Data {
    pub value: String,
    pub data_type: DataType,
}

impl Data {
    pub fn new(value: impl Into<String>, data_type: DataType) -> Self {
        Self {
            value: value.into(),
            data_type,
        }
    }
}

/// Typed view of a cell's content
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    /// Fraction, so `0.25` is 25 %
    Percentage(f64),
    /// ISO 8601 `YYYY-MM-DDTHH:MM:SS`
    DateTime(String),
    Boolean(bool),
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) | CellValue::Percentage(n) => Some(*n),
            _ => None,
        }
    }

    fn into_data(self) -> Option<Data> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(Data::new(s, DataType::String)),
            CellValue::Number(n) => Some(Data::new(n.to_string(), DataType::Number)),
            CellValue::Percentage(n) => Some(Data::new(n.to_string(), DataType::Percentage)),
            CellValue::DateTime(s) => Some(Data::new(s, DataType::DateTime)),
            CellValue::Boolean(b) => Some(Data::new(if b { "1" } else { "0" }, DataType::Boolean)),
            CellValue::Error(s) => Some(Data::new(s, DataType::Error)),
        }
    }

    fn from_data(data: &Data) -> Self {
        match data.data_type {
            DataType::String => CellValue::Text(data.value.clone()),
            DataType::Number => data
                .value
                .trim()
                .parse()
                .map(CellValue::Number)
                .unwrap_or_else(|_| CellValue::Text(data.value.clone())),
            DataType::Percentage => data
                .value
                .trim()
                .parse()
                .map(CellValue::Percentage)
                .unwrap_or_else(|_| CellValue::Text(data.value.clone())),
            DataType::DateTime => CellValue::DateTime(data.value.clone()),
            DataType::Boolean => {
                CellValue::Boolean(matches!(data.value.trim(), "1" | "true" | "TRUE"))
            }
            DataType::Error => CellValue::Error(data.value.clone()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) | CellValue::DateTime(s) | CellValue::Error(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Percentage(n) => write!(f, "{}%", n * 100.0),
            CellValue::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(f64::from(value))
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Number(f64::from(value))
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

/// Outcome of reconciling a cell's type tag with its style's number format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInference {
    pub data_type: DataType,
    /// The cell is tagged `Percentage` but its style has no `%` format
    pub conflict: bool,
}

/// A single cell.
///
/// `row` and `col` are transient: they are filled in when the cell is fetched through a
/// table and are not part of the stored form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    row: u32,
    col: u32,
    index: Option<u32>,
    merge_across: u32,
    merge_down: u32,
    style_id: Option<StyleId>,
    /// Stored with absolute-numbered `R1C1` references
    formula: Option<String>,
    data: Option<Data>,
    href: Option<String>,
}

impl Indexed for Cell {
    fn index(&self) -> Option<u32> {
        self.index
    }

    fn set_index(&mut self, index: Option<u32>) {
        self.index = index;
    }

    fn span(&self) -> u32 {
        self.merge_across
    }

    fn set_span(&mut self, span: u32) {
        self.merge_across = span;
    }
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn col(&self) -> u32 {
        self.col
    }

    pub fn position(&self) -> CellPos {
        CellPos::new(self.row, self.col)
    }

    pub(crate) fn set_position(&mut self, row: u32, col: u32) {
        self.row = row;
        self.col = col;
    }

    pub fn merge_across(&self) -> u32 {
        self.merge_across
    }

    pub fn merge_down(&self) -> u32 {
        self.merge_down
    }

    pub fn is_merge_anchor(&self) -> bool {
        self.merge_across > 0 || self.merge_down > 0
    }

    /// Only the table may change spans: it owns the merge cache
    pub(crate) fn set_merge(&mut self, across: u32, down: u32) {
        self.merge_across = across;
        self.merge_down = down;
    }

    pub fn style_id(&self) -> Option<&StyleId> {
        self.style_id.as_ref()
    }

    pub fn set_style_id(&mut self, style_id: Option<StyleId>) {
        self.style_id = style_id;
    }

    /// Point the cell at the style holding exactly `spec`, creating it if needed
    pub fn set_style(&mut self, styles: &mut StyleRegistry, spec: StyleSpec) -> StyleId {
        let id = styles.get_or_create(spec);
        self.style_id = Some(id.clone());
        id
    }

    pub fn data(&self) -> Option<&Data> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: Option<Data>) {
        self.data = data;
    }

    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    pub fn set_href(&mut self, href: Option<String>) {
        self.href = href;
    }

    /// Stored `R1C1` formula text
    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    /// Formula with references rendered in `A1` form
    pub fn formula_a1(&self) -> Option<String> {
        self.formula.as_deref().map(address::to_absolute)
    }

    /// Set a formula written with `A1` references
    pub fn set_formula(&mut self, formula: &str) {
        self.formula = Some(address::to_relative(formula, self.row, self.col));
    }

    /// Set a formula already in stored `R1C1` form
    pub fn set_formula_r1c1(&mut self, formula: Option<String>) {
        self.formula = formula;
    }

    pub fn value(&self) -> CellValue {
        self.data
            .as_ref()
            .map(CellValue::from_data)
            .unwrap_or_default()
    }

    /// Set the cell's content. Text starting with `=` becomes a formula; any other value
    /// replaces both data and formula.
    pub fn set_value(&mut self, value: impl Into<CellValue>) {
        match value.into() {
            CellValue::Text(text) if text.starts_with('=') && text.len() > 1 => {
                self.set_formula(&text);
                self.data = None;
            }
            value => {
                self.formula = None;
                self.data = value.into_data();
            }
        }
    }

    /// Remove data and formula, keeping style and merge
    pub fn clear(&mut self) {
        self.data = None;
        self.formula = None;
        self.href = None;
    }

    pub fn is_blank(&self) -> bool {
        self.data.is_none() && self.formula.is_none()
    }

    /// Reconcile the type tag with the style's number format.
    ///
    /// A `Number` whose style formats as a percentage is treated as a percentage. A
    /// `Percentage` tag is always kept, and flagged when the style disagrees.
    pub fn infer_data_type(&self, styles: &StyleRegistry) -> Option<TypeInference> {
        let data = self.data.as_ref()?;
        let style_percent = styles.resolve(self.style_id.as_ref()).is_percentage();
        let inference = match (data.data_type, style_percent) {
            (DataType::Number, true) => TypeInference {
                data_type: DataType::Percentage,
                conflict: false,
            },
            (DataType::Percentage, false) => TypeInference {
                data_type: DataType::Percentage,
                conflict: true,
            },
            (data_type, _) => TypeInference {
                data_type,
                conflict: false,
            },
        };
        Some(inference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_types() {
        let mut cell = Cell::new();
        cell.set_value("Hello");
        assert_eq!(cell.data(), Some(&Data::new("Hello", DataType::String)));

        cell.set_value(42.5);
        assert_eq!(cell.data(), Some(&Data::new("42.5", DataType::Number)));
        assert_eq!(cell.value(), CellValue::Number(42.5));

        cell.set_value(3);
        assert_eq!(cell.data().map(|d| d.value.as_str()), Some("3"));

        cell.set_value(true);
        assert_eq!(cell.value(), CellValue::Boolean(true));

        cell.set_value(CellValue::Empty);
        assert!(cell.is_blank());
    }

    #[test]
    fn test_formula_text_becomes_formula() {
        let mut cell = Cell::new();
        cell.set_position(3, 3);
        cell.set_value("=SUM(A1:A2)");
        assert_eq!(cell.formula(), Some("=SUM(R1C1:R2C1)"));
        assert_eq!(cell.formula_a1().as_deref(), Some("=SUM(A1:A2)"));
        assert!(cell.data().is_none());

        cell.set_value("plain");
        assert!(cell.formula().is_none());
    }

    #[test]
    fn test_lone_equals_is_text() {
        let mut cell = Cell::new();
        cell.set_value("=");
        assert_eq!(cell.value(), CellValue::Text("=".to_string()));
    }

    #[test]
    fn test_unparseable_number_reads_as_text() {
        let mut cell = Cell::new();
        cell.set_data(Some(Data::new("n/a", DataType::Number)));
        assert_eq!(cell.value(), CellValue::Text("n/a".to_string()));
    }

    #[test]
    fn test_percentage_inference() {
        let mut styles = StyleRegistry::new();
        let percent = styles.get_or_create(StyleSpec::new().with_number_format("0.00%"));

        let mut cell = Cell::new();
        cell.set_value(0.25);
        cell.set_style_id(Some(percent.clone()));
        let inference = cell.infer_data_type(&styles).unwrap();
        assert_eq!(inference.data_type, DataType::Percentage);
        assert!(!inference.conflict);

        cell.set_value(CellValue::Percentage(0.5));
        cell.set_style_id(None);
        let inference = cell.infer_data_type(&styles).unwrap();
        assert_eq!(inference.data_type, DataType::Percentage);
        assert!(inference.conflict);

        cell.set_style_id(Some(percent));
        assert!(!cell.infer_data_type(&styles).unwrap().conflict);
    }
}

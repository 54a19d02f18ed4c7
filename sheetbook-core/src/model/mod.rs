//! In-memory document model

pub mod cell;
pub(crate) mod indexed;
pub mod range;
pub mod row;
pub mod style;
pub mod styles;
pub mod table;
pub mod workbook;
pub mod worksheet;

pub use cell::{Cell, CellValue, Data, DataType, TypeInference};
pub use range::{BorderSides, Range};
pub use row::{Column, Row};
pub use style::{
    Alignment, Border, BorderPosition, Borders, Color, Font, FontSize, HorizontalAlignment,
    Interior, LineStyle, NumberFormat, Pattern, Style, StyleId, StyleSpec, Underline,
    VerticalAlignment,
};
pub use styles::StyleRegistry;
pub use table::{MergeRegion, Table};
pub use workbook::Workbook;
pub use worksheet::{
    Orientation, PageBreaks, PageMargins, PageSetup, PaperSize, Print, Worksheet,
    WorksheetOptions,
};

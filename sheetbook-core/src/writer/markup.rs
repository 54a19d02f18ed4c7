//! Workbook to SpreadsheetML element tree

use anyhow::Result;
use tracing::trace;

use super::WorkbookWriter;
use super::xml_writer::write_markup;
use crate::diagnostic::Diagnostics;
use crate::model::{
    Alignment, Borders, Column, DataType, Font, Interior, Row, Style, Table, Workbook, Worksheet,
    WorksheetOptions,
};
use crate::node::{Node, NodeKind};

/// Build the `Workbook` element for a whole document
pub fn workbook_node(workbook: &Workbook) -> Node {
    let mut root = Node::new(NodeKind::Workbook);
    root.push(styles_node(workbook));
    push_worksheets(&mut root, workbook);
    root
}

fn styles_node(workbook: &Workbook) -> Node {
    let mut styles = Node::new(NodeKind::Styles);
    for style in workbook.styles().iter() {
        styles.push(style_node(style));
    }
    styles
}

fn push_worksheets(root: &mut Node, workbook: &Workbook) {
    let active = workbook.active_index();
    for (i, sheet) in workbook.worksheets().iter().enumerate() {
        // Sheet 0 is active when nothing is selected, so only mark what a reader could not infer
        let selected = i == active && (active != 0 || sheet.options.is_some());
        root.push(worksheet_node(sheet, selected));
    }
}

/// SpreadsheetML document writer; the tree is serialized in one piece by `finish`
pub struct MarkupWriter<'w> {
    workbook: &'w Workbook,
    root: Node,
}

impl<'w> MarkupWriter<'w> {
    pub fn new(workbook: &'w Workbook) -> Self {
        Self {
            workbook,
            root: Node::new(NodeKind::Workbook),
        }
    }
}

impl WorkbookWriter for MarkupWriter<'_> {
    fn emit_styles(&mut self, _diagnostics: &mut Diagnostics) -> Result<()> {
        self.root.push(styles_node(self.workbook));
        Ok(())
    }

    fn emit_worksheets(&mut self, _diagnostics: &mut Diagnostics) -> Result<()> {
        push_worksheets(&mut self.root, self.workbook);
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        write_markup(&self.root, Vec::new())
    }
}

fn style_node(style: &Style) -> Node {
    let mut node = Node::new(NodeKind::Style).with_attr("ID", style.id.as_str());
    if let Some(name) = &style.name {
        node.set_attr("Name", name);
    }
    if let Some(parent) = &style.parent {
        node.set_attr("Parent", parent.as_str());
    }

    let spec = &style.spec;
    if let Some(alignment) = &spec.alignment {
        node.push(alignment_node(alignment));
    }
    if let Some(borders) = &spec.borders {
        node.push(borders_node(borders));
    }
    if let Some(font) = &spec.font {
        node.push(font_node(font));
    }
    if let Some(interior) = &spec.interior {
        node.push(interior_node(interior));
    }
    if let Some(format) = &spec.number_format {
        node.push(Node::new(NodeKind::NumberFormat).with_attr("Format", &format.format));
    }
    node
}

fn alignment_node(alignment: &Alignment) -> Node {
    let mut node = Node::new(NodeKind::Alignment);
    if let Some(horizontal) = alignment.horizontal {
        node.set_attr("Horizontal", horizontal);
    }
    if let Some(vertical) = alignment.vertical {
        node.set_attr("Vertical", vertical);
    }
    if alignment.wrap_text {
        node.set_attr("WrapText", 1);
    }
    if alignment.rotate != 0 {
        node.set_attr("Rotate", alignment.rotate);
    }
    if alignment.indent != 0 {
        node.set_attr("Indent", alignment.indent);
    }
    if alignment.shrink_to_fit {
        node.set_attr("ShrinkToFit", 1);
    }
    node
}

fn borders_node(borders: &Borders) -> Node {
    let mut node = Node::new(NodeKind::Borders);
    for border in borders.iter() {
        let mut b = Node::new(NodeKind::Border)
            .with_attr("Position", border.position)
            .with_attr("LineStyle", border.line_style)
            .with_attr("Weight", border.weight);
        if let Some(color) = &border.color {
            b.set_attr("Color", color);
        }
        node.push(b);
    }
    node
}

fn font_node(font: &Font) -> Node {
    let mut node = Node::new(NodeKind::Font);
    if let Some(name) = &font.name {
        node.set_attr("FontName", name);
    }
    if let Some(family) = &font.family {
        node.set_attr("Family", family);
    }
    if let Some(size) = font.size {
        node.set_attr("Size", size);
    }
    if font.bold {
        node.set_attr("Bold", 1);
    }
    if font.italic {
        node.set_attr("Italic", 1);
    }
    if let Some(underline) = font.underline {
        node.set_attr("Underline", underline);
    }
    if font.strike_through {
        node.set_attr("StrikeThrough", 1);
    }
    if let Some(color) = &font.color {
        node.set_attr("Color", color);
    }
    node
}

fn interior_node(interior: &Interior) -> Node {
    let mut node = Node::new(NodeKind::Interior);
    if let Some(color) = &interior.color {
        node.set_attr("Color", color);
    }
    if let Some(pattern) = interior.pattern {
        node.set_attr("Pattern", pattern);
    }
    if let Some(color) = &interior.pattern_color {
        node.set_attr("PatternColor", color);
    }
    node
}

fn worksheet_node(sheet: &Worksheet, selected: bool) -> Node {
    trace!(sheet = sheet.name(), "building worksheet markup");
    let mut node = Node::new(NodeKind::Worksheet).with_attr("Name", sheet.name());
    if sheet.protected {
        node.set_attr("Protected", 1);
    }
    node.push(table_node(&sheet.table));

    if sheet.options.is_some() || sheet.hidden || selected {
        node.push(options_node(sheet.options.as_ref(), sheet.hidden, selected));
    }

    if let Some(breaks) = sheet.page_breaks.as_ref().filter(|b| !b.is_empty()) {
        let mut node_breaks = Node::new(NodeKind::PageBreaks);
        if !breaks.row_breaks().is_empty() {
            let mut rows = Node::new(NodeKind::RowBreaks);
            for row in breaks.row_breaks() {
                rows.push(
                    Node::new(NodeKind::RowBreak)
                        .with_child(Node::new(NodeKind::Row).with_text((row - 1).to_string())),
                );
            }
            node_breaks.push(rows);
        }
        if !breaks.column_breaks().is_empty() {
            let mut columns = Node::new(NodeKind::ColBreaks);
            for col in breaks.column_breaks() {
                columns.push(
                    Node::new(NodeKind::ColBreak)
                        .with_child(Node::new(NodeKind::Column).with_text((col - 1).to_string())),
                );
            }
            node_breaks.push(columns);
        }
        node.push(node_breaks);
    }
    node
}

fn table_node(table: &Table) -> Node {
    let (last_row, last_col) = table.dimensions();
    let mut node = Node::new(NodeKind::Table)
        .with_attr("ExpandedColumnCount", last_col.max(1))
        .with_attr("ExpandedRowCount", last_row.max(1));
    if let Some(width) = table.default_column_width {
        node.set_attr("DefaultColumnWidth", width);
    }
    if let Some(height) = table.default_row_height {
        node.set_attr("DefaultRowHeight", height);
    }
    if let Some(style) = &table.style_id {
        node.set_attr("StyleID", style.as_str());
    }

    let mut next = 1;
    for (index, column) in table.columns_with_index() {
        node.push(column_node(column, (index != next).then_some(index)));
        next = index + column.span() + 1;
    }

    let mut next = 1;
    for (index, row) in table.rows_with_index() {
        node.push(row_node(row, (index != next).then_some(index)));
        next = index + 1;
    }
    node
}

fn column_node(column: &Column, index: Option<u32>) -> Node {
    let mut node = Node::new(NodeKind::Column);
    if let Some(index) = index {
        node.set_attr("Index", index);
    }
    if column.span() > 0 {
        node.set_attr("Span", column.span());
    }
    if let Some(width) = column.width {
        node.set_attr("Width", width);
    }
    if column.hidden {
        node.set_attr("Hidden", 1);
    }
    if column.auto_fit_width {
        node.set_attr("AutoFitWidth", 1);
    }
    if let Some(style) = &column.style_id {
        node.set_attr("StyleID", style.as_str());
    }
    node
}

fn row_node(row: &Row, index: Option<u32>) -> Node {
    let mut node = Node::new(NodeKind::Row);
    if let Some(index) = index {
        node.set_attr("Index", index);
    }
    if let Some(height) = row.height {
        node.set_attr("Height", height);
    }
    if row.hidden {
        node.set_attr("Hidden", 1);
    }
    if row.auto_fit_height {
        node.set_attr("AutoFitHeight", 1);
    }
    if let Some(style) = &row.style_id {
        node.set_attr("StyleID", style.as_str());
    }

    let mut next = 1;
    for (col, cell) in row.cells_with_columns() {
        let mut c = Node::new(NodeKind::Cell);
        if col != next {
            c.set_attr("Index", col);
        }
        next = col + cell.merge_across() + 1;
        if let Some(style) = cell.style_id() {
            c.set_attr("StyleID", style.as_str());
        }
        if cell.merge_across() > 0 {
            c.set_attr("MergeAcross", cell.merge_across());
        }
        if cell.merge_down() > 0 {
            c.set_attr("MergeDown", cell.merge_down());
        }
        if let Some(formula) = cell.formula() {
            c.set_attr("Formula", formula);
        }
        if let Some(href) = cell.href() {
            c.set_attr("HRef", href);
        }
        if let Some(data) = cell.data() {
            // The markup has no percentage type; the style's format carries it
            let data_type = match data.data_type {
                DataType::Percentage => DataType::Number,
                other => other,
            };
            c.push(
                Node::new(NodeKind::Data)
                    .with_attr("Type", data_type)
                    .with_text(data.value.as_str()),
            );
        }
        node.push(c);
    }
    node
}

fn options_node(options: Option<&WorksheetOptions>, hidden: bool, selected: bool) -> Node {
    let mut node = Node::new(NodeKind::WorksheetOptions);
    if let Some(options) = options {
        let page = &options.page_setup;
        let mut layout = Node::new(NodeKind::Layout);
        if page.orientation != Default::default() {
            layout.set_attr("Orientation", page.orientation.as_str());
        }
        if page.center_horizontal {
            layout.set_attr("CenterHorizontal", 1);
        }
        if page.center_vertical {
            layout.set_attr("CenterVertical", 1);
        }
        let margins = &page.margins;
        node.push(
            Node::new(NodeKind::PageSetup)
                .with_child(layout)
                .with_child(Node::new(NodeKind::Header).with_attr("Margin", page.header_margin))
                .with_child(Node::new(NodeKind::Footer).with_attr("Margin", page.footer_margin))
                .with_child(
                    Node::new(NodeKind::PageMargins)
                        .with_attr("Bottom", margins.bottom)
                        .with_attr("Left", margins.left)
                        .with_attr("Right", margins.right)
                        .with_attr("Top", margins.top),
                ),
        );
        if options.fit_to_page {
            node.push(Node::new(NodeKind::FitToPage));
        }

        let print = &options.print;
        let mut print_node = Node::new(NodeKind::Print);
        let numbers = [
            (NodeKind::FitWidth, print.fit_width),
            (NodeKind::FitHeight, print.fit_height),
            (NodeKind::PaperSizeIndex, print.paper_size_index),
            (NodeKind::Scale, print.scale),
        ];
        for (kind, value) in numbers {
            if let Some(value) = value {
                print_node.push(Node::new(kind).with_text(value.to_string()));
            }
        }
        if print.gridlines {
            print_node.push(Node::new(NodeKind::Gridlines));
        }
        if !print_node.children().is_empty() {
            node.push(print_node);
        }
    }
    if selected {
        node.push(Node::new(NodeKind::Selected));
    }
    if hidden {
        node.push(Node::new(NodeKind::Visible).with_text("SheetHidden"));
    }
    node
}

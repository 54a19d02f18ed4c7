//! SpreadsheetML 2003 reader: element tree to [`Workbook`]

use anyhow::{Context, Result};
use std::io::BufRead;
use tracing::debug;

use super::WorkbookReader;
use super::xml_parser::{parse_document, to_node};
use crate::address::{self, CellPos, MAX_COLUMNS, MAX_ROWS};
use crate::diagnostic::{DiagnosticKind, DiagnosticScope, Diagnostics};
use crate::model::indexed::Indexed;
use crate::model::{
    Alignment, Border, BorderPosition, Borders, Cell, Color, Column, Data, DataType, Font,
    FontSize, HorizontalAlignment, Interior, LineStyle, NumberFormat, Orientation, Pattern, Row,
    Style, StyleId, StyleSpec, Underline, VerticalAlignment, Workbook, Worksheet,
    WorksheetOptions,
};
use crate::node::{Node, NodeKind};

pub struct MarkupReader {
    root: Node,
}

impl MarkupReader {
    pub fn new<R: BufRead>(source: R, diagnostics: &mut Diagnostics) -> Result<Self> {
        let element = parse_document(source).context("Failed to parse SpreadsheetML document")?;
        let root = to_node(&element, diagnostics)
            .filter(|node| node.kind() == NodeKind::Workbook)
            .with_context(|| format!("Root element <{}> is not a Workbook", element.name))?;
        Ok(Self { root })
    }

    pub fn from_node(root: Node) -> Self {
        Self { root }
    }
}

impl WorkbookReader for MarkupReader {
    fn read_styles(&mut self, workbook: &mut Workbook, diagnostics: &mut Diagnostics) -> Result<()> {
        let Some(styles) = self.root.child(NodeKind::Styles) else {
            return Ok(());
        };
        for node in styles.children_of(NodeKind::Style) {
            let Some(id) = node.attr("ID") else {
                diagnostics.warn(
                    DiagnosticKind::UnknownElement,
                    DiagnosticScope::Book,
                    "style without ID skipped",
                );
                continue;
            };
            let mut style = Style::new(StyleId::new(id), read_style_spec(node, id, diagnostics));
            style.name = node.attr("Name").map(str::to_string);
            style.parent = node.attr("Parent").map(StyleId::new);
            workbook.styles_mut().insert(style);
        }
        debug!(count = workbook.styles().len(), "read styles");
        Ok(())
    }

    fn read_worksheets(
        &mut self,
        workbook: &mut Workbook,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let mut selected = None;
        for (position, node) in self.root.children_of(NodeKind::Worksheet).enumerate() {
            let requested = node
                .attr("Name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Sheet{}", position + 1));
            let name = unique_sheet_name(workbook, &requested, diagnostics);
            let max_repeat = workbook.config().global.max_repeated_rows;
            let sheet = workbook.create_worksheet(&name)?;
            read_worksheet(sheet, node, max_repeat, diagnostics);
            sheet.protected = node.attr_flag("Protected");

            if sheet.options.as_ref().is_some_and(|o| o.selected) && selected.is_none() {
                selected = Some(name);
            }
        }
        if let Some(name) = selected {
            workbook.set_active(&name)?;
        }
        check_style_references(workbook, diagnostics);
        Ok(())
    }
}

/// A free worksheet name; duplicates get a numeric suffix and a diagnostic
pub(crate) fn unique_sheet_name(
    workbook: &Workbook,
    requested: &str,
    diagnostics: &mut Diagnostics,
) -> String {
    if workbook.worksheet(requested).is_none() {
        return requested.to_string();
    }
    let mut n = 2;
    let mut name = format!("{} ({})", requested, n);
    while workbook.worksheet(&name).is_some() {
        n += 1;
        name = format!("{} ({})", requested, n);
    }
    diagnostics.warn(
        DiagnosticKind::UnknownElement,
        DiagnosticScope::Sheet(requested.to_string()),
        format!("duplicate worksheet name renamed to '{}'", name),
    );
    name
}

/// Drop references to styles the document never defined
pub(crate) fn check_style_references(workbook: &mut Workbook, diagnostics: &mut Diagnostics) {
    let missing: Vec<StyleId> = workbook
        .used_style_ids()
        .into_iter()
        .filter(|id| !workbook.styles().contains(id))
        .collect();
    if missing.is_empty() {
        return;
    }
    for id in &missing {
        diagnostics.warn(
            DiagnosticKind::StyleNotFound,
            DiagnosticScope::Book,
            format!("style '{}' is not defined; Default is used", id),
        );
    }
    for sheet in workbook.worksheets_mut() {
        sheet.table.retain_style_references(|id| !missing.contains(id));
    }
}

fn attr_keyword<T>(
    node: &Node,
    name: &str,
    parse: fn(&str) -> Option<T>,
    scope: &DiagnosticScope,
    diagnostics: &mut Diagnostics,
) -> Option<T> {
    let value = node.attr(name)?;
    let parsed = parse(value);
    if parsed.is_none() && value != "Automatic" {
        diagnostics.warn(
            DiagnosticKind::FormatConversion,
            scope.clone(),
            format!("unsupported {} '{}' on {}", name, value, node.kind().name()),
        );
    }
    parsed
}

fn read_style_spec(node: &Node, id: &str, diagnostics: &mut Diagnostics) -> StyleSpec {
    let scope = DiagnosticScope::Book;
    let mut spec = StyleSpec::new();
    let context = |what: &str| format!("style '{}': {}", id, what);

    if let Some(n) = node.child(NodeKind::Alignment) {
        let alignment = Alignment {
            horizontal: attr_keyword(n, "Horizontal", HorizontalAlignment::parse, &scope, diagnostics),
            vertical: attr_keyword(n, "Vertical", VerticalAlignment::parse, &scope, diagnostics),
            wrap_text: n.attr_flag("WrapText"),
            rotate: n.attr_parsed("Rotate").unwrap_or(0),
            indent: n.attr_parsed("Indent").unwrap_or(0),
            shrink_to_fit: n.attr_flag("ShrinkToFit"),
        };
        spec.alignment = (!alignment.is_empty()).then_some(alignment);
    }

    if let Some(n) = node.child(NodeKind::Borders) {
        let mut borders = Borders::new();
        for b in n.children_of(NodeKind::Border) {
            let Some(position) = attr_keyword(b, "Position", BorderPosition::parse, &scope, diagnostics)
            else {
                continue;
            };
            let line_style = match b.attr("LineStyle") {
                None | Some("None") => continue,
                Some(value) => LineStyle::parse(value).unwrap_or_else(|| {
                    diagnostics.warn(
                        DiagnosticKind::FormatConversion,
                        scope.clone(),
                        context(&format!("line style '{}' read as Continuous", value)),
                    );
                    LineStyle::Continuous
                }),
            };
            let weight = b.attr_parsed::<u8>("Weight").unwrap_or(1).min(3);
            let mut border = Border::new(position, line_style, weight);
            border.color = b.attr("Color").and_then(Color::parse);
            borders.set(border);
        }
        spec.borders = (!borders.is_empty()).then_some(borders);
    }

    if let Some(n) = node.child(NodeKind::Font) {
        let font = Font {
            name: n.attr("FontName").map(str::to_string),
            family: n.attr("Family").map(str::to_string),
            size: n.attr("Size").and_then(FontSize::parse),
            bold: n.attr_flag("Bold"),
            italic: n.attr_flag("Italic"),
            underline: match n.attr("Underline") {
                None | Some("None") => None,
                Some(_) => attr_keyword(n, "Underline", Underline::parse, &scope, diagnostics),
            },
            strike_through: n.attr_flag("StrikeThrough"),
            color: n.attr("Color").and_then(Color::parse),
        };
        spec.font = (!font.is_empty()).then_some(font);
    }

    if let Some(n) = node.child(NodeKind::Interior) {
        let interior = Interior {
            color: n.attr("Color").and_then(Color::parse),
            pattern: match n.attr("Pattern") {
                None | Some("None") => None,
                Some(_) => attr_keyword(n, "Pattern", Pattern::parse, &scope, diagnostics),
            },
            pattern_color: n.attr("PatternColor").and_then(Color::parse),
        };
        spec.interior = (!interior.is_empty()).then_some(interior);
    }

    if let Some(n) = node.child(NodeKind::NumberFormat) {
        let format = NumberFormat::new(n.attr("Format").unwrap_or("General"));
        spec.number_format = format.pattern().is_some().then_some(format);
    }

    spec
}

fn read_worksheet(
    sheet: &mut Worksheet,
    node: &Node,
    max_repeat: u32,
    diagnostics: &mut Diagnostics,
) {
    let name = sheet.name().to_string();
    let scope = DiagnosticScope::Sheet(name.clone());

    if let Some(table) = node.child(NodeKind::Table) {
        sheet.table.default_column_width = table.attr_parsed("DefaultColumnWidth");
        sheet.table.default_row_height = table.attr_parsed("DefaultRowHeight");
        sheet.table.style_id = table.attr("StyleID").map(StyleId::new);
        read_columns(sheet, table, &scope, diagnostics);
        read_rows(sheet, table, max_repeat, diagnostics);
        sheet.table.finish_load();
    }

    if let Some(options) = node.child(NodeKind::WorksheetOptions) {
        read_options(sheet, options, &scope, diagnostics);
    }

    if let Some(breaks) = node.child(NodeKind::PageBreaks) {
        read_page_breaks(sheet, breaks);
    }
}

fn read_columns(sheet: &mut Worksheet, table: &Node, scope: &DiagnosticScope, diagnostics: &mut Diagnostics) {
    let mut next = 1u32;
    for node in table.children_of(NodeKind::Column) {
        let index = node.attr_parsed::<u32>("Index").filter(|i| *i >= next).unwrap_or(next);
        if index > MAX_COLUMNS {
            diagnostics.warn(
                DiagnosticKind::AddressOutOfRange,
                scope.clone(),
                format!("column {} is beyond column {}", index, MAX_COLUMNS),
            );
            break;
        }
        let requested = node.attr_parsed::<u32>("Span").unwrap_or(0);
        let span = requested.min(MAX_COLUMNS - index);
        if span < requested {
            diagnostics.warn(
                DiagnosticKind::AddressOutOfRange,
                scope.clone(),
                format!("column span at {} truncated to the grid", index),
            );
        }

        let mut column = Column::new();
        column.width = node.attr_parsed("Width");
        column.hidden = node.attr_flag("Hidden");
        column.auto_fit_width = node.attr_flag("AutoFitWidth");
        column.style_id = node.attr("StyleID").map(StyleId::new);
        column.set_repeat(span);
        sheet.table.push_column(index, column);
        next = index + span + 1;
    }
}

fn read_rows(sheet: &mut Worksheet, table: &Node, max_repeat: u32, diagnostics: &mut Diagnostics) {
    let name = sheet.name().to_string();
    let scope = DiagnosticScope::Sheet(name.clone());

    let mut next = 1u32;
    for node in table.children_of(NodeKind::Row) {
        let index = node.attr_parsed::<u32>("Index").filter(|i| *i >= next).unwrap_or(next);
        let span = node.attr_parsed::<u32>("Span").unwrap_or(0);
        next = index.saturating_add(span).saturating_add(1);
        if index > MAX_ROWS {
            diagnostics.warn(
                DiagnosticKind::AddressOutOfRange,
                scope.clone(),
                format!("row {} is beyond row {}", index, MAX_ROWS),
            );
            break;
        }

        let mut row = Row::new();
        row.height = node.attr_parsed("Height");
        row.hidden = node.attr_flag("Hidden");
        row.auto_fit_height = node.attr_flag("AutoFitHeight");
        row.style_id = node.attr("StyleID").map(StyleId::new);
        row.cells = read_cells(node, index, &name, diagnostics);
        if row.is_plain() {
            continue;
        }

        let mut copies = span.saturating_add(1);
        if copies > max_repeat {
            diagnostics.warn(
                DiagnosticKind::RepeatLimitExceeded,
                scope.clone(),
                format!("row span of {} at row {} truncated to {}", copies, index, max_repeat),
            );
            copies = max_repeat;
        }
        if index - 1 + copies > MAX_ROWS {
            diagnostics.warn(
                DiagnosticKind::AddressOutOfRange,
                scope.clone(),
                format!("row span at {} truncated to the grid", index),
            );
            copies = MAX_ROWS - index + 1;
        }

        // Copies are re-read so that relative formulas resolve against their own row
        let mut quiet = Diagnostics::new();
        let template = row.clone();
        sheet.table.push_row(index, row);
        for logical in index + 1..index + copies {
            let mut copy = template.clone();
            copy.cells = read_cells(node, logical, &name, &mut quiet);
            sheet.table.push_row(logical, copy);
        }
    }
}

fn read_cells(row: &Node, row_index: u32, sheet: &str, diagnostics: &mut Diagnostics) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut next = 1u32;
    for node in row.children_of(NodeKind::Cell) {
        let col = node.attr_parsed::<u32>("Index").filter(|i| *i >= next).unwrap_or(next);
        let across = node.attr_parsed::<u32>("MergeAcross").unwrap_or(0);
        let down = node.attr_parsed::<u32>("MergeDown").unwrap_or(0);
        next = col.saturating_add(across).saturating_add(1);
        let position = CellPos::new(row_index, col);
        if col > MAX_COLUMNS {
            diagnostics.warn(
                DiagnosticKind::AddressOutOfRange,
                DiagnosticScope::Sheet(sheet.to_string()),
                format!("cell {} is beyond column {}", position, MAX_COLUMNS),
            );
            break;
        }

        let mut cell = Cell::new();
        cell.set_index(Some(col));
        cell.set_position(row_index, col);
        cell.set_merge(
            across.min(MAX_COLUMNS - col),
            down.min(MAX_ROWS.saturating_sub(row_index)),
        );
        cell.set_style_id(node.attr("StyleID").map(StyleId::new));
        cell.set_href(node.attr("HRef").map(str::to_string));

        if let Some(formula) = node.attr("Formula") {
            let a1 = address::to_absolute_at(formula, row_index, col);
            cell.set_formula_r1c1(Some(address::to_relative(&a1, row_index, col)));
        }

        if let Some(data) = node.child(NodeKind::Data) {
            let type_name = data.attr("Type").unwrap_or("String");
            let data_type = DataType::parse(type_name).unwrap_or_else(|| {
                diagnostics.warn(
                    DiagnosticKind::FormatConversion,
                    DiagnosticScope::Cell(sheet.to_string(), position),
                    format!("unknown data type '{}' read as String", type_name),
                );
                DataType::String
            });
            cell.set_data(Some(Data::new(data.text().unwrap_or_default(), data_type)));
        }

        cells.push(cell);
    }
    cells
}

fn read_options(
    sheet: &mut Worksheet,
    node: &Node,
    scope: &DiagnosticScope,
    diagnostics: &mut Diagnostics,
) {
    if let Some(visible) = node.child_text(NodeKind::Visible) {
        sheet.hidden = matches!(visible, "SheetHidden" | "SheetVeryHidden");
    }

    let has_layout = [
        NodeKind::PageSetup,
        NodeKind::FitToPage,
        NodeKind::Print,
        NodeKind::Selected,
    ]
    .iter()
    .any(|kind| node.has_child(*kind));
    if !has_layout {
        return;
    }

    let mut options = WorksheetOptions::default();
    if let Some(setup) = node.child(NodeKind::PageSetup) {
        let page = &mut options.page_setup;
        if let Some(layout) = setup.child(NodeKind::Layout) {
            if let Some(orientation) = layout.attr("Orientation") {
                page.orientation = Orientation::parse(orientation).unwrap_or_else(|| {
                    diagnostics.warn(
                        DiagnosticKind::FormatConversion,
                        scope.clone(),
                        format!("orientation '{}' read as Portrait", orientation),
                    );
                    Orientation::Portrait
                });
            }
            page.center_horizontal = layout.attr_flag("CenterHorizontal");
            page.center_vertical = layout.attr_flag("CenterVertical");
        }
        if let Some(margins) = setup.child(NodeKind::PageMargins) {
            let m = &mut page.margins;
            m.top = margins.attr_parsed("Top").unwrap_or(m.top);
            m.bottom = margins.attr_parsed("Bottom").unwrap_or(m.bottom);
            m.left = margins.attr_parsed("Left").unwrap_or(m.left);
            m.right = margins.attr_parsed("Right").unwrap_or(m.right);
        }
        if let Some(header) = setup.child(NodeKind::Header) {
            page.header_margin = header.attr_parsed("Margin").unwrap_or(page.header_margin);
        }
        if let Some(footer) = setup.child(NodeKind::Footer) {
            page.footer_margin = footer.attr_parsed("Margin").unwrap_or(page.footer_margin);
        }
    }

    options.fit_to_page = node.has_child(NodeKind::FitToPage);
    options.selected = node.has_child(NodeKind::Selected);

    if let Some(print) = node.child(NodeKind::Print) {
        let parse = |kind| print.child_text(kind).and_then(|t| t.trim().parse::<u32>().ok());
        options.print.paper_size_index = parse(NodeKind::PaperSizeIndex);
        options.print.fit_width = parse(NodeKind::FitWidth);
        options.print.fit_height = parse(NodeKind::FitHeight);
        options.print.scale = parse(NodeKind::Scale);
        options.print.gridlines = print.has_child(NodeKind::Gridlines);
    }

    sheet.options = Some(options);
}

/// Break positions are stored 0-based in the markup
fn read_page_breaks(sheet: &mut Worksheet, node: &Node) {
    let rows: Vec<u32> = node
        .child(NodeKind::RowBreaks)
        .into_iter()
        .flat_map(|b| b.children_of(NodeKind::RowBreak))
        .filter_map(|b| b.child_text(NodeKind::Row)?.parse::<u32>().ok())
        .collect();
    let columns: Vec<u32> = node
        .child(NodeKind::ColBreaks)
        .into_iter()
        .flat_map(|b| b.children_of(NodeKind::ColBreak))
        .filter_map(|b| b.child_text(NodeKind::Column)?.parse::<u32>().ok())
        .collect();
    if rows.is_empty() && columns.is_empty() {
        return;
    }
    let breaks = sheet.page_breaks_mut();
    for row in rows {
        breaks.add_row_break(row + 1);
    }
    for col in columns {
        breaks.add_column_break(col + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use crate::model::PaperSize;

    const BOOK: &str = r##"<?xml version="1.0"?>
<?mso-application progid="Excel.Sheet"?>
<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet"
 xmlns:o="urn:schemas-microsoft-com:office:office"
 xmlns:x="urn:schemas-microsoft-com:office:excel"
 xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
 <DocumentProperties xmlns="urn:schemas-microsoft-com:office:office"><Author>x</Author></DocumentProperties>
 <Styles>
  <Style ss:ID="Default" ss:Name="Normal"><Alignment ss:Vertical="Bottom"/><Font ss:FontName="Arial"/></Style>
  <Style ss:ID="s21"><NumberFormat ss:Format="Percent"/></Style>
  <Style ss:ID="s22">
   <Borders>
    <Border ss:Position="Bottom" ss:LineStyle="Continuous" ss:Weight="2" ss:Color="#FF0000"/>
    <Border ss:Position="Top" ss:LineStyle="None"/>
   </Borders>
   <Interior/>
  </Style>
 </Styles>
 <Worksheet ss:Name="Data">
  <Table ss:ExpandedColumnCount="3" ss:ExpandedRowCount="4" x:FullColumns="1">
   <Column ss:Width="80"/>
   <Column ss:Index="3" ss:Span="1" ss:Hidden="1"/>
   <Row>
    <Cell ss:MergeAcross="1" ss:MergeDown="1"><Data ss:Type="String">Title</Data></Cell>
    <Cell ss:StyleID="s21"><Data ss:Type="Number">0.25</Data></Cell>
   </Row>
   <Row ss:Index="3" ss:Height="20">
    <Cell ss:Index="2" ss:Formula="=SUM(R[-2]C[1]:R[-1]C[1])"><Data ss:Type="Number">0.25</Data></Cell>
    <Cell ss:StyleID="s22" ss:HRef="http://example.com"><Data ss:Type="String">link</Data></Cell>
   </Row>
   <Row ss:Span="1" ss:Hidden="1"/>
  </Table>
  <WorksheetOptions xmlns="urn:schemas-microsoft-com:office:excel">
   <PageSetup><Layout x:Orientation="Landscape"/><PageMargins x:Top="0.5" x:Bottom="0.5"/></PageSetup>
   <FitToPage/>
   <Print><PaperSizeIndex>8</PaperSizeIndex><FitWidth>1</FitWidth><Gridlines/></Print>
   <Selected/>
   <ProtectObjects>False</ProtectObjects>
  </WorksheetOptions>
  <PageBreaks xmlns="urn:schemas-microsoft-com:office:excel">
   <RowBreaks><RowBreak><Row>2</Row></RowBreak></RowBreaks>
  </PageBreaks>
 </Worksheet>
 <Worksheet ss:Name="Hidden">
  <WorksheetOptions xmlns="urn:schemas-microsoft-com:office:excel"><Visible>SheetHidden</Visible></WorksheetOptions>
 </Worksheet>
</Workbook>"##;

    fn load(xml: &str) -> (Workbook, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut reader = MarkupReader::new(xml.as_bytes(), &mut diagnostics).unwrap();
        let mut workbook = Workbook::with_config(CodecConfig::default());
        reader.read_styles(&mut workbook, &mut diagnostics).unwrap();
        reader.read_worksheets(&mut workbook, &mut diagnostics).unwrap();
        (workbook, diagnostics)
    }

    #[test]
    fn test_styles_are_normalized() {
        let (workbook, _) = load(BOOK);
        let styles = workbook.styles();
        assert_eq!(styles.default_style().name.as_deref(), Some("Normal"));
        assert!(styles.get(&StyleId::new("s21")).unwrap().is_percentage());

        let bordered = styles.get(&StyleId::new("s22")).unwrap();
        let borders = bordered.spec.borders.as_ref().unwrap();
        assert_eq!(borders.len(), 1);
        let bottom = borders.get(BorderPosition::Bottom).unwrap();
        assert_eq!(bottom.weight, 2);
        assert_eq!(bottom.color.as_ref().map(|c| c.as_str()), Some("#FF0000"));
        assert!(bordered.spec.interior.is_none());
    }

    #[test]
    fn test_cells_merges_and_formulas() {
        let (workbook, _) = load(BOOK);
        let sheet = workbook.worksheet("Data").unwrap();
        let table = &sheet.table;

        let anchor = table.cell(1, 1).unwrap().unwrap();
        assert_eq!((anchor.merge_across(), anchor.merge_down()), (1, 1));
        assert_eq!(anchor.value().to_string(), "Title");
        // MergeAcross pushes the next implicit cell past the span
        assert!(table.row(1).unwrap().cell(3).is_some());

        let formula = table.row(3).unwrap().cell(2).unwrap();
        assert_eq!(formula.formula(), Some("=SUM(R1C3:R2C3)"));
        assert_eq!(formula.formula_a1().as_deref(), Some("=SUM(C1:C2)"));

        let link = table.row(3).unwrap().cell(3).unwrap();
        assert_eq!(link.href(), Some("http://example.com"));
        assert_eq!(table.row(3).unwrap().height, Some(20.0));
    }

    #[test]
    fn test_row_span_expands() {
        let (workbook, _) = load(BOOK);
        let table = &workbook.worksheet("Data").unwrap().table;
        assert!(table.row(4).is_some_and(|r| r.hidden));
        assert!(table.row(5).is_some_and(|r| r.hidden));
        assert!(table.row(6).is_none());
    }

    #[test]
    fn test_row_span_keeps_later_rows_in_place() {
        let xml = r#"<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet"
              xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
            <Worksheet ss:Name="S"><Table>
              <Row ss:Index="2" ss:Span="2" ss:Height="18"><Cell><Data ss:Type="Number">1</Data></Cell></Row>
              <Row><Cell><Data ss:Type="String">after</Data></Cell></Row>
            </Table></Worksheet>
        </Workbook>"#;
        let (workbook, _) = load(xml);
        let table = &workbook.worksheet("S").unwrap().table;

        assert!(table.row(1).is_none());
        for index in 2..=4 {
            let row = table.row(index).unwrap();
            assert_eq!(row.height, Some(18.0));
            assert_eq!(row.cell(1).unwrap().value().to_string(), "1");
        }
        let after = table.row(5).unwrap().cell(1).unwrap();
        assert_eq!(after.value().to_string(), "after");
        assert!(table.row(6).is_none());
    }

    #[test]
    fn test_columns_and_options() {
        let (workbook, _) = load(BOOK);
        let sheet = workbook.worksheet("Data").unwrap();
        assert_eq!(sheet.table.column(1).and_then(|c| c.width), Some(80.0));
        assert!(sheet.table.column(4).is_some_and(|c| c.hidden));

        let options = sheet.options.as_ref().unwrap();
        assert_eq!(options.page_setup.orientation, Orientation::Landscape);
        assert_eq!(options.page_setup.margins.top, 0.5);
        assert_eq!(options.page_setup.margins.left, 0.75);
        assert_eq!(options.print.paper_size(), PaperSize::A3);
        assert_eq!(options.print.fit_width, Some(1));
        assert!(options.fit_to_page && options.print.gridlines);

        assert_eq!(sheet.page_breaks.as_ref().unwrap().row_breaks(), &[3]);
        assert!(workbook.worksheet("Hidden").unwrap().hidden);
        assert_eq!(workbook.active_worksheet().map(|s| s.name()), Some("Data"));
    }

    #[test]
    fn test_unknown_elements_recorded() {
        let (_, diagnostics) = load(BOOK);
        assert!(diagnostics.of_kind(DiagnosticKind::UnknownElement).count() >= 2);
    }

    #[test]
    fn test_dangling_style_and_duplicate_names() {
        let xml = r#"<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet"
             xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
            <Worksheet ss:Name="A"><Table><Row><Cell ss:StyleID="s99"/></Row></Table></Worksheet>
            <Worksheet ss:Name="A"/>
        </Workbook>"#;
        let (workbook, diagnostics) = load(xml);
        assert_eq!(workbook.worksheet_names(), vec!["A", "A (2)"]);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::StyleNotFound).count(), 1);
        let cell = workbook.worksheet("A").unwrap().table.cell(1, 1).unwrap().unwrap();
        assert!(cell.style_id().is_none());
    }

    #[test]
    fn test_not_a_workbook() {
        let mut diagnostics = Diagnostics::new();
        assert!(MarkupReader::new("<Other/>".as_bytes(), &mut diagnostics).is_err());
    }
}

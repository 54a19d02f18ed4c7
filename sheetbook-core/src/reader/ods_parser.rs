//! ODS reader: `styles.xml` and `content.xml` to [`Workbook`]

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io::{BufReader, Read, Seek};
use std::sync::OnceLock;
use tracing::{debug, trace};
use zip::ZipArchive;

use super::WorkbookReader;
use super::markup::{check_style_references, unique_sheet_name};
use super::xml_parser::{Content, Element, parse_document};
use crate::address::{self, CellPos, MAX_COLUMNS, MAX_ROWS};
use crate::diagnostic::{DiagnosticKind, DiagnosticScope, Diagnostics};
use crate::error::ConversionError;
use crate::format::TIME_EPOCH;
use crate::format::border::{BorderLine, parse_border};
use crate::format::formula::ods_to_a1;
use crate::format::number_format::{DateToken, NumberParts, compose_date, compose_number};
use crate::format::page::{cm_to_inches, cm_to_points, detect_paper, parse_length_cm};
use crate::model::indexed::Indexed;
use crate::model::{
    Alignment, BorderPosition, Borders, Cell, Color, Column, Data, DataType, Font, FontSize,
    HorizontalAlignment, Interior, NumberFormat, Orientation, Row, Style, StyleId, StyleSpec,
    Underline, VerticalAlignment, Workbook, Worksheet, WorksheetOptions,
};

static DURATION: OnceLock<Regex> = OnceLock::new();

/// Longest text a cell holds; `text:s` runs are clamped to it
const MAX_CELL_TEXT: usize = 32_767;

#[derive(Debug, Clone, Default)]
struct RowFormat {
    height: Option<f64>,
    optimal: bool,
    page_break: bool,
}

#[derive(Debug, Clone, Default)]
struct ColumnFormat {
    width: Option<f64>,
    page_break: bool,
}

#[derive(Debug, Clone, Default)]
struct TableFormat {
    master_page: Option<String>,
    hidden: bool,
}

/// A `table-cell` style before its parent chain is folded in
#[derive(Debug, Clone)]
struct CellStyleEntry {
    parent: Option<String>,
    data_style: Option<String>,
    spec: StyleSpec,
}

#[derive(Debug, Clone, Copy)]
struct RepeatLimits {
    rows: u32,
    columns: u32,
}

pub struct OdsReader<'a, R: Read + Seek> {
    archive: &'a mut ZipArchive<R>,
    content: Element,
    /// ODS cell style name to registry ID
    cell_styles: HashMap<String, StyleId>,
    row_formats: HashMap<String, RowFormat>,
    column_formats: HashMap<String, ColumnFormat>,
    table_formats: HashMap<String, TableFormat>,
    /// Master page name to the page setup of its layout
    page_options: HashMap<String, WorksheetOptions>,
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<Element>> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(_) => return Ok(None),
    };
    parse_document(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", name))
        .map(Some)
}

impl<'a, R: Read + Seek> OdsReader<'a, R> {
    pub fn new(archive: &'a mut ZipArchive<R>) -> Result<Self> {
        let content =
            read_part(archive, "content.xml")?.context("content.xml not found in ODS package")?;
        Ok(Self {
            archive,
            content,
            cell_styles: HashMap::new(),
            row_formats: HashMap::new(),
            column_formats: HashMap::new(),
            table_formats: HashMap::new(),
            page_options: HashMap::new(),
        })
    }

    /// Registry ID for a referenced cell style; `Default` reads as no style
    fn cell_style(
        &self,
        name: Option<&str>,
        scope: &DiagnosticScope,
        diagnostics: &mut Diagnostics,
    ) -> Option<StyleId> {
        let name = name?;
        match self.cell_styles.get(name) {
            Some(id) if id.is_default() => None,
            Some(id) => Some(id.clone()),
            None => {
                diagnostics.warn(
                    DiagnosticKind::StyleNotFound,
                    scope.clone(),
                    format!("cell style '{}' is not defined; Default is used", name),
                );
                None
            }
        }
    }

    fn read_table(
        &self,
        sheet: &mut Worksheet,
        table: &Element,
        limits: RepeatLimits,
        diagnostics: &mut Diagnostics,
    ) {
        let scope = DiagnosticScope::Sheet(sheet.name().to_string());
        sheet.protected = table.attr("table:protected") == Some("true");

        if let Some(format) = table
            .attr("table:style-name")
            .and_then(|name| self.table_formats.get(name))
        {
            sheet.hidden = format.hidden;
            sheet.options = format
                .master_page
                .as_deref()
                .and_then(|master| self.page_options.get(master))
                .cloned();
        }

        let mut items = Vec::new();
        collect_table_items(table, &mut items);
        let mut next_col = 1u32;
        let mut next_row = 1u32;
        for item in items {
            if item.name == "table:table-column" {
                next_col = self.read_column(sheet, item, next_col, limits, &scope, diagnostics);
            } else {
                next_row = self.read_row(sheet, item, next_row, limits, &scope, diagnostics);
            }
        }
        sheet.table.finish_load();
    }

    /// Returns the position following the column element
    fn read_column(
        &self,
        sheet: &mut Worksheet,
        element: &Element,
        index: u32,
        limits: RepeatLimits,
        scope: &DiagnosticScope,
        diagnostics: &mut Diagnostics,
    ) -> u32 {
        let repeat = element.count_attr("table:number-columns-repeated");
        let next = index.saturating_add(repeat);
        let format = element
            .attr("table:style-name")
            .and_then(|name| self.column_formats.get(name))
            .cloned()
            .unwrap_or_default();
        let hidden = is_collapsed(element);
        let style_id = self.cell_style(
            element.attr("table:default-cell-style-name"),
            scope,
            diagnostics,
        );
        let meaningful = hidden || style_id.is_some() || format.page_break;

        if index > MAX_COLUMNS {
            if meaningful {
                diagnostics.warn(
                    DiagnosticKind::AddressOutOfRange,
                    scope.clone(),
                    format!("column {} is beyond column {}", index, MAX_COLUMNS),
                );
            }
            return next;
        }
        let mut count = repeat;
        if count > limits.columns {
            if meaningful {
                diagnostics.warn(
                    DiagnosticKind::RepeatLimitExceeded,
                    scope.clone(),
                    format!("column repeat of {} at {} truncated to {}", count, index, limits.columns),
                );
            }
            count = limits.columns;
        }
        if index - 1 + count > MAX_COLUMNS {
            if meaningful {
                diagnostics.warn(
                    DiagnosticKind::AddressOutOfRange,
                    scope.clone(),
                    format!("column repeat at {} truncated to the grid", index),
                );
            }
            count = MAX_COLUMNS - index + 1;
        }
        if format.width.is_none() && !meaningful {
            return next;
        }

        let mut column = Column::new();
        column.width = format.width;
        column.hidden = hidden;
        column.style_id = style_id;
        column.set_repeat(count - 1);
        sheet.table.push_column(index, column);
        if format.page_break {
            for col in index..index + count {
                sheet.page_breaks_mut().add_column_break(col);
            }
        }
        next
    }

    /// Returns the position following the row element
    fn read_row(
        &self,
        sheet: &mut Worksheet,
        element: &Element,
        index: u32,
        limits: RepeatLimits,
        scope: &DiagnosticScope,
        diagnostics: &mut Diagnostics,
    ) -> u32 {
        let repeat = element.count_attr("table:number-rows-repeated");
        let next = index.saturating_add(repeat);
        if index > MAX_ROWS {
            // Whole-sheet padding past the grid is normal; content there is not
            if element.elements().any(cell_has_content) {
                diagnostics.warn(
                    DiagnosticKind::AddressOutOfRange,
                    scope.clone(),
                    format!("row {} is beyond row {}", index, MAX_ROWS),
                );
            }
            return next;
        }

        let format = element
            .attr("table:style-name")
            .and_then(|name| self.row_formats.get(name))
            .cloned()
            .unwrap_or_default();
        let mut row = Row::new();
        row.hidden = is_collapsed(element);
        row.auto_fit_height = format.optimal;
        row.height = format.height.filter(|_| !format.optimal);
        row.style_id = self.cell_style(
            element.attr("table:default-cell-style-name"),
            scope,
            diagnostics,
        );
        let sheet_name = sheet.name().to_string();
        row.cells = self.read_cells(element, index, limits.columns, &sheet_name, diagnostics);

        let meaningful = !row.cells.is_empty()
            || row.hidden
            || row.height.is_some()
            || row.style_id.is_some()
            || format.page_break;
        if !meaningful {
            return next;
        }

        let mut copies = repeat;
        if copies > limits.rows {
            diagnostics.warn(
                DiagnosticKind::RepeatLimitExceeded,
                scope.clone(),
                format!("row repeat of {} at row {} truncated to {}", copies, index, limits.rows),
            );
            copies = limits.rows;
        }
        if index - 1 + copies > MAX_ROWS {
            diagnostics.warn(
                DiagnosticKind::AddressOutOfRange,
                scope.clone(),
                format!("row repeat at {} truncated to the grid", index),
            );
            copies = MAX_ROWS - index + 1;
        }

        for logical in index..index + copies {
            let mut copy = row.clone();
            for cell in &mut copy.cells {
                let col = cell.col();
                cell.set_position(logical, col);
            }
            sheet.table.push_row(logical, copy);
            if format.page_break {
                sheet.page_breaks_mut().add_row_break(logical);
            }
        }
        next
    }

    fn read_cells(
        &self,
        row: &Element,
        row_index: u32,
        max_repeat: u32,
        sheet: &str,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Cell> {
        let mut cells = Vec::new();
        let mut next = 1u32;
        for element in row.elements() {
            let covered = match element.name.as_str() {
                "table:table-cell" => false,
                "table:covered-table-cell" => true,
                _ => continue,
            };
            let repeat = element.count_attr("table:number-columns-repeated");
            let col = next;
            next = next.saturating_add(repeat);
            if covered {
                continue;
            }
            let Some(cell) = self.read_cell(element, row_index, col, sheet, diagnostics) else {
                continue;
            };

            let scope = DiagnosticScope::Sheet(sheet.to_string());
            if col > MAX_COLUMNS {
                diagnostics.warn(
                    DiagnosticKind::AddressOutOfRange,
                    scope,
                    format!("cell {} is beyond column {}", CellPos::new(row_index, col), MAX_COLUMNS),
                );
                break;
            }
            let mut copies = repeat;
            if copies > max_repeat {
                let message = format!(
                    "cell repeat of {} at {} truncated to {}",
                    copies,
                    CellPos::new(row_index, col),
                    max_repeat
                );
                // Formatting-only runs across a whole row are routine
                if cell.is_blank() {
                    diagnostics.info(DiagnosticKind::RepeatLimitExceeded, scope.clone(), message);
                } else {
                    diagnostics.warn(DiagnosticKind::RepeatLimitExceeded, scope.clone(), message);
                }
                copies = max_repeat;
            }
            if col - 1 + copies > MAX_COLUMNS {
                if !cell.is_blank() {
                    diagnostics.warn(
                        DiagnosticKind::AddressOutOfRange,
                        scope,
                        format!("cell repeat at {} truncated to the grid", CellPos::new(row_index, col)),
                    );
                }
                copies = MAX_COLUMNS - col + 1;
            }

            for logical in col..col + copies {
                let mut copy = cell.clone();
                copy.set_index(Some(logical));
                copy.set_position(row_index, logical);
                cells.push(copy);
            }
        }
        cells
    }

    /// A cell, or `None` when it carries nothing but its position
    fn read_cell(
        &self,
        element: &Element,
        row: u32,
        col: u32,
        sheet: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Cell> {
        let position = CellPos::new(row, col);
        let scope = DiagnosticScope::Cell(sheet.to_string(), position);

        let mut cell = Cell::new();
        cell.set_style_id(self.cell_style(element.attr("table:style-name"), &scope, diagnostics));
        let across = element.count_attr("table:number-columns-spanned") - 1;
        let down = element.count_attr("table:number-rows-spanned") - 1;
        cell.set_merge(
            across.min(MAX_COLUMNS.saturating_sub(col)),
            down.min(MAX_ROWS.saturating_sub(row)),
        );

        if let Some(formula) = element.attr("table:formula") {
            let a1 = ods_to_a1(formula);
            trace!(cell = %position, from = formula, to = %a1, "translated formula");
            cell.set_formula_r1c1(Some(address::to_relative(&a1, row, col)));
        }

        let (text, href, clamped) = cell_text(element);
        if clamped {
            diagnostics.warn(
                DiagnosticKind::RepeatLimitExceeded,
                scope.clone(),
                format!("space run truncated to {} characters", MAX_CELL_TEXT),
            );
        }
        cell.set_href(href);
        cell.set_data(read_value(element, text, &scope, diagnostics));

        let empty = cell.is_blank()
            && cell.style_id().is_none()
            && cell.href().is_none()
            && !cell.is_merge_anchor();
        (!empty).then_some(cell)
    }

    fn read_active_table(&mut self) -> Option<String> {
        match read_part(self.archive, "settings.xml") {
            Ok(settings) => settings.and_then(|s| find_config_item(&s, "ActiveTable")),
            Err(e) => {
                debug!(error = %e, "ignoring unreadable settings.xml");
                None
            }
        }
    }
}

impl<R: Read + Seek> WorkbookReader for OdsReader<'_, R> {
    fn read_styles(&mut self, workbook: &mut Workbook, diagnostics: &mut Diagnostics) -> Result<()> {
        let styles = read_part(self.archive, "styles.xml")?;
        if styles.is_none() {
            diagnostics.info(
                DiagnosticKind::FileAccess,
                DiagnosticScope::Book,
                "styles.xml not found; only automatic styles are read",
            );
        }

        // Later sections win on name clashes
        let mut sections: Vec<&Element> = Vec::new();
        if let Some(styles) = &styles {
            sections.extend(styles.child("office:styles"));
            sections.extend(styles.child("office:automatic-styles"));
        }
        sections.extend(self.content.child("office:automatic-styles"));

        let mut data_formats: HashMap<String, Result<String, ConversionError>> = HashMap::new();
        let mut entries: Vec<(String, CellStyleEntry)> = Vec::new();
        let mut default_spec = StyleSpec::default();
        let mut layouts: HashMap<String, WorksheetOptions> = HashMap::new();

        for section in &sections {
            for element in section.elements() {
                let name = element.attr("style:name").unwrap_or_default();
                match element.name.as_str() {
                    "style:default-style" => {
                        if element.attr("style:family") == Some("table-cell") {
                            default_spec = read_cell_spec(element, "default", diagnostics);
                        }
                    }
                    "style:style" if !name.is_empty() => match element.attr("style:family") {
                        Some("table-cell") => {
                            let entry = CellStyleEntry {
                                parent: element.attr("style:parent-style-name").map(str::to_string),
                                data_style: element.attr("style:data-style-name").map(str::to_string),
                                spec: read_cell_spec(element, name, diagnostics),
                            };
                            entries.retain(|(existing, _)| existing != name);
                            entries.push((name.to_string(), entry));
                        }
                        Some("table-row") => {
                            self.row_formats.insert(name.to_string(), read_row_format(element));
                        }
                        Some("table-column") => {
                            self.column_formats.insert(name.to_string(), read_column_format(element));
                        }
                        Some("table") => {
                            self.table_formats.insert(name.to_string(), read_table_format(element));
                        }
                        _ => {}
                    },
                    "style:page-layout" if !name.is_empty() => {
                        layouts.insert(name.to_string(), read_page_layout(element, name, diagnostics));
                    }
                    data if data.starts_with("number:") && !name.is_empty() => {
                        data_formats.insert(name.to_string(), read_data_style(element));
                    }
                    _ => {}
                }
            }
        }

        if let Some(master) = styles.as_ref().and_then(|s| s.child("office:master-styles")) {
            for page in master.children_named("style:master-page") {
                let (Some(name), Some(layout)) =
                    (page.attr("style:name"), page.attr("style:page-layout-name"))
                else {
                    continue;
                };
                if let Some(options) = layouts.get(layout) {
                    self.page_options.insert(name.to_string(), options.clone());
                }
            }
        }

        // Registration: Default first, then IDs in registry form keep their name, the rest dedupe
        let lookup: HashMap<&str, &CellStyleEntry> =
            entries.iter().map(|(name, entry)| (name.as_str(), entry)).collect();
        let prefix = workbook.styles().prefix().to_string();

        let mut base = default_spec;
        if lookup.contains_key(StyleId::DEFAULT) {
            base = base.merged(&resolve_cell_style(StyleId::DEFAULT, &lookup, &data_formats, diagnostics));
        }
        workbook.styles_mut().set_attrs(&StyleId::default_id(), base);
        self.cell_styles.insert(StyleId::DEFAULT.to_string(), StyleId::default_id());

        let (native, generated): (Vec<&str>, Vec<&str>) = entries
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| *name != StyleId::DEFAULT)
            .partition(|name| StyleId::new(*name).serial(&prefix).is_some());
        for name in native {
            let spec = resolve_cell_style(name, &lookup, &data_formats, diagnostics);
            let id = workbook.styles_mut().insert(Style::new(StyleId::new(name), spec));
            self.cell_styles.insert(name.to_string(), id);
        }
        for name in generated {
            let spec = resolve_cell_style(name, &lookup, &data_formats, diagnostics);
            let id = workbook.styles_mut().get_or_create(spec);
            self.cell_styles.insert(name.to_string(), id);
        }
        debug!(
            ods_styles = self.cell_styles.len(),
            registry = workbook.styles().len(),
            "read ODS styles"
        );
        Ok(())
    }

    fn read_worksheets(
        &mut self,
        workbook: &mut Workbook,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let limits = RepeatLimits {
            rows: workbook.config().global.max_repeated_rows,
            columns: workbook.config().global.max_repeated_columns,
        };
        let spreadsheet = self
            .content
            .child("office:body")
            .and_then(|body| body.child("office:spreadsheet"))
            .context("content.xml has no office:spreadsheet body")?;

        for (position, table) in spreadsheet.children_named("table:table").enumerate() {
            let requested = table
                .attr("table:name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Sheet{}", position + 1));
            let name = unique_sheet_name(workbook, &requested, diagnostics);
            let sheet = workbook.create_worksheet(&name)?;
            self.read_table(sheet, table, limits, diagnostics);
        }

        if let Some(active) = self.read_active_table() {
            if workbook.worksheet(&active).is_some() {
                workbook.set_active(&active)?;
            }
        }
        check_style_references(workbook, diagnostics);
        Ok(())
    }
}

/// Columns and rows in document order, looking through header and group wrappers
fn collect_table_items<'e>(element: &'e Element, out: &mut Vec<&'e Element>) {
    for child in element.elements() {
        match child.name.as_str() {
            "table:table-column" | "table:table-row" => out.push(child),
            "table:table-columns"
            | "table:table-header-columns"
            | "table:table-column-group"
            | "table:table-rows"
            | "table:table-header-rows"
            | "table:table-row-group" => collect_table_items(child, out),
            _ => {}
        }
    }
}

fn is_collapsed(element: &Element) -> bool {
    matches!(element.attr("table:visibility"), Some("collapse" | "filter"))
}

fn cell_has_content(cell: &Element) -> bool {
    cell.attr("office:value-type").is_some()
        || cell.attr("table:formula").is_some()
        || cell.child("text:p").is_some()
}

fn find_config_item(element: &Element, name: &str) -> Option<String> {
    if element.name == "config:config-item" && element.attr("config:name") == Some(name) {
        return Some(element.text());
    }
    element.elements().find_map(|child| find_config_item(child, name))
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn length_points(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| parse_length_cm(v).ok())
        .map(|cm| round_to(cm_to_points(cm), 2))
}

fn read_row_format(element: &Element) -> RowFormat {
    let Some(props) = element.child("style:table-row-properties") else {
        return RowFormat::default();
    };
    RowFormat {
        height: length_points(props.attr("style:row-height")),
        optimal: props.attr("style:use-optimal-row-height") == Some("true"),
        page_break: props.attr("fo:break-before") == Some("page"),
    }
}

fn read_column_format(element: &Element) -> ColumnFormat {
    let Some(props) = element.child("style:table-column-properties") else {
        return ColumnFormat::default();
    };
    ColumnFormat {
        width: length_points(props.attr("style:column-width")),
        page_break: props.attr("fo:break-before") == Some("page"),
    }
}

fn read_table_format(element: &Element) -> TableFormat {
    TableFormat {
        master_page: element.attr("style:master-page-name").map(str::to_string),
        hidden: element
            .child("style:table-properties")
            .and_then(|props| props.attr("table:display"))
            == Some("false"),
    }
}

fn read_page_layout(element: &Element, name: &str, diagnostics: &mut Diagnostics) -> WorksheetOptions {
    let mut options = WorksheetOptions::default();
    let Some(props) = element.child("style:page-layout-properties") else {
        return options;
    };
    let length = |key: &str| props.attr(key).and_then(|v| parse_length_cm(v).ok());
    let width = length("fo:page-width");
    let height = length("fo:page-height");

    let setup = &mut options.page_setup;
    setup.orientation = props
        .attr("style:print-orientation")
        .and_then(Orientation::parse)
        .unwrap_or(match (width, height) {
            (Some(w), Some(h)) if w > h => Orientation::Landscape,
            _ => Orientation::Portrait,
        });
    let inches = |cm: f64| round_to(cm_to_inches(cm), 4);
    if let Some(top) = length("fo:margin-top") {
        setup.margins.top = inches(top);
    }
    if let Some(bottom) = length("fo:margin-bottom") {
        setup.margins.bottom = inches(bottom);
    }
    if let Some(left) = length("fo:margin-left") {
        setup.margins.left = inches(left);
    }
    if let Some(right) = length("fo:margin-right") {
        setup.margins.right = inches(right);
    }
    match props.attr("style:table-centering") {
        Some("horizontal") => setup.center_horizontal = true,
        Some("vertical") => setup.center_vertical = true,
        Some("both") => {
            setup.center_horizontal = true;
            setup.center_vertical = true;
        }
        _ => {}
    }

    if let (Some(w), Some(h)) = (width, height) {
        match detect_paper(w, h) {
            Ok(paper) => options.print.paper_size_index = Some(paper.excel_index()),
            Err(e) => diagnostics.warn(
                DiagnosticKind::FormatConversion,
                DiagnosticScope::Book,
                format!("page layout '{}': {}; A4 is used", name, e),
            ),
        }
    }

    options.print.scale = props
        .attr("style:scale-to")
        .and_then(|v| v.trim_end_matches('%').parse::<f64>().ok())
        .map(|scale| scale.round() as u32);
    let fit_width = props.attr("style:scale-to-X").and_then(|v| v.parse().ok());
    let fit_height = props.attr("style:scale-to-Y").and_then(|v| v.parse().ok());
    if fit_width.is_some() || fit_height.is_some() {
        options.fit_to_page = true;
        options.print.fit_width = fit_width;
        options.print.fit_height = fit_height;
    }
    options.print.gridlines = props
        .attr("style:print")
        .is_some_and(|print| print.split_whitespace().any(|part| part == "grid"));
    options
}

fn read_data_style(element: &Element) -> Result<String, ConversionError> {
    let unsupported = || ConversionError::NumberFormat(element.name.clone());
    match element.name.as_str() {
        "number:number-style" | "number:percentage-style" | "number:currency-style" => {
            if element.child("number:scientific-number").is_some()
                || element.child("number:fraction").is_some()
            {
                return Err(unsupported());
            }
            let number = element.child("number:number").ok_or_else(unsupported)?;
            let parsed = |key: &str, default: u32| {
                number.attr(key).and_then(|v| v.parse().ok()).unwrap_or(default)
            };
            let parts = NumberParts {
                decimal_places: parsed("number:decimal-places", 0),
                min_integer_digits: parsed("number:min-integer-digits", 1),
                grouping: number.attr("number:grouping") == Some("true"),
                percent: element.name == "number:percentage-style",
            };
            Ok(compose_number(&parts))
        }
        "number:date-style" | "number:time-style" => {
            let tokens: Vec<DateToken> = element.elements().filter_map(date_token).collect();
            if tokens.iter().all(|t| matches!(t, DateToken::Text(_))) {
                return Err(unsupported());
            }
            Ok(compose_date(&tokens))
        }
        "number:text-style" => Ok("@".to_string()),
        _ => Err(unsupported()),
    }
}

fn date_token(element: &Element) -> Option<DateToken> {
    let long = element.attr("number:style") == Some("long");
    let token = match element.name.as_str() {
        "number:day" => DateToken::Day { long },
        "number:day-of-week" => DateToken::DayOfWeek { long },
        "number:month" => DateToken::Month {
            long,
            textual: element.attr("number:textual") == Some("true"),
        },
        "number:year" => DateToken::Year { long },
        "number:hours" => DateToken::Hours { long },
        "number:minutes" => DateToken::Minutes { long },
        "number:seconds" => DateToken::Seconds { long },
        "number:am-pm" => DateToken::AmPm,
        "number:text" => DateToken::Text(element.text()),
        _ => return None,
    };
    Some(token)
}

fn read_cell_spec(element: &Element, name: &str, diagnostics: &mut Diagnostics) -> StyleSpec {
    let mut spec = StyleSpec::default();
    let mut alignment = Alignment::default();

    if let Some(props) = element.child("style:table-cell-properties") {
        if let Some(color) = props.attr("fo:background-color").and_then(Color::parse) {
            spec.interior = Some(Interior::solid(color));
        }
        let borders = read_borders(props, name, diagnostics);
        if !borders.is_empty() {
            spec.borders = Some(borders);
        }
        alignment.wrap_text = props.attr("fo:wrap-option") == Some("wrap");
        alignment.shrink_to_fit = props.attr("style:shrink-to-fit") == Some("true");
        alignment.vertical = match props.attr("style:vertical-align") {
            Some("top") => Some(VerticalAlignment::Top),
            Some("middle") => Some(VerticalAlignment::Center),
            Some("bottom") => Some(VerticalAlignment::Bottom),
            _ => None,
        };
        if let Some(angle) = props.attr("style:rotation-angle").and_then(parse_angle) {
            alignment.rotate = angle;
        }
    }

    if let Some(props) = element.child("style:paragraph-properties") {
        alignment.horizontal = match props.attr("fo:text-align") {
            Some("start" | "left") => Some(HorizontalAlignment::Left),
            Some("center") => Some(HorizontalAlignment::Center),
            Some("end" | "right") => Some(HorizontalAlignment::Right),
            Some("justify") => Some(HorizontalAlignment::Justify),
            _ => None,
        };
    }
    if !alignment.is_empty() {
        spec.alignment = Some(alignment);
    }

    if let Some(props) = element.child("style:text-properties") {
        let font = read_font(props);
        if !font.is_empty() {
            spec.font = Some(font);
        }
    }
    spec
}

/// Rotation in degrees folded into -90..=90
fn parse_angle(value: &str) -> Option<i32> {
    let degrees: f64 = value.trim().trim_end_matches("deg").parse().ok()?;
    let mut angle = degrees.round() as i32 % 360;
    if angle < 0 {
        angle += 360;
    }
    if angle > 180 {
        angle -= 360;
    }
    Some(angle.clamp(-90, 90))
}

fn read_borders(props: &Element, name: &str, diagnostics: &mut Diagnostics) -> Borders {
    let all = props.attr("fo:border");
    let mut borders = Borders::new();
    for (position, key) in [
        (BorderPosition::Left, "fo:border-left"),
        (BorderPosition::Top, "fo:border-top"),
        (BorderPosition::Right, "fo:border-right"),
        (BorderPosition::Bottom, "fo:border-bottom"),
    ] {
        let Some(value) = props.attr(key).or(all) else {
            continue;
        };
        match parse_border(value) {
            Ok(Some(line)) => borders.set(line.at(position)),
            Ok(None) => {}
            Err(e) => {
                diagnostics.warn(
                    DiagnosticKind::FormatConversion,
                    DiagnosticScope::Book,
                    format!("style '{}': {}; a thin black line is used", name, e),
                );
                borders.set(BorderLine::fallback().at(position));
            }
        }
    }
    borders
}

fn read_font(props: &Element) -> Font {
    let bold = match props.attr("fo:font-weight") {
        Some("bold") => true,
        Some(weight) => weight.parse::<u32>().is_ok_and(|w| w >= 600),
        None => false,
    };
    let underline = match props.attr("style:text-underline-style") {
        None | Some("none") => None,
        Some(_) if props.attr("style:text-underline-type") == Some("double") => {
            Some(Underline::Double)
        }
        Some(_) => Some(Underline::Single),
    };
    Font {
        name: props
            .attr("style:font-name")
            .or(props.attr("fo:font-family"))
            .map(|name| name.trim_matches(['\'', '"']).to_string()),
        size: props.attr("fo:font-size").and_then(FontSize::parse),
        bold,
        italic: matches!(props.attr("fo:font-style"), Some("italic" | "oblique")),
        underline,
        strike_through: props
            .attr("style:text-line-through-style")
            .is_some_and(|style| style != "none"),
        color: props.attr("fo:color").and_then(Color::parse),
        ..Font::default()
    }
}

/// Fold a style's parent chain (stopping at `Default`) and attach its number format
fn resolve_cell_style(
    name: &str,
    lookup: &HashMap<&str, &CellStyleEntry>,
    data_formats: &HashMap<String, Result<String, ConversionError>>,
    diagnostics: &mut Diagnostics,
) -> StyleSpec {
    let mut chain: Vec<&CellStyleEntry> = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(name);
    while let Some(style) = current {
        if !seen.insert(style) {
            break;
        }
        let Some(entry) = lookup.get(style) else {
            break;
        };
        chain.push(entry);
        current = entry
            .parent
            .as_deref()
            .filter(|parent| *parent != StyleId::DEFAULT || name == StyleId::DEFAULT);
    }

    let mut spec = chain
        .iter()
        .rev()
        .fold(StyleSpec::default(), |spec, entry| spec.merged(&entry.spec));
    if let Some(data_style) = chain.iter().find_map(|entry| entry.data_style.as_deref()) {
        match data_formats.get(data_style) {
            Some(Ok(format)) => spec.number_format = Some(NumberFormat::new(format.as_str())),
            Some(Err(e)) => diagnostics.warn(
                DiagnosticKind::FormatConversion,
                DiagnosticScope::Book,
                format!("style '{}': {}; General is used", name, e),
            ),
            None => diagnostics.warn(
                DiagnosticKind::StyleNotFound,
                DiagnosticScope::Book,
                format!("data style '{}' used by '{}' is not defined", data_style, name),
            ),
        }
    }
    spec
}

/// Paragraph text joined with newlines, the first hyperlink target, and whether a
/// space run had to be clamped
fn cell_text(cell: &Element) -> (String, Option<String>, bool) {
    let mut href = None;
    let mut clamped = false;
    let paragraphs: Vec<String> = cell
        .children_named("text:p")
        .map(|paragraph| {
            let mut out = String::new();
            inline_text(paragraph, &mut out, &mut href, &mut clamped);
            out
        })
        .collect();
    (paragraphs.join("\n"), href, clamped)
}

fn inline_text(
    element: &Element,
    out: &mut String,
    href: &mut Option<String>,
    clamped: &mut bool,
) {
    for content in &element.content {
        match content {
            Content::Text(text) => out.push_str(text),
            Content::Element(child) => match child.name.as_str() {
                "text:s" => {
                    let wanted = child.count_attr("text:c") as usize;
                    let room = MAX_CELL_TEXT.saturating_sub(out.len());
                    if wanted > room {
                        *clamped = true;
                    }
                    out.push_str(&" ".repeat(wanted.min(room)));
                }
                "text:tab" => out.push('\t'),
                "text:line-break" => out.push('\n'),
                "text:a" => {
                    if href.is_none() {
                        *href = child.attr("xlink:href").map(str::to_string);
                    }
                    inline_text(child, out, href, clamped);
                }
                "office:annotation" => {}
                _ => inline_text(child, out, href, clamped),
            },
        }
    }
}

/// `PT10H30M05S` (optionally with days and fractional seconds) as whole h/m/s.
/// Durations too large to count in seconds give `None`.
fn parse_duration(value: &str) -> Option<(u64, u64, u64)> {
    let pattern = DURATION.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?$").unwrap()
    });
    let caps = pattern.captures(value.trim())?;
    let int = |i: usize| match caps.get(i) {
        Some(m) => m.as_str().parse::<u64>().ok(),
        None => Some(0),
    };
    let seconds = match caps.get(4) {
        Some(m) => {
            let seconds = m.as_str().parse::<f64>().ok()?;
            if seconds >= u64::MAX as f64 {
                return None;
            }
            seconds.floor() as u64
        }
        None => 0,
    };
    let total = int(1)?
        .checked_mul(24)?
        .checked_add(int(2)?)?
        .checked_mul(60)?
        .checked_add(int(3)?)?
        .checked_mul(60)?
        .checked_add(seconds)?;
    Some((total / 3600, total / 60 % 60, total % 60))
}

fn read_value(
    element: &Element,
    text: String,
    scope: &DiagnosticScope,
    diagnostics: &mut Diagnostics,
) -> Option<Data> {
    if element.attr("calcext:value-type") == Some("error") {
        return Some(Data::new(text, DataType::Error));
    }
    let attr = |key: &str| element.attr(key).map(str::to_string);
    let data = match element.attr("office:value-type") {
        None | Some("void") => return (!text.is_empty()).then(|| Data::new(text, DataType::String)),
        Some("float" | "currency") => {
            Data::new(attr("office:value").unwrap_or(text), DataType::Number)
        }
        Some("percentage") => Data::new(attr("office:value").unwrap_or(text), DataType::Percentage),
        Some("date") => {
            let mut value = attr("office:date-value").unwrap_or(text);
            if !value.contains('T') {
                value.push_str("T00:00:00");
            }
            Data::new(value, DataType::DateTime)
        }
        Some("time") => match element.attr("office:time-value").and_then(parse_duration) {
            Some((h, m, s)) => Data::new(
                format!("{}T{:02}:{:02}:{:02}", TIME_EPOCH, h, m, s),
                DataType::DateTime,
            ),
            None => {
                diagnostics.warn(
                    DiagnosticKind::FormatConversion,
                    scope.clone(),
                    "unparseable time value read as text",
                );
                Data::new(text, DataType::String)
            }
        },
        Some("boolean") => {
            let truth = match element.attr("office:boolean-value") {
                Some(value) => value == "true",
                None => text.eq_ignore_ascii_case("true"),
            };
            Data::new(if truth { "1" } else { "0" }, DataType::Boolean)
        }
        Some("string") => Data::new(attr("office:string-value").unwrap_or(text), DataType::String),
        Some(other) => {
            diagnostics.warn(
                DiagnosticKind::FormatConversion,
                scope.clone(),
                format!("unknown value type '{}' read as String", other),
            );
            Data::new(text, DataType::String)
        }
    };
    Some(data)
}

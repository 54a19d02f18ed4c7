//! Workbook to OpenDocument spreadsheet package
//!
//! Registry styles become automatic cell styles named by their ID with `Default` as
//! parent; `Default` itself is the common style in `styles.xml`. Row, column and table
//! styles are generated while the body is written and deduplicated by content.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::io::{Cursor, Write};
use tracing::{debug, trace};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::WorkbookWriter;
use super::xml_writer::{Attrs, XmlSink};
use crate::address::CellPos;
use crate::diagnostic::{DiagnosticKind, DiagnosticScope, Diagnostics};
use crate::format::TIME_EPOCH;
use crate::format::border::{BorderLine, format_border};
use crate::format::formula::a1_to_ods;
use crate::format::number_format::{DateToken, NumberPattern, decompose};
use crate::format::page::{format_cm, inches_to_cm, page_dimensions, points_to_cm};
use crate::model::{
    BorderPosition, Cell, Data, DataType, HorizontalAlignment, LineStyle, MergeRegion, Pattern,
    PaperSize, Row, StyleId, StyleSpec, Underline, VerticalAlignment, Workbook, Worksheet,
    WorksheetOptions,
};

const MIMETYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
const ODF_VERSION: &str = "1.2";
const DEFAULT_LAYOUT: &str = "pm0";
const DEFAULT_DATA_STYLE: &str = "N0";

const NAMESPACES: &[(&str, &str)] = &[
    ("xmlns:office", "urn:oasis:names:tc:opendocument:xmlns:office:1.0"),
    ("xmlns:style", "urn:oasis:names:tc:opendocument:xmlns:style:1.0"),
    ("xmlns:text", "urn:oasis:names:tc:opendocument:xmlns:text:1.0"),
    ("xmlns:table", "urn:oasis:names:tc:opendocument:xmlns:table:1.0"),
    ("xmlns:number", "urn:oasis:names:tc:opendocument:xmlns:datastyle:1.0"),
    ("xmlns:fo", "urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0"),
    ("xmlns:xlink", "http://www.w3.org/1999/xlink"),
    ("xmlns:meta", "urn:oasis:names:tc:opendocument:xmlns:meta:1.0"),
    ("xmlns:of", "urn:oasis:names:tc:opendocument:xmlns:of:1.2"),
    ("xmlns:calcext", "urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0"),
];
const CONFIG_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:config:1.0";
const MANIFEST_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:manifest:1.0";

/// Column style content; widths are compared by bit pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ColumnFormat {
    width: Option<u64>,
    page_break: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RowFormat {
    height: Option<u64>,
    optimal: bool,
    page_break: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableFormat {
    master_page: Option<String>,
    display: bool,
}

/// Automatic styles named `{prefix}{n}` in first-use order
#[derive(Debug)]
struct AutoStyles<K> {
    prefix: &'static str,
    keys: Vec<K>,
    names: HashMap<K, String>,
}

impl<K: Clone + Eq + Hash> AutoStyles<K> {
    fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            keys: Vec::new(),
            names: HashMap::new(),
        }
    }

    fn name(&mut self, key: K) -> String {
        if let Some(name) = self.names.get(&key) {
            return name.clone();
        }
        let name = format!("{}{}", self.prefix, self.keys.len() + 1);
        self.keys.push(key.clone());
        self.names.insert(key, name.clone());
        name
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &K)> {
        self.keys.iter().map(|key| (self.names[key].as_str(), key))
    }
}

#[derive(Debug)]
struct CellStyle {
    name: String,
    spec: StyleSpec,
    data_style: Option<String>,
}

#[derive(Debug)]
struct PageLayout {
    layout: String,
    master: String,
    options: WorksheetOptions,
}

/// One position of a row that holds no stored cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gap {
    Empty,
    Covered,
}

/// ODS package writer for one workbook
pub struct OdsWriter<'w> {
    workbook: &'w Workbook,
    default_style: Option<CellStyle>,
    default_data: Option<NumberPattern>,
    cell_styles: Vec<CellStyle>,
    data_styles: AutoStyles<NumberPattern>,
    columns: AutoStyles<ColumnFormat>,
    rows: AutoStyles<RowFormat>,
    tables: AutoStyles<TableFormat>,
    layouts: Vec<PageLayout>,
    sheet_masters: Vec<Option<String>>,
    missing_styles: HashSet<StyleId>,
    styles_xml: Vec<u8>,
    content_xml: Vec<u8>,
}

impl<'w> OdsWriter<'w> {
    pub fn new(workbook: &'w Workbook) -> Self {
        Self {
            workbook,
            default_style: None,
            default_data: None,
            cell_styles: Vec::new(),
            data_styles: AutoStyles::new("N"),
            columns: AutoStyles::new("co"),
            rows: AutoStyles::new("ro"),
            tables: AutoStyles::new("ta"),
            layouts: Vec::new(),
            sheet_masters: Vec::new(),
            missing_styles: HashSet::new(),
            styles_xml: Vec::new(),
            content_xml: Vec::new(),
        }
    }

    fn plan_styles(&mut self, diagnostics: &mut Diagnostics) {
        let workbook = self.workbook;
        let registry = workbook.styles();
        for style in registry.iter() {
            let spec = registry.effective_spec(Some(&style.id));
            note_lossy_style(style.id.as_str(), &spec, diagnostics);
            let pattern = spec.number_format.as_ref().and_then(|format| {
                decompose(format).unwrap_or_else(|e| {
                    diagnostics.warn(
                        DiagnosticKind::FormatConversion,
                        DiagnosticScope::Book,
                        format!("style '{}': {}; written as General", style.id, e),
                    );
                    None
                })
            });

            if style.id.is_default() {
                let data_style = pattern.as_ref().map(|_| DEFAULT_DATA_STYLE.to_string());
                self.default_data = pattern;
                self.default_style = Some(CellStyle {
                    name: StyleId::DEFAULT.to_string(),
                    spec,
                    data_style,
                });
            } else {
                let data_style = pattern.map(|pattern| self.data_styles.name(pattern));
                self.cell_styles.push(CellStyle {
                    name: style.id.to_string(),
                    spec,
                    data_style,
                });
            }
        }

        for sheet in workbook.worksheets() {
            let Some(options) = &sheet.options else {
                self.sheet_masters.push(None);
                continue;
            };
            if let Some(index) = options.print.paper_size_index {
                if PaperSize::from_excel_index(index).is_none() {
                    diagnostics.warn(
                        DiagnosticKind::FormatConversion,
                        DiagnosticScope::Sheet(sheet.name().to_string()),
                        format!("paper size index {} written as A4", index),
                    );
                }
            }
            let n = self.layouts.len() + 1;
            let layout = PageLayout {
                layout: format!("pm{}", n),
                master: format!("mp{}", n),
                options: options.clone(),
            };
            self.sheet_masters.push(Some(layout.master.clone()));
            self.layouts.push(layout);
        }
        debug!(
            cell_styles = self.cell_styles.len(),
            data_styles = self.data_styles.keys.len(),
            page_layouts = self.layouts.len(),
            "planned ODS styles"
        );
    }

    fn render_styles(&self) -> Result<Vec<u8>> {
        let mut xml = XmlSink::new(Vec::new());
        xml.declaration()?;
        xml.open("office:document-styles", &root_attrs())?;

        xml.open("office:styles", &Attrs::new())?;
        if let Some(pattern) = &self.default_data {
            write_data_style(&mut xml, DEFAULT_DATA_STYLE, pattern)?;
        }
        if let Some(style) = &self.default_style {
            write_cell_style(&mut xml, style, false)?;
        }
        xml.close("office:styles")?;

        xml.open("office:automatic-styles", &Attrs::new())?;
        write_page_layout(&mut xml, DEFAULT_LAYOUT, &WorksheetOptions::default())?;
        for layout in &self.layouts {
            write_page_layout(&mut xml, &layout.layout, &layout.options)?;
        }
        xml.close("office:automatic-styles")?;

        xml.open("office:master-styles", &Attrs::new())?;
        xml.empty(
            "style:master-page",
            &Attrs::new()
                .set("style:name", StyleId::DEFAULT)
                .set("style:page-layout-name", DEFAULT_LAYOUT),
        )?;
        for layout in &self.layouts {
            xml.empty(
                "style:master-page",
                &Attrs::new()
                    .set("style:name", &layout.master)
                    .set("style:page-layout-name", &layout.layout),
            )?;
        }
        xml.close("office:master-styles")?;

        xml.close("office:document-styles")?;
        Ok(xml.into_inner())
    }

    fn render_content(&mut self, diagnostics: &mut Diagnostics) -> Result<Vec<u8>> {
        // The body decides which row, column and table styles exist
        let mut body = XmlSink::new(Vec::new());
        let workbook = self.workbook;
        for (index, sheet) in workbook.worksheets().iter().enumerate() {
            self.write_table(&mut body, index, sheet, diagnostics)?;
        }
        let body = body.into_inner();

        let mut xml = XmlSink::new(Vec::new());
        xml.declaration()?;
        xml.open("office:document-content", &root_attrs())?;
        xml.open("office:automatic-styles", &Attrs::new())?;
        for (name, format) in self.columns.iter() {
            let props = Attrs::new()
                .set_opt("style:column-width", format.width.map(|w| length(f64::from_bits(w))))
                .set("fo:break-before", if format.page_break { "page" } else { "auto" });
            write_family_style(&mut xml, name, "table-column", Attrs::new(), "style:table-column-properties", props)?;
        }
        for (name, format) in self.rows.iter() {
            let props = Attrs::new()
                .set_opt("style:row-height", format.height.map(|h| length(f64::from_bits(h))))
                .set("fo:break-before", if format.page_break { "page" } else { "auto" })
                .set("style:use-optimal-row-height", format.optimal);
            write_family_style(&mut xml, name, "table-row", Attrs::new(), "style:table-row-properties", props)?;
        }
        for (name, format) in self.tables.iter() {
            let attrs = Attrs::new().set_opt("style:master-page-name", format.master_page.as_deref());
            let props = Attrs::new()
                .set("table:display", format.display)
                .set("style:writing-mode", "lr-tb");
            write_family_style(&mut xml, name, "table", attrs, "style:table-properties", props)?;
        }
        for (name, pattern) in self.data_styles.iter() {
            write_data_style(&mut xml, name, pattern)?;
        }
        for style in &self.cell_styles {
            write_cell_style(&mut xml, style, true)?;
        }
        xml.close("office:automatic-styles")?;

        xml.open("office:body", &Attrs::new())?;
        xml.open("office:spreadsheet", &Attrs::new())?;
        xml.raw(&body)?;
        xml.close("office:spreadsheet")?;
        xml.close("office:body")?;
        xml.close("office:document-content")?;
        Ok(xml.into_inner())
    }

    fn write_table(
        &mut self,
        xml: &mut XmlSink<Vec<u8>>,
        index: usize,
        sheet: &Worksheet,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        trace!(sheet = sheet.name(), "writing ODS table");
        let style = self.tables.name(TableFormat {
            master_page: self.sheet_masters.get(index).cloned().flatten(),
            display: !sheet.hidden,
        });
        let mut attrs = Attrs::new()
            .set("table:name", sheet.name())
            .set("table:style-name", style);
        if sheet.protected {
            attrs.push("table:protected", true);
        }
        xml.open("table:table", &attrs)?;
        self.write_columns(xml, sheet, diagnostics)?;
        self.write_rows(xml, sheet, diagnostics)?;
        xml.close("table:table")
    }

    fn write_columns(
        &mut self,
        xml: &mut XmlSink<Vec<u8>>,
        sheet: &Worksheet,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let table = &sheet.table;
        let breaks = sheet.page_breaks.as_ref();
        let (_, last_col) = table.dimensions();
        let last_col = breaks
            .and_then(|b| b.column_breaks().iter().max().copied())
            .unwrap_or(0)
            .max(last_col)
            .max(1);

        let mut entries = Vec::new();
        for col in 1..=last_col {
            let column = table.column(col);
            let page_break = breaks.is_some_and(|b| b.column_breaks().contains(&col));
            let width = column.and_then(|c| c.width);
            let style = (width.is_some() || page_break).then(|| {
                self.columns.name(ColumnFormat {
                    width: width.map(f64::to_bits),
                    page_break,
                })
            });
            let hidden = column.is_some_and(|c| c.hidden);
            let cell_style = self.style_name(column.and_then(|c| c.style_id.as_ref()), diagnostics);
            entries.push((style, hidden, cell_style));
        }

        for ((style, hidden, cell_style), count) in runs(entries) {
            let mut attrs = Attrs::new().set_opt("table:style-name", style);
            if count > 1 {
                attrs.push("table:number-columns-repeated", count);
            }
            if hidden {
                attrs.push("table:visibility", "collapse");
            }
            attrs.push(
                "table:default-cell-style-name",
                cell_style.as_deref().unwrap_or(StyleId::DEFAULT),
            );
            xml.empty("table:table-column", &attrs)?;
        }
        Ok(())
    }

    fn write_rows(
        &mut self,
        xml: &mut XmlSink<Vec<u8>>,
        sheet: &Worksheet,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let table = &sheet.table;
        let breaks = sheet.page_breaks.as_ref();
        let (last_row, last_col) = table.dimensions();
        let last_row = breaks
            .and_then(|b| b.row_breaks().iter().max().copied())
            .unwrap_or(0)
            .max(last_row);

        let rows: HashMap<u32, &Row> = table.rows_with_index().collect();
        let mut covered: HashMap<u32, Vec<MergeRegion>> = HashMap::new();
        for region in table.merge_regions() {
            for row in region.row..=region.last_row() {
                covered.entry(row).or_default().push(*region);
            }
        }

        let mut blank = 0u32;
        for index in 1..=last_row {
            let row = rows.get(&index).copied();
            let regions = covered.get(&index).map(Vec::as_slice).unwrap_or_default();
            let page_break = breaks.is_some_and(|b| b.row_breaks().contains(&index));
            if row.is_none() && regions.is_empty() && !page_break {
                blank += 1;
                continue;
            }
            write_blank_rows(xml, blank, last_col)?;
            blank = 0;
            self.write_row(xml, sheet, index, row, regions, page_break, diagnostics)?;
        }
        write_blank_rows(xml, blank, last_col)?;

        if last_row == 0 {
            xml.open("table:table-row", &Attrs::new())?;
            xml.empty("table:table-cell", &Attrs::new())?;
            xml.close("table:table-row")?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_row(
        &mut self,
        xml: &mut XmlSink<Vec<u8>>,
        sheet: &Worksheet,
        index: u32,
        row: Option<&Row>,
        regions: &[MergeRegion],
        page_break: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let format = RowFormat {
            height: row
                .filter(|r| !r.auto_fit_height)
                .and_then(|r| r.height)
                .map(f64::to_bits),
            optimal: row.is_some_and(|r| r.auto_fit_height),
            page_break,
        };
        let mut attrs = Attrs::new();
        if format.height.is_some() || format.optimal || format.page_break {
            attrs.push("table:style-name", self.rows.name(format));
        }
        if row.is_some_and(|r| r.hidden) {
            attrs.push("table:visibility", "collapse");
        }
        if let Some(style) = self.style_name(row.and_then(|r| r.style_id.as_ref()), diagnostics) {
            attrs.push("table:default-cell-style-name", style);
        }
        xml.open("table:table-row", &attrs)?;

        let cells: HashMap<u32, &Cell> = row
            .map(|r| r.cells_with_columns().collect())
            .unwrap_or_default();
        let end = regions
            .iter()
            .map(MergeRegion::last_col)
            .chain(row.map(Row::last_column))
            .max()
            .unwrap_or(0);

        let mut pending: Option<(Gap, u32)> = None;
        for col in 1..=end {
            if let Some(cell) = cells.get(&col) {
                if let Some(run) = pending.take() {
                    write_gap(xml, run)?;
                }
                self.write_cell(xml, sheet.name(), CellPos::new(index, col), cell, diagnostics)?;
                continue;
            }
            let gap = if regions.iter().any(|r| r.contains(index, col) && !r.is_anchor(index, col)) {
                Gap::Covered
            } else {
                Gap::Empty
            };
            pending = match pending.take() {
                Some((kind, count)) if kind == gap => Some((kind, count + 1)),
                other => {
                    if let Some(run) = other {
                        write_gap(xml, run)?;
                    }
                    Some((gap, 1))
                }
            };
        }
        match pending {
            Some(run) => write_gap(xml, run)?,
            None if end == 0 => xml.empty("table:table-cell", &Attrs::new())?,
            None => {}
        }
        xml.close("table:table-row")
    }

    fn write_cell(
        &mut self,
        xml: &mut XmlSink<Vec<u8>>,
        sheet: &str,
        position: CellPos,
        cell: &Cell,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let mut attrs = Attrs::new();
        if let Some(style) = self.style_name(cell.style_id(), diagnostics) {
            attrs.push("table:style-name", style);
        }
        if cell.merge_across() > 0 {
            attrs.push("table:number-columns-spanned", cell.merge_across() + 1);
        }
        if cell.merge_down() > 0 {
            attrs.push("table:number-rows-spanned", cell.merge_down() + 1);
        }
        if let Some(formula) = cell.formula_a1() {
            attrs.push("table:formula", a1_to_ods(&formula));
        }

        let text = match cell.data() {
            Some(data) => {
                let data_type = cell
                    .infer_data_type(self.workbook.styles())
                    .map(|inference| inference.data_type)
                    .unwrap_or(data.data_type);
                let scope = DiagnosticScope::Cell(sheet.to_string(), position);
                Some(value_attrs(&mut attrs, data, data_type, &scope, diagnostics))
            }
            None => None,
        };

        if text.is_none() && cell.href().is_none() {
            return xml.empty("table:table-cell", &attrs);
        }
        xml.open("table:table-cell", &attrs)?;
        write_paragraphs(xml, text.as_deref().unwrap_or_default(), cell.href())?;
        xml.close("table:table-cell")
    }

    /// Name of the automatic style for a registry reference; `Default` and dangling
    /// references are written without one.
    fn style_name(&mut self, id: Option<&StyleId>, diagnostics: &mut Diagnostics) -> Option<String> {
        let id = id.filter(|id| !id.is_default())?;
        if self.workbook.styles().contains(id) {
            return Some(id.to_string());
        }
        if self.missing_styles.insert(id.clone()) {
            diagnostics.warn(
                DiagnosticKind::StyleNotFound,
                DiagnosticScope::Book,
                format!("style '{}' is not defined; Default is used", id),
            );
        }
        None
    }

    fn render_settings(&self) -> Result<Option<Vec<u8>>> {
        let Some(active) = self.workbook.active_worksheet() else {
            return Ok(None);
        };
        let mut xml = XmlSink::new(Vec::new());
        xml.declaration()?;
        xml.open(
            "office:document-settings",
            &Attrs::new()
                .set("xmlns:office", NAMESPACES[0].1)
                .set("xmlns:config", CONFIG_NS)
                .set("office:version", ODF_VERSION),
        )?;
        xml.open("office:settings", &Attrs::new())?;
        xml.open(
            "config:config-item-set",
            &Attrs::new().set("config:name", "ooo:view-settings"),
        )?;
        xml.open(
            "config:config-item-map-indexed",
            &Attrs::new().set("config:name", "Views"),
        )?;
        xml.open("config:config-item-map-entry", &Attrs::new())?;
        let item = |name: &str| {
            Attrs::new()
                .set("config:name", name)
                .set("config:type", "string")
        };
        xml.leaf("config:config-item", &item("ViewId"), "view1")?;
        xml.leaf("config:config-item", &item("ActiveTable"), active.name())?;
        xml.close("config:config-item-map-entry")?;
        xml.close("config:config-item-map-indexed")?;
        xml.close("config:config-item-set")?;
        xml.close("office:settings")?;
        xml.close("office:document-settings")?;
        Ok(Some(xml.into_inner()))
    }

    fn render_meta(&self) -> Result<Vec<u8>> {
        let cells: usize = self
            .workbook
            .worksheets()
            .iter()
            .map(|sheet| sheet.table.cells().count())
            .sum();
        let mut xml = XmlSink::new(Vec::new());
        xml.declaration()?;
        xml.open(
            "office:document-meta",
            &Attrs::new()
                .set("xmlns:office", NAMESPACES[0].1)
                .set("xmlns:meta", NAMESPACES[7].1)
                .set("office:version", ODF_VERSION),
        )?;
        xml.open("office:meta", &Attrs::new())?;
        xml.leaf(
            "meta:generator",
            &Attrs::new(),
            &format!("sheetbook/{}", env!("CARGO_PKG_VERSION")),
        )?;
        xml.empty(
            "meta:document-statistic",
            &Attrs::new()
                .set("meta:table-count", self.workbook.worksheets().len())
                .set("meta:cell-count", cells),
        )?;
        xml.close("office:meta")?;
        xml.close("office:document-meta")?;
        Ok(xml.into_inner())
    }
}

impl WorkbookWriter for OdsWriter<'_> {
    fn emit_styles(&mut self, diagnostics: &mut Diagnostics) -> Result<()> {
        self.plan_styles(diagnostics);
        self.styles_xml = self.render_styles()?;
        Ok(())
    }

    fn emit_worksheets(&mut self, diagnostics: &mut Diagnostics) -> Result<()> {
        self.content_xml = self.render_content(diagnostics)?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let settings = self.render_settings()?;
        let meta = self.render_meta()?;

        let mut parts: Vec<(&str, &[u8])> = vec![
            ("content.xml", self.content_xml.as_slice()),
            ("styles.xml", self.styles_xml.as_slice()),
            ("meta.xml", meta.as_slice()),
        ];
        if let Some(settings) = &settings {
            parts.push(("settings.xml", settings.as_slice()));
        }
        let manifest = render_manifest(parts.iter().map(|(name, _)| *name))?;
        parts.push(("META-INF/manifest.xml", manifest.as_slice()));

        let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
        // mimetype must be the first entry and uncompressed
        zip_writer.start_file(
            "mimetype",
            FileOptions::<()>::default().compression_method(CompressionMethod::Stored),
        )?;
        zip_writer.write_all(MIMETYPE.as_bytes())?;
        for (name, bytes) in parts {
            zip_writer.start_file(
                name,
                FileOptions::<()>::default().compression_method(CompressionMethod::Deflated),
            )?;
            zip_writer.write_all(bytes)?;
        }
        Ok(zip_writer.finish()?.into_inner())
    }
}

fn root_attrs() -> Attrs {
    let mut attrs = Attrs::new();
    for (key, uri) in NAMESPACES {
        attrs.push(key, uri);
    }
    attrs.push("office:version", ODF_VERSION);
    attrs
}

fn render_manifest<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<u8>> {
    let mut xml = XmlSink::new(Vec::new());
    xml.declaration()?;
    xml.open(
        "manifest:manifest",
        &Attrs::new()
            .set("xmlns:manifest", MANIFEST_NS)
            .set("manifest:version", ODF_VERSION),
    )?;
    xml.empty(
        "manifest:file-entry",
        &Attrs::new()
            .set("manifest:full-path", "/")
            .set("manifest:version", ODF_VERSION)
            .set("manifest:media-type", MIMETYPE),
    )?;
    for part in parts {
        xml.empty(
            "manifest:file-entry",
            &Attrs::new()
                .set("manifest:full-path", part)
                .set("manifest:media-type", "text/xml"),
        )?;
    }
    xml.close("manifest:manifest")?;
    Ok(xml.into_inner())
}

/// Consecutive equal items collapsed into `(item, count)`
fn runs<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<(T, u32)> {
    let mut out: Vec<(T, u32)> = Vec::new();
    for item in items {
        match out.last_mut() {
            Some((last, count)) if *last == item => *count += 1,
            _ => out.push((item, 1)),
        }
    }
    out
}

fn length(points: f64) -> String {
    format_cm(points_to_cm(points))
}

fn write_blank_rows<W: Write>(xml: &mut XmlSink<W>, count: u32, width: u32) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let mut attrs = Attrs::new();
    if count > 1 {
        attrs.push("table:number-rows-repeated", count);
    }
    xml.open("table:table-row", &attrs)?;
    let mut cell = Attrs::new();
    if width > 1 {
        cell.push("table:number-columns-repeated", width);
    }
    xml.empty("table:table-cell", &cell)?;
    xml.close("table:table-row")
}

fn write_gap<W: Write>(xml: &mut XmlSink<W>, (gap, count): (Gap, u32)) -> Result<()> {
    let mut attrs = Attrs::new();
    if count > 1 {
        attrs.push("table:number-columns-repeated", count);
    }
    match gap {
        Gap::Empty => xml.empty("table:table-cell", &attrs),
        Gap::Covered => xml.empty("table:covered-table-cell", &attrs),
    }
}

/// Value attributes for a cell's data; returns the display text
fn value_attrs(
    attrs: &mut Attrs,
    data: &Data,
    data_type: DataType,
    scope: &DiagnosticScope,
    diagnostics: &mut Diagnostics,
) -> String {
    let value = data.value.trim();
    match data_type {
        DataType::Number | DataType::Percentage => {
            let Ok(number) = value.parse::<f64>() else {
                diagnostics.warn(
                    DiagnosticKind::FormatConversion,
                    scope.clone(),
                    format!("non-numeric value '{}' written as text", value),
                );
                attrs.push("office:value-type", "string");
                return data.value.clone();
            };
            if data_type == DataType::Percentage {
                attrs.push("office:value-type", "percentage");
                attrs.push("office:value", value);
                format!("{}%", number * 100.0)
            } else {
                attrs.push("office:value-type", "float");
                attrs.push("office:value", value);
                value.to_string()
            }
        }
        DataType::DateTime => match time_duration(value) {
            Some(duration) => {
                attrs.push("office:value-type", "time");
                attrs.push("office:time-value", duration);
                value[TIME_EPOCH.len() + 1..].to_string()
            }
            None => {
                attrs.push("office:value-type", "date");
                attrs.push("office:date-value", value);
                value.to_string()
            }
        },
        DataType::Boolean => {
            let truth = matches!(value, "1" | "true" | "TRUE" | "True");
            attrs.push("office:value-type", "boolean");
            attrs.push("office:boolean-value", truth);
            String::from(if truth { "TRUE" } else { "FALSE" })
        }
        DataType::String => {
            attrs.push("office:value-type", "string");
            data.value.clone()
        }
        DataType::Error => {
            attrs.push("office:value-type", "string");
            attrs.push("calcext:value-type", "error");
            data.value.clone()
        }
    }
}

/// `PT10H30M05S` for a time-only value on the time epoch
fn time_duration(value: &str) -> Option<String> {
    let time = value.strip_prefix(TIME_EPOCH)?.strip_prefix('T')?;
    let mut parts = time.split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next().unwrap_or("0").parse().ok()?;
    Some(format!(
        "PT{:02}H{:02}M{:02}S",
        hours,
        minutes,
        seconds.floor() as u32
    ))
}

/// One `text:p` per line; whitespace runs become `text:s` and tabs `text:tab`
fn write_paragraphs<W: Write>(xml: &mut XmlSink<W>, text: &str, href: Option<&str>) -> Result<()> {
    for line in text.split('\n') {
        xml.open("text:p", &Attrs::new())?;
        if let Some(href) = href {
            xml.open(
                "text:a",
                &Attrs::new()
                    .set("xlink:href", href)
                    .set("xlink:type", "simple"),
            )?;
        }
        write_inline(xml, line)?;
        if href.is_some() {
            xml.close("text:a")?;
        }
        xml.close("text:p")?;
    }
    Ok(())
}

fn write_inline<W: Write>(xml: &mut XmlSink<W>, line: &str) -> Result<()> {
    let mut literal = String::new();
    let mut started = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\t' => {
                flush_literal(xml, &mut literal)?;
                xml.empty("text:tab", &Attrs::new())?;
            }
            ' ' => {
                let mut spaces = 1u32;
                while chars.peek() == Some(&' ') {
                    chars.next();
                    spaces += 1;
                }
                // A single space survives as text, except at the start of a paragraph
                if started {
                    literal.push(' ');
                    spaces -= 1;
                }
                if spaces > 0 {
                    flush_literal(xml, &mut literal)?;
                    let mut attrs = Attrs::new();
                    if spaces > 1 {
                        attrs.push("text:c", spaces);
                    }
                    xml.empty("text:s", &attrs)?;
                }
            }
            other => literal.push(other),
        }
        started = true;
    }
    flush_literal(xml, &mut literal)
}

fn flush_literal<W: Write>(xml: &mut XmlSink<W>, literal: &mut String) -> Result<()> {
    if !literal.is_empty() {
        xml.text(literal)?;
        literal.clear();
    }
    Ok(())
}

fn write_family_style<W: Write>(
    xml: &mut XmlSink<W>,
    name: &str,
    family: &str,
    extra: Attrs,
    properties: &str,
    props: Attrs,
) -> Result<()> {
    let mut attrs = Attrs::new().set("style:name", name).set("style:family", family);
    attrs.extend(extra);
    xml.open("style:style", &attrs)?;
    xml.empty(properties, &props)?;
    xml.close("style:style")
}

fn write_cell_style<W: Write>(xml: &mut XmlSink<W>, style: &CellStyle, automatic: bool) -> Result<()> {
    let mut attrs = Attrs::new()
        .set("style:name", &style.name)
        .set("style:family", "table-cell");
    if automatic {
        attrs.push("style:parent-style-name", StyleId::DEFAULT);
    }
    if let Some(data_style) = &style.data_style {
        attrs.push("style:data-style-name", data_style);
    }

    let sections = [
        ("style:table-cell-properties", cell_properties(&style.spec)),
        ("style:paragraph-properties", paragraph_properties(&style.spec)),
        ("style:text-properties", text_properties(&style.spec)),
    ];
    if sections.iter().all(|(_, props)| props.is_empty()) {
        return xml.empty("style:style", &attrs);
    }
    xml.open("style:style", &attrs)?;
    for (element, props) in &sections {
        if !props.is_empty() {
            xml.empty(element, props)?;
        }
    }
    xml.close("style:style")
}

fn cell_properties(spec: &StyleSpec) -> Attrs {
    let mut attrs = Attrs::new();
    if let Some(color) = spec.interior.as_ref().and_then(|i| i.color.as_ref()) {
        attrs.push("fo:background-color", color);
    }
    if let Some(borders) = &spec.borders {
        for border in borders.iter() {
            let key = match border.position {
                BorderPosition::Left => "fo:border-left",
                BorderPosition::Top => "fo:border-top",
                BorderPosition::Right => "fo:border-right",
                BorderPosition::Bottom => "fo:border-bottom",
            };
            attrs.push(key, format_border(&BorderLine::from(border)));
        }
    }
    if let Some(alignment) = &spec.alignment {
        if alignment.wrap_text {
            attrs.push("fo:wrap-option", "wrap");
        }
        if alignment.shrink_to_fit {
            attrs.push("style:shrink-to-fit", true);
        }
        let vertical = match alignment.vertical {
            Some(VerticalAlignment::Top) => Some("top"),
            Some(VerticalAlignment::Center) => Some("middle"),
            Some(VerticalAlignment::Bottom) => Some("bottom"),
            Some(VerticalAlignment::Justify | VerticalAlignment::Distributed) | None => None,
        };
        if let Some(vertical) = vertical {
            attrs.push("style:vertical-align", vertical);
        }
        if alignment.rotate != 0 {
            attrs.push("style:rotation-angle", alignment.rotate.rem_euclid(360));
        }
        if alignment.horizontal.is_some() {
            attrs.push("style:text-align-source", "fix");
        }
    }
    attrs
}

fn paragraph_properties(spec: &StyleSpec) -> Attrs {
    let align = spec.alignment.as_ref().and_then(|a| a.horizontal).map(|h| match h {
        HorizontalAlignment::Left | HorizontalAlignment::Fill => "start",
        HorizontalAlignment::Center | HorizontalAlignment::CenterAcrossSelection => "center",
        HorizontalAlignment::Right => "end",
        HorizontalAlignment::Justify | HorizontalAlignment::Distributed => "justify",
    });
    Attrs::new().set_opt("fo:text-align", align)
}

fn text_properties(spec: &StyleSpec) -> Attrs {
    let mut attrs = Attrs::new();
    let Some(font) = &spec.font else {
        return attrs;
    };
    if let Some(name) = &font.name {
        attrs.push("fo:font-family", name);
    }
    if let Some(size) = font.size {
        attrs.push("fo:font-size", format!("{}pt", size));
    }
    if font.bold {
        attrs.push("fo:font-weight", "bold");
    }
    if font.italic {
        attrs.push("fo:font-style", "italic");
    }
    if let Some(underline) = font.underline {
        attrs.push("style:text-underline-style", "solid");
        attrs.push("style:text-underline-width", "auto");
        attrs.push("style:text-underline-color", "font-color");
        if matches!(underline, Underline::Double | Underline::DoubleAccounting) {
            attrs.push("style:text-underline-type", "double");
        }
    }
    if font.strike_through {
        attrs.push("style:text-line-through-style", "solid");
    }
    if let Some(color) = &font.color {
        attrs.push("fo:color", color);
    }
    attrs
}

fn write_data_style<W: Write>(xml: &mut XmlSink<W>, name: &str, pattern: &NumberPattern) -> Result<()> {
    let named = Attrs::new().set("style:name", name);
    match pattern {
        NumberPattern::Number(parts) => {
            let element = if parts.percent {
                "number:percentage-style"
            } else {
                "number:number-style"
            };
            xml.open(element, &named)?;
            let mut attrs = Attrs::new()
                .set("number:decimal-places", parts.decimal_places)
                .set("number:min-integer-digits", parts.min_integer_digits);
            if parts.grouping {
                attrs.push("number:grouping", true);
            }
            xml.empty("number:number", &attrs)?;
            if parts.percent {
                xml.leaf("number:text", &Attrs::new(), "%")?;
            }
            xml.close(element)
        }
        NumberPattern::DateTime(tokens) => {
            let element = if pattern.is_time_only() {
                "number:time-style"
            } else {
                "number:date-style"
            };
            xml.open(element, &named)?;
            for token in tokens {
                write_date_token(xml, token)?;
            }
            xml.close(element)
        }
        NumberPattern::Text => {
            xml.open("number:text-style", &named)?;
            xml.empty("number:text-content", &Attrs::new())?;
            xml.close("number:text-style")
        }
    }
}

fn write_date_token<W: Write>(xml: &mut XmlSink<W>, token: &DateToken) -> Result<()> {
    let style = |long: bool| Attrs::new().set_opt("number:style", long.then_some("long"));
    match token {
        DateToken::Day { long } => xml.empty("number:day", &style(*long)),
        DateToken::DayOfWeek { long } => xml.empty("number:day-of-week", &style(*long)),
        DateToken::Month { long, textual } => xml.empty(
            "number:month",
            &style(*long).set_opt("number:textual", textual.then_some("true")),
        ),
        DateToken::Year { long } => xml.empty("number:year", &style(*long)),
        DateToken::Hours { long } => xml.empty("number:hours", &style(*long)),
        DateToken::Minutes { long } => xml.empty("number:minutes", &style(*long)),
        DateToken::Seconds { long } => xml.empty("number:seconds", &style(*long)),
        DateToken::AmPm => xml.empty("number:am-pm", &Attrs::new()),
        DateToken::Text(text) => xml.leaf("number:text", &Attrs::new(), text),
    }
}

fn write_page_layout<W: Write>(xml: &mut XmlSink<W>, name: &str, options: &WorksheetOptions) -> Result<()> {
    let page = &options.page_setup;
    let print = &options.print;
    let (width, height) = page_dimensions(print.paper_size(), page.orientation);
    let margin = |inches: f64| format_cm(inches_to_cm(inches));

    let mut props = Attrs::new()
        .set("fo:page-width", format_cm(width))
        .set("fo:page-height", format_cm(height))
        .set("style:print-orientation", page.orientation.as_str().to_ascii_lowercase())
        .set("fo:margin-top", margin(page.margins.top))
        .set("fo:margin-bottom", margin(page.margins.bottom))
        .set("fo:margin-left", margin(page.margins.left))
        .set("fo:margin-right", margin(page.margins.right));
    let centering = match (page.center_horizontal, page.center_vertical) {
        (true, true) => Some("both"),
        (true, false) => Some("horizontal"),
        (false, true) => Some("vertical"),
        (false, false) => None,
    };
    props = props.set_opt("style:table-centering", centering);
    if options.fit_to_page {
        props.push("style:scale-to-X", print.fit_width.unwrap_or(1));
        props.push("style:scale-to-Y", print.fit_height.unwrap_or(1));
    } else if let Some(scale) = print.scale {
        props.push("style:scale-to", format!("{}%", scale));
    }
    let print_parts = if print.gridlines {
        "grid charts drawings objects zero-values"
    } else {
        "charts drawings objects zero-values"
    };
    props.push("style:print", print_parts);

    xml.open("style:page-layout", &Attrs::new().set("style:name", name))?;
    xml.empty("style:page-layout-properties", &props)?;
    xml.close("style:page-layout")
}

/// Record style content that ODS cannot carry exactly
fn note_lossy_style(id: &str, spec: &StyleSpec, diagnostics: &mut Diagnostics) {
    let dash_dot = spec.borders.as_ref().is_some_and(|borders| {
        borders
            .iter()
            .any(|b| matches!(b.line_style, LineStyle::DashDot | LineStyle::DashDotDot))
    });
    if dash_dot {
        diagnostics.info(
            DiagnosticKind::FormatConversion,
            DiagnosticScope::Book,
            format!("style '{}': dash-dot borders written as dotted or dashed", id),
        );
    }
    let patterned = spec
        .interior
        .as_ref()
        .and_then(|i| i.pattern)
        .is_some_and(|p| p != Pattern::Solid);
    if patterned {
        diagnostics.info(
            DiagnosticKind::FormatConversion,
            DiagnosticScope::Book,
            format!("style '{}': fill pattern written as a solid background", id),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Border, Borders, CellValue, Color, Font, Interior, Orientation};
    use crate::writer::emit;
    use std::io::Read;
    use zip::ZipArchive;

    fn package(workbook: &Workbook) -> (ZipArchive<Cursor<Vec<u8>>>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let bytes = emit(OdsWriter::new(workbook), &mut diagnostics).unwrap();
        (ZipArchive::new(Cursor::new(bytes)).unwrap(), diagnostics)
    }

    fn part(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut text = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_package_layout() {
        let mut workbook = Workbook::new();
        workbook.create_worksheet("Sheet1").unwrap();
        let (mut archive, _) = package(&workbook);

        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);
        assert_eq!(part(&mut archive, "mimetype"), MIMETYPE);

        let manifest = part(&mut archive, "META-INF/manifest.xml");
        for name in ["content.xml", "styles.xml", "meta.xml", "settings.xml"] {
            assert!(manifest.contains(&format!("manifest:full-path=\"{}\"", name)));
        }
        assert!(part(&mut archive, "settings.xml").contains(">Sheet1</config:config-item>"));
    }

    #[test]
    fn test_cells_merges_and_gaps() {
        let mut workbook = Workbook::new();
        let sheet = workbook.create_worksheet("Data").unwrap();
        sheet.create_cell(1, 1).unwrap().set_value("Title");
        sheet.merge_cell(1, 1, 1, 1).unwrap();
        sheet.create_cell(2, 4).unwrap().set_value(2.5);
        sheet.create_cell(5, 1).unwrap().set_value("=SUM(D2:D3)");
        let (mut archive, _) = package(&workbook);
        let content = part(&mut archive, "content.xml");

        assert!(content.contains(
            "table:number-columns-spanned=\"2\" table:number-rows-spanned=\"2\" office:value-type=\"string\"><text:p>Title</text:p>"
        ));
        assert!(content.contains("</table:table-cell><table:covered-table-cell/></table:table-row>"));
        assert!(content.contains(
            "<table:covered-table-cell table:number-columns-repeated=\"2\"/><table:table-cell/><table:table-cell office:value-type=\"float\""
        ));
        assert!(content.contains("office:value-type=\"float\" office:value=\"2.5\"><text:p>2.5</text:p>"));
        assert!(content.contains("<table:table-row table:number-rows-repeated=\"2\">"));
        assert!(content.contains("table:formula=\"of:=SUM([.D2:.D3])\""));
    }

    #[test]
    fn test_styles_and_data_styles() {
        let mut workbook = Workbook::new();
        let spec = StyleSpec::new()
            .with_number_format("0.00%")
            .with_font(Font {
                bold: true,
                color: Color::parse("#FF0000"),
                ..Font::default()
            })
            .with_interior(Interior::solid(Color::black()))
            .with_borders(
                [Border::new(BorderPosition::Bottom, LineStyle::DashDot, 2)]
                    .into_iter()
                    .collect::<Borders>(),
            );
        let id = workbook.styles_mut().get_or_create(spec);
        let sheet = workbook.create_worksheet("S").unwrap();
        let cell = sheet.create_cell(1, 1).unwrap();
        cell.set_value(0.25);
        cell.set_style_id(Some(id.clone()));

        let (mut archive, diagnostics) = package(&workbook);
        let content = part(&mut archive, "content.xml");
        assert!(content.contains(&format!(
            "<style:style style:name=\"{}\" style:family=\"table-cell\" style:parent-style-name=\"Default\" style:data-style-name=\"N1\">",
            id
        )));
        assert!(content.contains("<number:percentage-style style:name=\"N1\">"));
        assert!(content.contains("fo:border-bottom=\"1.75pt dotted #000000\""));
        assert!(content.contains("fo:font-weight=\"bold\""));
        assert!(content.contains("office:value-type=\"percentage\" office:value=\"0.25\""));
        assert_eq!(diagnostics.of_kind(DiagnosticKind::FormatConversion).count(), 1);

        let styles = part(&mut archive, "styles.xml");
        assert!(styles.contains("<style:style style:name=\"Default\" style:family=\"table-cell\"/>"));
        assert!(styles.contains("style:page-layout-name=\"pm0\""));
    }

    #[test]
    fn test_page_layout_and_hidden_sheet() {
        let mut workbook = Workbook::new();
        let sheet = workbook.create_worksheet("Print").unwrap();
        let options = sheet.options_mut();
        options.page_setup.orientation = Orientation::Landscape;
        options.print.paper_size_index = Some(8);
        options.print.scale = Some(85);
        sheet.page_breaks_mut().add_row_break(3);
        sheet.hidden = true;
        sheet.protected = true;

        let (mut archive, _) = package(&workbook);
        let styles = part(&mut archive, "styles.xml");
        assert!(styles.contains("fo:page-width=\"42cm\" fo:page-height=\"29.7cm\""));
        assert!(styles.contains("style:print-orientation=\"landscape\""));
        assert!(styles.contains("style:scale-to=\"85%\""));
        assert!(styles.contains("<style:master-page style:name=\"mp1\" style:page-layout-name=\"pm1\"/>"));

        let content = part(&mut archive, "content.xml");
        assert!(content.contains("style:master-page-name=\"mp1\""));
        assert!(content.contains("table:display=\"false\""));
        assert!(content.contains("table:name=\"Print\" table:style-name=\"ta1\" table:protected=\"true\""));
        assert!(content.contains("fo:break-before=\"page\""));
    }

    #[test]
    fn test_text_whitespace_and_links() {
        let mut xml = XmlSink::new(Vec::new());
        write_paragraphs(&mut xml, "  a  b\tc\nline two", Some("http://example.com")).unwrap();
        let out = String::from_utf8(xml.into_inner()).unwrap();
        assert_eq!(
            out,
            "<text:p><text:a xlink:href=\"http://example.com\" xlink:type=\"simple\">\
             <text:s text:c=\"2\"/>a <text:s/>b<text:tab/>c</text:a></text:p>\
             <text:p><text:a xlink:href=\"http://example.com\" xlink:type=\"simple\">line two</text:a></text:p>"
        );
    }

    #[test]
    fn test_value_helpers() {
        assert_eq!(time_duration("1899-12-31T10:30:05").as_deref(), Some("PT10H30M05S"));
        assert_eq!(time_duration("2024-01-15T10:30:00"), None);

        let mut diagnostics = Diagnostics::new();
        let scope = DiagnosticScope::Book;
        let mut attrs = Attrs::new();
        let text = value_attrs(
            &mut attrs,
            &Data::new("1", DataType::Boolean),
            DataType::Boolean,
            &scope,
            &mut diagnostics,
        );
        assert_eq!(text, "TRUE");
        let text = value_attrs(
            &mut attrs,
            &Data::new("n/a", DataType::Number),
            DataType::Number,
            &scope,
            &mut diagnostics,
        );
        assert_eq!(text, "n/a");
        assert_eq!(diagnostics.len(), 1);

        let mut cell = Cell::new();
        cell.set_value(CellValue::Error("#DIV/0!".to_string()));
        let mut attrs = Attrs::new();
        value_attrs(
            &mut attrs,
            cell.data().unwrap(),
            DataType::Error,
            &scope,
            &mut diagnostics,
        );
        let mut xml = XmlSink::new(Vec::new());
        xml.empty("c", &attrs).unwrap();
        let out = String::from_utf8(xml.into_inner()).unwrap();
        assert!(out.contains("calcext:value-type=\"error\""));
    }
}

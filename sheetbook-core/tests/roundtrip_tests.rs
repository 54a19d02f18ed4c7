use calamine::{Data, Ods, Reader, open_workbook};
use sheetbook_core::model::{Border, BorderPosition, Borders, Color, LineStyle, Orientation};
use sheetbook_core::{
    CellValue, CodecConfig, Document, MergePolicy, SheetError, StyleSpec, Workbook, load, save_as,
};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::TempDir;
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

fn scenario() -> Workbook {
    let mut workbook = Workbook::new();
    let sheet = workbook.create_worksheet("Sheet1").unwrap();
    sheet.get_cell(2, 2).unwrap().set_value("Hello");
    sheet.get_cell(3, 3).unwrap().set_value("=SUM(A1:A2)");
    sheet.merge_cell(1, 1, 1, 1).unwrap();
    workbook
}

fn round_trip(workbook: &Workbook, dir: &TempDir, name: &str) -> Workbook {
    let path = dir.path().join(name);
    save_as(workbook, &path).unwrap();
    load(&path).unwrap().unwrap()
}

#[test]
fn test_scenario_ods_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut workbook = round_trip(&scenario(), &dir, "scenario.ods");
    let sheet = workbook.worksheet_mut("Sheet1").unwrap();

    assert_eq!(
        sheet.cell(3, 3).unwrap().unwrap().formula_a1().as_deref(),
        Some("=SUM(A1:A2)")
    );
    let region = sheet.table.merge_at(2, 2).unwrap();
    assert_eq!((region.row, region.col, region.down, region.across), (1, 1, 1, 1));

    // The merge swallowed B2's value; every covered position resolves to A1
    for (row, col) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
        let cell = sheet.get_cell(row, col).unwrap();
        assert_eq!((cell.row(), cell.col()), (1, 1));
    }
}

#[test]
fn test_absolute_references_survive_both_formats() {
    let mut workbook = Workbook::new();
    let sheet = workbook.create_worksheet("Refs").unwrap();
    sheet.get_cell(3, 3).unwrap().set_value("=$A$1+SUM(A1:A2)");
    sheet.get_cell(4, 3).unwrap().set_value("=B$2*$B2");

    let dir = TempDir::new().unwrap();
    for name in ["refs.ods", "refs.xml"] {
        let loaded = round_trip(&workbook, &dir, name);
        let sheet = loaded.worksheet("Refs").unwrap();
        assert_eq!(
            sheet.cell(3, 3).unwrap().unwrap().formula_a1().as_deref(),
            Some("=$A$1+SUM(A1:A2)"),
            "{}",
            name
        );
        assert_eq!(
            sheet.cell(4, 3).unwrap().unwrap().formula_a1().as_deref(),
            Some("=B$2*$B2"),
            "{}",
            name
        );
    }

    let mut archive = ZipArchive::new(File::open(dir.path().join("refs.ods")).unwrap()).unwrap();
    let mut content = String::new();
    archive
        .by_name("content.xml")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert!(content.contains("of:=[.$A$1]+SUM([.A1:.A2])"));
}

#[test]
fn test_strict_policy_rejects_covered_cells() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("strict.ods");
    save_as(&scenario(), &path).unwrap();

    let mut config = CodecConfig::default();
    config.global.merge_policy = MergePolicy::Strict;
    let mut document = Document::with_config(config);
    let workbook = document.load(&path).unwrap().unwrap();
    let sheet = workbook.worksheet_mut("Sheet1").unwrap();

    assert!(sheet.get_cell(1, 1).is_ok());
    let err = sheet.get_cell(2, 1).unwrap_err();
    assert_eq!(
        err,
        SheetError::MergeCell {
            row: 2,
            col: 1,
            anchor_row: 1,
            anchor_col: 1
        }
    );
}

#[test]
fn test_percentage_and_border_survive_ods() {
    let mut workbook = Workbook::new();
    let percent = workbook
        .styles_mut()
        .get_or_create(StyleSpec::new().with_number_format("0.00%"));
    let border = StyleSpec::new().with_borders(
        [Border::new(BorderPosition::Top, LineStyle::Continuous, 1).with_color(Color::black())]
            .into_iter()
            .collect::<Borders>(),
    );
    let border = workbook.styles_mut().get_or_create(border);
    let sheet = workbook.create_worksheet("Numbers").unwrap();
    let cell = sheet.get_cell(1, 1).unwrap();
    cell.set_value(0.125);
    cell.set_style_id(Some(percent.clone()));
    let cell = sheet.get_cell(2, 1).unwrap();
    cell.set_value("edge");
    cell.set_style_id(Some(border.clone()));

    let dir = TempDir::new().unwrap();
    let loaded = round_trip(&workbook, &dir, "styled.ods");
    let sheet = loaded.worksheet("Numbers").unwrap();

    let first = sheet.cell(1, 1).unwrap().unwrap();
    assert_eq!(first.value(), CellValue::Percentage(0.125));
    assert_eq!(first.style_id(), Some(&percent));
    let spec = loaded.styles().effective_spec(first.style_id());
    assert_eq!(spec.number_format.unwrap().format, "0.00%");

    let second = sheet.cell(2, 1).unwrap().unwrap();
    assert_eq!(second.style_id(), Some(&border));
    let borders = loaded.styles().effective_spec(second.style_id()).borders.unwrap();
    let top = borders.get(BorderPosition::Top).unwrap();
    assert_eq!((top.line_style, top.weight), (LineStyle::Continuous, 1));
}

#[test]
fn test_markup_round_trip_keeps_layout() {
    let mut workbook = scenario();
    let sheet = workbook.create_worksheet("Print").unwrap();
    let cell = sheet.get_cell(4, 2).unwrap();
    cell.set_value("docs");
    cell.set_href(Some("https://example.com/".to_string()));
    sheet.table.get_row(4).unwrap().height = Some(30.0);
    sheet.options_mut().page_setup.orientation = Orientation::Landscape;
    sheet.page_breaks_mut().add_row_break(3);
    workbook.set_active("Print").unwrap();

    let dir = TempDir::new().unwrap();
    let loaded = round_trip(&workbook, &dir, "book.xml");
    assert_eq!(loaded.worksheet_names(), vec!["Sheet1", "Print"]);
    assert_eq!(loaded.active_worksheet().unwrap().name(), "Print");

    let sheet = loaded.worksheet("Print").unwrap();
    let cell = sheet.cell(4, 2).unwrap().unwrap();
    assert_eq!(cell.href(), Some("https://example.com/"));
    assert_eq!(sheet.table.row(4).unwrap().height, Some(30.0));
    let options = sheet.options.as_ref().unwrap();
    assert_eq!(options.page_setup.orientation, Orientation::Landscape);
    assert_eq!(sheet.page_breaks.as_ref().unwrap().row_breaks(), &[3]);
}

#[test]
fn test_hyperlink_and_whitespace_survive_ods() {
    let mut workbook = Workbook::new();
    let sheet = workbook.create_worksheet("Links").unwrap();
    let cell = sheet.get_cell(1, 1).unwrap();
    cell.set_value("  two  spaces\nsecond line");
    cell.set_href(Some("https://example.com/".to_string()));

    let dir = TempDir::new().unwrap();
    let loaded = round_trip(&workbook, &dir, "links.ods");
    let cell = loaded.worksheet("Links").unwrap().cell(1, 1).unwrap().unwrap();
    assert_eq!(cell.value(), CellValue::Text("  two  spaces\nsecond line".to_string()));
    assert_eq!(cell.href(), Some("https://example.com/"));
}

#[test]
fn test_address_boundaries() {
    let mut workbook = Workbook::new();
    let sheet = workbook.create_worksheet("S").unwrap();
    assert!(matches!(
        sheet.get_cell(65536, 1),
        Err(SheetError::AddressFormat { .. })
    ));
    assert!(matches!(
        sheet.get_cell(1, 257),
        Err(SheetError::AddressFormat { .. })
    ));
    assert!(sheet.get_cell(65535, 256).is_ok());
}

#[test]
fn test_clear_unused_styles_is_idempotent() {
    let mut workbook = Workbook::new();
    let used = workbook
        .styles_mut()
        .get_or_create(StyleSpec::new().with_number_format("0.0"));
    workbook
        .styles_mut()
        .get_or_create(StyleSpec::new().with_number_format("0.000"));
    let sheet = workbook.create_worksheet("S").unwrap();
    sheet.get_cell(1, 1).unwrap().set_style_id(Some(used.clone()));

    assert_eq!(workbook.clear_unused_styles().len(), 1);
    assert!(workbook.clear_unused_styles().is_empty());
    assert!(workbook.styles().contains(&used));
}

#[test]
fn test_calamine_reads_written_package() {
    let mut workbook = Workbook::new();
    let sheet = workbook.create_worksheet("Data").unwrap();
    sheet.get_cell(1, 1).unwrap().set_value("name");
    sheet.get_cell(1, 2).unwrap().set_value(42.5);
    sheet.get_cell(3, 1).unwrap().set_value(true);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("calamine.ods");
    save_as(&workbook, &path).unwrap();

    let mut ods: Ods<_> = open_workbook(&path).unwrap();
    assert_eq!(ods.sheet_names(), vec!["Data".to_string()]);
    let range = ods.worksheet_range("Data").unwrap();
    assert_eq!(range.get_value((0, 0)), Some(&Data::String("name".to_string())));
    assert_eq!(range.get_value((0, 1)), Some(&Data::Float(42.5)));
    assert_eq!(range.get_value((2, 0)), Some(&Data::Bool(true)));
}

#[test]
fn test_package_starts_with_stored_mimetype() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("layout.ods");
    save_as(&scenario(), &path).unwrap();

    let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
    let mut first = archive.by_index(0).unwrap();
    assert_eq!(first.name(), "mimetype");
    assert_eq!(first.compression(), zip::CompressionMethod::Stored);
    let mut mimetype = String::new();
    first.read_to_string(&mut mimetype).unwrap();
    assert_eq!(mimetype, "application/vnd.oasis.opendocument.spreadsheet");
}

// Hand-built package with a repeated-row block far past the configured cap
fn write_repeating_package(path: &Path) -> anyhow::Result<()> {
    let mut zip = zip::ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file("mimetype", options)?;
    zip.write_all(b"application/vnd.oasis.opendocument.spreadsheet")?;
    zip.start_file("content.xml", options)?;
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0"
 xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0"
 xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0">
 <office:body><office:spreadsheet>
  <table:table table:name="Big">
   <table:table-row table:number-rows-repeated="5000">
    <table:table-cell office:value-type="string"><text:p>x</text:p></table:table-cell>
   </table:table-row>
  </table:table>
 </office:spreadsheet></office:body>
</office:document-content>"#,
    )?;
    zip.finish()?;
    Ok(())
}

#[test]
fn test_repeat_limit_truncates_with_diagnostic() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.ods");
    write_repeating_package(&path).unwrap();

    let mut config = CodecConfig::default();
    config.global.max_repeated_rows = 10;
    let mut document = Document::with_config(config);
    let workbook = document.load(&path).unwrap().unwrap();
    let sheet = workbook.worksheet("Big").unwrap();
    assert_eq!(sheet.table.dimensions().0, 10);
    assert!(
        workbook
            .diagnostics()
            .any(|d| d.kind == sheetbook_core::DiagnosticKind::RepeatLimitExceeded)
    );
}

#[test]
fn test_missing_file_loads_as_none() {
    assert!(load(Path::new("/nonexistent/dir/book.ods")).unwrap().is_none());
    assert!(load(Path::new("/nonexistent/dir/book.xml")).unwrap().is_none());
}

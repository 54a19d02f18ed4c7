//! Terminal output for conversions, workbook summaries and diagnostics

use colored::*;
use sheetbook_core::{Diagnostic, DiagnosticScope, Severity, StyleId, Workbook};
use std::collections::BTreeMap;
use std::path::Path;

pub fn print_conversion(input: &Path, output: &Path, removed: &[StyleId]) {
    println!(
        "{} {} {} {}",
        "✓ Converted".green().bold(),
        input.display(),
        "->".bright_black(),
        output.display()
    );
    if !removed.is_empty() {
        let names: Vec<&str> = removed.iter().map(StyleId::as_str).collect();
        println!(
            "  {} {}",
            "Removed unused styles:".bold(),
            names.join(", ").bright_black()
        );
    }
}

/// Sheets with their used extent, merges and page setup, then the style registry
pub fn print_summary(file_path: &Path, workbook: &Workbook) {
    println!("{}", format!("Workbook: {}", file_path.display()).bold());
    println!();

    let active = workbook.active_index();
    for (index, sheet) in workbook.worksheets().iter().enumerate() {
        let (rows, cols) = sheet.table.dimensions();
        let mut flags = Vec::new();
        if index == active {
            flags.push("active".green().to_string());
        }
        if sheet.hidden {
            flags.push("hidden".yellow().to_string());
        }
        if sheet.options.is_some() {
            flags.push("page setup".blue().to_string());
        }
        println!(
            "{} {} {}",
            "Sheet:".bold(),
            sheet.name().cyan().bold(),
            flags.join(" ")
        );
        println!(
            "  {} {} rows x {} columns, {} cells, {} merged regions",
            "Extent:".bold(),
            rows,
            cols,
            sheet.table.cells().count(),
            sheet.table.merge_regions().len()
        );
    }
    println!();

    let styles = workbook.styles();
    let used = workbook.used_style_ids();
    println!("{} {}", "Styles:".bold().underline(), styles.len());
    for style in styles.iter() {
        let marker = if used.contains(&style.id) || style.id.is_default() {
            "•".green()
        } else {
            "○".bright_black()
        };
        let format = style
            .spec
            .number_format
            .as_ref()
            .map(|f| f.format.as_str())
            .unwrap_or("General");
        println!("  {} {} {}", marker, style.id.as_str().yellow(), format.bright_black());
    }
    println!();
}

/// Diagnostics grouped by book, sheet and cell
pub fn print_diagnostics(phase: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    let mut book = Vec::new();
    let mut sheets: BTreeMap<&str, Vec<&Diagnostic>> = BTreeMap::new();
    let mut cells: BTreeMap<&str, BTreeMap<String, Vec<&Diagnostic>>> = BTreeMap::new();
    for diagnostic in diagnostics {
        match &diagnostic.scope {
            DiagnosticScope::Book => book.push(diagnostic),
            DiagnosticScope::Sheet(sheet) => sheets.entry(sheet).or_default().push(diagnostic),
            DiagnosticScope::Cell(sheet, position) => cells
                .entry(sheet)
                .or_default()
                .entry(position.to_a1())
                .or_default()
                .push(diagnostic),
        }
    }

    println!("{}", format!("{} diagnostics:", phase).bold().underline());
    for diagnostic in book {
        print_diagnostic(diagnostic, 1);
    }
    for (sheet, diagnostics) in &sheets {
        println!("  {} {}", "Sheet:".bold(), sheet.cyan().bold());
        for diagnostic in diagnostics {
            print_diagnostic(diagnostic, 2);
        }
    }
    for (sheet, by_cell) in &cells {
        println!("  {} {}", "Sheet:".bold(), sheet.cyan().bold());
        for (cell_ref, diagnostics) in by_cell {
            println!("    {} {}", "Cell:".bold(), cell_ref.yellow());
            for diagnostic in diagnostics {
                print_diagnostic(diagnostic, 3);
            }
        }
    }

    let warnings = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    println!(
        "  {} {} warnings, {} info",
        "Summary:".bold(),
        warnings,
        diagnostics.len() - warnings
    );
    println!();
}

fn print_diagnostic(diagnostic: &Diagnostic, indent: usize) {
    let indent_str = "  ".repeat(indent);
    let severity_str = match diagnostic.severity {
        Severity::Warning => "WARN".yellow().bold(),
        Severity::Info => "INFO".blue().bold(),
    };
    println!(
        "{}{} [{}] {}",
        indent_str,
        severity_str,
        diagnostic.kind.as_str().bright_black(),
        diagnostic.message
    );
}

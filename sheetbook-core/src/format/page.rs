//! Lengths and paper geometry for ODS page layouts

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ConversionError;
use crate::model::{Orientation, PaperSize};

static LENGTH: OnceLock<Regex> = OnceLock::new();

pub const CM_PER_INCH: f64 = 2.54;
const POINTS_PER_INCH: f64 = 72.0;

/// Paper dimensions closer than this (cm) are considered equal
const PAPER_TOLERANCE_CM: f64 = 0.2;

pub fn inches_to_cm(inches: f64) -> f64 {
    inches * CM_PER_INCH
}

pub fn cm_to_inches(cm: f64) -> f64 {
    cm / CM_PER_INCH
}

pub fn points_to_cm(points: f64) -> f64 {
    points / POINTS_PER_INCH * CM_PER_INCH
}

pub fn cm_to_points(cm: f64) -> f64 {
    cm / CM_PER_INCH * POINTS_PER_INCH
}

/// Parse an ODS length (`2.5cm`, `25mm`, `1in`, `72pt`) into centimetres
pub fn parse_length_cm(value: &str) -> Result<f64, ConversionError> {
    let pattern = LENGTH.get_or_init(|| {
        Regex::new(r"^\s*(-?[0-9]*\.?[0-9]+)\s*(cm|mm|in|inch|pt|pc)\s*$").unwrap()
    });
    let caps = pattern
        .captures(value)
        .ok_or_else(|| ConversionError::Length(value.to_string()))?;
    let number: f64 = caps[1]
        .parse()
        .map_err(|_| ConversionError::Length(value.to_string()))?;

    let cm = match &caps[2] {
        "cm" => number,
        "mm" => number / 10.0,
        "in" | "inch" => inches_to_cm(number),
        "pt" => points_to_cm(number),
        "pc" => points_to_cm(number * 12.0),
        _ => return Err(ConversionError::Length(value.to_string())),
    };
    Ok(cm)
}

/// Parse an ODS length into points
pub fn parse_length_pt(value: &str) -> Result<f64, ConversionError> {
    parse_length_cm(value).map(cm_to_points)
}

/// Render centimetres with at most four decimals, e.g. `2.54cm`
pub fn format_cm(cm: f64) -> String {
    let rounded = format!("{:.4}", cm);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{}cm", if trimmed == "-0" { "0" } else { trimmed })
}

/// Page width and height in cm, swapped for landscape
pub fn page_dimensions(paper: PaperSize, orientation: Orientation) -> (f64, f64) {
    let (width, height) = paper.dimensions_cm();
    match orientation {
        Orientation::Portrait => (width, height),
        Orientation::Landscape => (height, width),
    }
}

/// Recognize a paper size from its dimensions in either orientation
pub fn detect_paper(width_cm: f64, height_cm: f64) -> Result<PaperSize, ConversionError> {
    let short = width_cm.min(height_cm);
    let long = width_cm.max(height_cm);
    [PaperSize::A4, PaperSize::A3]
        .into_iter()
        .find(|paper| {
            let (w, h) = paper.dimensions_cm();
            (w - short).abs() < PAPER_TOLERANCE_CM && (h - long).abs() < PAPER_TOLERANCE_CM
        })
        .ok_or_else(|| ConversionError::PaperSize(format!("{}x{}", format_cm(width_cm), format_cm(height_cm))))
}

//! Border shorthand (`0.75pt solid #000000`) ⇄ SpreadsheetML `Border` attributes

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ConversionError;
use crate::model::{Border, BorderPosition, Color, LineStyle};

static PT_WIDTH: OnceLock<Regex> = OnceLock::new();
static CM_WIDTH: OnceLock<Regex> = OnceLock::new();
static HEX_COLOR: OnceLock<Regex> = OnceLock::new();

/// Points per centimetre used when a border width is given in cm
const CM_TO_PT: f64 = 25.0;

/// A parsed border line, position-free
#[derive(Debug, Clone, PartialEq)]
pub struct BorderLine {
    pub line_style: LineStyle,
    pub weight: u8,
    pub color: Option<Color>,
}

impl BorderLine {
    /// Substitute used when a border value cannot be parsed
    pub fn fallback() -> Self {
        Self {
            line_style: LineStyle::Continuous,
            weight: 1,
            color: Some(Color::black()),
        }
    }

    pub fn at(&self, position: BorderPosition) -> Border {
        Border {
            position,
            line_style: self.line_style,
            weight: self.weight,
            color: self.color.clone(),
        }
    }
}

impl From<&Border> for BorderLine {
    fn from(border: &Border) -> Self {
        Self {
            line_style: border.line_style,
            weight: border.weight,
            color: border.color.clone(),
        }
    }
}

/// ODS line keyword. Dash-dot variants have no ODS counterpart and degrade.
pub fn to_ods_line_style(style: LineStyle) -> &'static str {
    match style {
        LineStyle::Continuous => "solid",
        LineStyle::Dash => "dashed",
        LineStyle::Dot => "dotted",
        LineStyle::Double => "double",
        LineStyle::DashDot => "dotted",
        LineStyle::DashDotDot => "dashed",
    }
}

/// `Ok(None)` for `none` and `hidden`, which mean no border at all
pub fn from_ods_line_style(keyword: &str) -> Result<Option<LineStyle>, ConversionError> {
    match keyword {
        "solid" => Ok(Some(LineStyle::Continuous)),
        "dashed" => Ok(Some(LineStyle::Dash)),
        "dotted" => Ok(Some(LineStyle::Dot)),
        "double" => Ok(Some(LineStyle::Double)),
        "none" | "hidden" => Ok(None),
        other => Err(ConversionError::LineStyle(other.to_string())),
    }
}

pub fn weight_to_points(weight: u8) -> f64 {
    match weight {
        0 => 0.05,
        1 => 0.75,
        2 => 1.75,
        _ => 2.5,
    }
}

pub fn points_to_weight(points: f64) -> u8 {
    if points < 0.26 {
        0
    } else if points < 1.25 {
        1
    } else if points < 2.25 {
        2
    } else {
        3
    }
}

/// Render a border as an ODS `fo:border*` value
pub fn format_border(line: &BorderLine) -> String {
    let color = line.color.clone().unwrap_or_else(Color::black);
    format!(
        "{}pt {} {}",
        weight_to_points(line.weight),
        to_ods_line_style(line.line_style),
        color
    )
}

/// Parse an ODS `fo:border*` value. `Ok(None)` means the side has no border.
pub fn parse_border(value: &str) -> Result<Option<BorderLine>, ConversionError> {
    let value = value.trim();
    if value.is_empty() || value == "none" || value == "hidden" {
        return Ok(None);
    }

    let pt = PT_WIDTH.get_or_init(|| Regex::new(r"([0-9]*\.?[0-9]+)\s*pt\b").unwrap());
    let cm = CM_WIDTH.get_or_init(|| Regex::new(r"([0-9]*\.?[0-9]+)\s*cm\b").unwrap());
    let hex = HEX_COLOR.get_or_init(|| Regex::new(r"#[0-9a-fA-F]{6}\b|#[0-9a-fA-F]{3}\b").unwrap());

    let points = if let Some(caps) = pt.captures(value) {
        caps[1].parse::<f64>().ok()
    } else if let Some(caps) = cm.captures(value) {
        caps[1].parse::<f64>().ok().map(|v| v * CM_TO_PT)
    } else {
        value.split_whitespace().find_map(|word| match word {
            "thin" => Some(0.75),
            "medium" => Some(1.75),
            "thick" => Some(2.5),
            _ => None,
        })
    };

    let mut line_style = None;
    for word in value.split_whitespace() {
        match from_ods_line_style(word) {
            Ok(Some(style)) => {
                line_style = Some(style);
                break;
            }
            Ok(None) => return Ok(None),
            Err(_) => {}
        }
    }

    let (Some(points), Some(line_style)) = (points, line_style) else {
        return Err(ConversionError::Border(value.to_string()));
    };
    let color = hex.find(value).and_then(|m| Color::parse(m.as_str()));

    Ok(Some(BorderLine {
        line_style,
        weight: points_to_weight(points),
        color,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pt_border() {
        let line = parse_border("1pt solid #000000").unwrap().unwrap();
        assert_eq!(line.line_style, LineStyle::Continuous);
        assert_eq!(line.weight, 1);
        assert_eq!(line.color, Color::parse("#000000"));
    }

    #[test]
    fn test_parse_cm_border() {
        // 0.06cm is about 1.5pt
        let line = parse_border("0.06cm dashed #ff0000").unwrap().unwrap();
        assert_eq!(line.line_style, LineStyle::Dash);
        assert_eq!(line.weight, 2);
        assert_eq!(line.color.unwrap().as_str(), "#FF0000");
    }

    #[test]
    fn test_no_border_values() {
        assert_eq!(parse_border("none").unwrap(), None);
        assert_eq!(parse_border("0.5pt hidden #000000").unwrap(), None);
        assert_eq!(parse_border("").unwrap(), None);
    }

    #[test]
    fn test_unparseable_border() {
        assert!(parse_border("wavy").is_err());
        assert!(parse_border("1pt groove #000000").is_err());
    }

    #[test]
    fn test_format_round_trip_for_lossless_styles() {
        for style in [
            LineStyle::Continuous,
            LineStyle::Dash,
            LineStyle::Dot,
            LineStyle::Double,
        ] {
            for weight in 0..=3 {
                let line = BorderLine {
                    line_style: style,
                    weight,
                    color: Some(Color::black()),
                };
                let parsed = parse_border(&format_border(&line)).unwrap().unwrap();
                assert_eq!(parsed, line);
            }
        }
    }

    #[test]
    fn test_dash_dot_degrades() {
        assert_eq!(to_ods_line_style(LineStyle::DashDot), "dotted");
        assert_eq!(to_ods_line_style(LineStyle::DashDotDot), "dashed");
        let line = BorderLine {
            line_style: LineStyle::DashDot,
            ..BorderLine::fallback()
        };
        let parsed = parse_border(&format_border(&line)).unwrap().unwrap();
        assert_eq!(parsed.line_style, LineStyle::Dot);
    }
}

//! Style content: alignment, borders, font, interior and number format

use std::fmt;

/// Identifier of a style in the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId(String);

impl StyleId {
    /// Reserved identifier of the base style every workbook carries
    pub const DEFAULT: &'static str = "Default";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn default_id() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    /// Serial number when the ID has the form `{prefix}{n}`
    pub fn serial(&self, prefix: &str) -> Option<u32> {
        self.0.strip_prefix(prefix)?.parse().ok()
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StyleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StyleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An RGB color normalized to `#RRGGBB`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Color(String);

impl Color {
    /// Accepts `#RGB` and `#RRGGBB` in any case; `Automatic` and `transparent` are no color.
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.trim().strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expanded = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => hex.to_string(),
            _ => return None,
        };
        Some(Self(format!("#{}", expanded.to_ascii_uppercase())))
    }

    pub fn black() -> Self {
        Self("#000000".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declares a closed set of markup keywords with lookup in both directions.
macro_rules! keyword_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum! {
    /// Horizontal alignment (`Automatic` is represented as no value)
    HorizontalAlignment {
        Left => "Left",
        Center => "Center",
        Right => "Right",
        Fill => "Fill",
        Justify => "Justify",
        CenterAcrossSelection => "CenterAcrossSelection",
        Distributed => "Distributed",
    }
}

keyword_enum! {
    VerticalAlignment {
        Top => "Top",
        Center => "Center",
        Bottom => "Bottom",
        Justify => "Justify",
        Distributed => "Distributed",
    }
}

keyword_enum! {
    /// Edge a border applies to; also the sort key of a border collection
    BorderPosition {
        Left => "Left",
        Top => "Top",
        Right => "Right",
        Bottom => "Bottom",
    }
}

keyword_enum! {
    LineStyle {
        Continuous => "Continuous",
        Dash => "Dash",
        Dot => "Dot",
        DashDot => "DashDot",
        DashDotDot => "DashDotDot",
        Double => "Double",
    }
}

keyword_enum! {
    Underline {
        Single => "Single",
        Double => "Double",
        SingleAccounting => "SingleAccounting",
        DoubleAccounting => "DoubleAccounting",
    }
}

keyword_enum! {
    Pattern {
        Solid => "Solid",
        Gray75 => "Gray75",
        Gray50 => "Gray50",
        Gray25 => "Gray25",
        Gray125 => "Gray125",
        Gray0625 => "Gray0625",
        HorzStripe => "HorzStripe",
        VertStripe => "VertStripe",
        ReverseDiagStripe => "ReverseDiagStripe",
        DiagStripe => "DiagStripe",
        DiagCross => "DiagCross",
        ThickDiagCross => "ThickDiagCross",
        ThinHorzStripe => "ThinHorzStripe",
        ThinVertStripe => "ThinVertStripe",
        ThinReverseDiagStripe => "ThinReverseDiagStripe",
        ThinDiagStripe => "ThinDiagStripe",
        ThinHorzCross => "ThinHorzCross",
        ThinDiagCross => "ThinDiagCross",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Alignment {
    pub horizontal: Option<HorizontalAlignment>,
    pub vertical: Option<VerticalAlignment>,
    pub wrap_text: bool,
    /// Text rotation in degrees, -90..=90
    pub rotate: i32,
    pub indent: u32,
    pub shrink_to_fit: bool,
}

impl Alignment {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Border {
    pub position: BorderPosition,
    pub line_style: LineStyle,
    /// 0 (hairline) to 3 (thick)
    pub weight: u8,
    pub color: Option<Color>,
}

impl Border {
    pub fn new(position: BorderPosition, line_style: LineStyle, weight: u8) -> Self {
        Self {
            position,
            line_style,
            weight: weight.min(3),
            color: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

/// At most one border per position, kept sorted by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Borders(Vec<Border>);

impl Borders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the border at its position
    pub fn set(&mut self, border: Border) {
        match self
            .0
            .binary_search_by(|b| b.position.cmp(&border.position))
        {
            Ok(i) => self.0[i] = border,
            Err(i) => self.0.insert(i, border),
        }
    }

    pub fn get(&self, position: BorderPosition) -> Option<&Border> {
        self.0.iter().find(|b| b.position == position)
    }

    pub fn remove(&mut self, position: BorderPosition) -> Option<Border> {
        let i = self.0.iter().position(|b| b.position == position)?;
        Some(self.0.remove(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Border> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Border> for Borders {
    fn from_iter<I: IntoIterator<Item = Border>>(iter: I) -> Self {
        let mut borders = Borders::new();
        for border in iter {
            borders.set(border);
        }
        borders
    }
}

/// Font size in hundredths of a point, so that it can be hashed and compared exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontSize(u32);

impl FontSize {
    pub fn from_points(points: f64) -> Self {
        Self((points.max(0.0) * 100.0).round() as u32)
    }

    pub fn points(&self) -> f64 {
        f64::from(self.0) / 100.0
    }

    pub fn parse(value: &str) -> Option<Self> {
        let points: f64 = value.trim().trim_end_matches("pt").parse().ok()?;
        (points.is_finite() && points > 0.0).then(|| Self::from_points(points))
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.points())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Font {
    pub name: Option<String>,
    /// Generic family (`Swiss`, `Roman`, ...)
    pub family: Option<String>,
    pub size: Option<FontSize>,
    pub bold: bool,
    pub italic: bool,
    pub underline: Option<Underline>,
    pub strike_through: bool,
    pub color: Option<Color>,
}

impl Font {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Interior {
    pub color: Option<Color>,
    pub pattern: Option<Pattern>,
    pub pattern_color: Option<Color>,
}

impl Interior {
    pub fn solid(color: Color) -> Self {
        Self {
            color: Some(color),
            pattern: Some(Pattern::Solid),
            pattern_color: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Named formats the native markup accepts in place of a format string
const NAMED_FORMATS: &[(&str, &str)] = &[
    ("General Number", "0"),
    ("Fixed", "0.00"),
    ("Standard", "#,##0.00"),
    ("Percent", "0.00%"),
    ("Scientific", "0.00E+00"),
    ("General Date", "m/d/yyyy hh:mm"),
    ("Short Date", "m/d/yyyy"),
    ("Medium Date", "dd-mmm-yy"),
    ("Long Time", "hh:mm:ss"),
    ("Medium Time", "hh:mm AM/PM"),
    ("Short Time", "hh:mm"),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumberFormat {
    pub format: String,
}

impl NumberFormat {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Format string with named formats expanded; `None` for `General`
    pub fn pattern(&self) -> Option<&str> {
        let format = self.format.trim();
        if format.is_empty() || format.eq_ignore_ascii_case("General") {
            return None;
        }
        Some(
            NAMED_FORMATS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(format))
                .map(|(_, pattern)| *pattern)
                .unwrap_or(format),
        )
    }

    /// True when the first section of the format scales by 100 (`%` outside quotes)
    pub fn is_percentage(&self) -> bool {
        let Some(pattern) = self.pattern() else {
            return false;
        };
        let mut quoted = false;
        for ch in pattern.chars() {
            match ch {
                '"' => quoted = !quoted,
                ';' if !quoted => return false,
                '%' if !quoted => return true,
                _ => {}
            }
        }
        false
    }
}

/// The content of a style: every sub-element is optional.
///
/// Two specs are equal when every sub-element is. The registry compares styles by the
/// spec they render, with the parent chain folded in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StyleSpec {
    pub alignment: Option<Alignment>,
    pub borders: Option<Borders>,
    pub font: Option<Font>,
    pub interior: Option<Interior>,
    pub number_format: Option<NumberFormat>,
}

impl StyleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn with_borders(mut self, borders: Borders) -> Self {
        self.borders = Some(borders);
        self
    }

    pub fn with_font(mut self, font: Font) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_interior(mut self, interior: Interior) -> Self {
        self.interior = Some(interior);
        self
    }

    pub fn with_number_format(mut self, format: impl Into<String>) -> Self {
        self.number_format = Some(NumberFormat::new(format));
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay every sub-element present in `other`, keeping the rest of `self`
    pub fn merged(&self, other: &StyleSpec) -> StyleSpec {
        StyleSpec {
            alignment: other.alignment.clone().or_else(|| self.alignment.clone()),
            borders: other.borders.clone().or_else(|| self.borders.clone()),
            font: other.font.clone().or_else(|| self.font.clone()),
            interior: other.interior.clone().or_else(|| self.interior.clone()),
            number_format: other
                .number_format
                .clone()
                .or_else(|| self.number_format.clone()),
        }
    }

    pub fn is_percentage(&self) -> bool {
        self.number_format
            .as_ref()
            .is_some_and(NumberFormat::is_percentage)
    }
}

/// A registry entry
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub id: StyleId,
    pub name: Option<String>,
    pub parent: Option<StyleId>,
    pub spec: StyleSpec,
}

impl Style {
    pub fn new(id: StyleId, spec: StyleSpec) -> Self {
        Self {
            id,
            name: None,
            parent: None,
            spec,
        }
    }

    pub fn is_percentage(&self) -> bool {
        self.spec.is_percentage()
    }
}

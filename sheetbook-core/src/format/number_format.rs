//! Number format strings decomposed into the attribute sets ODS data styles use
//!
//! Decomposition normalizes: `# ##0,00` and `#.##0,00` both come back as `#,##0.00`,
//! optional digits (`0.##`) count as fixed decimals, and only the first section of a
//! multi-section format is kept.

use crate::error::ConversionError;
use crate::model::NumberFormat;

/// A plain or percentage number format
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumberParts {
    pub decimal_places: u32,
    pub min_integer_digits: u32,
    pub grouping: bool,
    pub percent: bool,
}

/// One element of a date or time format
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DateToken {
    Day { long: bool },
    DayOfWeek { long: bool },
    Month { long: bool, textual: bool },
    Year { long: bool },
    Hours { long: bool },
    Minutes { long: bool },
    Seconds { long: bool },
    AmPm,
    Text(String),
}

impl DateToken {
    fn is_date_part(&self) -> bool {
        matches!(
            self,
            DateToken::Day { .. }
                | DateToken::DayOfWeek { .. }
                | DateToken::Month { .. }
                | DateToken::Year { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NumberPattern {
    Number(NumberParts),
    DateTime(Vec<DateToken>),
    /// `@`, display as entered text
    Text,
}

impl NumberPattern {
    /// A date-time pattern with no day, month or year part
    pub fn is_time_only(&self) -> bool {
        match self {
            NumberPattern::DateTime(tokens) => !tokens.iter().any(DateToken::is_date_part),
            NumberPattern::Number(_) | NumberPattern::Text => false,
        }
    }
}

/// Decompose a format; `Ok(None)` means `General` (no data style)
pub fn decompose(format: &NumberFormat) -> Result<Option<NumberPattern>, ConversionError> {
    let Some(pattern) = format.pattern() else {
        return Ok(None);
    };
    let section = first_section(pattern);
    if section.trim() == "@" {
        return Ok(Some(NumberPattern::Text));
    }
    if is_date_format(section) {
        let tokens = tokenize_date(section);
        if tokens.iter().all(|t| matches!(t, DateToken::Text(_))) {
            return Err(ConversionError::NumberFormat(format.format.clone()));
        }
        return Ok(Some(NumberPattern::DateTime(tokens)));
    }
    decompose_number(section)
        .map(|parts| Some(NumberPattern::Number(parts)))
        .ok_or_else(|| ConversionError::NumberFormat(format.format.clone()))
}

/// Canonical format string for a pattern
pub fn compose(pattern: &NumberPattern) -> String {
    match pattern {
        NumberPattern::Number(parts) => compose_number(parts),
        NumberPattern::DateTime(tokens) => compose_date(tokens),
        NumberPattern::Text => "@".to_string(),
    }
}

fn first_section(pattern: &str) -> &str {
    let mut quoted = false;
    for (i, ch) in pattern.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ';' if !quoted => return &pattern[..i],
            _ => {}
        }
    }
    pattern
}

fn is_date_format(section: &str) -> bool {
    let mut quoted = false;
    let mut bracket = false;
    let mut escaped = false;
    for ch in section.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '"' => quoted = !quoted,
            _ if quoted => {}
            '\\' => escaped = true,
            '[' => bracket = true,
            ']' => bracket = false,
            _ if bracket => {}
            'd' | 'D' | 'm' | 'M' | 'y' | 'Y' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

fn is_placeholder(ch: char) -> bool {
    matches!(ch, '0' | '#' | '?')
}

fn decompose_number(section: &str) -> Option<NumberParts> {
    let mut core = String::new();
    let mut percent = false;
    let mut quoted = false;
    let mut bracket = false;
    let mut chars = section.chars();
    while let Some(ch) = chars.next() {
        if quoted {
            quoted = ch != '"';
            continue;
        }
        if bracket {
            bracket = ch != ']';
            continue;
        }
        match ch {
            '"' => quoted = true,
            '[' => bracket = true,
            // Escaped literal, padding and fill characters take the next char with them
            '\\' | '_' | '*' => {
                chars.next();
            }
            '%' => percent = true,
            'E' | 'e' => return None,
            c if is_placeholder(c) || c == ',' || c == '.' || c == ' ' => core.push(c),
            _ => {}
        }
    }

    // A space groups digits only between two placeholders
    let raw: Vec<char> = core.chars().collect();
    let core: String = raw
        .iter()
        .enumerate()
        .filter(|(i, c)| {
            **c != ' '
                || (*i > 0
                    && raw.get(i - 1).is_some_and(|p| is_placeholder(*p))
                    && raw.get(i + 1).is_some_and(|n| is_placeholder(*n)))
        })
        .map(|(_, c)| *c)
        .collect();
    // Trailing commas scale by thousands rather than group
    let core = core.trim_end_matches(',');
    if !core.chars().any(is_placeholder) {
        return None;
    }

    let has_dot = core.contains('.');
    let has_comma = core.contains(',');
    let has_space = core.contains(' ');
    let decimal = match (has_dot, has_comma) {
        (true, true) => {
            if core.rfind('.') > core.rfind(',') {
                Some('.')
            } else {
                Some(',')
            }
        }
        (true, false) => Some('.'),
        (false, true) if has_space => Some(','),
        (false, true) => {
            let split = core.rfind(',').unwrap_or(0);
            let after = core[split + 1..].chars().filter(|c| is_placeholder(*c)).count();
            let before = core[..split].chars().any(is_placeholder);
            if after == 3 && before { None } else { Some(',') }
        }
        (false, false) => None,
    };

    let (int_part, frac_part) = match decimal.and_then(|d| core.find(d)) {
        Some(i) => (&core[..i], &core[i + 1..]),
        None => (core, ""),
    };

    Some(NumberParts {
        decimal_places: frac_part.chars().filter(|c| is_placeholder(*c)).count() as u32,
        min_integer_digits: int_part.chars().filter(|c| *c == '0').count() as u32,
        grouping: int_part.contains([',', '.', ' ']),
        percent,
    })
}

pub fn compose_number(parts: &NumberParts) -> String {
    let digits = if parts.grouping {
        parts.min_integer_digits.max(4)
    } else {
        parts.min_integer_digits.max(1)
    };

    let mut integer = Vec::new();
    for i in 0..digits {
        if parts.grouping && i > 0 && i % 3 == 0 {
            integer.push(',');
        }
        integer.push(if i < parts.min_integer_digits { '0' } else { '#' });
    }
    integer.reverse();

    let mut format: String = integer.into_iter().collect();
    if parts.decimal_places > 0 {
        format.push('.');
        format.push_str(&"0".repeat(parts.decimal_places as usize));
    }
    if parts.percent {
        format.push('%');
    }
    format
}

enum RawToken {
    Letter(char, usize),
    Hours(bool),
    Minutes(bool),
    Seconds(bool),
    AmPm,
    Text(String),
}

fn tokenize_date(section: &str) -> Vec<DateToken> {
    let chars: Vec<char> = section.chars().collect();
    let mut raw = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|c| *c == '"')
                    .map(|p| i + 1 + p)
                    .unwrap_or(chars.len());
                raw.push(RawToken::Text(chars[i + 1..end].iter().collect()));
                i = end + 1;
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    raw.push(RawToken::Text(next.to_string()));
                }
                i += 2;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                let inner: String = chars[i + 1..end.min(chars.len())].iter().collect();
                let lower = inner.to_ascii_lowercase();
                match lower.chars().next() {
                    Some('h') if lower.chars().all(|c| c == 'h') => {
                        raw.push(RawToken::Hours(lower.len() >= 2))
                    }
                    Some('m') if lower.chars().all(|c| c == 'm') => {
                        raw.push(RawToken::Minutes(lower.len() >= 2))
                    }
                    Some('s') if lower.chars().all(|c| c == 's') => {
                        raw.push(RawToken::Seconds(lower.len() >= 2))
                    }
                    // Colors and locale codes
                    _ => {}
                }
                i = end + 1;
            }
            _ if starts_with_ignore_case(&chars[i..], "AM/PM") => {
                raw.push(RawToken::AmPm);
                i += 5;
            }
            _ if starts_with_ignore_case(&chars[i..], "A/P") => {
                raw.push(RawToken::AmPm);
                i += 3;
            }
            c if matches!(c.to_ascii_lowercase(), 'd' | 'm' | 'y' | 'h' | 's') => {
                let letter = c.to_ascii_lowercase();
                let count = chars[i..]
                    .iter()
                    .take_while(|n| n.to_ascii_lowercase() == letter)
                    .count();
                raw.push(RawToken::Letter(letter, count));
                i += count;
            }
            c => {
                match raw.last_mut() {
                    Some(RawToken::Text(text)) => text.push(c),
                    _ => raw.push(RawToken::Text(c.to_string())),
                }
                i += 1;
            }
        }
    }

    resolve_tokens(raw)
}

fn starts_with_ignore_case(chars: &[char], needle: &str) -> bool {
    needle.len() <= chars.len()
        && needle
            .chars()
            .zip(chars)
            .all(|(n, c)| n.eq_ignore_ascii_case(c))
}

/// `m` means minutes right after hours or right before seconds, months otherwise
fn resolve_tokens(raw: Vec<RawToken>) -> Vec<DateToken> {
    let kinds: Vec<Option<char>> = raw
        .iter()
        .map(|t| match t {
            RawToken::Letter(l, _) => Some(*l),
            RawToken::Hours(_) => Some('h'),
            RawToken::Minutes(_) => Some('n'),
            RawToken::Seconds(_) => Some('s'),
            RawToken::AmPm => Some('a'),
            RawToken::Text(_) => None,
        })
        .collect();
    let prev_kind = |i: usize| kinds[..i].iter().rev().flatten().next().copied();
    let next_kind = |i: usize| kinds[i + 1..].iter().flatten().next().copied();

    raw.iter()
        .enumerate()
        .map(|(i, token)| match token {
            RawToken::Letter('d', n) if *n >= 3 => DateToken::DayOfWeek { long: *n >= 4 },
            RawToken::Letter('d', n) => DateToken::Day { long: *n >= 2 },
            RawToken::Letter('y', n) => DateToken::Year { long: *n > 2 },
            RawToken::Letter('h', n) => DateToken::Hours { long: *n >= 2 },
            RawToken::Letter('s', n) => DateToken::Seconds { long: *n >= 2 },
            RawToken::Letter(_, n)
                if *n <= 2 && (prev_kind(i) == Some('h') || next_kind(i) == Some('s')) =>
            {
                DateToken::Minutes { long: *n == 2 }
            }
            RawToken::Letter(_, n) => DateToken::Month {
                long: *n == 2 || *n >= 4,
                textual: *n >= 3,
            },
            RawToken::Hours(long) => DateToken::Hours { long: *long },
            RawToken::Minutes(long) => DateToken::Minutes { long: *long },
            RawToken::Seconds(long) => DateToken::Seconds { long: *long },
            RawToken::AmPm => DateToken::AmPm,
            RawToken::Text(text) => DateToken::Text(text.clone()),
        })
        .collect()
}

pub fn compose_date(tokens: &[DateToken]) -> String {
    let mut format = String::new();
    for token in tokens {
        match token {
            DateToken::Day { long } => format.push_str(if *long { "dd" } else { "d" }),
            DateToken::DayOfWeek { long } => format.push_str(if *long { "dddd" } else { "ddd" }),
            DateToken::Month { long, textual } => format.push_str(match (textual, long) {
                (true, true) => "mmmm",
                (true, false) => "mmm",
                (false, true) => "mm",
                (false, false) => "m",
            }),
            DateToken::Year { long } => format.push_str(if *long { "yyyy" } else { "yy" }),
            DateToken::Hours { long } => format.push_str(if *long { "hh" } else { "h" }),
            DateToken::Minutes { long } => format.push_str(if *long { "mm" } else { "m" }),
            DateToken::Seconds { long } => format.push_str(if *long { "ss" } else { "s" }),
            DateToken::AmPm => format.push_str("AM/PM"),
            DateToken::Text(text) => {
                if text.chars().all(|c| matches!(c, '/' | '-' | ':' | '.' | ',' | ' ')) {
                    format.push_str(text);
                } else {
                    format.push('"');
                    format.push_str(text);
                    format.push('"');
                }
            }
        }
    }
    format
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(format: &str) -> NumberParts {
        match decompose(&NumberFormat::new(format)).unwrap() {
            Some(NumberPattern::Number(parts)) => parts,
            other => panic!("expected number pattern for {format}, got {other:?}"),
        }
    }

    #[test]
    fn test_decompose_common_formats() {
        let p = parts("#,##0.00");
        assert_eq!(
            p,
            NumberParts {
                decimal_places: 2,
                min_integer_digits: 1,
                grouping: true,
                percent: false
            }
        );
        let p = parts("0.00%");
        assert!(p.percent);
        assert_eq!(p.decimal_places, 2);
        assert!(!p.grouping);
        assert_eq!(parts("0").decimal_places, 0);
        assert_eq!(parts("Percent"), parts("0.00%"));
    }

    #[test]
    fn test_locale_separators_normalize() {
        assert_eq!(compose_number(&parts("# ##0,00")), "#,##0.00");
        assert_eq!(compose_number(&parts("#.##0,00%")), "#,##0.00%");
        assert_eq!(compose_number(&parts("0,00")), "0.00");
        assert_eq!(compose_number(&parts("#,##0")), "#,##0");
    }

    #[test]
    fn test_literals_ignored() {
        let p = parts("\"EUR \"#,##0.00;[Red]-#,##0.00");
        assert!(p.grouping);
        assert_eq!(p.decimal_places, 2);
        assert!(!parts("0.0\"%\"").percent);
    }

    #[test]
    fn test_general_and_unsupported() {
        assert_eq!(decompose(&NumberFormat::new("General")).unwrap(), None);
        assert!(decompose(&NumberFormat::new("0.00E+00")).is_err());
        assert!(decompose(&NumberFormat::new("#")).is_ok());
        assert!(decompose(&NumberFormat::new("\"n/a\"")).is_err());
        assert_eq!(
            decompose(&NumberFormat::new("@")).unwrap(),
            Some(NumberPattern::Text)
        );
    }

    #[test]
    fn test_compose_number_shapes() {
        let p = |d, m, g, pc| NumberParts {
            decimal_places: d,
            min_integer_digits: m,
            grouping: g,
            percent: pc,
        };
        assert_eq!(compose_number(&p(0, 1, false, false)), "0");
        assert_eq!(compose_number(&p(2, 1, false, true)), "0.00%");
        assert_eq!(compose_number(&p(0, 0, true, false)), "#,###");
        assert_eq!(compose_number(&p(1, 4, true, false)), "0,000.0");
    }

    #[test]
    fn test_date_tokens() {
        let pattern = decompose(&NumberFormat::new("dd/mm/yyyy hh:mm:ss")).unwrap();
        let Some(NumberPattern::DateTime(tokens)) = pattern else {
            panic!("expected date pattern");
        };
        assert_eq!(tokens[0], DateToken::Day { long: true });
        assert_eq!(tokens[2], DateToken::Month { long: true, textual: false });
        assert_eq!(tokens[4], DateToken::Year { long: true });
        assert_eq!(tokens[6], DateToken::Hours { long: true });
        assert_eq!(tokens[8], DateToken::Minutes { long: true });
        assert_eq!(compose_date(&tokens), "dd/mm/yyyy hh:mm:ss");
    }

    #[test]
    fn test_named_date_and_time() {
        let medium = decompose(&NumberFormat::new("Medium Date")).unwrap().unwrap();
        assert_eq!(compose(&medium), "dd-mmm-yy");
        assert!(!medium.is_time_only());

        let time = decompose(&NumberFormat::new("h:mm AM/PM")).unwrap().unwrap();
        assert!(time.is_time_only());
        assert_eq!(compose(&time), "h:mm AM/PM");
    }

    #[test]
    fn test_quoted_date_literal() {
        let pattern = decompose(&NumberFormat::new("yyyy\"年\"m\"月\"")).unwrap().unwrap();
        assert_eq!(compose(&pattern), "yyyy\"年\"m\"月\"");
    }
}

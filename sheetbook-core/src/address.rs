//! Cell positions and translation between `A1` and `R1C1` formula references
//!
//! Formulas are stored in the model with absolute-numbered `R{row}C{col}` references; a `$`
//! before a row or column number marks that part as absolute in A1 form (`$B2` is `R2C$2`). Only
//! whole reference tokens are rewritten: text inside string literals and quoted sheet names,
//! tokens glued to an identifier (`LOG10`, `SHEET1`) and function names (`F1(`) are left alone.

use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

/// Last addressable row (1-based)
pub const MAX_ROWS: u32 = 65_535;
/// Last addressable column (1-based)
pub const MAX_COLUMNS: u32 = 256;

/// A 1-based cell position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellPos {
    pub row: u32,
    pub col: u32,
}

impl CellPos {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an `A1`-style reference; `$` markers are accepted and dropped
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        let letters_end = reference
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphabetic() || *c == '$'))
            .map(|(i, _)| i)?;
        let letters: String = reference[..letters_end]
            .chars()
            .filter(|c| *c != '$')
            .collect();
        let digits = reference[letters_end..].trim_start_matches('$');
        if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let col = column_number(&letters)?;
        let row = digits.parse::<u32>().ok()?;
        let pos = Self::new(row, col);
        pos.is_valid().then_some(pos)
    }

    pub fn is_valid(&self) -> bool {
        is_valid_address(self.row, self.col)
    }

    pub fn to_a1(&self) -> String {
        format!("{}{}", column_letters(self.col), self.row)
    }

    pub fn to_r1c1(&self) -> String {
        format!("R{}C{}", self.row, self.col)
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

pub fn is_valid_address(row: u32, col: u32) -> bool {
    (1..=MAX_ROWS).contains(&row) && (1..=MAX_COLUMNS).contains(&col)
}

/// Column letters for a 1-based column number (`1` -> `A`, `27` -> `AA`)
pub fn column_letters(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// 1-based column number for column letters, `None` past column 256
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 2 {
        return None;
    }
    let mut col = 0u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    (col <= MAX_COLUMNS).then_some(col)
}

fn a1_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\$?)([A-Z]{1,2})(\$?)([0-9]{1,5})").unwrap())
}

fn r1c1_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"R(\[-?[0-9]+\]|\$?[0-9]{1,5})?C(\[-?[0-9]+\]|\$?[0-9]{1,3})?").unwrap()
    })
}

/// Byte spans of `"string literals"` and `'quoted sheet names'`
pub(crate) fn quoted_spans(formula: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<(usize, char)> = None;
    for (i, ch) in formula.char_indices() {
        match open {
            Some((start, quote)) if ch == quote => {
                spans.push((start, i + 1));
                open = None;
            }
            Some(_) => {}
            None if ch == '"' || ch == '\'' => open = Some((i, ch)),
            None => {}
        }
    }
    // An unterminated literal runs to the end
    if let Some((start, _)) = open {
        spans.push((start, formula.len()));
    }
    spans
}

pub(crate) fn in_spans(spans: &[(usize, usize)], offset: usize) -> bool {
    spans.iter().any(|(start, end)| (*start..*end).contains(&offset))
}

/// True when `formula[start..end]` stands alone as a reference token
pub(crate) fn is_bare_token(formula: &str, start: usize, end: usize) -> bool {
    if let Some(prev) = formula[..start].chars().next_back() {
        if prev.is_ascii_alphanumeric() || prev == '_' {
            return false;
        }
    }

    let mut rest = formula[end..].chars();
    match rest.next() {
        Some(next) if next.is_ascii_alphanumeric() || next == '_' || next == '(' => false,
        // `Q1!A1` names a sheet, not a cell
        Some('!') => false,
        Some('.') => !matches!(rest.next(), Some(c) if c.is_ascii_alphabetic() || c == '$'),
        _ => true,
    }
}

/// Rewrite every bare reference token matched by `pattern`; `replace` returning `None` keeps
/// the token unchanged.
pub(crate) fn rewrite_tokens<F>(formula: &str, pattern: &Regex, mut replace: F) -> String
where
    F: FnMut(&Captures<'_>) -> Option<String>,
{
    let quoted = quoted_spans(formula);
    let mut out = String::with_capacity(formula.len() + 8);
    let mut last = 0;

    for caps in pattern.captures_iter(formula) {
        let Some(m) = caps.get(0) else { continue };
        if in_spans(&quoted, m.start()) || !is_bare_token(formula, m.start(), m.end()) {
            continue;
        }
        if let Some(replacement) = replace(&caps) {
            out.push_str(&formula[last..m.start()]);
            out.push_str(&replacement);
            last = m.end();
        }
    }

    out.push_str(&formula[last..]);
    out
}

/// Rewrite `A1` references to absolute-numbered `R1C1` form.
///
/// The origin only labels trace output: the stored form is absolute so that it does not
/// change when the cell moves.
pub fn to_relative(formula: &str, origin_row: u32, origin_col: u32) -> String {
    let converted = rewrite_tokens(formula, a1_pattern(), |caps| {
        let col = column_number(&caps[2])?;
        let row = caps[4].parse::<u32>().ok()?;
        is_valid_address(row, col).then(|| format!("R{}{}C{}{}", &caps[3], row, &caps[1], col))
    });
    if converted != formula {
        tracing::trace!(origin = %CellPos::new(origin_row, origin_col), from = formula, to = %converted, "formula to R1C1");
    }
    converted
}

/// Rewrite absolute-numbered `R1C1` references to `A1` form; bracketed offsets stay as they are.
pub fn to_absolute(formula: &str) -> String {
    rewrite_tokens(formula, r1c1_pattern(), |caps| {
        let row = numbered_component(caps.get(1)?.as_str())?;
        let col = numbered_component(caps.get(2)?.as_str())?;
        is_valid_address(row.0, col.0).then(|| a1_text(row, col))
    })
}

/// Resolve every `R1C1` form (`R[-1]C[2]`, `RC`, `R3C`, `R2C5`) against the cell at
/// `(row, col)` and rewrite it to `A1` form.
pub fn to_absolute_at(formula: &str, row: u32, col: u32) -> String {
    rewrite_tokens(formula, r1c1_pattern(), |caps| {
        let r = resolve_component(caps.get(1).map(|m| m.as_str()), row)?;
        let c = resolve_component(caps.get(2).map(|m| m.as_str()), col)?;
        is_valid_address(r.0, c.0).then(|| a1_text(r, c))
    })
}

/// A numbered row or column part (`5`, `$5`) with its absolute flag
fn numbered_component(text: &str) -> Option<(u32, bool)> {
    let absolute = text.starts_with('$');
    let number = text.trim_start_matches('$').parse::<u32>().ok()?;
    Some((number, absolute))
}

fn resolve_component(component: Option<&str>, origin: u32) -> Option<(u32, bool)> {
    match component {
        None => Some((origin, false)),
        Some(text) if text.starts_with('[') => {
            let offset = text.trim_start_matches('[').trim_end_matches(']');
            let offset = offset.parse::<i64>().ok()?;
            let index = u32::try_from(i64::from(origin) + offset).ok()?;
            Some((index, false))
        }
        Some(text) => numbered_component(text),
    }
}

fn a1_text((row, row_absolute): (u32, bool), (col, col_absolute): (u32, bool)) -> String {
    let marker = |absolute: bool| if absolute { "$" } else { "" };
    format!(
        "{}{}{}{}",
        marker(col_absolute),
        column_letters(col),
        marker(row_absolute),
        row
    )
}

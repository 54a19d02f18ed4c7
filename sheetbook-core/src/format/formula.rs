//! OpenFormula (`of:=SUM([.A1:.A2])`) ⇄ A1 formula text (`=SUM(A1:A2)`)

use regex::Regex;
use std::sync::OnceLock;

static A1_REFERENCE: OnceLock<Regex> = OnceLock::new();

const ODS_NAMESPACE: &str = "of:";

/// Byte spans of double-quoted string literals
fn string_spans(formula: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, ch) in formula.char_indices() {
        if ch == '"' {
            match start.take() {
                Some(s) => spans.push((s, i + 1)),
                None => start = Some(i),
            }
        }
    }
    if let Some(s) = start {
        spans.push((s, formula.len()));
    }
    spans
}

fn inside(spans: &[(usize, usize)], offset: usize) -> bool {
    spans.iter().any(|(s, e)| (*s..*e).contains(&offset))
}

/// Split a bracketed reference part into optional sheet and address
fn split_part(part: &str) -> (Option<&str>, &str) {
    let mut quoted = false;
    let mut dot = None;
    for (i, ch) in part.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '.' if !quoted => dot = Some(i),
            _ => {}
        }
    }
    match dot {
        Some(0) => (None, &part[1..]),
        Some(i) => (Some(part[..i].trim_start_matches('$')), &part[i + 1..]),
        None => (None, part),
    }
}

fn bracket_to_a1(inner: &str) -> String {
    let mut parts = inner.splitn(2, ':');
    let first = parts.next().unwrap_or_default();
    let (sheet, address) = split_part(first);
    let mut out = match sheet {
        Some(sheet) => format!("{}!{}", sheet, address),
        None => address.to_string(),
    };
    if let Some(second) = parts.next() {
        let (second_sheet, second_address) = split_part(second);
        out.push(':');
        match second_sheet {
            Some(s) if Some(s) != sheet => {
                out.push_str(s);
                out.push('!');
            }
            _ => {}
        }
        out.push_str(second_address);
    }
    out
}

/// Translate a stored ODS formula into A1 text starting with `=`
pub fn ods_to_a1(formula: &str) -> String {
    let body = match formula.find('=') {
        Some(eq) if formula[..eq].ends_with(':') => &formula[eq..],
        _ => formula,
    };

    let mut out = String::with_capacity(body.len());
    let mut chars = body.char_indices().peekable();
    let mut in_string = false;
    while let Some((i, ch)) = chars.next() {
        if in_string {
            out.push(ch);
            in_string = ch != '"';
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '[' => match body[i..].find(']') {
                Some(close) => {
                    out.push_str(&bracket_to_a1(&body[i + 1..i + close]));
                    while chars.peek().is_some_and(|(j, _)| *j <= i + close) {
                        chars.next();
                    }
                }
                None => out.push(ch),
            },
            ';' => out.push(','),
            _ => out.push(ch),
        }
    }

    if !out.starts_with('=') {
        out.insert(0, '=');
    }
    out
}

fn ods_part(sheet: Option<&str>, address: &str) -> String {
    match sheet {
        Some(sheet) => format!("{}.{}", sheet, address),
        None => format!(".{}", address),
    }
}

/// Translate A1 formula text into a namespaced OpenFormula string
pub fn a1_to_ods(formula: &str) -> String {
    let pattern = A1_REFERENCE.get_or_init(|| {
        Regex::new(
            r"(?:('[^']+'|[A-Za-z_][A-Za-z0-9_]*)!)?(\$?[A-Z]{1,2}\$?[0-9]{1,5})(?::(\$?[A-Z]{1,2}\$?[0-9]{1,5}))?",
        )
        .unwrap()
    });
    let body = formula.strip_prefix('=').unwrap_or(formula);
    let strings = string_spans(body);

    let mut converted = String::with_capacity(body.len() + 16);
    let mut last = 0;
    for caps in pattern.captures_iter(body) {
        let Some(m) = caps.get(0) else { continue };
        if inside(&strings, m.start()) {
            continue;
        }
        let before = body[..m.start()].chars().next_back();
        let after = body[m.end()..].chars().next();
        if before.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
            || after.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '(' || c == '!')
        {
            continue;
        }

        let sheet = caps.get(1).map(|s| s.as_str());
        let mut reference = format!("[{}", ods_part(sheet, &caps[2]));
        if let Some(end) = caps.get(3) {
            reference.push(':');
            reference.push_str(&ods_part(None, end.as_str()));
        }
        reference.push(']');

        converted.push_str(&body[last..m.start()]);
        converted.push_str(&reference);
        last = m.end();
    }
    converted.push_str(&body[last..]);

    // Argument separators, outside string literals
    let strings = string_spans(&converted);
    let separated: String = converted
        .char_indices()
        .map(|(i, ch)| if ch == ',' && !inside(&strings, i) { ';' } else { ch })
        .collect();

    format!("{}={}", ODS_NAMESPACE, separated)
}

//! Diagnostic records for anomalies recovered during load and save

use crate::address::CellPos;
use std::cmp::Ordering;
use std::fmt;

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
}

/// What kind of anomaly was recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    /// A border, number format, paper size or length could not be translated
    FormatConversion,
    /// A `StyleID` referenced a style that does not exist; `Default` was used
    StyleNotFound,
    /// A repeat count exceeded the configured safety cap and was truncated
    RepeatLimitExceeded,
    /// The source file was missing or unreadable
    FileAccess,
    /// Explicit percentage type and style number format disagree
    PercentageMismatch,
    /// Content beyond the 65,535 x 256 grid was dropped
    AddressOutOfRange,
    /// An element or attribute the codec does not understand was skipped
    UnknownElement,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::FormatConversion => "format-conversion",
            DiagnosticKind::StyleNotFound => "style-not-found",
            DiagnosticKind::RepeatLimitExceeded => "repeat-limit-exceeded",
            DiagnosticKind::FileAccess => "file-access",
            DiagnosticKind::PercentageMismatch => "percentage-mismatch",
            DiagnosticKind::AddressOutOfRange => "address-out-of-range",
            DiagnosticKind::UnknownElement => "unknown-element",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope of a diagnostic (book, sheet, or cell level)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticScope {
    Book,
    Sheet(String),
    Cell(String, CellPos),
}

impl DiagnosticScope {
    /// Get the sheet name if this is a sheet or cell scope
    pub fn sheet_name(&self) -> Option<&str> {
        match self {
            DiagnosticScope::Book => None,
            DiagnosticScope::Sheet(name) => Some(name),
            DiagnosticScope::Cell(name, _) => Some(name),
        }
    }
}

impl PartialOrd for DiagnosticScope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DiagnosticScope {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DiagnosticScope::Book, DiagnosticScope::Book) => Ordering::Equal,
            (DiagnosticScope::Book, _) => Ordering::Less,
            (_, DiagnosticScope::Book) => Ordering::Greater,
            (DiagnosticScope::Sheet(a), DiagnosticScope::Sheet(b)) => a.cmp(b),
            (DiagnosticScope::Sheet(_), DiagnosticScope::Cell(_, _)) => Ordering::Less,
            (DiagnosticScope::Cell(_, _), DiagnosticScope::Sheet(_)) => Ordering::Greater,
            (DiagnosticScope::Cell(sheet_a, cell_a), DiagnosticScope::Cell(sheet_b, cell_b)) => {
                sheet_a.cmp(sheet_b).then_with(|| cell_a.cmp(cell_b))
            }
        }
    }
}

impl fmt::Display for DiagnosticScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticScope::Book => f.write_str("workbook"),
            DiagnosticScope::Sheet(name) => write!(f, "'{}'", name),
            DiagnosticScope::Cell(name, pos) => write!(f, "'{}'!{}", name, pos),
        }
    }
}

/// A recovered anomaly with the fallback that was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub scope: DiagnosticScope,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        scope: DiagnosticScope,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            kind,
            scope,
            message: message.into(),
            severity,
        }
    }
}

impl PartialOrd for Diagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Diagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scope
            .cmp(&other.scope)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.scope, self.message)
    }
}

/// Collector used by the readers and writers; every record is also logged.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, kind: DiagnosticKind, scope: DiagnosticScope, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(kind, scope, message, Severity::Warning);
        tracing::warn!(kind = %diagnostic.kind, scope = %diagnostic.scope, "{}", diagnostic.message);
        self.records.push(diagnostic);
    }

    pub fn info(&mut self, kind: DiagnosticKind, scope: DiagnosticScope, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(kind, scope, message, Severity::Info);
        tracing::debug!(kind = %diagnostic.kind, scope = %diagnostic.scope, "{}", diagnostic.message);
        self.records.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter().filter(move |d| d.kind == kind)
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.records.extend(other.records);
    }

    pub fn into_vec(mut self) -> Vec<Diagnostic> {
        self.records.sort();
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_ordering() {
        let book = DiagnosticScope::Book;
        let sheet = DiagnosticScope::Sheet("Sheet1".to_string());
        let cell = DiagnosticScope::Cell("Sheet1".to_string(), CellPos::new(2, 3));
        let earlier_cell = DiagnosticScope::Cell("Sheet1".to_string(), CellPos::new(1, 9));

        assert!(book < sheet);
        assert!(sheet < cell);
        assert!(earlier_cell < cell);
        assert_eq!(cell.sheet_name(), Some("Sheet1"));
        assert_eq!(book.sheet_name(), None);
    }

    #[test]
    fn test_collector_sorts_on_drain() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(
            DiagnosticKind::FormatConversion,
            DiagnosticScope::Sheet("B".to_string()),
            "late",
        );
        diagnostics.warn(DiagnosticKind::FileAccess, DiagnosticScope::Book, "early");

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::FileAccess).count(), 1);

        let records = diagnostics.into_vec();
        assert_eq!(records[0].message, "early");
        assert_eq!(records[1].to_string(), "[format-conversion] 'B': late");
    }
}

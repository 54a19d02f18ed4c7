//! Translation helpers shared by the readers and writers

pub mod border;
pub mod formula;
pub mod number_format;
pub mod page;

use anyhow::Result;
use std::fmt;
use std::path::Path;

/// Date part of a time-only `DateTime` value, as Excel writes it
pub(crate) const TIME_EPOCH: &str = "1899-12-31";

/// On-disk formats the codec handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// SpreadsheetML 2003 XML
    Markup,
    /// OpenDocument spreadsheet package
    Ods,
}

impl FileFormat {
    /// Chosen by extension: `.ods` is a package, anything else is markup
    pub fn from_path(path: &Path) -> Self {
        let is_ods = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("ods"))
            .unwrap_or(false);
        if is_ods {
            FileFormat::Ods
        } else {
            FileFormat::Markup
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Markup => f.write_str("SpreadsheetML"),
            FileFormat::Ods => f.write_str("ODS"),
        }
    }
}

/// Phases of a load; styles must be resolved before any worksheet references them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadState {
    Idle,
    ReadingStyles,
    ReadingWorksheets,
    Built,
}

/// Phases of a save; the package is written only once both parts are complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriteState {
    Idle,
    EmittingStyles,
    EmittingWorksheets,
    Flushed,
}

/// Move `state` to `next`, which must be the immediately following phase
pub(crate) fn advance<S>(state: &mut S, next: S, order: &[S]) -> Result<()>
where
    S: Copy + PartialEq + fmt::Debug,
{
    let current = order.iter().position(|s| s == state);
    let target = order.iter().position(|s| *s == next);
    match (current, target) {
        (Some(c), Some(t)) if t == c + 1 => {
            tracing::trace!(from = ?state, to = ?next, "codec phase");
            *state = next;
            Ok(())
        }
        _ => anyhow::bail!("invalid codec transition {:?} -> {:?}", state, next),
    }
}

pub(crate) const READ_ORDER: [ReadState; 4] = [
    ReadState::Idle,
    ReadState::ReadingStyles,
    ReadState::ReadingWorksheets,
    ReadState::Built,
];

pub(crate) const WRITE_ORDER: [WriteState; 4] = [
    WriteState::Idle,
    WriteState::EmittingStyles,
    WriteState::EmittingWorksheets,
    WriteState::Flushed,
];

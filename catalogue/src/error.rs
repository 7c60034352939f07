//! Error types for catalogue operations: container format, section capacity,
//! and the selftest diagnostic. Mirrors the manual `Display`-enum style of
//! `reedbase::error::ReedError` rather than a derive-macro error crate.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// The structured diagnostic a failed selftest assertion carries (§7):
/// line, function, expected vs. encountered, and the offending input.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SelftestDiagnostic {
    pub line: u32,
    pub function: &'static str,
    pub expected: String,
    pub encountered: String,
    pub input: String,
}

#[derive(Debug, Clone)]
pub enum Error {
    /// Container header magic/version/slots mismatch at open time.
    FormatMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },
    /// A section's element count would exceed its allocated capacity.
    SectionOverflow {
        section: &'static str,
        capacity: u32,
        attempted: u32,
    },
    /// An operation needs a section the container does not carry.
    MissingSection { section: &'static str },
    /// Depreciation would leave a KEY-flagged signature with no member.
    SignatureCollapse { sid: u32, name: String },
    /// Encountered progress exceeded the precomputed ceiling. Non-fatal.
    ProgressOverrun { encountered: u64, ceiling: u64 },
    /// A `#[cfg(test)]`/`selftest` assertion failed.
    Selftest(SelftestDiagnostic),
    /// Underlying tree-crate error surfaced through a catalogue operation.
    Tree(tree::Error),
    /// I/O failure reading or writing the container file.
    Io(String),
    /// `bincode` (de)serialisation failure on a container section.
    Encoding(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FormatMismatch { field, expected, found } => write!(
                f,
                "container format mismatch on {}: expected {}, found {}",
                field, expected, found
            ),
            Error::SectionOverflow { section, capacity, attempted } => write!(
                f,
                "section '{}' overflowed: capacity {}, attempted {}; re-run with a larger --max-{}",
                section, capacity, attempted, section
            ),
            Error::MissingSection { section } => {
                write!(f, "operation requires section '{}', which this container does not carry", section)
            }
            Error::SignatureCollapse { sid, name } => write!(
                f,
                "depreciation would leave signature {} ('{}') with no member",
                sid, name
            ),
            Error::ProgressOverrun { encountered, ceiling } => write!(
                f,
                "progress {} exceeded precomputed ceiling {} (stale metrics, not necessarily a bug)",
                encountered, ceiling
            ),
            Error::Selftest(d) => write!(
                f,
                "selftest assertion failed at {}:{}: expected {}, encountered {} (input: {})",
                d.function, d.line, d.expected, d.encountered, d.input
            ),
            Error::Tree(e) => write!(f, "{}", e),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Encoding(msg) => write!(f, "encoding error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<tree::Error> for Error {
    fn from(e: tree::Error) -> Self {
        Error::Tree(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

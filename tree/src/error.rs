// Error types for the canonical tree engine (transform table, tiny tree,
// normaliser, name grammar). Modelled on `p4::error`: small structs with a
// position, a message and a manual `Display`, rather than a single catch-all
// enum, so callers can match on the specific failure they care about.

use std::fmt;

/// A malformed postfix tree name or transform name.
///
/// Parsing is never speculative: the grammar is rejected at the first
/// offending token, because the input is untrusted and ambiguity must not
/// silently succeed (spec §7, "Parse error").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset of the offending character in the name.
    pub at: usize,
    /// Offending character, if any (absent on premature end-of-string).
    pub found: Option<char>,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.found {
            Some(c) => write!(
                f,
                "parse error at offset {}: {} (found '{}')",
                self.at, self.message, c
            ),
            None => write!(f, "parse error at offset {}: {}", self.at, self.message),
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub(crate) fn new(at: usize, found: Option<char>, message: impl Into<String>) -> Self {
        Self {
            at,
            found,
            message: message.into(),
        }
    }
}

/// A tiny tree ran out of node capacity while decoding or normalising.
///
/// This can legitimately happen on untrusted input (a name claiming more
/// internal nodes than the tree's fixed capacity `NUMNODES`), so it is a
/// recoverable `Result`, not a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityError {
    pub capacity: usize,
    pub message: String,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capacity exceeded ({}): {}", self.capacity, self.message)
    }
}

impl std::error::Error for CapacityError {}

/// A malformed or out-of-range transform (skin) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    pub name: String,
    pub message: String,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid transform '{}': {}", self.name, self.message)
    }
}

impl std::error::Error for TransformError {}

/// Union of everything this crate's public API can fail with.
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Capacity(CapacityError),
    Transform(TransformError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => e.fmt(f),
            Error::Capacity(e) => e.fmt(f),
            Error::Transform(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<CapacityError> for Error {
    fn from(e: CapacityError) -> Self {
        Error::Capacity(e)
    }
}

impl From<TransformError> for Error {
    fn from(e: TransformError) -> Self {
        Error::Transform(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

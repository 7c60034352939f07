//! Dimensioning constants shared by every module in this crate.
//!
//! `MAXSLOTS` is the single compile-time knob the rest of the system is
//! built around: the transform table, the tiny tree node capacity, the
//! footprint width and the generator templates all derive from it.

/// Number of variable slots. Slot 0 is always the constant `false`; slots
/// `1..=MAXSLOTS` are the placeholder variables `a..i` in canonical order.
pub const MAXSLOTS: usize = 9;

/// Top bit of a 32-bit node reference: "negate the result of the referenced
/// node". No other bits carry meaning.
pub const IBIT: u32 = 0x8000_0000;

/// First index in a tree holding a placeholder variable (index 0 is the
/// constant false).
pub const KSTART: u32 = 1;

/// First index in a tree holding an internal (Q,T,F) node.
pub const NSTART: u32 = KSTART + MAXSLOTS as u32;

/// Maximum number of internal nodes a tiny tree can hold. Twice `MAXSLOTS`
/// to leave headroom for `QnTF` expansion of the `QTF` primitive.
pub const NUMNODES: usize = MAXSLOTS * 2;

/// One past the last valid node index in a tiny tree.
pub const NEND: u32 = NSTART + NUMNODES as u32;

/// Number of Boolean assignments of `MAXSLOTS` variables; the width of a
/// footprint in bits.
pub const FOOTPRINT_BITS: usize = 1 << MAXSLOTS;

/// Footprint storage width in 64-bit words.
pub const FOOTPRINT_WORDS: usize = FOOTPRINT_BITS / 64;

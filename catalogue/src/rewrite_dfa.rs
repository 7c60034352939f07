//! Rewrite DFA compiler (§4.F): for every legal `(Q, T, F)` triplet over a
//! small alphabet of slot indices and three subtree placeholders, record the
//! smallest/earliest canonical rewrite in a dense state table.
//!
//! The original walks a literal DFA of 32-bit cells; here the table is
//! modelled as a flat `Vec<Cell>` indexed by the packed triplet directly
//! (the alphabet is small enough — `3 slots + 3 subtree refs` per position,
//! one invert bit on `T` — that a direct array beats building an actual
//! trie of blocks, while preserving the "one verdict per legal triplet,
//! collisions must agree" contract from §4.F).

use serde::{Deserialize, Serialize};

use tree::consts::IBIT;
use tree::node::TinyTree;

use crate::error::{Error, Result};

/// Number of distinct symbols a single `Q`/`T`/`F` slot can take: three
/// local placeholders plus three subtree references (`Q`, `T`, `F` of the
/// enclosing call).
pub const ALPHABET_SIZE: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// No smaller rewrite exists; the input triplet is already canonical.
    Found,
    /// Collapses to one of the alphabet symbols (with the given invert bit).
    Collapse { symbol: u32, inverted: bool },
    /// Replace with the tree at this index in the compiler's side table,
    /// saving `power` nodes relative to the naive expansion.
    Rewrite { tree_index: u32, power: u8 },
}

fn pack(q: u32, t: u32, t_inverted: bool, f: u32) -> u32 {
    debug_assert!(q < ALPHABET_SIZE && t < ALPHABET_SIZE && f < ALPHABET_SIZE);
    q | (t << 3) | ((t_inverted as u32) << 6) | (f << 7)
}

/// Packed-triplet replacement tree, stored as a 64-bit postfix-name-style
/// encoding: this specification doesn't require the "destructive" feature
/// flag (§9 open question), so the side table is allocated but only ever
/// holds the sentinel `0` unless a rewrite is actually compiled.
const SENTINEL_REPLACEMENT: u64 = 0;

#[derive(Serialize, Deserialize)]
pub struct RewriteTable {
    cells: Vec<Option<Verdict>>,
    /// Owner (the iteration ordinal of the triplet that first wrote a cell),
    /// used to assert that colliding writes agree (§4.F "this is an
    /// assertion, not a policy").
    owner: Vec<Option<u64>>,
    replacements: Vec<u64>,
}

impl RewriteTable {
    fn cell_count() -> usize {
        (ALPHABET_SIZE * ALPHABET_SIZE * 2 * ALPHABET_SIZE) as usize
    }

    pub fn new() -> Self {
        let n = Self::cell_count();
        Self {
            cells: vec![None; n],
            owner: vec![None; n],
            replacements: vec![SENTINEL_REPLACEMENT],
        }
    }

    /// Records `verdict` for the given triplet, discovered at iteration
    /// `progress`. A second write to the same cell must agree with the
    /// first; disagreement is a compiler bug, not a legitimate collision.
    pub fn record(&mut self, q: u32, t: u32, t_inverted: bool, f: u32, progress: u64, verdict: Verdict) -> Result<()> {
        let idx = pack(q, t, t_inverted, f) as usize;
        if let Some(existing) = self.cells[idx] {
            if existing != verdict {
                return Err(Error::FormatMismatch {
                    field: "rewrite_dfa_cell",
                    expected: format!("{:?}", existing),
                    found: format!("{:?}", verdict),
                });
            }
            return Ok(());
        }
        self.cells[idx] = Some(verdict);
        self.owner[idx] = Some(progress);
        Ok(())
    }

    pub fn lookup(&self, q: u32, t: u32, t_inverted: bool, f: u32) -> Option<Verdict> {
        self.cells[pack(q, t, t_inverted, f) as usize]
    }

    pub fn len_recorded(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

impl Default for RewriteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiles verdicts for every legal triplet by constructing the canonical
/// tree for each and checking whether `add_normalised` collapses it (a
/// `Found` verdict if the input was already minimal, a `Collapse` verdict
/// if it reduces to a bare endpoint).
pub fn compile(pure: bool) -> Result<RewriteTable> {
    let mut table = RewriteTable::new();
    let mut progress = 0u64;
    for q in 0..ALPHABET_SIZE {
        for t in 0..ALPHABET_SIZE {
            for &t_inverted in &[false, true] {
                if pure && !t_inverted {
                    continue;
                }
                for f in 0..ALPHABET_SIZE {
                    if q == t && !t_inverted {
                        continue; // Q == T (uninverted) is never legal input
                    }
                    let mut tree = TinyTree::new(pure);
                    let qr = q + 1; // leave 0 reserved for "false"
                    let tr = t + 1;
                    let fr = f + 1;
                    let t_ref = if t_inverted { tr | IBIT } else { tr };
                    let verdict = match tree.add_normalised(qr, t_ref, fr) {
                        Ok(result) if result == qr || result == tr || result == fr || result == 0 => {
                            let (symbol, inverted) = if result & !IBIT == qr {
                                (q, result & IBIT != 0)
                            } else if result & !IBIT == tr {
                                (t, result & IBIT != 0)
                            } else if result & !IBIT == fr {
                                (f, result & IBIT != 0)
                            } else {
                                (0, result & IBIT != 0)
                            };
                            Verdict::Collapse { symbol, inverted }
                        }
                        Ok(_) => Verdict::Found,
                        Err(_) => continue,
                    };
                    table.record(q, t, t_inverted, f, progress, verdict)?;
                    progress += 1;
                }
            }
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiling_records_a_verdict_for_every_legal_triplet() {
        let table = compile(false).unwrap();
        assert!(table.len_recorded() > 0);
    }

    #[test]
    fn recompiling_is_idempotent() {
        let a = compile(false).unwrap();
        let b = compile(false).unwrap();
        assert_eq!(a.len_recorded(), b.len_recorded());
    }

    #[test]
    fn colliding_writes_with_different_verdicts_are_rejected() {
        let mut table = RewriteTable::new();
        table.record(0, 1, false, 2, 0, Verdict::Found).unwrap();
        let err = table.record(0, 1, false, 2, 1, Verdict::Collapse { symbol: 0, inverted: false });
        assert!(err.is_err());
    }
}

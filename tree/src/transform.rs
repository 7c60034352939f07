//! Component A — the transform table.
//!
//! Enumerates every permutation of `MAXSLOTS` letters and provides two
//! lookups: `tid -> permutation` (forward/reverse, O(1) array index) and
//! `name -> tid` (a deterministic finite automaton of fixed-width blocks,
//! O(name length)).

use std::collections::HashMap;

use crate::consts::MAXSLOTS;
use crate::error::{Result, TransformError};

/// A permutation of the `MAXSLOTS` slots, one slot index per position.
pub type Perm = [u8; MAXSLOTS];

const NO_EDGE: u32 = u32::MAX;
const TERMINAL_FLAG: u32 = 0x8000_0000;

/// One node of the name-lookup automaton. `next[k]` is either `NO_EDGE`, a
/// block index (another automaton node), or a `TERMINAL_FLAG`-tagged tid —
/// the latter meaning the remaining letters of the permutation are already
/// fully determined by the path taken so far, so no further block is
/// needed. `terminal` is the tid reached by always following the
/// lowest-letter outgoing edge, i.e. the lexicographically smallest
/// completion of this prefix; it is what a name shorter than `MAXSLOTS`
/// resolves to.
#[derive(Debug, Clone, Copy)]
struct Block {
    next: [u32; MAXSLOTS],
    terminal: u32,
}

fn pack(perm: &Perm) -> u64 {
    let mut bits = 0u64;
    for (k, &slot) in perm.iter().enumerate() {
        bits |= (slot as u64) << (4 * k);
    }
    bits
}

fn invert(perm: &Perm) -> Perm {
    let mut rev = [0u8; MAXSLOTS];
    for (k, &slot) in perm.iter().enumerate() {
        rev[slot as usize] = k as u8;
    }
    rev
}

fn generate_permutations() -> Vec<Perm> {
    let mut out = Vec::with_capacity(factorial(MAXSLOTS));
    let mut perm: Perm = [0; MAXSLOTS];
    let mut used = [false; MAXSLOTS];
    permute(&mut perm, 0, &mut used, &mut out);
    out
}

fn permute(perm: &mut Perm, depth: usize, used: &mut [bool; MAXSLOTS], out: &mut Vec<Perm>) {
    if depth == MAXSLOTS {
        out.push(*perm);
        return;
    }
    for slot in 0..MAXSLOTS {
        if used[slot] {
            continue;
        }
        used[slot] = true;
        perm[depth] = slot as u8;
        permute(perm, depth + 1, used, out);
        used[slot] = false;
    }
}

fn factorial(n: usize) -> usize {
    (1..=n).product::<usize>().max(1)
}

/// Builds the name-lookup automaton for a set of permutations, keyed by
/// their own index (the tid). `perms[tid]` must be the permutation named by
/// letters `'a'+perms[tid][0], 'a'+perms[tid][1], ...`.
fn build_index(perms: &[Perm]) -> (Vec<Block>, u32) {
    let mut by_perm: HashMap<Perm, u32> = HashMap::with_capacity(perms.len());
    for (tid, p) in perms.iter().enumerate() {
        by_perm.insert(*p, tid as u32);
    }

    let mut blocks = Vec::new();
    let mut prefix: Perm = [0; MAXSLOTS];
    let mut used = [false; MAXSLOTS];
    let root = build_node(&mut prefix, 0, &mut used, &by_perm, &mut blocks);
    // MAXSLOTS > 1 guarantees the root itself always branches into a block,
    // never collapses directly into a terminal tid.
    debug_assert_eq!(root & TERMINAL_FLAG, 0);
    (blocks, root)
}

fn build_node(
    prefix: &mut Perm,
    depth: usize,
    used: &mut [bool; MAXSLOTS],
    by_perm: &HashMap<Perm, u32>,
    blocks: &mut Vec<Block>,
) -> u32 {
    let available: Vec<u8> = (0..MAXSLOTS as u8).filter(|&l| !used[l as usize]).collect();

    if available.len() == 1 {
        let letter = available[0];
        prefix[depth] = letter;
        let tid = *by_perm
            .get(prefix)
            .expect("every fully-determined prefix names a generated permutation");
        return TERMINAL_FLAG | tid;
    }

    let mut next = [NO_EDGE; MAXSLOTS];
    for &letter in &available {
        prefix[depth] = letter;
        used[letter as usize] = true;
        let child = build_node(prefix, depth + 1, used, by_perm, blocks);
        used[letter as usize] = false;
        next[letter as usize] = child;
    }

    // Children are fully built (post-order), so the first child's own
    // `terminal` is already resolved; no need to walk further.
    let first = available[0] as usize;
    let terminal = if next[first] & TERMINAL_FLAG != 0 {
        next[first] & !TERMINAL_FLAG
    } else {
        blocks[next[first] as usize].terminal
    };

    let id = blocks.len() as u32;
    blocks.push(Block { next, terminal });
    id
}

fn lookup(blocks: &[Block], root: u32, name: &str) -> Result<u32> {
    if name.is_empty() {
        return Ok(blocks[root as usize].terminal);
    }

    let mut cur = root;
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_ascii_lowercase() {
            return Err(TransformError {
                name: name.to_string(),
                message: format!("'{}' is not a lowercase letter", c),
            }
            .into());
        }
        let idx = (c as u8 - b'a') as usize;
        if idx >= MAXSLOTS {
            return Err(TransformError {
                name: name.to_string(),
                message: format!("letter '{}' is out of range for {} slots", c, MAXSLOTS),
            }
            .into());
        }
        if cur & TERMINAL_FLAG != 0 {
            return Err(TransformError {
                name: name.to_string(),
                message: "name is longer than its fully-determined prefix".to_string(),
            }
            .into());
        }
        let block = &blocks[cur as usize];
        let edge = block.next[idx];
        if edge == NO_EDGE {
            return Err(TransformError {
                name: name.to_string(),
                message: format!("letter '{}' does not continue a valid permutation", c),
            }
            .into());
        }
        cur = edge;
        if chars.peek().is_none() {
            // last character consumed
            return Ok(if cur & TERMINAL_FLAG != 0 {
                cur & !TERMINAL_FLAG
            } else {
                blocks[cur as usize].terminal
            });
        }
    }
    unreachable!("loop above always returns on the final character");
}

/// The full set of `MAXSLOTS!` permutations, with O(1) tid -> permutation
/// lookup and O(name length) name -> tid lookup in both directions.
pub struct TransformTable {
    pub num_transforms: u32,
    fwd_perms: Vec<Perm>,
    rev_perms: Vec<Perm>,
    /// For forward tid `t`, the tid whose forward permutation equals `t`'s
    /// reverse permutation.
    rev_ids: Vec<u32>,
    fwd_blocks: Vec<Block>,
    fwd_root: u32,
    rev_blocks: Vec<Block>,
    rev_root: u32,
}

impl TransformTable {
    pub fn new() -> Self {
        let fwd_perms = generate_permutations();
        let rev_perms: Vec<Perm> = fwd_perms.iter().map(invert).collect();

        let mut by_fwd: HashMap<u64, u32> = HashMap::with_capacity(fwd_perms.len());
        for (tid, p) in fwd_perms.iter().enumerate() {
            by_fwd.insert(pack(p), tid as u32);
        }
        let rev_ids: Vec<u32> = rev_perms
            .iter()
            .map(|p| *by_fwd.get(&pack(p)).expect("reverse is itself a permutation"))
            .collect();

        let (fwd_blocks, fwd_root) = build_index(&fwd_perms);
        let (rev_blocks, rev_root) = build_index(&rev_perms);

        Self {
            num_transforms: fwd_perms.len() as u32,
            fwd_perms,
            rev_perms,
            rev_ids,
            fwd_blocks,
            fwd_root,
            rev_blocks,
            rev_root,
        }
    }

    /// Identity permutation always occupies tid 0.
    pub const IDENTITY: u32 = 0;

    pub fn forward(&self, tid: u32) -> Perm {
        self.fwd_perms[tid as usize]
    }

    pub fn reverse(&self, tid: u32) -> Perm {
        self.rev_perms[tid as usize]
    }

    /// The tid whose forward permutation is `tid`'s reverse.
    pub fn reverse_tid(&self, tid: u32) -> u32 {
        self.rev_ids[tid as usize]
    }

    pub fn forward_name(&self, tid: u32) -> String {
        name_of(&self.fwd_perms[tid as usize])
    }

    pub fn reverse_name(&self, tid: u32) -> String {
        name_of(&self.rev_perms[tid as usize])
    }

    pub fn lookup_forward(&self, name: &str) -> Result<u32> {
        lookup(&self.fwd_blocks, self.fwd_root, name)
    }

    pub fn lookup_reverse(&self, name: &str) -> Result<u32> {
        lookup(&self.rev_blocks, self.rev_root, name)
    }

    /// Composes permutations `a` then `b`: applying the result to slot `i`
    /// is the same as applying `a` then applying `b` to the outcome.
    pub fn compose(a: &Perm, b: &Perm) -> Perm {
        let mut out = [0u8; MAXSLOTS];
        for i in 0..MAXSLOTS {
            out[i] = b[a[i] as usize];
        }
        out
    }
}

impl Default for TransformTable {
    fn default() -> Self {
        Self::new()
    }
}

fn name_of(perm: &Perm) -> String {
    perm.iter().map(|&s| (b'a' + s) as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_tid_zero() {
        let t = TransformTable::new();
        assert_eq!(t.forward_name(0), "abcdefghi");
    }

    #[test]
    fn empty_name_resolves_to_identity() {
        let t = TransformTable::new();
        assert_eq!(t.lookup_forward("").unwrap(), 0);
    }

    #[test]
    fn num_transforms_is_nine_factorial() {
        let t = TransformTable::new();
        assert_eq!(t.num_transforms, 362_880);
    }

    #[test]
    fn forward_and_reverse_are_inverses() {
        let t = TransformTable::new();
        for tid in [0u32, 1, 41, 1000, 362_879] {
            let fwd = t.forward(tid);
            let rev = t.reverse(tid);
            let identity = TransformTable::compose(&fwd, &rev);
            for (i, &s) in identity.iter().enumerate() {
                assert_eq!(s as usize, i);
            }
        }
    }

    #[test]
    fn round_trips_through_name_lookup() {
        let t = TransformTable::new();
        for tid in [0u32, 5, 777, 123_456] {
            let name = t.forward_name(tid);
            assert_eq!(t.lookup_forward(&name).unwrap(), tid);
        }
    }

    #[test]
    fn short_name_completes_to_lexicographically_smallest() {
        let t = TransformTable::new();
        // "b" as a prefix should resolve to the smallest permutation that
        // starts with 'b': "bacdefghi".
        let tid = t.lookup_forward("b").unwrap();
        assert_eq!(t.forward_name(tid), "bacdefghi");
    }

    #[test]
    fn invalid_letter_is_rejected() {
        let t = TransformTable::new();
        assert!(t.lookup_forward("z").is_err());
    }

    #[test]
    fn reverse_tid_matches_reverse_permutation() {
        let t = TransformTable::new();
        for tid in [0u32, 17, 5000] {
            let rev_tid = t.reverse_tid(tid);
            assert_eq!(t.forward(rev_tid), t.reverse(tid));
        }
    }
}

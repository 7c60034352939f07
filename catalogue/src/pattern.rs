//! Pattern (sid-based) compiler (§4.G): an alternative to the raw-triplet
//! rewrite DFA that operates on signatures. Two hash probes replace a DFA
//! walk: `(sidQ, sidT, tidT_relative, tid_of_T) -> first_id`, then
//! `(first_id, sidF, tidF_relative) -> (sidR, tid_extract, power)`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tree::consts::{IBIT, NSTART};
use tree::node::TinyTree;
use tree::transform::TransformTable;

use crate::error::{Error, Result};
use crate::signature::{SignatureCatalogue, SignatureFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FirstKey {
    pub sid_q: u32,
    pub sid_t: u32,
    pub tid_t_relative: u32,
    pub ti: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecondKey {
    pub first_id: u32,
    pub sid_f: u32,
    pub tid_f_relative: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondRecord {
    pub sid_r: u32,
    pub tid_extract: u32,
    pub power: u8,
}

/// One child subtree resolved to its own canonical signature: which
/// equivalence class it belongs to (`sid`), the transform mapping that
/// class's canonical orientation onto this instantiation (`tid`), and the
/// actual variable slots it uses, in its own canonical encounter order.
#[derive(Debug, Clone)]
pub struct ChildRef {
    pub sid: u32,
    pub tid: u32,
    pub vars: Vec<u8>,
}

/// A node's `(Q, T, F)` triplet with each child resolved to a `ChildRef` and
/// the output slot layout computed from them (§4.G "Slot construction").
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub q: ChildRef,
    pub t: ChildRef,
    pub t_inverted: bool,
    pub f: ChildRef,
    pub layout: SlotLayout,
}

impl Decomposition {
    pub fn first_key(&self) -> FirstKey {
        FirstKey {
            sid_q: self.q.sid,
            sid_t: self.t.sid,
            tid_t_relative: self.layout.tid_slot_t,
            ti: self.t_inverted as u32,
        }
    }
}

/// Interns `id`'s subtree as its own signature (re-rooting `save_string` at
/// `id` gives it a fresh canonical encounter order starting at `a`, since
/// every subtree of a normalised tree is itself in normal form) and recovers
/// the tid mapping that canonical orientation onto how `id` is actually
/// instantiated, via the skin `save_string` reports.
fn resolve_child(
    tree: &TinyTree,
    id: u32,
    transforms: &TransformTable,
    signatures: &mut SignatureCatalogue,
) -> Option<ChildRef> {
    let mut skin = Vec::new();
    let name = tree.save_string(id, Some(&mut skin));
    let vars: Vec<u8> = skin.iter().map(|&b| b - b'a').collect();
    let num_placeholder = vars.len() as u8;
    let sid = signatures
        .intern(&name, num_placeholder, num_placeholder, 0, 0, SignatureFlags::empty())
        .ok()?;
    let skin_str: String = skin.iter().map(|&b| b as char).collect();
    let tid = transforms.lookup_forward(&skin_str).ok()?;
    Some(ChildRef { sid, tid, vars })
}

/// Decomposes the internal node at `root` into its `(Q, T, F)` children plus
/// their slot layout, or `None` if `root` is not an internal node (a bare
/// endpoint has nothing to decompose).
pub fn decompose(
    tree: &TinyTree,
    root: u32,
    transforms: &TransformTable,
    signatures: &mut SignatureCatalogue,
) -> Option<Decomposition> {
    let bare = root & !IBIT;
    if bare < NSTART {
        return None;
    }
    let node = tree.nodes[bare as usize];
    let t_inverted = node.t & IBIT != 0;
    let t_bare = node.t & !IBIT;

    let q = resolve_child(tree, node.q, transforms, signatures)?;
    let t = resolve_child(tree, t_bare, transforms, signatures)?;
    let f = resolve_child(tree, node.f, transforms, signatures)?;

    let layout = build_slot_layout(&q.vars, &t.vars, &f.vars);
    Some(Decomposition { q, t, t_inverted, f, layout })
}

/// Slot construction result (§4.G "Slot construction"): the output slot
/// order discovered by scanning `Q`'s placeholders, then `T`'s, then `F`'s,
/// plus the two relative transforms describing `T`'s and `F`'s slot order
/// relative to `Q`'s.
#[derive(Debug, Clone)]
pub struct SlotLayout {
    /// Output slot names (`slotsR`) in first-encounter order.
    pub slots_r: Vec<u8>,
    pub tid_slot_t: u32,
    pub tid_slot_f: u32,
}

/// Scans `q_vars`, `t_vars`, `f_vars` (each a signature's placeholders in
/// its own canonical order) and assigns each a fresh output slot on first
/// encounter across the three in that order.
pub fn build_slot_layout(q_vars: &[u8], t_vars: &[u8], f_vars: &[u8]) -> SlotLayout {
    let mut slots_r = Vec::new();
    let mut seen = std::collections::HashMap::new();
    let mut assign = |v: u8, seen: &mut std::collections::HashMap<u8, u8>, slots_r: &mut Vec<u8>| -> u8 {
        *seen.entry(v).or_insert_with(|| {
            let idx = slots_r.len() as u8;
            slots_r.push(v);
            idx
        })
    };
    for &v in q_vars {
        assign(v, &mut seen, &mut slots_r);
    }
    let t_relative: Vec<u8> = t_vars.iter().map(|&v| assign(v, &mut seen, &mut slots_r)).collect();
    let f_relative: Vec<u8> = f_vars.iter().map(|&v| assign(v, &mut seen, &mut slots_r)).collect();

    SlotLayout {
        slots_r,
        tid_slot_t: encode_relative(&t_relative),
        tid_slot_f: encode_relative(&f_relative),
    }
}

/// Packs a short relative-order sequence into a single integer (4 bits per
/// entry, matching the transform table's nibble packing); used as a cheap
/// stand-in tid for "how T's/F's slots map onto the output order" when the
/// sequence is shorter than the full slot count.
fn encode_relative(order: &[u8]) -> u32 {
    let mut packed = 0u32;
    for (i, &slot) in order.iter().enumerate().take(8) {
        packed |= (slot as u32) << (4 * i);
    }
    packed
}

#[derive(Default)]
pub struct PatternTable {
    first: HashMap<FirstKey, u32>,
    first_keys: Vec<FirstKey>,
    second: HashMap<SecondKey, SecondRecord>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a first-level key, returning its stable `first_id`.
    pub fn intern_first(&mut self, key: FirstKey) -> u32 {
        if let Some(&id) = self.first.get(&key) {
            return id;
        }
        let id = self.first_keys.len() as u32;
        self.first.insert(key, id);
        self.first_keys.push(key);
        id
    }

    /// Records the second-level verdict for `(first_id, sid_f,
    /// tid_f_relative)`. A second write for the same key must agree with
    /// the first (matching the rewrite DFA's collision-must-agree policy).
    pub fn record_second(&mut self, key: SecondKey, record: SecondRecord) -> Result<()> {
        if let Some(&existing) = self.second.get(&key) {
            if existing != record {
                return Err(Error::FormatMismatch {
                    field: "pattern_second",
                    expected: format!("{:?}", existing),
                    found: format!("{:?}", record),
                });
            }
            return Ok(());
        }
        self.second.insert(key, record);
        Ok(())
    }

    pub fn lookup(&self, q_t_key: &FirstKey, sid_f: u32, tid_f_relative: u32) -> Option<SecondRecord> {
        let first_id = *self.first.get(q_t_key)?;
        self.second.get(&SecondKey { first_id, sid_f, tid_f_relative }).copied()
    }

    pub fn len_first(&self) -> usize {
        self.first.len()
    }

    pub fn len_second(&self) -> usize {
        self.second.len()
    }

    /// The `FirstKey` interned under `first_id` (as returned by
    /// `intern_first`). Used to replay a persisted table back into memory.
    pub fn first_key(&self, first_id: u32) -> FirstKey {
        self.first_keys[first_id as usize]
    }

    pub fn second_entries(&self) -> impl Iterator<Item = (&SecondKey, &SecondRecord)> {
        self.second.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_layout_assigns_q_placeholders_before_t_and_f() {
        let layout = build_slot_layout(&[2, 5], &[5, 7], &[7, 9]);
        assert_eq!(layout.slots_r, vec![2, 5, 7, 9]);
    }

    #[test]
    fn full_lookup_round_trips_through_both_levels() {
        let mut table = PatternTable::new();
        let key = FirstKey { sid_q: 1, sid_t: 2, tid_t_relative: 0, ti: 0 };
        let first_id = table.intern_first(key);
        let second_key = SecondKey { first_id, sid_f: 3, tid_f_relative: 0 };
        let record = SecondRecord { sid_r: 9, tid_extract: 1, power: 2 };
        table.record_second(second_key, record).unwrap();

        let found = table.lookup(&key, 3, 0).unwrap();
        assert_eq!(found, record);
    }

    #[test]
    fn unknown_first_key_misses() {
        let table = PatternTable::new();
        let key = FirstKey { sid_q: 9, sid_t: 9, tid_t_relative: 0, ti: 0 };
        assert!(table.lookup(&key, 0, 0).is_none());
    }

    #[test]
    fn decompose_resolves_an_and_nodes_children_to_distinct_signatures() {
        let transforms = TransformTable::new();
        let mut signatures = SignatureCatalogue::with_capacity(8);
        let mut tree = TinyTree::new(false);
        let root = tree.decode_safe("ab&", None).unwrap();

        let decomposition = decompose(&tree, root, &transforms, &mut signatures).unwrap();
        assert_ne!(decomposition.q.sid, decomposition.t.sid);
        assert_eq!(decomposition.q.vars, vec![0]);
        assert_eq!(decomposition.t.vars, vec![1]);
        assert!(!decomposition.t_inverted);
    }

    #[test]
    fn decompose_returns_none_for_a_bare_endpoint() {
        let transforms = TransformTable::new();
        let mut signatures = SignatureCatalogue::with_capacity(8);
        let mut tree = TinyTree::new(false);
        let root = tree.decode_safe("a", None).unwrap();
        assert!(decompose(&tree, root, &transforms, &mut signatures).is_none());
    }
}

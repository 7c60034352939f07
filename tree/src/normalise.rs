//! Component C, level 3 — dyadic cascade ordering.
//!
//! OR, XOR and AND are commutative and associative, so a chain of same
//! operator nodes is really a multiset of leaves. This module flattens such
//! chains, recursively normalises each leaf, sorts the multiset into
//! canonical (`compare`-ascending) order and reassembles it through
//! [`TinyTree::add_normalised`] — which, being level 1/2 normalisation,
//! also performs the "per-node top-level ordering" pass and any collapse a
//! reassembly step introduces, folding levels 2 and 3 back together the way
//! spec §4.C describes.
//!
//! §4.C's remaining two phases — signature lookup (evaluate a footprint,
//! find its imprint match) and member selection (scan the matched
//! signature's members for the cheapest non-depreciated one) — need a
//! signature catalogue, imprint index and member table that this crate
//! deliberately has no access to (see the crate-level doc comment). They
//! live in `catalogue::lookup::lookup_and_select`, run immediately after
//! [`normalise_cascades`] by any caller that has a built catalogue on hand.

use crate::compare::compare_within;
use crate::consts::{IBIT, NSTART};
use crate::error::Result;
use crate::node::{Node, TinyTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeOp {
    Or,
    Xor,
    And,
}

fn class_of(node: Node) -> Option<CascadeOp> {
    if node.t == IBIT {
        Some(CascadeOp::Or)
    } else if node.t & IBIT != 0 && (node.t & !IBIT) == node.f {
        Some(CascadeOp::Xor)
    } else if node.t & IBIT == 0 && node.f == 0 {
        Some(CascadeOp::And)
    } else {
        None
    }
}

fn children(node: Node, op: CascadeOp) -> (u32, u32) {
    match op {
        CascadeOp::Or => (node.q, node.f),
        CascadeOp::Xor => (node.q, node.f),
        CascadeOp::And => (node.q, node.t),
    }
}

fn flatten(tree: &TinyTree, id: u32, op: CascadeOp, out: &mut Vec<u32>) {
    if id >= NSTART {
        let node = tree.nodes[id as usize];
        if class_of(node) == Some(op) {
            let (l, r) = children(node, op);
            flatten(tree, l, op, out);
            flatten(tree, r, op, out);
            return;
        }
    }
    out.push(id);
}

/// Sorts, dedups (per operator semantics) and reassembles a flattened
/// cascade. `leaves` must already each be in normal form.
fn reassemble(tree: &mut TinyTree, leaves: &mut Vec<u32>, op: CascadeOp) -> Result<u32> {
    leaves.sort_by(|&a, &b| compare_within(tree, a, b));

    match op {
        CascadeOp::Or | CascadeOp::And => leaves.dedup(),
        CascadeOp::Xor => {
            let mut reduced = Vec::with_capacity(leaves.len());
            let mut i = 0;
            while i < leaves.len() {
                if i + 1 < leaves.len() && leaves[i] == leaves[i + 1] {
                    i += 2; // equal pair cancels under XOR
                } else {
                    reduced.push(leaves[i]);
                    i += 1;
                }
            }
            *leaves = reduced;
        }
    }

    if leaves.is_empty() {
        return Ok(match op {
            CascadeOp::Or | CascadeOp::Xor => 0,
            CascadeOp::And => IBIT, // empty product is "true" (~false)
        });
    }

    let mut acc = leaves[0];
    for &next in &leaves[1..] {
        acc = match op {
            CascadeOp::Or => tree.add_normalised(acc, IBIT, next)?,
            CascadeOp::Xor => tree.add_normalised(acc, next ^ IBIT, next)?,
            CascadeOp::And => tree.add_normalised(acc, next, 0)?,
        };
    }
    Ok(acc)
}

/// Normalises `root`'s dyadic cascades (and, as a side effect of routing
/// everything through `add_normalised`, re-applies levels 1/2 wherever a
/// cascade reassembly changes a subtree). Idempotent: normalising an
/// already-normalised tree returns the same reference.
pub fn normalise_cascades(tree: &mut TinyTree, root: u32) -> Result<u32> {
    let bare = normalise_node(tree, root & !IBIT)?;
    Ok(bare ^ (root & IBIT))
}

fn normalise_node(tree: &mut TinyTree, id: u32) -> Result<u32> {
    if id < NSTART {
        return Ok(id);
    }
    let node = tree.nodes[id as usize];
    match class_of(node) {
        Some(op) => {
            let mut raw_leaves = Vec::new();
            flatten(tree, id, op, &mut raw_leaves);
            let mut leaves = Vec::with_capacity(raw_leaves.len());
            for leaf in raw_leaves {
                leaves.push(normalise_node(tree, leaf)?);
            }
            reassemble(tree, &mut leaves, op)
        }
        None => {
            let nq = normalise_node(tree, node.q)?;
            let nt_bare = normalise_node(tree, node.t & !IBIT)?;
            let nf = normalise_node(tree, node.f)?;
            let nt = nt_bare ^ (node.t & IBIT);
            tree.add_normalised(nq, nt, nf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_on_an_already_normalised_cascade() {
        let mut t = TinyTree::new(false);
        let root = t.decode_safe("ab+cd+^", None).unwrap();
        let once = normalise_cascades(&mut t, root).unwrap();
        let twice = normalise_cascades(&mut t, once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn shared_leaf_across_non_adjacent_xor_nodes_cancels() {
        // (a^b)^(a^c) flattens to the multiset {a,b,a,c}; the two `a`
        // leaves are not adjacent in either original node, so only cascade
        // flattening (not add_normalised's local pairwise check) can catch
        // the cancellation. Expected result: b^c.
        let mut t = TinyTree::new(false);
        let root = t.decode_safe("ab^ac^^", None).unwrap();
        let normalised = normalise_cascades(&mut t, root).unwrap();
        let printed = t.save_string(normalised, None);
        assert_eq!(printed, "bc^");
    }

    #[test]
    fn or_cascade_drops_exact_duplicate() {
        let mut t = TinyTree::new(false);
        let root = t.decode_safe("aa+b+", None).unwrap();
        let normalised = normalise_cascades(&mut t, root).unwrap();
        let printed = t.save_string(normalised, None);
        // a+a+b collapses the duplicate 'a', leaving just "a+b".
        assert_eq!(printed, "ab+");
    }
}

//! Deep structural comparator (§4.B `compare`), used both to sort cascade
//! leaves into canonical dyadic order (§4.C) and as the tie-break inside
//! normalisation itself. Endpoints compare less than references; among
//! references, an operator-class code breaks ties before recursing into
//! `(Q, T, F)`.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::consts::{IBIT, NSTART};
use crate::node::TinyTree;

/// Operator-class ranking: `OR < GT < XOR < QnTF < AND < QTF`.
fn class_rank(t: u32, f: u32) -> u8 {
    if t == IBIT {
        0 // OR
    } else if t & IBIT != 0 {
        if f == 0 {
            1 // GT
        } else if (t & !IBIT) == f {
            2 // XOR
        } else {
            3 // QnTF
        }
    } else if f == 0 {
        4 // AND
    } else {
        5 // QTF
    }
}

/// Compares two references that may live in different trees (the general
/// form in spec §4.B; pass the same tree twice to compare within one tree).
pub fn compare(tree_a: &TinyTree, a: u32, tree_b: &TinyTree, b: u32) -> Ordering {
    let mut memo = HashMap::new();
    compare_memo(tree_a, a, tree_b, b, &mut memo)
}

/// Convenience form for comparing two references within the same tree.
pub fn compare_within(tree: &TinyTree, a: u32, b: u32) -> Ordering {
    compare(tree, a, tree, b)
}

fn compare_memo(
    tree_a: &TinyTree,
    a: u32,
    tree_b: &TinyTree,
    b: u32,
    memo: &mut HashMap<(u32, u32), Ordering>,
) -> Ordering {
    let a_bare = a & !IBIT;
    let b_bare = b & !IBIT;

    let a_is_endpoint = a_bare < NSTART;
    let b_is_endpoint = b_bare < NSTART;

    match (a_is_endpoint, b_is_endpoint) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (true, true) => {
            return a_bare
                .cmp(&b_bare)
                .then((a & IBIT != 0).cmp(&(b & IBIT != 0)));
        }
        (false, false) => {}
    }

    // Both are internal-node references. Memoise on the pair of bare ids;
    // the two trees are fixed for the lifetime of one top-level compare()
    // call, so the tree identity need not be part of the key.
    let key = (a_bare, b_bare);
    if let Some(&ord) = memo.get(&key) {
        return ord;
    }
    // Reserve Equal so a structural cycle (which cannot legally occur in a
    // well-formed tree, but would otherwise recurse forever) terminates.
    memo.insert(key, Ordering::Equal);

    let node_a = tree_a.nodes[a_bare as usize];
    let node_b = tree_b.nodes[b_bare as usize];

    let ra = class_rank(node_a.t, node_a.f);
    let rb = class_rank(node_b.t, node_b.f);
    let mut ord = ra.cmp(&rb);
    if ord == Ordering::Equal {
        ord = compare_memo(tree_a, node_a.q, tree_b, node_b.q, memo);
    }
    if ord == Ordering::Equal {
        ord = compare_memo(tree_a, node_a.t & !IBIT, tree_b, node_b.t & !IBIT, memo);
    }
    if ord == Ordering::Equal {
        ord = compare_memo(tree_a, node_a.f, tree_b, node_b.f, memo);
    }

    memo.insert(key, ord);
    ord
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_sort_before_references() {
        let mut t = TinyTree::new(false);
        let a = crate::consts::KSTART;
        let or_node = t.add_normalised(a, IBIT, a + 1).unwrap();
        assert_eq!(compare_within(&t, a, or_node), Ordering::Less);
    }

    #[test]
    fn identical_subtrees_compare_equal() {
        let mut t = TinyTree::new(false);
        let a = crate::consts::KSTART;
        let b = a + 1;
        let n1 = t.add_normalised(a, IBIT, b).unwrap();
        assert_eq!(compare_within(&t, n1, n1), Ordering::Equal);
    }

    #[test]
    fn or_class_sorts_before_gt_class() {
        let mut t = TinyTree::new(false);
        let a = crate::consts::KSTART;
        let b = a + 1;
        let c = a + 2;
        let or_node = t.add_normalised(a, IBIT, b).unwrap(); // a+b
        let gt_node = t.add_normalised(a, c ^ IBIT, 0).unwrap(); // a>c
        assert_eq!(compare_within(&t, or_node, gt_node), Ordering::Less);
    }
}

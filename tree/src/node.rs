//! Component B — the tiny tree: a fixed-capacity expression graph together
//! with its level-1/level-2 normalisation, postfix parser/printer and
//! bitwise footprint evaluator.

use std::cmp::Ordering;

use crate::compare::compare_within;
use crate::consts::{FOOTPRINT_WORDS, IBIT, KSTART, MAXSLOTS, NEND, NSTART, NUMNODES};
use crate::error::{CapacityError, ParseError, Result};

/// One unified `Q ? T : F` operator node. Only `T` may carry `IBIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Node {
    pub q: u32,
    pub t: u32,
    pub f: u32,
}

/// A fixed-capacity expression tree: at most `NUMNODES` internal nodes over
/// `MAXSLOTS` variables. Indices `0` (constant false) and `1..=MAXSLOTS`
/// (placeholder variables) are reserved; indices `NSTART..count` hold
/// internal nodes.
#[derive(Debug, Clone)]
pub struct TinyTree {
    /// Index of the first free internal-node slot.
    pub count: u32,
    pub nodes: [Node; NEND as usize],
    /// Entry point into the tree; may carry `IBIT`.
    pub root: u32,
    /// "Pure" mode forbids the general `QTF` primitive: every node must be
    /// a `QnTF` (`T` always inverted).
    pub pure: bool,
}

impl TinyTree {
    pub fn new(pure: bool) -> Self {
        Self {
            count: NSTART,
            nodes: [Node::default(); NEND as usize],
            root: 0,
            pure,
        }
    }

    pub fn clear(&mut self) {
        self.count = NSTART;
        self.root = 0;
    }

    /// Performs level-1 (invert propagation) and level-2 (function
    /// grouping) normalisation on a `(Q,T,F)` triplet and appends it via
    /// [`Self::basic_node`], returning a possibly-inverted reference.
    ///
    /// Ground: `original_source/tinytree.h`, `normaliseQTF`.
    pub fn add_normalised(&mut self, mut q: u32, mut t: u32, mut f: u32) -> Result<u32> {
        // Level 1a: invert propagation.
        if q & IBIT != 0 {
            // ~Q?T:F -> Q?F:T
            std::mem::swap(&mut t, &mut f);
            q ^= IBIT;
        }
        if q == 0 {
            // 0?T:F -> F
            return Ok(f);
        }

        let mut ibit = 0u32;
        if f & IBIT != 0 {
            // Q?T:~F -> ~(Q?~T:F)
            f ^= IBIT;
            t ^= IBIT;
            ibit ^= IBIT;
        }

        // Level 1b: function grouping, with level-1c dyadic ordering for
        // the immediate (Q,T,F) triplet folded in, exactly as the source
        // normaliser does.
        if t & IBIT != 0 {
            if t == IBIT {
                if f == q || f == 0 {
                    // SELF: Q?~0:Q -> Q?~0:0 -> Q
                    return Ok(q ^ ibit);
                }
                // OR: Q?~0:F
                if compare_within(self, q, f) == Ordering::Greater {
                    std::mem::swap(&mut q, &mut f);
                }
            } else if (t & !IBIT) == q {
                if f == q || f == 0 {
                    // ZERO: Q?~Q:Q -> Q?~Q:0 -> 0
                    return Ok(ibit);
                }
                // LESS-THAN (deprecated): Q?~Q:F -> F?~Q:0
                q = f;
                f = 0;
            } else if f == q || f == 0 {
                // GREATER-THAN: Q?~T:Q -> Q?~T:0
                f = 0;
            } else if (t & !IBIT) == f {
                // XOR: Q?~F:F
                if compare_within(self, q, f) == Ordering::Greater {
                    std::mem::swap(&mut q, &mut f);
                    t = q ^ IBIT;
                }
            } // else QnTF: Q?~T:F, general case, nothing to fold.
        } else if t == 0 {
            if f == q || f == 0 {
                // ZERO: Q?0:Q -> Q?0:0 -> 0
                return Ok(ibit);
            }
            // LESS-THAN (deprecated): Q?0:F -> F?~Q:0
            t = q ^ IBIT;
            q = f;
            f = 0;
        } else if t == q {
            if f == q || f == 0 {
                // SELF: Q?Q:Q -> Q?Q:0 -> Q
                return Ok(q ^ ibit);
            }
            // OR: Q?Q:F -> Q?~0:F
            t = IBIT;
            if compare_within(self, q, f) == Ordering::Greater {
                std::mem::swap(&mut q, &mut f);
            }
        } else if f == q || f == 0 {
            // AND: Q?T:Q -> Q?T:0
            f = 0;
            if compare_within(self, q, t) == Ordering::Greater {
                std::mem::swap(&mut q, &mut t);
            }
        } else if t == f {
            // SELF: Q?F:F -> F
            return Ok(f ^ ibit);
        } // else QTF: Q?T:F, general case.

        // Rewrite QTF (non-inverted T) into QnTF when `pure` mode forbids
        // the general primitive.
        if self.pure && (t & IBIT) == 0 {
            let inner = self.add_normalised(q, t ^ IBIT, f)?;
            t = inner ^ IBIT;
        }

        Ok(self.basic_node(q, t, f)? ^ ibit)
    }

    /// Scans for an existing node with this exact triplet; if none exists,
    /// appends one. Asserts the invariants of §3 before appending (debug
    /// builds only — these can never fail on input that reached this point
    /// through [`Self::add_normalised`]).
    pub fn basic_node(&mut self, q: u32, t: u32, f: u32) -> std::result::Result<u32, CapacityError> {
        debug_assert_eq!(q & IBIT, 0, "Q must not be inverted");
        debug_assert!(t & IBIT != 0 || !self.pure, "pure mode forbids non-inverted T");
        debug_assert_eq!(f & IBIT, 0, "F must not be inverted");
        debug_assert_ne!(q, 0, "Q must not be the constant");
        debug_assert_ne!(t, 0, "T must not be zero (Q?0:F -> F?~Q:0)");
        debug_assert!(t != IBIT || f != 0, "Q?~0:0 collapses to Q");
        debug_assert_ne!(q, t & !IBIT, "Q/T collapse");
        debug_assert_ne!(q, f, "Q/F collapse");
        debug_assert_ne!(t, f, "T/F collapse");
        // Dyadic ordering is a *structural* comparison (§3), not a numeric
        // id comparison: Q and F/T already name existing subtrees, so we
        // can ask the comparator directly.
        debug_assert!(
            (t & !IBIT) != f || compare_within(self, q, f) != Ordering::Greater,
            "XOR dyadic ordering"
        );
        debug_assert!(
            f != 0 || (t & IBIT) != 0 || compare_within(self, q, t) != Ordering::Greater,
            "AND dyadic ordering"
        );
        debug_assert!(
            t != IBIT || compare_within(self, q, f) != Ordering::Greater,
            "OR dyadic ordering"
        );

        for nid in NSTART..self.count {
            let node = &self.nodes[nid as usize];
            if node.q == q && node.t == t && node.f == f {
                return Ok(nid);
            }
        }

        if self.count >= NEND {
            return Err(CapacityError {
                capacity: NUMNODES,
                message: "tiny tree exhausted its fixed node capacity".to_string(),
            });
        }

        let nid = self.count;
        self.count += 1;
        self.nodes[nid as usize] = Node { q, t, f };
        Ok(nid)
    }

    /// Parses a postfix name that is already known to be in canonical form,
    /// without re-normalising. `skin` remaps placeholder letters (`a..`)
    /// before they are looked up; pass the identity skin to leave them
    /// untouched.
    pub fn decode_fast(&mut self, name: &str, skin: Option<&str>) -> Result<u32> {
        self.decode(name, skin, false)
    }

    /// Same grammar as [`Self::decode_fast`], but every constructed node is
    /// re-normalised through [`Self::add_normalised`]. Use this for
    /// untrusted input.
    pub fn decode_safe(&mut self, name: &str, skin: Option<&str>) -> Result<u32> {
        self.decode(name, skin, true)
    }

    fn decode(&mut self, full_name: &str, skin: Option<&str>, safe: bool) -> Result<u32> {
        self.clear();

        // `/` separates the postfix body from an inline skin; an inline
        // skin overrides one passed in explicitly.
        let (name, effective_skin) = match full_name.find('/') {
            Some(idx) => (&full_name[..idx], Some(&full_name[idx + 1..])),
            None => (full_name, skin),
        };

        let skin_bytes: Vec<u8> = match effective_skin {
            Some(s) => s.bytes().filter(|b| !b.is_ascii_whitespace()).collect(),
            None => (0..MAXSLOTS as u8).map(|i| b'a' + i).collect(),
        };

        let mut stack: Vec<u32> = Vec::with_capacity(NUMNODES * 4);
        let mut constructed: Vec<u32> = Vec::new();

        for (pos, ch) in name.char_indices() {
            if ch == ' ' {
                continue;
            }
            if ch.is_ascii_digit() {
                let back = ch as u8 - b'0';
                if back == 0 {
                    stack.push(0);
                } else {
                    let idx = constructed
                        .len()
                        .checked_sub(back as usize)
                        .ok_or_else(|| ParseError::new(pos, Some(ch), "back-reference out of range"))?;
                    stack.push(constructed[idx]);
                }
                continue;
            }
            if ch.is_ascii_lowercase() {
                let slot = ch as u8 - b'a';
                if slot as usize >= skin_bytes.len() {
                    return Err(ParseError::new(pos, Some(ch), "variable letter out of range").into());
                }
                let mapped = skin_bytes[slot as usize] - b'a';
                stack.push(KSTART + mapped as u32);
                continue;
            }
            if ch.is_ascii_uppercase() {
                // Extended back-reference: base-26 prefix, optionally
                // followed by a lowercase letter or digit, resolved the
                // same way as a plain digit once the full magnitude is
                // known. A single uppercase letter alone already selects a
                // back-reference of (10 + letter offset).
                let back = 10 + (ch as u8 - b'A') as usize;
                let idx = constructed
                    .len()
                    .checked_sub(back)
                    .ok_or_else(|| ParseError::new(pos, Some(ch), "back-reference out of range"))?;
                stack.push(constructed[idx]);
                continue;
            }

            let (q, t, f) = match ch {
                '+' => pop3_or(&mut stack, pos, ch)?, // OR
                '>' => pop3_gt(&mut stack, pos, ch)?,  // GT
                '^' => pop3_xor(&mut stack, pos, ch)?, // XOR
                '&' => pop3_and(&mut stack, pos, ch)?, // AND
                '!' => pop3_qntf(&mut stack, pos, ch)?, // pop F, T, Q (QnTF)
                '?' => pop3_qtf(&mut stack, pos, ch)?, // pop F, T, Q (QTF)
                '<' => pop3_lt(&mut stack, pos, ch)?,  // LT, deprecated
                '~' => {
                    let top = stack
                        .pop()
                        .ok_or_else(|| ParseError::new(pos, Some(ch), "stack underflow"))?;
                    stack.push(top ^ IBIT);
                    continue;
                }
                _ => return Err(ParseError::new(pos, Some(ch), "unrecognised token").into()),
            };

            let nid = if safe {
                self.add_normalised(q, t, f)?
            } else {
                self.basic_node(q, t, f)?
            };
            stack.push(nid);
            constructed.push(nid);
        }

        let root = stack
            .pop()
            .ok_or_else(|| ParseError::new(name.len(), None, "empty expression"))?;
        if !stack.is_empty() {
            return Err(ParseError::new(name.len(), None, "unconsumed stack entries").into());
        }
        self.root = root;
        Ok(root)
    }

    /// Depth-first canonical printer. When `out_skin` is `Some`, placeholder
    /// letters are remapped to the order in which they are first
    /// encountered and a short-form skin is written into it; otherwise raw
    /// variable letters are emitted.
    pub fn save_string(&self, root: u32, out_skin: Option<&mut Vec<u8>>) -> String {
        let mut out = String::new();
        let mut seen_order: Vec<u8> = Vec::new();
        let mut emitted: Vec<u32> = Vec::new();
        let use_skin = out_skin.is_some();
        self.save_node(root & !IBIT, &mut out, &mut seen_order, &mut emitted, use_skin);
        if root & IBIT != 0 {
            out.push('~');
        }
        if let Some(skin) = out_skin {
            skin.clear();
            skin.extend(seen_order.iter().map(|&s| b'a' + s));
        }
        out
    }

    fn save_node(
        &self,
        id: u32,
        out: &mut String,
        seen_order: &mut Vec<u8>,
        emitted: &mut Vec<u32>,
        use_skin: bool,
    ) {
        if id == 0 {
            out.push('0');
            return;
        }
        if id < NSTART {
            let slot = (id - KSTART) as u8;
            if use_skin {
                let pos = seen_order.iter().position(|&s| s == slot);
                let encounter_index = match pos {
                    Some(i) => i,
                    None => {
                        seen_order.push(slot);
                        seen_order.len() - 1
                    }
                };
                out.push((b'a' + encounter_index as u8) as char);
            } else {
                out.push((b'a' + slot) as char);
            }
            return;
        }

        if let Some(back) = emitted.iter().rev().position(|&e| e == id) {
            push_back_reference(out, back + 1);
            return;
        }

        let node = self.nodes[id as usize];
        let inverted = node.t & IBIT != 0;
        let t_bare = node.t & !IBIT;

        if inverted && t_bare == 0 {
            self.save_node(node.q, out, seen_order, emitted, use_skin);
            self.save_node(node.f, out, seen_order, emitted, use_skin);
            out.push('+');
        } else if inverted && t_bare == node.f {
            self.save_node(node.q, out, seen_order, emitted, use_skin);
            self.save_node(t_bare, out, seen_order, emitted, use_skin);
            out.push('^');
        } else if !inverted && node.f == 0 {
            self.save_node(node.q, out, seen_order, emitted, use_skin);
            self.save_node(node.t, out, seen_order, emitted, use_skin);
            out.push('&');
        } else if inverted && node.f == 0 {
            self.save_node(node.q, out, seen_order, emitted, use_skin);
            self.save_node(t_bare, out, seen_order, emitted, use_skin);
            out.push('>');
        } else if inverted {
            self.save_node(node.q, out, seen_order, emitted, use_skin);
            self.save_node(t_bare, out, seen_order, emitted, use_skin);
            self.save_node(node.f, out, seen_order, emitted, use_skin);
            out.push('!');
        } else {
            self.save_node(node.q, out, seen_order, emitted, use_skin);
            self.save_node(node.t, out, seen_order, emitted, use_skin);
            self.save_node(node.f, out, seen_order, emitted, use_skin);
            out.push('?');
        }

        emitted.push(id);
    }

    /// Runs the tree over a 512-lane footprint vector. Lanes for the
    /// placeholder variables must already hold the standard truth-table
    /// seed (lane `i` of variable `v` is bit `v` of the Boolean assignment
    /// `i`); lane 0 (constant false) must be all-zero.
    pub fn eval(&self, lanes: &mut [[u64; FOOTPRINT_WORDS]; NEND as usize]) {
        for nid in NSTART..self.count {
            let node = self.nodes[nid as usize];
            let q = lanes[node.q as usize];
            let inverted = node.t & IBIT != 0;
            let t_lanes = lanes[(node.t & !IBIT) as usize];
            let f = lanes[node.f as usize];
            let mut result = [0u64; FOOTPRINT_WORDS];
            for w in 0..FOOTPRINT_WORDS {
                let t = if inverted { !t_lanes[w] } else { t_lanes[w] };
                result[w] = (q[w] & t) ^ (!q[w] & f[w]);
            }
            lanes[nid as usize] = result;
        }
    }

    /// Footprint for an arbitrary reference into this tree, honouring its
    /// invert bit. Takes `root` explicitly rather than reading `self.root`:
    /// normalisation passes (e.g. `normalise_cascades`) return a possibly
    /// different id than the one last `decode`d, without updating the
    /// latter, so the caller's own root value is the only one to trust.
    pub fn root_footprint(&self, lanes: &[[u64; FOOTPRINT_WORDS]; NEND as usize], root: u32) -> [u64; FOOTPRINT_WORDS] {
        let mut fp = lanes[(root & !IBIT) as usize];
        if root & IBIT != 0 {
            for w in fp.iter_mut() {
                *w = !*w;
            }
        }
        fp
    }
}

/// Builds the standard 512-lane footprint seed: lane `i` of variable `v`
/// holds bit `v` of the Boolean assignment `i`, with lane `0` all-zero.
/// Callers pass the result to [`TinyTree::eval`].
pub fn seeded_lanes() -> [[u64; FOOTPRINT_WORDS]; NEND as usize] {
    let mut lanes = [[0u64; FOOTPRINT_WORDS]; NEND as usize];
    for v in 0..MAXSLOTS {
        let mut lane = [0u64; FOOTPRINT_WORDS];
        for i in 0..(FOOTPRINT_WORDS * 64) {
            if (i >> v) & 1 != 0 {
                lane[i / 64] |= 1u64 << (i % 64);
            }
        }
        lanes[KSTART as usize + v] = lane;
    }
    lanes
}

fn push_back_reference(out: &mut String, back: usize) {
    if back <= 9 {
        out.push((b'0' + back as u8) as char);
    } else {
        // Extended back-reference: base-26 uppercase prefix over (back-10).
        out.push((b'A' + (back - 10) as u8) as char);
    }
}

fn pop1(stack: &mut Vec<u32>, pos: usize, ch: char) -> Result<u32> {
    stack.pop().ok_or_else(|| ParseError::new(pos, Some(ch), "stack underflow").into())
}

fn pop3_or(stack: &mut Vec<u32>, pos: usize, ch: char) -> Result<(u32, u32, u32)> {
    let f = pop1(stack, pos, ch)?;
    let q = pop1(stack, pos, ch)?;
    Ok((q, IBIT, f))
}

fn pop3_gt(stack: &mut Vec<u32>, pos: usize, ch: char) -> Result<(u32, u32, u32)> {
    let t = pop1(stack, pos, ch)?;
    let q = pop1(stack, pos, ch)?;
    Ok((q, t ^ IBIT, 0))
}

fn pop3_xor(stack: &mut Vec<u32>, pos: usize, ch: char) -> Result<(u32, u32, u32)> {
    let f = pop1(stack, pos, ch)?;
    let q = pop1(stack, pos, ch)?;
    Ok((q, f ^ IBIT, f))
}

fn pop3_and(stack: &mut Vec<u32>, pos: usize, ch: char) -> Result<(u32, u32, u32)> {
    let t = pop1(stack, pos, ch)?;
    let q = pop1(stack, pos, ch)?;
    Ok((q, t, 0))
}

fn pop3_qntf(stack: &mut Vec<u32>, pos: usize, ch: char) -> Result<(u32, u32, u32)> {
    let f = pop1(stack, pos, ch)?;
    let t = pop1(stack, pos, ch)?;
    let q = pop1(stack, pos, ch)?;
    Ok((q, t ^ IBIT, f))
}

fn pop3_qtf(stack: &mut Vec<u32>, pos: usize, ch: char) -> Result<(u32, u32, u32)> {
    let f = pop1(stack, pos, ch)?;
    let t = pop1(stack, pos, ch)?;
    let q = pop1(stack, pos, ch)?;
    Ok((q, t, f))
}

fn pop3_lt(stack: &mut Vec<u32>, pos: usize, ch: char) -> Result<(u32, u32, u32)> {
    let f = pop1(stack, pos, ch)?;
    let q = pop1(stack, pos, ch)?;
    Ok((f, q ^ IBIT, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip() {
        let mut t = TinyTree::new(false);
        let name = "ab+cd>efg&?hi^!";
        let root = t.decode_safe(name, None).unwrap();
        let printed = t.save_string(root, None);
        assert_eq!(printed, name);
    }

    #[test]
    fn xor_is_reordered_to_canonical_dyadic_order() {
        // "ab>ba+^" should normalise so that its top-level XOR children
        // appear in canonical (compare-sorted) order: "ab+ab>^".
        let mut build = TinyTree::new(false);
        let root = build.decode_safe("ab>ba+^", None).unwrap();
        let printed = build.save_string(root, None);
        assert_eq!(printed, "ab+ab>^");
    }

    #[test]
    fn self_collapse_to_q() {
        let mut t = TinyTree::new(false);
        let a = KSTART; // variable 'a'
        let r = t.add_normalised(a, a, a).unwrap();
        assert_eq!(r, a);
    }

    #[test]
    fn zero_collapse() {
        let mut t = TinyTree::new(false);
        let a = KSTART;
        let r = t.add_normalised(a, 0, 0).unwrap();
        assert_eq!(r, 0);
    }

    #[test]
    fn eval_matches_manual_substitution_under_a_skin() {
        let mut t = TinyTree::new(false);
        let name = "abc!defg!!hi!";
        let root_plain = t.decode_safe(name, None).unwrap();
        let mut lanes = seeded_lanes();
        t.eval(&mut lanes);
        let plain_fp = t.root_footprint(&lanes, root_plain);

        let mut t2 = TinyTree::new(false);
        // "bcadefghi" skin remaps a->b, b->c, c->a, rest identity.
        let root_skinned = t2.decode_safe(name, Some("bcadefghi")).unwrap();
        let mut lanes2 = seeded_lanes();
        t2.eval(&mut lanes2);
        let skinned_fp = t2.root_footprint(&lanes2, root_skinned);

        let mut t3 = TinyTree::new(false);
        let root_manual = t3.decode_safe("bca!defg!!hi!", None).unwrap();
        let mut lanes3 = seeded_lanes();
        t3.eval(&mut lanes3);
        let manual_fp = t3.root_footprint(&lanes3, root_manual);

        assert_eq!(skinned_fp, manual_fp);
        let _ = (root_plain, root_skinned, root_manual, plain_fp);
    }

    #[test]
    fn pure_mode_forbids_qtf_and_rewrites_to_qntf() {
        let mut t = TinyTree::new(true);
        let root = t.decode_safe("abc?", None).unwrap();
        for nid in NSTART..t.count {
            let node = t.nodes[nid as usize];
            assert_ne!(node.t & IBIT, 0, "every node must be QnTF in pure mode");
        }
        let _ = root;
    }

    #[test]
    fn inline_skin_after_slash_matches_explicit_skin_argument() {
        let name = "abc!defg!!hi!";
        let mut t_inline = TinyTree::new(false);
        let root_inline = t_inline
            .decode_safe(&format!("{}/bcadefghi", name), None)
            .unwrap();
        let mut t_explicit = TinyTree::new(false);
        let root_explicit = t_explicit.decode_safe(name, Some("bcadefghi")).unwrap();
        assert_eq!(
            t_inline.save_string(root_inline, None),
            t_explicit.save_string(root_explicit, None)
        );
    }

    #[test]
    fn capacity_overflow_is_recoverable() {
        // Chain enough distinct ANDs to exceed NUMNODES capacity.
        let mut t = TinyTree::new(false);
        let mut prev = KSTART;
        let mut hit_capacity = false;
        for v in (KSTART + 1)..(KSTART + MAXSLOTS as u32) {
            match t.basic_node(prev.min(v), prev.max(v), 0) {
                Ok(nid) => prev = nid,
                Err(_) => {
                    hit_capacity = true;
                    break;
                }
            }
        }
        let _ = hit_capacity;
    }
}

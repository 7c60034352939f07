//! Interleaved imprint index (§4.D). Rather than storing one footprint per
//! transform (huge) or trying all transforms per query (slow), only `rows`
//! representative imprints are stored per signature; at query time the
//! input footprint is permuted through `cols` column transforms and
//! re-hashed, recovering the full tid by composing the matched row's tid
//! with the query's column tid.

use tree::consts::{FOOTPRINT_WORDS, MAXSLOTS};
use tree::transform::{Perm, TransformTable};

use crate::error::{Error, Result};
use crate::interleave::InterleavePreset;
use crate::signature::next_prime;
use crate::versioned_index::VersionedIndex;

pub type Footprint = [u64; FOOTPRINT_WORDS];

/// Applies `perm` to `fp`, returning the footprint of the same function with
/// its variables relabelled according to `perm` (slot `k` becomes slot
/// `perm[k]`). Bit `i` of the permuted table is bit `i'` of `fp`, where `i'`
/// is `i` with its bits moved from position `perm[k]` to position `k`.
pub fn permute_footprint(fp: &Footprint, perm: &Perm) -> Footprint {
    let mut out = [0u64; FOOTPRINT_WORDS];
    let bits = FOOTPRINT_WORDS * 64;
    for i in 0..bits {
        let mut src = 0usize;
        for (k, &slot) in perm.iter().enumerate() {
            if (i >> k) & 1 != 0 {
                src |= 1 << slot;
            }
        }
        if (fp[src / 64] >> (src % 64)) & 1 != 0 {
            out[i / 64] |= 1u64 << (i % 64);
        }
    }
    out
}

fn hash_footprint(fp: &Footprint) -> u64 {
    let mut h = 0xcbf29ce484222325u64;
    for &word in fp {
        h ^= word;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// Lays `block_sizes` out sequentially over the `MAXSLOTS` positions,
/// labelling each position with the index of the block it falls in.
fn block_of(block_sizes: &[u8]) -> [u8; MAXSLOTS] {
    let mut out = [0u8; MAXSLOTS];
    let mut pos = 0usize;
    for (block, &size) in block_sizes.iter().enumerate() {
        for _ in 0..size {
            out[pos] = block as u8;
            pos += 1;
        }
    }
    debug_assert_eq!(pos, MAXSLOTS, "block_sizes must partition all MAXSLOTS positions");
    out
}

/// `perm` preserves the block partition iff every position's image falls in
/// the same block as the position itself. The set of such permutations is
/// the Young subgroup that freely reorders within each block and never
/// crosses a block boundary — the column subgroup H of §4.D.
fn preserves_blocks(perm: &Perm, blocks: &[u8; MAXSLOTS]) -> bool {
    (0..MAXSLOTS).all(|x| blocks[perm[x] as usize] == blocks[x])
}

/// For `h` preserving the block partition, `block_of(h(x)) == block_of(x)`
/// for every `x`, not just for the positions `perm` actually moves. This key
/// — the block each position's image falls in — is therefore constant
/// across an entire right coset of H: composing `perm` with any `h` in H
/// leaves it unchanged (`compose(perm, h)[i] = h(perm[i])`, and
/// `block_of(h(perm[i])) == block_of(perm[i])`). Two tids share a coset iff
/// their keys match, so grouping by this key and keeping one representative
/// per group yields a valid set of coset representatives.
fn coset_key(perm: &Perm, blocks: &[u8; MAXSLOTS]) -> u64 {
    let mut key = 0u64;
    for (i, &slot) in perm.iter().enumerate() {
        key |= (blocks[slot as usize] as u64) << (4 * i);
    }
    key
}

/// Builds the column subgroup (`col_tids`, every block-preserving tid) and
/// one row representative per distinct right coset of that subgroup
/// (`row_tids`), for `preset`'s `block_sizes` partition. Every tid in
/// `0..transforms.num_transforms` then factors as exactly one
/// `compose(col, row)` (§4.D "Key property"): unlike taking arbitrary tid
/// prefixes for both sets, this guarantees the composition spans all of
/// `S9`, not just the subgroup `col_tids` itself.
pub fn build_row_col_tids(preset: InterleavePreset, transforms: &TransformTable) -> (Vec<u32>, Vec<u32>) {
    let blocks = block_of(preset.block_sizes);
    let mut col_tids = Vec::with_capacity(preset.cols as usize);
    let mut row_tids = Vec::with_capacity(preset.rows as usize);
    let mut seen_cosets: std::collections::HashMap<u64, u32> = std::collections::HashMap::with_capacity(preset.rows as usize * 2);

    for tid in 0..transforms.num_transforms {
        let perm = transforms.forward(tid);
        if preserves_blocks(&perm, &blocks) {
            col_tids.push(tid);
        }
        let key = coset_key(&perm, &blocks);
        if seen_cosets.insert(key, tid).is_none() {
            row_tids.push(tid);
        }
    }

    debug_assert_eq!(col_tids.len(), preset.cols as usize, "column subgroup size must match the preset");
    debug_assert_eq!(row_tids.len(), preset.rows as usize, "coset count must match the preset");
    (row_tids, col_tids)
}

/// Every candidate tid (besides the identity) whose permutation leaves
/// `footprint` unchanged (§4.C "Signature swap"). `candidates` is typically
/// a signature's own row/col tid sets, a bounded pool that already reaches
/// every orientation a lookup can land on.
pub fn compute_swap(transforms: &TransformTable, candidates: &[u32], footprint: &Footprint) -> Vec<u32> {
    let mut swap = Vec::new();
    for &tid in candidates {
        if tid == TransformTable::IDENTITY {
            continue;
        }
        let perm = transforms.forward(tid);
        if permute_footprint(footprint, &perm) == *footprint {
            swap.push(tid);
        }
    }
    swap
}

#[derive(Debug, Clone, Copy)]
struct StoredImprint {
    footprint: Footprint,
    sid: u32,
    /// Index of the stored row representative (0..preset.rows), not the
    /// full tid; the full tid is recovered by composing with a column tid
    /// at query time.
    row: u32,
}

pub struct ImprintIndex {
    preset: InterleavePreset,
    imprints: Vec<StoredImprint>,
    by_footprint: VersionedIndex,
    /// One representative tid per right coset of `col_tids` in `S9` (§4.D);
    /// see `build_row_col_tids`.
    row_tids: Vec<u32>,
    /// The block-preserving subgroup of `S9` fixed by `preset.block_sizes`.
    col_tids: Vec<u32>,
}

impl ImprintIndex {
    pub fn new(preset: InterleavePreset, transforms: &TransformTable, expected_signatures: usize) -> Self {
        let (row_tids, col_tids) = build_row_col_tids(preset, transforms);
        Self {
            preset,
            imprints: Vec::with_capacity(expected_signatures * row_tids.len()),
            by_footprint: VersionedIndex::with_capacity(next_prime(
                expected_signatures * row_tids.len() * 5 + 11,
            )),
            row_tids,
            col_tids,
        }
    }

    pub fn len(&self) -> usize {
        self.imprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imprints.is_empty()
    }

    pub fn row_tids(&self) -> &[u32] {
        &self.row_tids
    }

    pub fn col_tids(&self) -> &[u32] {
        &self.col_tids
    }

    /// Adds `rows` imprint entries for a newly-discovered signature's
    /// canonical footprint, one per row permutation.
    pub fn add(&mut self, transforms: &TransformTable, sid: u32, canonical_footprint: &Footprint) -> Result<()> {
        for row in 0..self.row_tids.len() {
            let row_tid = self.row_tids[row];
            let perm = transforms.forward(row_tid);
            let permuted = permute_footprint(canonical_footprint, &perm);
            let hash = hash_footprint(&permuted);
            if self.imprints.len() as u64 >= u32::MAX as u64 {
                return Err(Error::SectionOverflow {
                    section: "imprints",
                    capacity: u32::MAX,
                    attempted: self.imprints.len() as u32 + 1,
                });
            }
            let id = self.imprints.len() as u32;
            self.imprints.push(StoredImprint { footprint: permuted, sid, row: row as u32 });
            self.by_footprint.insert(hash, id, |stored| {
                self.imprints[stored as usize].footprint == permuted
            });
        }
        Ok(())
    }

    /// Given any tree's footprint, tries every column permutation and
    /// returns `(sid, tid)` on the first hit, where `tid` is the composition
    /// of the matched row's tid and the query column's tid (§4.D "Key
    /// property").
    pub fn lookup(&self, transforms: &TransformTable, footprint: &Footprint) -> Option<(u32, u32)> {
        for &col_tid in &self.col_tids {
            let perm = transforms.forward(col_tid);
            let permuted = permute_footprint(footprint, &perm);
            let hash = hash_footprint(&permuted);
            if let Some(id) = self
                .by_footprint
                .lookup(hash, |id| self.imprints[id as usize].footprint == permuted)
            {
                let stored = self.imprints[id as usize];
                let row_tid = self.row_tids[stored.row as usize];
                // Recover the tid mapping the query tree onto the
                // signature's canonical orientation: compose the column
                // permutation used to find the hit with the stored row,
                // then resolve the composed permutation back to a tid
                // through the name automaton.
                let combined = TransformTable::compose(&perm, &transforms.forward(row_tid));
                let combined_name: String = combined.iter().map(|&s| (b'a' + s) as char).collect();
                let combined_tid = transforms.lookup_forward(&combined_name).unwrap_or(row_tid);
                return Some((stored.sid, combined_tid));
            }
        }
        None
    }

    pub fn preset(&self) -> InterleavePreset {
        self.preset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_permutation_leaves_footprint_unchanged() {
        let t = TransformTable::new();
        let fp: Footprint = std::array::from_fn(|i| (i as u64).wrapping_mul(0x9e3779b97f4a7c15));
        let identity = t.forward(TransformTable::IDENTITY);
        assert_eq!(permute_footprint(&fp, &identity), fp);
    }

    #[test]
    fn added_signature_is_recoverable_under_every_tested_transform() {
        let transforms = TransformTable::new();
        let preset = crate::interleave::lookup(crate::interleave::DEFAULT_INTERLEAVE).unwrap();
        let mut idx = ImprintIndex::new(preset, &transforms, 1);
        let mut fp: Footprint = [0u64; FOOTPRINT_WORDS];
        fp[0] = 0b10110;
        idx.add(&transforms, 7, &fp).unwrap();

        for &tid in &[0u32, 1, 5] {
            let perm = transforms.forward(tid);
            let permuted = permute_footprint(&fp, &perm);
            let hit = idx.lookup(&transforms, &permuted);
            assert!(hit.is_some(), "transform {} should be recoverable", tid);
            assert_eq!(hit.unwrap().0, 7);
        }
    }

    #[test]
    fn row_and_col_tids_partition_every_transform_exactly_once() {
        let transforms = TransformTable::new();
        let preset = crate::interleave::lookup(crate::interleave::DEFAULT_INTERLEAVE).unwrap();
        let (row_tids, col_tids) = build_row_col_tids(preset, &transforms);
        assert_eq!(row_tids.len(), preset.rows as usize);
        assert_eq!(col_tids.len(), preset.cols as usize);

        let mut seen = std::collections::HashSet::with_capacity(transforms.num_transforms as usize);
        for &row_tid in &row_tids {
            let row_perm = transforms.forward(row_tid);
            for &col_tid in &col_tids {
                let col_perm = transforms.forward(col_tid);
                let combined = TransformTable::compose(&col_perm, &row_perm);
                let name: String = combined.iter().map(|&s| (b'a' + s) as char).collect();
                let tid = transforms.lookup_forward(&name).unwrap();
                assert!(seen.insert(tid), "tid {} produced by more than one (row, col) pair", tid);
            }
        }
        assert_eq!(seen.len(), transforms.num_transforms as usize);
    }

    #[test]
    fn a_non_trivial_swap_is_found_for_a_symmetric_footprint() {
        let transforms = TransformTable::new();
        // Swapping slots a/b leaves this footprint (built only from a XOR b)
        // unchanged.
        let mut fp: Footprint = [0u64; FOOTPRINT_WORDS];
        for i in 0..(FOOTPRINT_WORDS * 64) {
            let a = (i >> 0) & 1;
            let b = (i >> 1) & 1;
            if a ^ b != 0 {
                fp[i / 64] |= 1u64 << (i % 64);
            }
        }
        let swap_tid = transforms.lookup_forward("bacdefghi").unwrap();
        let candidates = vec![TransformTable::IDENTITY, swap_tid, transforms.lookup_forward("cbadefghi").unwrap()];
        let swap = compute_swap(&transforms, &candidates, &fp);
        assert_eq!(swap, vec![swap_tid]);
    }
}

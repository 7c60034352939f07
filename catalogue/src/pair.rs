//! Sid/tid pair table (§3 "Sid/tid pair"). Gives a (sid, tid) combination a
//! stable id so a member can compactly reference the semantic identity and
//! orientation of each of its three subtrees instead of repeating the pair.

use crate::versioned_index::VersionedIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SidTid {
    pub sid: u32,
    pub tid: u32,
}

fn pack(p: SidTid) -> u64 {
    ((p.sid as u64) << 32) | p.tid as u64
}

pub struct PairTable {
    pairs: Vec<SidTid>,
    by_pair: VersionedIndex,
}

impl PairTable {
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(expected),
            by_pair: VersionedIndex::with_capacity(crate::signature::next_prime(expected * 5 + 7)),
        }
    }

    pub fn get(&self, pair_id: u32) -> SidTid {
        self.pairs[pair_id as usize]
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Interns `(sid, tid)`, returning its stable pair id.
    pub fn intern(&mut self, sid: u32, tid: u32) -> u32 {
        let key = SidTid { sid, tid };
        let hash = pack(key);
        let existing = self.by_pair.lookup(hash, |id| self.pairs[id as usize] == key);
        if let Some(id) = existing {
            return id;
        }
        let id = self.pairs.len() as u32;
        self.pairs.push(key);
        self.by_pair.insert(hash, id, |stored| self.pairs[stored as usize] == key);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_pair_twice_is_idempotent() {
        let mut t = PairTable::with_capacity(8);
        let a = t.intern(3, 7);
        let b = t.intern(3, 7);
        assert_eq!(a, b);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn different_tids_for_the_same_sid_are_distinct_pairs() {
        let mut t = PairTable::with_capacity(8);
        let a = t.intern(3, 7);
        let b = t.intern(3, 8);
        assert_ne!(a, b);
    }
}

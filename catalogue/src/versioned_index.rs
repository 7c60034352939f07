//! The `(index, version_stamp, current_version)` open-addressed hash table
//! described in spec §9: bulk invalidation is a single counter bump, not a
//! table walk. One instance backs the signature index, the imprint index,
//! and the sid/tid pair index (§4.D).

const EMPTY: u32 = u32::MAX;

/// Open-addressed hash table over `u64` keys, storing `u32` ids. A slot is
/// logically empty whenever its stamp does not match `current_version`,
/// regardless of what bytes are still sitting in `index`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VersionedIndex {
    index: Vec<u32>,
    version_stamp: Vec<u32>,
    current_version: u32,
}

impl VersionedIndex {
    /// `capacity` should be prime and sized at roughly 5x the expected
    /// element count, per §4.D.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: vec![EMPTY; capacity],
            version_stamp: vec![0; capacity],
            current_version: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.index.len()
    }

    fn is_live(&self, slot: usize) -> bool {
        self.version_stamp[slot] == self.current_version && self.index[slot] != EMPTY
    }

    /// Invalidates every entry in O(1) by bumping the version counter.
    /// Wrapping is not a practical concern at `u32` scale for this workload.
    pub fn invalidate_all(&mut self) {
        self.current_version = self.current_version.wrapping_add(1);
        if self.current_version == 0 {
            self.current_version = 1;
        }
    }

    /// Probes linearly from `hash % capacity` for either a live slot whose
    /// stored key matches (via `key_eq`) or the first empty slot, whichever
    /// comes first. Returns `(slot, found)`.
    fn probe(&self, hash: u64, key_eq: impl Fn(u32) -> bool) -> (usize, bool) {
        let cap = self.index.len();
        let start = (hash % cap as u64) as usize;
        for step in 0..cap {
            let slot = (start + step) % cap;
            if !self.is_live(slot) {
                return (slot, false);
            }
            if key_eq(self.index[slot]) {
                return (slot, true);
            }
        }
        // Every slot occupied: caller sized the table too small. The
        // original tool treats this as a fatal section-capacity overflow.
        (start, false)
    }

    /// Inserts `id` at the first empty slot found probing from `hash`,
    /// unless `key_eq` already finds a live match (in which case the
    /// existing id is returned instead, matching hash-set insert semantics).
    pub fn insert(&mut self, hash: u64, id: u32, key_eq: impl Fn(u32) -> bool) -> u32 {
        let (slot, found) = self.probe(hash, &key_eq);
        if found {
            return self.index[slot];
        }
        self.index[slot] = id;
        self.version_stamp[slot] = self.current_version;
        id
    }

    pub fn lookup(&self, hash: u64, key_eq: impl Fn(u32) -> bool) -> Option<u32> {
        let (slot, found) = self.probe(hash, key_eq);
        if found {
            Some(self.index[slot])
        } else {
            None
        }
    }

    pub fn len_live(&self) -> usize {
        (0..self.index.len()).filter(|&s| self.is_live(s)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut idx = VersionedIndex::with_capacity(97);
        let id = idx.insert(42, 7, |stored| stored == 7);
        assert_eq!(id, 7);
        assert_eq!(idx.lookup(42, |stored| stored == 7), Some(7));
    }

    #[test]
    fn invalidate_all_clears_every_entry_in_one_step() {
        let mut idx = VersionedIndex::with_capacity(97);
        idx.insert(1, 1, |stored| stored == 1);
        idx.insert(2, 2, |stored| stored == 2);
        assert_eq!(idx.len_live(), 2);
        idx.invalidate_all();
        assert_eq!(idx.len_live(), 0);
        assert_eq!(idx.lookup(1, |stored| stored == 1), None);
    }

    #[test]
    fn colliding_hashes_probe_past_a_live_occupant() {
        let mut idx = VersionedIndex::with_capacity(97);
        idx.insert(5, 100, |stored| stored == 100);
        let second = idx.insert(5, 200, |stored| stored == 200);
        assert_eq!(second, 200);
        assert_eq!(idx.lookup(5, |stored| stored == 200), Some(200));
    }
}

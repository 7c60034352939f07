//! Signature catalogue (§3 "Signature", §4.D "Signature lookup phase").
//!
//! A signature is an equivalence class of trees under "there exists a
//! transform mapping one onto the other". Signatures are append-only during
//! a build pass; only `first_member` is mutated afterwards, when members are
//! attached to the class.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::versioned_index::VersionedIndex;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SignatureFlags: u32 {
        /// Tree is built entirely of QnTF nodes (pure mode).
        const SAFE = 1 << 0;
        /// A signature the catalogue must never allow to collapse to zero
        /// members, even across depreciation.
        const KEY = 1 << 1;
        /// Explicitly allowed to contain a raw QTF node.
        const UNSAFE = 1 << 2;
    }
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub num_placeholder: u8,
    pub num_endpoint: u8,
    pub num_backref: u8,
    pub size: u16,
    pub flags: SignatureFlags,
    /// Index into the owning `SignatureCatalogue::members` of the head of
    /// this signature's member list, or `None` if it has no members yet.
    pub first_member: Option<u32>,
    /// Transforms under which this signature's footprint is invariant
    /// (§4.C "Signature swap"). Empty for an asymmetric signature; computed
    /// by `imprint::compute_swap` against the signature's own row/col tid
    /// pool when the signature is first interned, and consulted by
    /// `lookup::lookup_and_select` to rotate to the lexicographically
    /// smallest equivalent orientation.
    pub swap: Vec<u32>,
}

impl Signature {
    fn new(name: String, num_placeholder: u8, num_endpoint: u8, num_backref: u8, size: u16, flags: SignatureFlags) -> Self {
        Self {
            name,
            num_placeholder,
            num_endpoint,
            num_backref,
            size,
            flags,
            first_member: None,
            swap: Vec::new(),
        }
    }
}

fn name_hash(name: &str) -> u64 {
    let mut h = DefaultHasher::new();
    name.hash(&mut h);
    h.finish()
}

/// Owns the append-only signature table and its name index. `sid` is simply
/// the position in `signatures`.
pub struct SignatureCatalogue {
    signatures: Vec<Signature>,
    by_name: VersionedIndex,
}

impl SignatureCatalogue {
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            signatures: Vec::with_capacity(expected),
            by_name: VersionedIndex::with_capacity(next_prime(expected * 5 + 7)),
        }
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn get(&self, sid: u32) -> &Signature {
        &self.signatures[sid as usize]
    }

    pub fn get_mut(&mut self, sid: u32) -> &mut Signature {
        &mut self.signatures[sid as usize]
    }

    pub fn find_by_name(&self, name: &str) -> Option<u32> {
        let hash = name_hash(name);
        self.by_name
            .lookup(hash, |id| self.signatures[id as usize].name == name)
    }

    /// Inserts a new signature keyed by canonical name, or returns the
    /// existing sid if one with the same name is already present
    /// (signatures form a set keyed by canonical name, per §3).
    pub fn intern(
        &mut self,
        name: &str,
        num_placeholder: u8,
        num_endpoint: u8,
        num_backref: u8,
        size: u16,
        flags: SignatureFlags,
    ) -> Result<u32> {
        if let Some(sid) = self.find_by_name(name) {
            return Ok(sid);
        }
        let sid = self.signatures.len() as u32;
        if sid == u32::MAX {
            return Err(Error::SectionOverflow {
                section: "signatures",
                capacity: u32::MAX,
                attempted: sid + 1,
            });
        }
        self.signatures.push(Signature::new(
            name.to_string(),
            num_placeholder,
            num_endpoint,
            num_backref,
            size,
            flags,
        ));
        let hash = name_hash(name);
        self.by_name.insert(hash, sid, |id| self.signatures[id as usize].name == name);
        Ok(sid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Signature)> {
        self.signatures.iter().enumerate().map(|(i, s)| (i as u32, s))
    }
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

/// Section index sizes must be prime (§4.D). Walks upward from `n`.
pub fn next_prime(n: usize) -> usize {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_name_twice_returns_the_same_sid() {
        let mut cat = SignatureCatalogue::with_capacity(16);
        let a = cat.intern("ab+", 2, 2, 0, 1, SignatureFlags::SAFE).unwrap();
        let b = cat.intern("ab+", 2, 2, 0, 1, SignatureFlags::SAFE).unwrap();
        assert_eq!(a, b);
        assert_eq!(cat.len(), 1);
    }

    #[test]
    fn distinct_names_receive_increasing_sids_in_encounter_order() {
        let mut cat = SignatureCatalogue::with_capacity(16);
        let a = cat.intern("ab+", 2, 2, 0, 1, SignatureFlags::SAFE).unwrap();
        let b = cat.intern("ab^", 2, 2, 0, 1, SignatureFlags::SAFE).unwrap();
        assert!(b > a);
    }

    #[test]
    fn next_prime_rounds_up() {
        assert_eq!(next_prime(10), 11);
        assert_eq!(next_prime(2), 2);
    }
}

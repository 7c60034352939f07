//! Member table (§3 "Member"): concrete trees within a signature class,
//! retained so the rewrite path can expand a signature back into an actual
//! tree. Members form a singly linked list per signature via `next`; the
//! list head lives in `Signature::first_member`.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemberFlags: u32 {
        /// Depreciated: still present but excluded from member selection.
        const DEPR = 1 << 0;
        /// Removing this member would empty its signature's member list.
        const LOCKED = 1 << 1;
        /// Built entirely of QnTF nodes.
        const SAFE = 1 << 2;
        /// Used as a component subtree by at least one other member.
        const COMP = 1 << 3;
    }
}

pub const MAX_HEADS: usize = 5;

#[derive(Debug, Clone)]
pub struct Member {
    pub sid: u32,
    pub name: String,
    pub flags: MemberFlags,
    /// Pair-table ids of the Q, T, F subtrees, or `None` for a bare endpoint.
    pub q_pair: Option<u32>,
    pub t_pair: Option<u32>,
    pub f_pair: Option<u32>,
    /// Up to five "head" references: other members whose Q/T/F this member
    /// appears as (the reverse edges of `q_pair`/`t_pair`/`f_pair`).
    pub heads: [Option<u32>; MAX_HEADS],
    /// Next member in this signature's linked list, or `None` at the tail.
    pub next: Option<u32>,
}

impl Member {
    pub fn new(sid: u32, name: String, flags: MemberFlags) -> Self {
        Self {
            sid,
            name,
            flags,
            q_pair: None,
            t_pair: None,
            f_pair: None,
            heads: [None; MAX_HEADS],
            next: None,
        }
    }

    pub fn add_head(&mut self, head: u32) -> bool {
        for slot in self.heads.iter_mut() {
            if slot.is_none() {
                *slot = Some(head);
                return true;
            }
        }
        false
    }

    /// Flattens to a plain, serialisable record (§4.I container sections).
    /// `heads` is rebuilt from `q_pair`/`t_pair`/`f_pair` back-edges on
    /// reload rather than persisted directly, so it is not part of the
    /// record.
    pub fn to_record(&self) -> MemberRecord {
        MemberRecord {
            sid: self.sid,
            name: self.name.clone(),
            flags: self.flags.bits(),
            q_pair: self.q_pair,
            t_pair: self.t_pair,
            f_pair: self.f_pair,
            next: self.next,
        }
    }

    pub fn from_record(record: MemberRecord) -> Self {
        Self {
            sid: record.sid,
            name: record.name,
            flags: MemberFlags::from_bits_truncate(record.flags),
            q_pair: record.q_pair,
            t_pair: record.t_pair,
            f_pair: record.f_pair,
            heads: [None; MAX_HEADS],
            next: record.next,
        }
    }
}

/// Plain, serde-friendly mirror of `Member`, used to persist/reload the
/// member table as a container section. `MemberFlags` carries no serde impl
/// of its own, so flags round-trip as a raw `u32` bitmask.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemberRecord {
    pub sid: u32,
    pub name: String,
    pub flags: u32,
    pub q_pair: Option<u32>,
    pub t_pair: Option<u32>,
    pub f_pair: Option<u32>,
    pub next: Option<u32>,
}

/// Owns the append-only member array and attaches new members to the head
/// of their signature's linked list (§3 "their `firstMember` field is
/// mutated when members are attached").
#[derive(Default)]
pub struct MemberTable {
    members: Vec<Member>,
}

impl MemberTable {
    pub fn new() -> Self {
        Self { members: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: u32) -> &Member {
        &self.members[id as usize]
    }

    pub fn get_mut(&mut self, id: u32) -> &mut Member {
        &mut self.members[id as usize]
    }

    /// Appends `member`, prepending it onto its signature's member list.
    pub fn attach(&mut self, mut member: Member, signature: &mut crate::signature::Signature) -> u32 {
        member.next = signature.first_member;
        let id = self.members.len() as u32;
        self.members.push(member);
        signature.first_member = Some(id);
        id
    }

    /// Appends `member` as-is, without touching `next` or any signature's
    /// `first_member`. Used to replay a persisted member table back into
    /// memory in its original id order, where `next`/`first_member` were
    /// already captured by the container sections being restored.
    pub fn push_raw(&mut self, member: Member) -> u32 {
        let id = self.members.len() as u32;
        self.members.push(member);
        id
    }

    /// Walks the member list rooted at `head`, yielding member ids in
    /// attach order (most-recently-attached first).
    pub fn list(&self, head: Option<u32>) -> Vec<u32> {
        let mut out = Vec::new();
        let mut cur = head;
        while let Some(id) = cur {
            out.push(id);
            cur = self.members[id as usize].next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Signature, SignatureFlags};

    fn blank_signature() -> Signature {
        let mut cat = crate::signature::SignatureCatalogue::with_capacity(1);
        let sid = cat.intern("a", 1, 1, 0, 0, SignatureFlags::SAFE).unwrap();
        cat.get(sid).clone()
    }

    #[test]
    fn attaching_members_prepends_onto_the_list() {
        let mut sig = blank_signature();
        let mut table = MemberTable::new();
        let m1 = table.attach(Member::new(0, "a".into(), MemberFlags::SAFE), &mut sig);
        let m2 = table.attach(Member::new(0, "b".into(), MemberFlags::SAFE), &mut sig);
        assert_eq!(table.list(sig.first_member), vec![m2, m1]);
    }

    #[test]
    fn add_head_fills_slots_in_order_and_reports_when_full() {
        let mut m = Member::new(0, "a".into(), MemberFlags::SAFE);
        for i in 0..MAX_HEADS as u32 {
            assert!(m.add_head(i));
        }
        assert!(!m.add_head(99));
    }
}

//! Slots stored inside extents: live records and deleted (free) spans

use crate::core::loc::Loc;
use serde::{Deserialize, Serialize};

/// Bytes of bookkeeping in front of every record payload
pub const RECORD_HEADER_LEN: u32 = 16;

/// Smallest span that can still serve as a free-list entry
///
/// Allocation always leaves at least this much behind in a slot, so every
/// extent keeps some reclaimable space.
pub const MIN_DELETED_LEN: u32 = 24;

/// Forward link of a deleted slot inside its free-list bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextDeleted {
    End,
    At(Loc),
    /// Unlinked by the allocator; the slot no longer belongs to any bucket
    Detached,
}

impl NextDeleted {
    pub fn from_option(next: Option<Loc>) -> Self {
        next.map_or(NextDeleted::End, NextDeleted::At)
    }

    /// Successor while linked; a detached slot has none
    pub fn loc(&self) -> Option<Loc> {
        match self {
            NextDeleted::At(loc) => Some(*loc),
            NextDeleted::End | NextDeleted::Detached => None,
        }
    }
}

/// A reclaimed or never-used span inside exactly one extent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedSlot {
    /// Owning extent
    pub(crate) extent: Loc,
    pub(crate) length_with_headers: u32,
    pub(crate) next_deleted: NextDeleted,
}

impl DeletedSlot {
    pub fn new(extent: Loc, length_with_headers: u32) -> Self {
        DeletedSlot {
            extent,
            length_with_headers,
            next_deleted: NextDeleted::End,
        }
    }

    pub fn extent(&self) -> Loc {
        self.extent
    }

    pub fn length_with_headers(&self) -> u32 {
        self.length_with_headers
    }

    pub fn next(&self) -> Option<Loc> {
        self.next_deleted.loc()
    }
}

/// A live record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub(crate) extent: Loc,
    pub(crate) length_with_headers: u32,
    pub(crate) prev: Option<Loc>,
    pub(crate) next: Option<Loc>,
    pub(crate) payload: Vec<u8>,
}

impl Record {
    pub fn extent(&self) -> Loc {
        self.extent
    }

    pub fn length_with_headers(&self) -> u32 {
        self.length_with_headers
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload bytes counted against the collection's data size
    pub fn net_len(&self) -> u64 {
        self.payload.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    Record(Record),
    Deleted(DeletedSlot),
}

impl Slot {
    /// Extent the slot lives in, whichever kind it is
    pub fn extent(&self) -> Loc {
        match self {
            Slot::Record(r) => r.extent,
            Slot::Deleted(d) => d.extent,
        }
    }

    pub fn length_with_headers(&self) -> u32 {
        match self {
            Slot::Record(r) => r.length_with_headers,
            Slot::Deleted(d) => d.length_with_headers,
        }
    }
}

/// Length of a record holding `payload_len` bytes, header included, 4-byte aligned
pub fn record_len_for(payload_len: usize) -> u64 {
    (payload_len as u64 + RECORD_HEADER_LEN as u64 + 3) & !3
}

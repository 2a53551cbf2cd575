//! Addressable store of extents and slots
//!
//! Stands in for the memory-mapped data files: every extent header and every
//! slot (record or deleted span) is reachable by its [`Loc`]. The arena knows
//! nothing about free lists or the capped cursor; those live in
//! [`CappedDetails`](crate::core::details::CappedDetails).

use crate::core::error::{CappedError, Result};
use crate::core::extent::{Extent, EXTENT_HEADER_LEN};
use crate::core::loc::Loc;
use crate::core::record::{DeletedSlot, Record, Slot, MIN_DELETED_LEN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bytes reserved at the start of every data file
pub const FILE_HEADER_LEN: u32 = 8192;

/// Largest data file; extents that would cross it open a new file
pub const MAX_FILE_LEN: u32 = 0x7ff0_0000;

/// Reject an extent length the layout cannot hold
///
/// An extent must fit one data file, be 4-byte aligned and leave room for at
/// least one deleted slot after its header.
pub fn check_extent_size(index: usize, size: u32) -> Result<()> {
    let min_extent = EXTENT_HEADER_LEN + MIN_DELETED_LEN;
    if size < min_extent {
        return Err(CappedError::InvalidConfig(format!(
            "extent {} is {} bytes, the minimum is {}",
            index, size, min_extent
        )));
    }
    if size > MAX_FILE_LEN - FILE_HEADER_LEN {
        return Err(CappedError::InvalidConfig(format!(
            "extent {} is {} bytes, larger than a data file",
            index, size
        )));
    }
    if size % 4 != 0 {
        return Err(CappedError::InvalidConfig(format!(
            "extent {} length {} is not a multiple of 4",
            index, size
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arena {
    /// Extent headers by location
    extents: BTreeMap<Loc, Extent>,

    /// Records and deleted slots by location
    slots: BTreeMap<Loc, Slot>,
}

impl Arena {
    /// Lay out a ring of extents back to back
    ///
    /// Each extent's body is carved into a single deleted slot so that a fresh
    /// extent always has reclaimable space. The slots are not linked into any
    /// free list yet. Returns the extent locations in ring order.
    pub fn layout(extent_sizes: &[u32]) -> Result<(Arena, Vec<Loc>)> {
        let mut arena = Arena::default();
        let mut order = Vec::with_capacity(extent_sizes.len());

        let mut file = 0u32;
        let mut offset = FILE_HEADER_LEN;

        for (i, &size) in extent_sizes.iter().enumerate() {
            check_extent_size(i, size)?;
            if offset as u64 + size as u64 > MAX_FILE_LEN as u64 {
                file += 1;
                offset = FILE_HEADER_LEN;
            }

            let loc = Loc::new(file, offset);
            let mut extent = Extent::new(loc, size);
            if let Some(&prev) = order.last() {
                extent.xprev = Some(prev);
                arena.extent_mut(prev)?.xnext = Some(loc);
            }

            let body = extent.body_start();
            let body_len = extent.body_len();
            arena.extents.insert(loc, extent);
            arena
                .slots
                .insert(body, Slot::Deleted(DeletedSlot::new(loc, body_len)));

            order.push(loc);
            offset += size;
        }

        Ok((arena, order))
    }

    pub fn extent(&self, loc: Loc) -> Result<&Extent> {
        self.extents.get(&loc).ok_or(CappedError::DanglingLocation {
            loc,
            expected: "extent",
        })
    }

    pub fn extent_mut(&mut self, loc: Loc) -> Result<&mut Extent> {
        self.extents.get_mut(&loc).ok_or(CappedError::DanglingLocation {
            loc,
            expected: "extent",
        })
    }

    pub fn extent_count(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> impl Iterator<Item = &Extent> {
        self.extents.values()
    }

    pub fn slot(&self, loc: Loc) -> Result<&Slot> {
        self.slots.get(&loc).ok_or(CappedError::DanglingLocation {
            loc,
            expected: "slot",
        })
    }

    pub fn slots(&self) -> impl Iterator<Item = (&Loc, &Slot)> {
        self.slots.iter()
    }

    /// Extent owning the slot at `loc`
    pub fn extent_of(&self, loc: Loc) -> Result<Loc> {
        Ok(self.slot(loc)?.extent())
    }

    pub fn deleted(&self, loc: Loc) -> Result<&DeletedSlot> {
        match self.slots.get(&loc) {
            Some(Slot::Deleted(d)) => Ok(d),
            _ => Err(CappedError::DanglingLocation {
                loc,
                expected: "deleted slot",
            }),
        }
    }

    pub fn deleted_mut(&mut self, loc: Loc) -> Result<&mut DeletedSlot> {
        match self.slots.get_mut(&loc) {
            Some(Slot::Deleted(d)) => Ok(d),
            _ => Err(CappedError::DanglingLocation {
                loc,
                expected: "deleted slot",
            }),
        }
    }

    pub fn record(&self, loc: Loc) -> Result<&Record> {
        match self.slots.get(&loc) {
            Some(Slot::Record(r)) => Ok(r),
            _ => Err(CappedError::DanglingLocation {
                loc,
                expected: "record",
            }),
        }
    }

    pub fn record_mut(&mut self, loc: Loc) -> Result<&mut Record> {
        match self.slots.get_mut(&loc) {
            Some(Slot::Record(r)) => Ok(r),
            _ => Err(CappedError::DanglingLocation {
                loc,
                expected: "record",
            }),
        }
    }

    /// Place a slot, checking it stays inside its extent's body
    pub fn put_slot(&mut self, loc: Loc, slot: Slot) -> Result<()> {
        let extent = self.extent(slot.extent())?;
        if !extent.contains_span(loc, slot.length_with_headers()) {
            return Err(CappedError::SlotInsideHeader {
                slot: loc,
                extent: extent.loc(),
            });
        }
        self.slots.insert(loc, slot);
        Ok(())
    }

    pub fn take_slot(&mut self, loc: Loc) -> Result<Slot> {
        self.slots.remove(&loc).ok_or(CappedError::DanglingLocation {
            loc,
            expected: "slot",
        })
    }

    /// Live records of one extent, oldest first
    pub fn records_in(&self, extent: Loc) -> Result<Vec<Loc>> {
        let mut out = Vec::new();
        let mut cur = self.extent(extent)?.first_record();
        while let Some(loc) = cur {
            out.push(loc);
            cur = self.record(loc)?.next;
        }
        Ok(out)
    }

    /// Two deleted slots are adjacent when they share an extent and the first
    /// ends exactly where the second begins
    pub fn are_adjacent(&self, a: Loc, b: Loc) -> Result<bool> {
        let first = self.deleted(a)?;
        let second = self.deleted(b)?;
        Ok(first.extent == second.extent
            && a.file() == b.file()
            && a.end_of(first.length_with_headers) == b.offset() as u64)
    }
}

//! Bucket-0 bookkeeping for capped collections
//!
//! Bucket 0 is one singly-linked list of deleted slots. The slots of the
//! active extent form a contiguous run inside it, starting either at the list
//! head or right after the boundary slot kept in bucket 1.

use crate::core::details::BoundaryMarker;
use crate::core::error::{CappedError, Result};
use crate::core::loc::Loc;
use crate::core::record::NextDeleted;
use crate::core::state::CappedState;
use serde::Serialize;

/// A free slot as seen from outside the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreeSlot {
    loc: Loc,
    extent: Loc,
    len: u32,
}

impl FreeSlot {
    pub fn loc(&self) -> Loc {
        self.loc
    }

    /// Extent the slot belongs to
    pub fn extent(&self) -> Loc {
        self.extent
    }

    /// Size including bookkeeping
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if `other` starts exactly where this slot ends, in the same extent
    pub fn is_adjacent_to(&self, other: &FreeSlot) -> bool {
        self.extent == other.extent
            && self.loc.file() == other.loc.file()
            && self.loc.end_of(self.len) == other.loc.offset() as u64
    }
}

impl CappedState {
    /// End the layout phase: bucket 0 is split at the list head from now on
    pub(crate) fn establish_boundary(&mut self) {
        if self.details.boundary == BoundaryMarker::Unestablished {
            self.details.boundary = BoundaryMarker::AtListHead;
        }
    }

    /// First deleted slot attributed to the active extent
    pub(crate) fn first_deleted_in_cap_extent(&self) -> Result<Option<Loc>> {
        match self.details.boundary {
            BoundaryMarker::At(boundary) => Ok(self.arena.deleted(boundary)?.next()),
            BoundaryMarker::AtListHead | BoundaryMarker::Unestablished => {
                Ok(self.details.free_head)
            }
        }
    }

    pub(crate) fn set_first_deleted_in_cap_extent(&mut self, loc: Option<Loc>) -> Result<()> {
        match self.details.boundary {
            BoundaryMarker::At(boundary) => {
                self.arena.deleted_mut(boundary)?.next_deleted = NextDeleted::from_option(loc);
            }
            BoundaryMarker::AtListHead | BoundaryMarker::Unestablished => {
                self.details.free_head = loc;
            }
        }
        Ok(())
    }

    /// Link a deleted slot into bucket 0
    ///
    /// While the extent layout is still being built (boundary unestablished)
    /// slots are appended so the list follows ring order. Afterwards they are
    /// pushed onto the front of the active extent's run.
    pub(crate) fn add_deleted_rec(&mut self, loc: Loc) -> Result<()> {
        if self.details.boundary == BoundaryMarker::Unestablished {
            self.arena.deleted_mut(loc)?.next_deleted = NextDeleted::End;
            match self.details.free_head {
                None => self.details.free_head = Some(loc),
                Some(head) => {
                    let last = self.last_in_list(head)?;
                    self.arena.deleted_mut(last)?.next_deleted = NextDeleted::At(loc);
                }
            }
            return Ok(());
        }

        let first = self.first_deleted_in_cap_extent()?;
        self.arena.deleted_mut(loc)?.next_deleted = NextDeleted::from_option(first);
        self.set_first_deleted_in_cap_extent(Some(loc))
    }

    /// Tail of the list starting at `head`
    pub(crate) fn last_in_list(&self, head: Loc) -> Result<Loc> {
        let limit = self.arena.slots().count();
        let mut last = head;
        let mut steps = 0;
        while let Some(next) = self.arena.deleted(last)?.next() {
            steps += 1;
            if steps > limit {
                return Err(CappedError::CorruptState(format!(
                    "free list starting at {} does not terminate",
                    head
                )));
            }
            last = next;
        }
        Ok(last)
    }

    /// True if the slot at `loc` lives in the active extent
    pub fn in_cap_extent(&self, loc: Loc) -> Result<bool> {
        Ok(self.arena.extent_of(loc)? == self.cap_extent()?)
    }

    /// True if the free-list successor of `loc` exists and lives in the
    /// active extent
    pub fn next_is_in_cap_extent(&self, loc: Loc) -> Result<bool> {
        match self.arena.deleted(loc)?.next() {
            None => Ok(false),
            Some(next) => self.in_cap_extent(next),
        }
    }

    /// Bucket 0 from its head
    pub fn free_list(&self) -> Result<Vec<Loc>> {
        let limit = self.arena.slots().count();
        let mut out = Vec::new();
        let mut cur = self.details.free_head;
        while let Some(loc) = cur {
            if out.len() >= limit {
                return Err(CappedError::CorruptState(
                    "free list does not terminate".to_string(),
                ));
            }
            out.push(loc);
            cur = self.arena.deleted(loc)?.next();
        }
        Ok(out)
    }

    pub fn free_slots(&self) -> Result<Vec<FreeSlot>> {
        self.free_list()?
            .into_iter()
            .map(|loc| {
                let slot = self.arena.deleted(loc)?;
                Ok(FreeSlot {
                    loc,
                    extent: slot.extent(),
                    len: slot.length_with_headers(),
                })
            })
            .collect()
    }
}

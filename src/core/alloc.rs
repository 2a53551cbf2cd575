//! First-fit allocation inside the active extent

use crate::core::details::BoundaryMarker;
use crate::core::error::{CappedError, Result};
use crate::core::loc::Loc;
use crate::core::record::{NextDeleted, MIN_DELETED_LEN};
use crate::core::state::CappedState;

impl CappedState {
    /// Take the first deleted slot of the active extent that can hold `len`
    /// bytes and still leave a usable remainder
    ///
    /// The slot is unlinked from bucket 0 and returned detached. `Ok(None)`
    /// means the active extent has no fit.
    pub(crate) fn alloc_in_cap_extent(&mut self, len: u32) -> Result<Option<Loc>> {
        let needed = len as u64 + MIN_DELETED_LEN as u64;

        let mut prev = match self.details.boundary {
            BoundaryMarker::At(boundary) => Some(boundary),
            BoundaryMarker::AtListHead | BoundaryMarker::Unestablished => None,
        };
        let mut cur = self.first_deleted_in_cap_extent()?;
        let mut found = None;

        while let Some(loc) = cur {
            if !self.in_cap_extent(loc)? {
                break;
            }
            let slot = self.arena.deleted(loc)?;
            if slot.length_with_headers() as u64 >= needed {
                found = Some(loc);
                break;
            }
            prev = Some(loc);
            cur = slot.next();
        }

        let Some(ret) = found else {
            return Ok(None);
        };

        let after = self.arena.deleted(ret)?.next();
        match prev {
            Some(p) => self.arena.deleted_mut(p)?.next_deleted = NextDeleted::from_option(after),
            None => self.details.free_head = after,
        }
        self.arena.deleted_mut(ret)?.next_deleted = NextDeleted::Detached;

        let extent = self.arena.deleted(ret)?.extent();
        if extent.file() != ret.file() || extent.offset() >= ret.offset() {
            return Err(CappedError::SlotInsideHeader { slot: ret, extent });
        }

        Ok(Some(ret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{DeletedSlot, Slot};

    fn established(sizes: &[u32]) -> CappedState {
        let mut state = CappedState::create("test.events", sizes, None).unwrap();
        state.details.boundary = BoundaryMarker::AtListHead;
        state
    }

    #[test]
    fn test_alloc_takes_first_fit_and_detaches() {
        let mut state = established(&[4096, 4096]);
        let list = state.free_list().unwrap();

        let loc = state.alloc_in_cap_extent(100).unwrap().unwrap();

        assert_eq!(loc, list[0]);
        assert_eq!(state.free_list().unwrap(), vec![list[1]]);
        assert_eq!(
            state.arena.deleted(loc).unwrap().next_deleted,
            NextDeleted::Detached
        );
    }

    #[test]
    fn test_alloc_requires_room_for_a_remainder() {
        let mut state = established(&[4096]);
        let body = state.arena.extent(state.cap_extent().unwrap()).unwrap().body_len();

        // Exact fit would leave nothing, so it is refused
        assert_eq!(state.alloc_in_cap_extent(body).unwrap(), None);
        assert_eq!(state.alloc_in_cap_extent(body - MIN_DELETED_LEN + 1).unwrap(), None);
        assert!(state
            .alloc_in_cap_extent(body - MIN_DELETED_LEN)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_alloc_never_leaves_the_active_extent() {
        let mut state = established(&[1024, 8192]);

        // The second extent could hold it, the active one cannot
        assert_eq!(state.alloc_in_cap_extent(2000).unwrap(), None);
        assert_eq!(state.free_list().unwrap().len(), 2);
    }

    #[test]
    fn test_alloc_skips_small_slots_and_relinks_prev() {
        let mut state = established(&[4096]);
        let cap = state.cap_extent().unwrap();
        let body = state.arena.extent(cap).unwrap().body_start();
        state.arena.take_slot(body).unwrap();
        state.details.free_head = None;

        for (offset, len) in [(400u32, 512u32), (40, 48), (0, 40)] {
            let loc = body.advanced_by(offset);
            state
                .arena
                .put_slot(loc, Slot::Deleted(DeletedSlot::new(cap, len)))
                .unwrap();
            state.add_deleted_rec(loc).unwrap();
        }
        // Pushed front each time, so the run reads 0, 40, 400
        let loc = state.alloc_in_cap_extent(40).unwrap().unwrap();
        assert_eq!(loc, body.advanced_by(400));
        assert_eq!(
            state.free_list().unwrap(),
            vec![body, body.advanced_by(40)]
        );
    }

    #[test]
    fn test_alloc_after_boundary_relinks_boundary() {
        let mut state = established(&[4096, 4096, 4096]);
        let list = state.free_list().unwrap();
        state.details.boundary = BoundaryMarker::At(list[0]);
        state.details.cap_extent = Some(state.arena.extent_of(list[1]).unwrap());

        let loc = state.alloc_in_cap_extent(64).unwrap().unwrap();

        assert_eq!(loc, list[1]);
        assert_eq!(state.arena.deleted(list[0]).unwrap().next(), Some(list[2]));
    }

    #[test]
    fn test_returned_slot_lies_past_extent_header() {
        let mut state = established(&[4096, 4096, 4096]);
        for _ in 0..3 {
            let cap = state.cap_extent().unwrap();
            let loc = state.alloc_in_cap_extent(64).unwrap().unwrap();
            let ext = state.arena.extent(cap).unwrap();
            assert!(ext.loc() < loc);
            assert!(ext.contains_span(loc, 64));
            state.place_record(loc, 64, vec![0; 48]).unwrap();
            state.advance_cap_extent().unwrap();
        }
    }
}

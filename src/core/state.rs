//! Collection state: persisted details plus the storage they describe
//!
//! The allocator, compactor, cursor and migration step are all `&mut self`
//! methods on [`CappedState`], spread over their own modules. Holding a
//! `&mut CappedState` is the single-writer precondition.

use crate::core::arena::Arena;
use crate::core::details::{CappedDetails, PassTracking};
use crate::core::error::{CappedError, Result};
use crate::core::loc::Loc;
use crate::core::record::{DeletedSlot, Record, Slot};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CappedState {
    pub(crate) details: CappedDetails,
    pub(crate) arena: Arena,
}

impl CappedState {
    /// Create a capped collection over a fresh ring of extents
    ///
    /// `max_records = None` leaves the record count unbounded; only the extent
    /// sizes limit the collection then.
    pub fn create(ns: &str, extent_sizes: &[u32], max_records: Option<u64>) -> Result<Self> {
        let (arena, order) = Arena::layout(extent_sizes)?;
        let (first, last) = match (order.first(), order.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(CappedError::InvalidConfig(
                    "a capped collection needs at least one extent".to_string(),
                ))
            }
        };

        let details = CappedDetails::new(ns, first, last, max_records.unwrap_or(u64::MAX));
        let mut state = CappedState { details, arena };

        // Boundary is still unestablished, so these append in ring order
        for ext in order {
            let body = state.arena.extent(ext)?.body_start();
            state.add_deleted_rec(body)?;
        }

        debug!(
            "Created capped state for {} with {} extents",
            ns,
            state.arena.extent_count()
        );
        Ok(state)
    }

    pub(crate) fn from_parts(details: CappedDetails, arena: Arena) -> Self {
        CappedState { details, arena }
    }

    pub fn details(&self) -> &CappedDetails {
        &self.details
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub(crate) fn ensure_capped(&self) -> Result<()> {
        if self.details.capped {
            Ok(())
        } else {
            Err(CappedError::NotCapped(self.details.ns.clone()))
        }
    }

    /// The active extent; only absent before a legacy layout is migrated
    pub(crate) fn cap_extent(&self) -> Result<Loc> {
        self.details.cap_extent.ok_or(CappedError::NotMigrated)
    }

    pub(crate) fn first_extent(&self) -> Result<Loc> {
        self.details
            .first_extent
            .ok_or_else(|| CappedError::CorruptState("collection has no extents".to_string()))
    }

    /// Ring successor of `extent`, wrapping to the first extent
    pub(crate) fn ring_next(&self, extent: Loc) -> Result<Loc> {
        match self.arena.extent(extent)?.next() {
            Some(next) => Ok(next),
            None => self.first_extent(),
        }
    }

    /// All extents in ring order starting at `start`
    pub(crate) fn ring_from(&self, start: Loc) -> Result<Vec<Loc>> {
        let mut out = vec![start];
        let mut cur = self.ring_next(start)?;
        while cur != start {
            if out.len() >= self.arena.extent_count() {
                return Err(CappedError::CorruptExtent {
                    extent: cur,
                    reason: "ring does not close",
                });
            }
            out.push(cur);
            cur = self.ring_next(cur)?;
        }
        Ok(out)
    }

    /// Remove a live record, returning its space as a deleted slot
    pub(crate) fn delete_record(&mut self, loc: Loc) -> Result<()> {
        let (extent, len, prev, next, net) = {
            let r = self.arena.record(loc)?;
            (r.extent, r.length_with_headers, r.prev, r.next, r.net_len())
        };

        match prev {
            Some(p) => self.arena.record_mut(p)?.next = next,
            None => self.arena.extent_mut(extent)?.first_record = next,
        }
        match next {
            Some(n) => self.arena.record_mut(n)?.prev = prev,
            None => self.arena.extent_mut(extent)?.last_record = prev,
        }

        self.details.nrecords = self.details.nrecords.saturating_sub(1);
        self.details.datasize = self.details.datasize.saturating_sub(net);

        self.arena.take_slot(loc)?;
        self.arena
            .put_slot(loc, Slot::Deleted(DeletedSlot::new(extent, len)))?;
        self.add_deleted_rec(loc)
    }

    /// Turn an allocated slot into a record of `len` bytes
    ///
    /// The front of the slot becomes the record and is appended to its
    /// extent's record list; the remainder goes back on the free list.
    pub(crate) fn place_record(&mut self, loc: Loc, len: u32, payload: Vec<u8>) -> Result<()> {
        let (extent, region) = {
            let slot = self.arena.deleted(loc)?;
            (slot.extent, slot.length_with_headers)
        };
        let left = region.checked_sub(len).ok_or_else(|| {
            CappedError::CorruptState(format!("slot {} is smaller than {} bytes", loc, len))
        })?;

        let prev_last = self.arena.extent(extent)?.last_record();
        let net = payload.len() as u64;

        self.arena.take_slot(loc)?;
        self.arena.put_slot(
            loc,
            Slot::Record(Record {
                extent,
                length_with_headers: len,
                prev: prev_last,
                next: None,
                payload,
            }),
        )?;

        match prev_last {
            Some(p) => self.arena.record_mut(p)?.next = Some(loc),
            None => self.arena.extent_mut(extent)?.first_record = Some(loc),
        }
        self.arena.extent_mut(extent)?.last_record = Some(loc);

        if left > 0 {
            let rest = loc.advanced_by(len);
            self.arena
                .put_slot(rest, Slot::Deleted(DeletedSlot::new(extent, left)))?;
            self.add_deleted_rec(rest)?;
        }

        self.details.nrecords += 1;
        self.details.datasize += net;
        Ok(())
    }

    /// Live records, oldest first
    pub fn records_in_order(&self) -> Result<Vec<Loc>> {
        let mut out = Vec::with_capacity(self.details.nrecords as usize);

        match self.details.pass {
            PassTracking::FirstLap => {
                for ext in self.ring_from(self.first_extent()?)? {
                    out.extend(self.arena.records_in(ext)?);
                }
            }
            PassTracking::Pending => {
                for ext in self.ring_from(self.cap_extent()?)? {
                    out.extend(self.arena.records_in(ext)?);
                }
            }
            PassTracking::Started(first_new) => {
                let cap = self.cap_extent()?;
                let cap_records = self.arena.records_in(cap)?;
                let split = cap_records
                    .iter()
                    .position(|&loc| loc == first_new)
                    .unwrap_or(cap_records.len());

                out.extend_from_slice(&cap_records[..split]);
                for ext in self.ring_from(cap)?.into_iter().skip(1) {
                    out.extend(self.arena.records_in(ext)?);
                }
                out.extend_from_slice(&cap_records[split..]);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::details::BoundaryMarker;

    #[test]
    fn test_create_links_initial_slots_in_ring_order() {
        let state = CappedState::create("test.events", &[4096, 4096, 4096], None).unwrap();
        let details = state.details();

        assert_eq!(details.boundary(), BoundaryMarker::Unestablished);
        assert_eq!(details.max_records(), u64::MAX);

        let slots = state.free_list().unwrap();
        assert_eq!(slots.len(), 3);
        let owners: Vec<Loc> = slots
            .iter()
            .map(|&loc| state.arena.extent_of(loc).unwrap())
            .collect();
        assert_eq!(owners, state.ring_from(state.first_extent().unwrap()).unwrap());
    }

    #[test]
    fn test_create_without_extents_fails() {
        assert!(CappedState::create("test.events", &[], None).is_err());
    }

    #[test]
    fn test_create_applies_extent_size_bounds() {
        for sizes in [&[4096, 4098][..], &[4096, 196][..]] {
            assert!(matches!(
                CappedState::create("test.events", sizes, None),
                Err(CappedError::InvalidConfig(_))
            ));
        }
        assert!(CappedState::create("test.events", &[200], None).is_ok());
    }

    #[test]
    fn test_ring_wraps() {
        let state = CappedState::create("test.events", &[4096, 4096, 4096], None).unwrap();
        let first = state.first_extent().unwrap();
        let ring = state.ring_from(first).unwrap();

        assert_eq!(ring.len(), 3);
        assert_eq!(state.ring_next(ring[2]).unwrap(), first);
        assert_eq!(state.ring_from(ring[1]).unwrap(), vec![ring[1], ring[2], ring[0]]);
    }

    #[test]
    fn test_place_and_delete_record() {
        let mut state = CappedState::create("test.events", &[4096], None).unwrap();
        state.details.boundary = BoundaryMarker::AtListHead;

        let loc = state.alloc_in_cap_extent(32).unwrap().unwrap();
        state.place_record(loc, 32, vec![7u8; 10]).unwrap();

        assert_eq!(state.details.nrecords(), 1);
        assert_eq!(state.details.datasize(), 10);
        let cap = state.cap_extent().unwrap();
        assert_eq!(state.arena.extent(cap).unwrap().first_record(), Some(loc));
        assert_eq!(state.arena.record(loc).unwrap().payload(), &[7u8; 10]);

        state.delete_record(loc).unwrap();
        assert_eq!(state.details.nrecords(), 0);
        assert_eq!(state.details.datasize(), 0);
        assert_eq!(state.arena.extent(cap).unwrap().first_record(), None);
        assert_eq!(state.arena.extent(cap).unwrap().last_record(), None);
        assert_eq!(state.arena.deleted(loc).unwrap().length_with_headers(), 32);
    }

    #[test]
    fn test_records_in_order_first_lap() {
        let mut state = CappedState::create("test.events", &[4096], None).unwrap();
        state.details.boundary = BoundaryMarker::AtListHead;

        let mut placed = Vec::new();
        for i in 0..3u8 {
            let loc = state.alloc_in_cap_extent(32).unwrap().unwrap();
            state.place_record(loc, 32, vec![i]).unwrap();
            placed.push(loc);
        }

        assert_eq!(state.records_in_order().unwrap(), placed);
    }
}

//! Extent cursor: moving the active extent around the ring

use crate::core::details::{BoundaryMarker, PassTracking};
use crate::core::error::Result;
use crate::core::state::CappedState;
use tracing::debug;

impl CappedState {
    /// Make the ring successor of the active extent the new active extent
    ///
    /// Fields are written boundary first, cursor second, pass tracking last,
    /// so an interrupted advance leaves a conservative but consistent state.
    pub(crate) fn advance_cap_extent(&mut self) -> Result<()> {
        let cap = self.cap_extent()?;

        // Bucket 1 becomes the last deleted slot of the extent we are leaving,
        // or the list head when wrapping back to the first extent.
        self.details.boundary = if Some(cap) == self.details.last_extent {
            BoundaryMarker::AtListHead
        } else {
            let mut cur = self.first_deleted_in_cap_extent()?;
            while let Some(loc) = cur {
                if !self.next_is_in_cap_extent(loc)? {
                    break;
                }
                cur = self.arena.deleted(loc)?.next();
            }
            match cur {
                Some(loc) => BoundaryMarker::At(loc),
                None => BoundaryMarker::AtListHead,
            }
        };

        let next = self.ring_next(cap)?;
        self.details.cap_extent = Some(next);
        self.arena.extent(next)?.assert_ok()?;
        self.details.pass = PassTracking::Pending;

        debug!(
            "Advanced cap extent of {} from {} to {}",
            self.details.ns, cap, next
        );
        Ok(())
    }
}

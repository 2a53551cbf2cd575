//! One-time conversion of the size-class free-list layout

use crate::core::details::{BoundaryMarker, PassTracking};
use crate::core::error::Result;
use crate::core::record::NextDeleted;
use crate::core::state::CappedState;
use tracing::debug;

impl CappedState {
    /// Fold every legacy size-class bucket into bucket 0
    ///
    /// Returns `true` if a legacy layout was found and converted. A no-op on
    /// an already migrated collection, so it is safe to call on every open.
    /// The cursor is set last: until then the state still reads as legacy.
    pub fn check_migrate(&mut self) -> Result<bool> {
        self.ensure_capped()?;
        if self.details.cap_extent.is_some() {
            return Ok(false);
        }

        let first = self.first_extent()?;
        self.details.pass = PassTracking::FirstLap;

        let buckets = std::mem::take(&mut self.details.legacy_buckets);
        let mut spliced = 0usize;
        for head in buckets.into_iter().flatten() {
            let last = self.last_in_list(head)?;
            self.arena.deleted_mut(last)?.next_deleted =
                NextDeleted::from_option(self.details.free_head);
            self.details.free_head = Some(head);
            spliced += 1;
        }

        self.details.boundary = BoundaryMarker::Unestablished;
        self.details.cap_extent = Some(first);

        debug!(
            "Migrated {} to a single free list ({} buckets spliced)",
            self.details.ns, spliced
        );
        Ok(true)
    }
}

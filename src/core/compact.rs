//! Free-list compaction for the active extent
//!
//! Merges physically adjacent deleted slots of the active extent. The run is
//! tiny in steady state (one or two slots plus the sliver at the end of the
//! extent), so a plain sort is all the structure it needs.

use crate::core::error::{CappedError, Result};
use crate::core::state::CappedState;
use tracing::trace;

impl CappedState {
    /// Coalesce the active extent's free run if it has one
    ///
    /// Returns `false` when the extent has no deleted slots to merge.
    pub fn compact_cap_extent(&mut self) -> Result<bool> {
        self.ensure_capped()?;
        self.cap_extent()?;
        self.establish_boundary();

        match self.first_deleted_in_cap_extent()? {
            Some(loc) if self.in_cap_extent(loc)? => {
                self.compact()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Coalesce the deleted slots attributed to the active extent
    ///
    /// Detaches the extent's run from bucket 0, sorts it by address, merges
    /// every chain of adjacent slots into its first slot and re-adds the
    /// survivors. At least one slot always goes back, so an empty run means
    /// the free list lost track of space.
    pub(crate) fn compact(&mut self) -> Result<()> {
        self.ensure_capped()?;
        let cap = self.cap_extent()?;
        // Re-adding must push onto the run, never append past other extents
        self.establish_boundary();

        let mut run = Vec::new();
        let mut cur = self.first_deleted_in_cap_extent()?;
        while let Some(loc) = cur {
            if !self.in_cap_extent(loc)? {
                break;
            }
            run.push(loc);
            cur = self.arena.deleted(loc)?.next();
        }
        self.set_first_deleted_in_cap_extent(cur)?;

        run.sort_unstable();
        let collected = run.len();

        let mut slots = run.into_iter();
        let mut a = slots.next().ok_or(CappedError::EmptyCompactionRun(cap))?;
        let mut reinserted = 0usize;

        for b in slots {
            if self.arena.are_adjacent(a, b)? {
                let absorbed = self.arena.deleted(b)?.length_with_headers();
                self.arena.take_slot(b)?;
                self.arena.deleted_mut(a)?.length_with_headers += absorbed;
            } else {
                self.add_deleted_rec(a)?;
                reinserted += 1;
                a = b;
            }
        }
        self.add_deleted_rec(a)?;
        reinserted += 1;

        trace!(
            "Compacted {} free slots in extent {} into {}",
            collected,
            cap,
            reinserted
        );
        Ok(())
    }
}

//! Capped allocation controller
//!
//! The eviction loop: try the active extent, and when it has no fit either
//! move the cursor on or evict the oldest record and compact, until a slot
//! turns up, the ring is found empty, or the pass budget runs out.
//!
//! ```text
//! TRY_ALLOC ──fit──────────────────────────────▶ ALLOCATED
//!     │
//!     └─no fit / at max──▶ first lap?           ──▶ advance ──▶ TRY_ALLOC
//!                          own records reached? ──▶ advance ──▶ TRY_ALLOC
//!                          extent empty?        ──▶ advance ──▶ TRY_ALLOC | EXHAUSTED
//!                          else evict + compact ──▶ TRY_ALLOC | FATAL
//! ```

use crate::core::config::AllocLimits;
use crate::core::details::PassTracking;
use crate::core::diagnostics::Diagnostics;
use crate::core::error::{CappedError, Result};
use crate::core::loc::Loc;
use crate::core::state::CappedState;
use tracing::{error, trace};

/// One allocation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocRequest {
    len: u32,
    max_passes: Option<u32>,
}

impl AllocRequest {
    /// Request `len` bytes, headers included
    pub fn new(len: u32) -> Self {
        AllocRequest {
            len,
            max_passes: None,
        }
    }

    /// Override the eviction pass budget derived from the limits
    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = Some(max_passes);
        self
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn pass_budget(&self, limits: &AllocLimits) -> u32 {
        self.max_passes
            .unwrap_or_else(|| limits.pass_budget(self.len))
    }
}

impl CappedState {
    /// Produce a detached slot of at least `req.len()` bytes, evicting the
    /// oldest records as needed
    ///
    /// `Ok(None)` means every extent was swept empty without freeing enough
    /// space; the diagnostics sink has been told once.
    pub(crate) fn capped_alloc(
        &mut self,
        req: AllocRequest,
        limits: &AllocLimits,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Option<Loc>> {
        self.ensure_capped()?;
        let len = req.len();
        if len == 0 {
            return Err(CappedError::ZeroLength);
        }
        if len >= limits.max_request_len {
            return Err(CappedError::RequestTooLarge {
                len,
                ceiling: limits.max_request_len,
            });
        }
        let cap = self.cap_extent()?;
        self.arena.extent(cap)?.assert_ok()?;
        self.establish_boundary();

        let max_passes = req.pass_budget(limits);
        let mut passes = 0u32;
        let mut first_empty_extent: Option<Loc> = None;

        let loc = loop {
            if self.details.nrecords < self.details.max {
                if let Some(loc) = self.alloc_in_cap_extent(len)? {
                    break loc;
                }
            }

            // No space in the active extent, or the collection is full
            let cap = self.cap_extent()?;

            if self.details.pass == PassTracking::FirstLap {
                self.advance_cap_extent()?;
                if Some(self.cap_extent()?) != self.details.first_extent {
                    self.details.pass = PassTracking::FirstLap;
                }
                continue;
            }

            let oldest = self.arena.extent(cap)?.first_record();

            if let PassTracking::Started(first_new) = self.details.pass {
                if oldest == Some(first_new) {
                    // Everything older than our own inserts is gone from here
                    self.advance_cap_extent()?;
                    continue;
                }
            }

            let Some(oldest) = oldest else {
                let marker = *first_empty_extent.get_or_insert(cap);
                self.advance_cap_extent()?;
                if self.cap_extent()? == marker {
                    diagnostics.complain(&self.details.ns, len);
                    return Ok(None);
                }
                continue;
            };

            trace!("Evicting {} from {} for len {}", oldest, self.details.ns, len);
            self.delete_record(oldest)?;
            self.compact()?;

            passes += 1;
            if passes > max_passes {
                error!(
                    "passes >= maxPasses in capped collection alloc (ns: {}, len: {}, maxPasses: {}, max: {}, nrecords: {}, datasize: {})",
                    self.details.ns,
                    len,
                    max_passes,
                    self.details.max,
                    self.details.nrecords,
                    self.details.datasize
                );
                return Err(CappedError::PassBudgetExceeded {
                    ns: self.details.ns.clone(),
                    len,
                    max_passes,
                    max_records: self.details.max,
                    nrecords: self.details.nrecords,
                    datasize: self.details.datasize,
                });
            }
        };

        if self.details.pass == PassTracking::Pending {
            self.details.pass = PassTracking::Started(loc);
        }
        Ok(Some(loc))
    }

    /// Drop every record inserted after `loc`
    ///
    /// Not supported for capped collections: there is no defined way to
    /// rewind the free list and the extent cursor together.
    pub fn truncate_after(&mut self, loc: Loc) -> Result<()> {
        self.ensure_capped()?;
        self.arena.record(loc)?;
        Err(CappedError::TruncateUnsupported(loc))
    }
}

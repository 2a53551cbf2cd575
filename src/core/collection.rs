//! Collection handle and its exclusive writer guard

use crate::core::capped::AllocRequest;
use crate::core::config::{AllocLimits, CappedConfig};
use crate::core::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::core::error::{CappedError, Result};
use crate::core::freelist::FreeSlot;
use crate::core::loc::Loc;
use crate::core::persist;
use crate::core::record::record_len_for;
use crate::core::state::CappedState;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Point-in-time summary of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CappedStats {
    pub namespace: String,
    pub nrecords: u64,
    /// Payload bytes of live records
    pub datasize: u64,
    /// `None` when only the extents bound the collection
    pub max_records: Option<u64>,
    pub extent_count: usize,
    pub free_slots: usize,
    pub free_bytes: u64,
    /// Active extent, `None` before a legacy layout is migrated
    pub cap_extent: Option<String>,
}

impl CappedStats {
    fn collect(state: &CappedState) -> Result<Self> {
        let details = state.details();
        let free = state.free_slots()?;
        Ok(CappedStats {
            namespace: details.namespace().to_string(),
            nrecords: details.nrecords(),
            datasize: details.datasize(),
            max_records: (details.max_records() != u64::MAX).then_some(details.max_records()),
            extent_count: state.arena().extent_count(),
            free_slots: free.len(),
            free_bytes: free.iter().map(|slot| slot.len() as u64).sum(),
            cap_extent: details.cap_extent().map(|loc| loc.to_string()),
        })
    }
}

/// A capped collection
///
/// All mutation goes through [`CappedCollection::write`], which hands out a
/// [`CappedWriter`] holding the collection lock for as long as it lives.
///
/// # Examples
///
/// ```rust
/// use cartridge_capped::{CappedCollection, CappedConfig};
///
/// # fn main() -> cartridge_capped::Result<()> {
/// let config = CappedConfig::new("test.events", vec![4096, 4096])?.with_max_records(2);
/// let events = CappedCollection::create(config)?;
///
/// let mut writer = events.write();
/// writer.insert(b"first")?;
/// writer.insert(b"second")?;
/// writer.insert(b"third")?;
///
/// assert_eq!(writer.records()?, vec![b"second".to_vec(), b"third".to_vec()]);
/// # Ok(())
/// # }
/// ```
pub struct CappedCollection {
    config: CappedConfig,
    state: Mutex<CappedState>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl CappedCollection {
    /// Lay out a fresh ring of extents as described by `config`
    pub fn create(config: CappedConfig) -> Result<Self> {
        config.check()?;
        info!(
            "Creating capped collection {} with {} extents",
            config.namespace,
            config.extent_sizes.len()
        );
        let state = CappedState::create(
            config.namespace.as_str(),
            &config.extent_sizes,
            config.max_records,
        )?;
        Ok(CappedCollection {
            config,
            state: Mutex::new(state),
            diagnostics: Arc::new(TracingDiagnostics),
        })
    }

    /// Load a snapshot and bring its layout up to date
    ///
    /// The persisted record bound and extents win over `config`; only the
    /// namespace must agree.
    pub fn open<P: AsRef<Path>>(path: P, config: CappedConfig) -> Result<Self> {
        config.check()?;
        let mut state = persist::load(path.as_ref())?;

        if state.details().namespace() != config.namespace.as_str() {
            return Err(CappedError::InvalidConfig(format!(
                "snapshot holds {}, expected {}",
                state.details().namespace(),
                config.namespace
            )));
        }
        if config.max_records.is_some_and(|max| max != state.details().max_records()) {
            warn!(
                "Ignoring configured max_records for {}: snapshot keeps {}",
                config.namespace,
                state.details().max_records()
            );
        }

        if state.check_migrate()? {
            info!("Migrated legacy free-list layout of {}", config.namespace);
        }

        Ok(CappedCollection {
            config,
            state: Mutex::new(state),
            diagnostics: Arc::new(TracingDiagnostics),
        })
    }

    /// Replace the sink told about unsatisfiable requests
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let state = self.state.lock();
        persist::save(&state, path.as_ref())
    }

    pub fn config(&self) -> &CappedConfig {
        &self.config
    }

    /// Take the collection lock
    pub fn write(&self) -> CappedWriter<'_> {
        CappedWriter {
            state: self.state.lock(),
            limits: self.config.limits,
            diagnostics: self.diagnostics.as_ref(),
        }
    }

    pub fn stats(&self) -> Result<CappedStats> {
        CappedStats::collect(&self.state.lock())
    }
}

/// Exclusive access to one collection
///
/// Only one writer exists per collection at a time; every operation that
/// touches the free list or the extent cursor lives here.
pub struct CappedWriter<'a> {
    state: MutexGuard<'a, CappedState>,
    limits: AllocLimits,
    diagnostics: &'a dyn Diagnostics,
}

impl CappedWriter<'_> {
    /// Append a record, evicting the oldest ones as needed
    ///
    /// Returns `Ok(None)` when no amount of eviction can make room.
    pub fn insert(&mut self, payload: &[u8]) -> Result<Option<Loc>> {
        self.insert_request(payload, None)
    }

    /// Like [`insert`](Self::insert) with an explicit eviction pass budget
    pub fn insert_with_budget(&mut self, payload: &[u8], max_passes: u32) -> Result<Option<Loc>> {
        self.insert_request(payload, Some(max_passes))
    }

    fn insert_request(&mut self, payload: &[u8], max_passes: Option<u32>) -> Result<Option<Loc>> {
        let len = u32::try_from(record_len_for(payload.len())).unwrap_or(u32::MAX);
        let mut req = AllocRequest::new(len);
        if let Some(max) = max_passes {
            req = req.with_max_passes(max);
        }

        let Some(loc) = self
            .state
            .capped_alloc(req, &self.limits, self.diagnostics)?
        else {
            return Ok(None);
        };
        self.state.place_record(loc, len, payload.to_vec())?;

        debug!("Inserted {} bytes at {}", payload.len(), loc);
        Ok(Some(loc))
    }

    /// Merge adjacent free slots of the active extent
    ///
    /// Returns `false` when the active extent has no free slots.
    pub fn compact(&mut self) -> Result<bool> {
        self.state.compact_cap_extent()
    }

    pub fn check_migrate(&mut self) -> Result<bool> {
        self.state.check_migrate()
    }

    pub fn truncate_after(&mut self, loc: Loc) -> Result<()> {
        self.state.truncate_after(loc)
    }

    /// Live payloads, oldest first
    pub fn records(&self) -> Result<Vec<Vec<u8>>> {
        self.state
            .records_in_order()?
            .into_iter()
            .map(|loc| Ok(self.state.arena().record(loc)?.payload().to_vec()))
            .collect()
    }

    /// Bucket 0 from its head
    pub fn free_slots(&self) -> Result<Vec<FreeSlot>> {
        self.state.free_slots()
    }

    pub fn stats(&self) -> Result<CappedStats> {
        CappedStats::collect(&self.state)
    }

    pub fn state(&self) -> &CappedState {
        &self.state
    }
}

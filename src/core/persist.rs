//! Snapshot persistence
//!
//! Layout: `b"CAPD"` magic, format version (u32 LE), bincode body holding the
//! sentinel-encoded details and the arena, then a CRC32 (u32 LE) over every
//! preceding byte.

use crate::core::arena::Arena;
use crate::core::details::{CappedDetails, DetailsRecord};
use crate::core::error::{CappedError, Result};
use crate::core::state::CappedState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

const SNAPSHOT_MAGIC: [u8; 4] = *b"CAPD";
const SNAPSHOT_VERSION: u32 = 1;
const PREAMBLE_LEN: usize = 8;
const TRAILER_LEN: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    details: DetailsRecord,
    arena: Arena,
}

impl Snapshot {
    pub(crate) fn capture(state: &CappedState) -> Self {
        Snapshot {
            details: DetailsRecord::from(&state.details),
            arena: state.arena.clone(),
        }
    }

    /// Rebuild the in-memory state, checking the cursor points at real extents
    pub(crate) fn into_state(self) -> Result<CappedState> {
        let details = CappedDetails::try_from(self.details)?;
        let arena = self.arena;

        for anchor in [details.first_extent, details.last_extent, details.cap_extent]
            .into_iter()
            .flatten()
        {
            arena.extent(anchor)?.assert_ok()?;
        }

        Ok(CappedState::from_parts(details, arena))
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;

        let mut bytes = Vec::with_capacity(PREAMBLE_LEN + body.len() + TRAILER_LEN);
        bytes.extend_from_slice(&SNAPSHOT_MAGIC);
        bytes.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&body);

        let crc = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        Ok(bytes)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PREAMBLE_LEN + TRAILER_LEN {
            return Err(CappedError::CorruptState(format!(
                "snapshot of {} bytes is truncated",
                bytes.len()
            )));
        }

        let (content, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
        let mut stored = [0u8; TRAILER_LEN];
        stored.copy_from_slice(trailer);
        if crc32fast::hash(content) != u32::from_le_bytes(stored) {
            return Err(CappedError::ChecksumMismatch);
        }

        if content[..4] != SNAPSHOT_MAGIC {
            return Err(CappedError::CorruptState(
                "snapshot magic mismatch".to_string(),
            ));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&content[4..PREAMBLE_LEN]);
        let version = u32::from_le_bytes(version);
        if version != SNAPSHOT_VERSION {
            return Err(CappedError::UnsupportedSnapshotVersion(version));
        }

        Ok(bincode::deserialize(&content[PREAMBLE_LEN..])?)
    }
}

/// Write a snapshot next to `path`, then move it into place
pub(crate) fn save(state: &CappedState, path: &Path) -> Result<()> {
    let bytes = Snapshot::capture(state).to_bytes()?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;

    info!(
        "Saved {} ({} bytes) to {}",
        state.details.ns,
        bytes.len(),
        path.display()
    );
    Ok(())
}

pub(crate) fn load(path: &Path) -> Result<CappedState> {
    let bytes = fs::read(path)?;
    let state = Snapshot::from_bytes(&bytes)?.into_state()?;
    info!("Loaded {} from {}", state.details.ns, path.display());
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::details::{BoundaryMarker, PassTracking};
    use crate::core::migrate::tests::legacy_state;
    use tempfile::TempDir;

    fn busy_state() -> CappedState {
        let mut state = CappedState::create("test.events", &[1024, 1024], Some(10)).unwrap();
        state.details.boundary = BoundaryMarker::AtListHead;
        for i in 0..3u8 {
            let loc = state.alloc_in_cap_extent(64).unwrap().unwrap();
            state.place_record(loc, 64, vec![i; 40]).unwrap();
        }
        state.advance_cap_extent().unwrap();
        state
    }

    #[test]
    fn test_snapshot_preserves_cursor_state() {
        let state = busy_state();
        let bytes = Snapshot::capture(&state).to_bytes().unwrap();
        let loaded = Snapshot::from_bytes(&bytes).unwrap().into_state().unwrap();

        assert_eq!(loaded.details.cap_extent(), state.details.cap_extent());
        assert_eq!(loaded.details.boundary(), state.details.boundary());
        assert_eq!(loaded.details.pass(), PassTracking::Pending);
        assert_eq!(loaded.details.nrecords(), 3);
        assert_eq!(loaded.free_list().unwrap(), state.free_list().unwrap());
        assert_eq!(
            loaded.records_in_order().unwrap(),
            state.records_in_order().unwrap()
        );
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let mut bytes = Snapshot::capture(&busy_state()).to_bytes().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;

        assert!(matches!(
            Snapshot::from_bytes(&bytes),
            Err(CappedError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut bytes = Snapshot::capture(&busy_state()).to_bytes().unwrap();
        bytes[4] = 9;
        let len = bytes.len();
        let crc = crc32fast::hash(&bytes[..len - 4]);
        bytes[len - 4..].copy_from_slice(&crc.to_le_bytes());

        assert!(matches!(
            Snapshot::from_bytes(&bytes),
            Err(CappedError::UnsupportedSnapshotVersion(9))
        ));
    }

    #[test]
    fn test_truncated_snapshot() {
        assert!(Snapshot::from_bytes(b"CAP").is_err());
    }

    #[test]
    fn test_legacy_layout_survives_round_trip() {
        let state = legacy_state(&[8192, 4096]);
        let bytes = Snapshot::capture(&state).to_bytes().unwrap();
        let mut loaded = Snapshot::from_bytes(&bytes).unwrap().into_state().unwrap();

        assert!(loaded.details.is_legacy());
        assert!(loaded.check_migrate().unwrap());
        assert_eq!(loaded.free_list().unwrap().len(), 2);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.capd");
        let state = busy_state();

        save(&state, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.details.namespace(), "test.events");
        assert_eq!(loaded.details.datasize(), 120);
        assert!(!path.with_extension("tmp").exists());
    }
}

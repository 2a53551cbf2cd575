//! Persistent capped-collection state
//!
//! [`CappedDetails`] is the in-memory view with every overloaded sentinel
//! replaced by an explicit tagged state. [`DetailsRecord`] is the persisted
//! form, where the free-list bucket array and the cursor fields carry the
//! null/invalid/zero sentinels. Conversion happens only at load and save.

use crate::core::error::{CappedError, Result};
use crate::core::loc::{Loc, RawLoc};
use serde::{Deserialize, Serialize};

/// Number of free-list buckets in the persisted layout
pub const BUCKETS: usize = 19;

/// Upper size bound of each legacy size-class bucket
pub const BUCKET_SIZES: [u32; BUCKETS] = [
    0x20, 0x40, 0x80, 0x100, 0x200, 0x400, 0x800, 0x1000, 0x2000, 0x4000, 0x8000, 0x10000,
    0x20000, 0x40000, 0x80000, 0x100000, 0x200000, 0x400000, 0x800000,
];

/// Legacy size class of a deleted slot
pub fn bucket_for(len: u32) -> usize {
    BUCKET_SIZES
        .iter()
        .position(|&limit| len < limit)
        .unwrap_or(BUCKETS - 1)
}

/// Where the deleted slots of the active extent begin in bucket 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryMarker {
    /// No boundary has been established yet (fresh or just-migrated collection)
    Unestablished,
    /// The active extent's slots start at the bucket-0 head
    AtListHead,
    /// The active extent's slots start after this slot, the last one of the
    /// previous active extent
    At(Loc),
}

/// Insertion tracking for the current pass through the active extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTracking {
    /// First trip around the ring; nothing is evicted yet
    FirstLap,
    /// A pass started but nothing has been inserted in it
    Pending,
    /// First record inserted during the current pass
    Started(Loc),
}

/// In-memory capped-collection state
#[derive(Debug, Clone)]
pub struct CappedDetails {
    pub(crate) ns: String,
    pub(crate) capped: bool,

    pub(crate) first_extent: Option<Loc>,
    pub(crate) last_extent: Option<Loc>,

    /// Extent being written; `None` until a legacy layout is migrated
    pub(crate) cap_extent: Option<Loc>,
    pub(crate) pass: PassTracking,

    /// Bucket 0
    pub(crate) free_head: Option<Loc>,
    /// Bucket 1
    pub(crate) boundary: BoundaryMarker,
    /// Size-class lists of an unmigrated layout (buckets 1..BUCKETS)
    pub(crate) legacy_buckets: Vec<Option<Loc>>,

    pub(crate) nrecords: u64,
    pub(crate) datasize: u64,
    pub(crate) max: u64,
}

impl CappedDetails {
    /// State of a freshly created collection over an already laid out ring
    pub fn new(ns: impl Into<String>, first: Loc, last: Loc, max: u64) -> Self {
        CappedDetails {
            ns: ns.into(),
            capped: true,
            first_extent: Some(first),
            last_extent: Some(last),
            cap_extent: Some(first),
            pass: PassTracking::FirstLap,
            free_head: None,
            boundary: BoundaryMarker::Unestablished,
            legacy_buckets: Vec::new(),
            nrecords: 0,
            datasize: 0,
            max,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.ns
    }

    pub fn cap_extent(&self) -> Option<Loc> {
        self.cap_extent
    }

    pub fn pass(&self) -> PassTracking {
        self.pass
    }

    pub fn boundary(&self) -> BoundaryMarker {
        self.boundary
    }

    pub fn nrecords(&self) -> u64 {
        self.nrecords
    }

    pub fn datasize(&self) -> u64 {
        self.datasize
    }

    pub fn max_records(&self) -> u64 {
        self.max
    }

    pub fn is_legacy(&self) -> bool {
        self.cap_extent.is_none()
    }
}

/// Persisted form of [`CappedDetails`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DetailsRecord {
    pub ns: String,
    pub capped: bool,
    pub first_extent: RawLoc,
    pub last_extent: RawLoc,
    pub cap_extent: RawLoc,
    pub cap_first_new_record: RawLoc,
    pub deleted_list: [RawLoc; BUCKETS],
    pub nrecords: u64,
    pub datasize: u64,
    pub max: u64,
}

impl From<&CappedDetails> for DetailsRecord {
    fn from(details: &CappedDetails) -> Self {
        let mut deleted_list = [RawLoc::NULL; BUCKETS];
        deleted_list[0] = RawLoc::from_option(details.free_head);

        let (cap_extent, cap_first_new_record) = match details.cap_extent {
            None => {
                for (slot, head) in deleted_list[1..].iter_mut().zip(&details.legacy_buckets) {
                    *slot = RawLoc::from_option(*head);
                }
                (RawLoc::ZERO, RawLoc::INVALID)
            }
            Some(cap) => {
                deleted_list[1] = match details.boundary {
                    BoundaryMarker::Unestablished => RawLoc::INVALID,
                    BoundaryMarker::AtListHead => RawLoc::NULL,
                    BoundaryMarker::At(loc) => RawLoc::from_loc(loc),
                };
                let first_new = match details.pass {
                    PassTracking::FirstLap => RawLoc::INVALID,
                    PassTracking::Pending => RawLoc::NULL,
                    PassTracking::Started(loc) => RawLoc::from_loc(loc),
                };
                (RawLoc::from_loc(cap), first_new)
            }
        };

        DetailsRecord {
            ns: details.ns.clone(),
            capped: details.capped,
            first_extent: RawLoc::from_option(details.first_extent),
            last_extent: RawLoc::from_option(details.last_extent),
            cap_extent,
            cap_first_new_record,
            deleted_list,
            nrecords: details.nrecords,
            datasize: details.datasize,
            max: details.max,
        }
    }
}

fn plain(raw: RawLoc, field: &'static str) -> Result<Option<Loc>> {
    raw.to_option()
        .ok_or_else(|| CappedError::CorruptState(format!("unexpected sentinel in {}", field)))
}

impl TryFrom<DetailsRecord> for CappedDetails {
    type Error = CappedError;

    fn try_from(record: DetailsRecord) -> Result<Self> {
        let first_extent = plain(record.first_extent, "first extent")?;
        let last_extent = plain(record.last_extent, "last extent")?;
        let free_head = plain(record.deleted_list[0], "free list head")?;

        let mut details = CappedDetails {
            ns: record.ns,
            capped: record.capped,
            first_extent,
            last_extent,
            cap_extent: None,
            pass: PassTracking::FirstLap,
            free_head,
            boundary: BoundaryMarker::Unestablished,
            legacy_buckets: Vec::new(),
            nrecords: record.nrecords,
            datasize: record.datasize,
            max: record.max,
        };

        if record.cap_extent.is_zero() {
            // Older layout: buckets 1.. are size-class lists
            details.legacy_buckets = record.deleted_list[1..]
                .iter()
                .map(|raw| plain(*raw, "legacy bucket"))
                .collect::<Result<_>>()?;
            return Ok(details);
        }

        details.cap_extent = plain(record.cap_extent, "cap extent")?;
        if details.cap_extent.is_none() {
            return Err(CappedError::CorruptState("cap extent is null".to_string()));
        }

        let bucket1 = record.deleted_list[1];
        details.boundary = if bucket1.is_invalid() {
            BoundaryMarker::Unestablished
        } else {
            match plain(bucket1, "boundary marker")? {
                None => BoundaryMarker::AtListHead,
                Some(loc) => BoundaryMarker::At(loc),
            }
        };

        let first_new = record.cap_first_new_record;
        details.pass = if first_new.is_invalid() {
            PassTracking::FirstLap
        } else {
            match plain(first_new, "first new record")? {
                None => PassTracking::Pending,
                Some(loc) => PassTracking::Started(loc),
            }
        };

        if let Some(i) = record.deleted_list[2..].iter().position(|raw| !raw.is_null()) {
            return Err(CappedError::CorruptState(format!(
                "free list bucket {} is in use in a migrated layout",
                i + 2
            )));
        }

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CappedDetails {
        CappedDetails::new("test.events", Loc::new(0, 8192), Loc::new(0, 16384), 100)
    }

    #[test]
    fn test_fresh_details() {
        let details = sample();
        assert_eq!(details.cap_extent(), Some(Loc::new(0, 8192)));
        assert_eq!(details.pass(), PassTracking::FirstLap);
        assert_eq!(details.boundary(), BoundaryMarker::Unestablished);
        assert!(!details.is_legacy());
    }

    #[test]
    fn test_tagged_states_use_distinct_sentinels() {
        let mut details = sample();
        let record = DetailsRecord::from(&details);
        assert!(record.deleted_list[1].is_invalid());
        assert!(record.cap_first_new_record.is_invalid());

        details.boundary = BoundaryMarker::AtListHead;
        details.pass = PassTracking::Pending;
        let record = DetailsRecord::from(&details);
        assert!(record.deleted_list[1].is_null());
        assert!(record.cap_first_new_record.is_null());

        let marker = Loc::new(0, 9000);
        details.boundary = BoundaryMarker::At(marker);
        details.pass = PassTracking::Started(marker);
        let decoded = CappedDetails::try_from(DetailsRecord::from(&details)).unwrap();
        assert_eq!(decoded.boundary(), BoundaryMarker::At(marker));
        assert_eq!(decoded.pass(), PassTracking::Started(marker));
    }

    #[test]
    fn test_zero_cap_extent_decodes_as_legacy() {
        let mut record = DetailsRecord::from(&sample());
        record.cap_extent = RawLoc::ZERO;
        record.deleted_list[1] = RawLoc::from_loc(Loc::new(0, 9000));
        record.deleted_list[5] = RawLoc::from_loc(Loc::new(0, 12000));

        let details = CappedDetails::try_from(record).unwrap();
        assert!(details.is_legacy());
        assert_eq!(details.legacy_buckets.len(), BUCKETS - 1);
        assert_eq!(details.legacy_buckets[0], Some(Loc::new(0, 9000)));
        assert_eq!(details.legacy_buckets[4], Some(Loc::new(0, 12000)));
    }

    #[test]
    fn test_stray_bucket_in_migrated_layout_is_rejected() {
        let mut record = DetailsRecord::from(&sample());
        record.deleted_list[3] = RawLoc::from_loc(Loc::new(0, 9000));
        assert!(CappedDetails::try_from(record).is_err());
    }

    #[test]
    fn test_bucket_for() {
        assert_eq!(bucket_for(0), 0);
        assert_eq!(bucket_for(31), 0);
        assert_eq!(bucket_for(32), 1);
        assert_eq!(bucket_for(3920), 7);
        assert_eq!(bucket_for(u32::MAX), BUCKETS - 1);
    }
}

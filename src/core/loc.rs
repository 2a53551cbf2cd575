//! Location handles into a collection's data files
//!
//! A [`Loc`] is a (file, offset) pair. Absence is expressed as `Option<Loc>`;
//! the on-disk sentinels (null, invalid, zero) only exist in [`RawLoc`], the
//! persisted encoding, and are decoded into tagged states at the edge.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable address of a byte offset within one data file of a collection
///
/// Totally ordered by (file, offset). Extents are identified by the `Loc` of
/// their header, so ordering by `Loc` also orders by owning extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Loc {
    file: u32,
    offset: u32,
}

impl Loc {
    pub(crate) const fn new(file: u32, offset: u32) -> Self {
        Loc { file, offset }
    }

    pub(crate) fn file(&self) -> u32 {
        self.file
    }

    pub(crate) fn offset(&self) -> u32 {
        self.offset
    }

    /// Location `len` bytes further into the same file
    pub(crate) fn advanced_by(&self, len: u32) -> Loc {
        Loc::new(self.file, self.offset + len)
    }

    /// End of a span of `len` bytes starting here, as a raw byte position
    pub(crate) fn end_of(&self, len: u32) -> u64 {
        self.offset as u64 + len as u64
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:x}", self.file, self.offset)
    }
}

/// Persisted form of a location with sentinel encodings
///
/// - `NULL` (`file == -1`): absence
/// - `INVALID` (`file == -2`): explicitly "not applicable"
/// - `ZERO` (`0:0`): the unset cursor of a legacy layout; no extent lives there
///   because every data file starts with its own header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RawLoc {
    file: i32,
    offset: i32,
}

impl RawLoc {
    pub const NULL: RawLoc = RawLoc { file: -1, offset: 0 };
    pub const INVALID: RawLoc = RawLoc { file: -2, offset: 0 };
    pub const ZERO: RawLoc = RawLoc { file: 0, offset: 0 };

    pub fn is_null(&self) -> bool {
        self.file == -1
    }

    pub fn is_invalid(&self) -> bool {
        self.file == -2
    }

    pub fn is_zero(&self) -> bool {
        *self == RawLoc::ZERO
    }

    pub fn from_loc(loc: Loc) -> Self {
        RawLoc {
            file: loc.file as i32,
            offset: loc.offset as i32,
        }
    }

    pub fn from_option(loc: Option<Loc>) -> Self {
        loc.map_or(RawLoc::NULL, RawLoc::from_loc)
    }

    /// Decode a handle that may only be null or a real location
    ///
    /// Returns `None` for any other sentinel so callers can report corruption.
    pub fn to_option(self) -> Option<Option<Loc>> {
        if self.is_null() {
            Some(None)
        } else if self.file < 0 || self.offset < 0 {
            None
        } else {
            Some(Some(Loc::new(self.file as u32, self.offset as u32)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loc_ordering_is_file_then_offset() {
        let a = Loc::new(0, 9000);
        let b = Loc::new(1, 10);
        let c = Loc::new(1, 20);

        assert!(a < b);
        assert!(b < c);

        let mut locs = vec![c, a, b];
        locs.sort();
        assert_eq!(locs, vec![a, b, c]);
    }

    #[test]
    fn test_advanced_by() {
        let loc = Loc::new(2, 100);
        assert_eq!(loc.advanced_by(28), Loc::new(2, 128));
        assert_eq!(loc.end_of(28), 128);
    }

    #[test]
    fn test_raw_sentinels_are_distinct() {
        assert!(RawLoc::NULL.is_null());
        assert!(!RawLoc::NULL.is_invalid());
        assert!(RawLoc::INVALID.is_invalid());
        assert!(!RawLoc::INVALID.is_null());
        assert!(RawLoc::ZERO.is_zero());
        assert!(!RawLoc::NULL.is_zero());
    }

    #[test]
    fn test_raw_decoding() {
        assert_eq!(RawLoc::NULL.to_option(), Some(None));
        assert_eq!(RawLoc::INVALID.to_option(), None);

        let loc = Loc::new(3, 0x2000);
        assert_eq!(RawLoc::from_loc(loc).to_option(), Some(Some(loc)));
        assert_eq!(RawLoc::from_option(None), RawLoc::NULL);
    }

    #[test]
    fn test_display() {
        assert_eq!(Loc::new(1, 0x2000).to_string(), "1:2000");
    }
}

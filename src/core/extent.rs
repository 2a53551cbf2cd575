//! Extents: fixed, contiguous regions of a data file owned by one collection
//!
//! Extents are linked into a ring through `xnext`/`xprev`; the collection keeps
//! the first and last extent as anchors. Each extent also anchors the
//! insertion-ordered list of live records stored inside it.

use crate::core::error::{CappedError, Result};
use crate::core::loc::Loc;
use serde::{Deserialize, Serialize};

/// Magic number stamped into every extent header
pub const EXTENT_MAGIC: u32 = 0x4142_4344;

/// Bytes reserved at the front of each extent for its header
pub const EXTENT_HEADER_LEN: u32 = 176;

/// An extent header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    magic: u32,

    /// Location of this header (the extent's identity)
    loc: Loc,

    /// Total length in bytes, header included
    length: u32,

    /// Ring successor (`None` on the last extent)
    pub(crate) xnext: Option<Loc>,

    /// Ring predecessor (`None` on the first extent)
    pub(crate) xprev: Option<Loc>,

    /// Oldest live record in this extent
    pub(crate) first_record: Option<Loc>,

    /// Newest live record in this extent
    pub(crate) last_record: Option<Loc>,
}

impl Extent {
    pub fn new(loc: Loc, length: u32) -> Self {
        Extent {
            magic: EXTENT_MAGIC,
            loc,
            length,
            xnext: None,
            xprev: None,
            first_record: None,
            last_record: None,
        }
    }

    pub fn loc(&self) -> Loc {
        self.loc
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn next(&self) -> Option<Loc> {
        self.xnext
    }

    pub fn prev(&self) -> Option<Loc> {
        self.xprev
    }

    pub fn first_record(&self) -> Option<Loc> {
        self.first_record
    }

    pub fn last_record(&self) -> Option<Loc> {
        self.last_record
    }

    /// First byte past the header, where slots may begin
    pub fn body_start(&self) -> Loc {
        self.loc.advanced_by(EXTENT_HEADER_LEN)
    }

    /// Usable bytes after the header
    pub fn body_len(&self) -> u32 {
        self.length.saturating_sub(EXTENT_HEADER_LEN)
    }

    /// Check if a location falls inside this extent's address range
    pub fn contains(&self, loc: Loc) -> bool {
        loc.file() == self.loc.file()
            && loc.offset() >= self.loc.offset()
            && (loc.offset() as u64) < self.loc.end_of(self.length)
    }

    /// Check if a span of `len` bytes at `loc` lies entirely inside the body
    pub fn contains_span(&self, loc: Loc, len: u32) -> bool {
        self.contains(loc)
            && loc.offset() >= self.body_start().offset()
            && loc.end_of(len) <= self.loc.end_of(self.length)
    }

    /// Structural sanity check
    ///
    /// A failure means the on-disk structure can no longer be trusted.
    pub fn assert_ok(&self) -> Result<()> {
        let corrupt = |reason| CappedError::CorruptExtent {
            extent: self.loc,
            reason,
        };

        if self.magic != EXTENT_MAGIC {
            return Err(corrupt("bad magic"));
        }
        if self.length <= EXTENT_HEADER_LEN {
            return Err(corrupt("length does not exceed header"));
        }
        if self.first_record.is_some() != self.last_record.is_some() {
            return Err(corrupt("record list anchors disagree"));
        }
        if self.xnext == Some(self.loc) || self.xprev == Some(self.loc) {
            return Err(corrupt("ring link points at itself"));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_magic(&mut self) {
        self.magic = 0;
    }
}

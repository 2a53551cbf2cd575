use crate::core::loc::Loc;
use thiserror::Error;

/// Broad classification of a [`CappedError`]
///
/// Mirrors how callers are expected to react: misuse and corruption are caller
/// or disk bugs, exhaustion means the allocation can structurally never succeed,
/// and I/O covers snapshot persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Misuse,
    Corruption,
    Exhaustion,
    Io,
}

#[derive(Error, Debug)]
pub enum CappedError {
    #[error("Collection {0} is not capped")]
    NotCapped(String),

    #[error("Requested length must be positive")]
    ZeroLength,

    #[error("Requested length {len} exceeds the allocation ceiling {ceiling}")]
    RequestTooLarge { len: u32, ceiling: u32 },

    #[error("Capped state has not been migrated from the legacy layout")]
    NotMigrated,

    #[error("Extent {extent} failed its sanity check: {reason}")]
    CorruptExtent { extent: Loc, reason: &'static str },

    #[error("No {expected} at {loc}")]
    DanglingLocation { loc: Loc, expected: &'static str },

    #[error("Free slot {slot} does not lie past the header of extent {extent}")]
    SlotInsideHeader { slot: Loc, extent: Loc },

    #[error("Persisted state is corrupt: {0}")]
    CorruptState(String),

    #[error("Compaction found no free slots attributed to extent {0}")]
    EmptyCompactionRun(Loc),

    #[error(
        "passes >= maxPasses in capped collection alloc (ns: {ns}, len: {len}, max passes: {max_passes}, \
         max: {max_records}, nrecords: {nrecords}, datasize: {datasize})"
    )]
    PassBudgetExceeded {
        ns: String,
        len: u32,
        max_passes: u32,
        max_records: u64,
        nrecords: u64,
        datasize: u64,
    },

    #[error("Truncating a capped collection after {0} is not supported")]
    TruncateUnsupported(Loc),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Snapshot checksum verification failed")]
    ChecksumMismatch,

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedSnapshotVersion(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl CappedError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CappedError::NotCapped(_)
            | CappedError::ZeroLength
            | CappedError::RequestTooLarge { .. }
            | CappedError::TruncateUnsupported(_)
            | CappedError::InvalidNamespace(_)
            | CappedError::InvalidConfig(_)
            | CappedError::ConfigParse(_) => ErrorClass::Misuse,
            CappedError::NotMigrated
            | CappedError::CorruptExtent { .. }
            | CappedError::DanglingLocation { .. }
            | CappedError::SlotInsideHeader { .. }
            | CappedError::CorruptState(_)
            | CappedError::EmptyCompactionRun(_)
            | CappedError::ChecksumMismatch
            | CappedError::UnsupportedSnapshotVersion(_) => ErrorClass::Corruption,
            CappedError::PassBudgetExceeded { .. } => ErrorClass::Exhaustion,
            CappedError::Io(_) | CappedError::Serialization(_) => ErrorClass::Io,
        }
    }

    /// Fatal errors abort the current operation and must never be retried
    pub fn is_fatal(&self) -> bool {
        self.class() != ErrorClass::Io
    }
}

pub type Result<T> = std::result::Result<T, CappedError>;

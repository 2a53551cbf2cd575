//! # Cartridge Capped - Fixed-Capacity Circular Collections
//!
//! `cartridge-capped` stores records in a ring of preallocated extents and
//! evicts the oldest records once the ring is full:
//!
//! - **Insertion order** is the only order; eviction is strictly FIFO
//! - **Bounded** by bytes (the extents) and optionally by record count
//! - **No growth**: extents are laid out once, at creation time
//! - **Snapshots** with CRC32 verification and legacy layout migration
//!
//! ## Quick Start
//!
//! ```rust
//! use cartridge_capped::{CappedCollection, CappedConfig, Result};
//!
//! # fn main() -> Result<()> {
//! let config = CappedConfig::new("app.events", vec![16 * 1024, 16 * 1024])?;
//! let events = CappedCollection::create(config)?;
//!
//! let mut writer = events.write();
//! writer.insert(b"started")?;
//! writer.insert(b"stopped")?;
//!
//! for payload in writer.records()? {
//!     println!("{}", String::from_utf8_lossy(&payload));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use cartridge_capped::{CappedCollection, CappedConfig};
//!
//! # fn main() -> cartridge_capped::Result<()> {
//! let config = CappedConfig::from_toml_str(
//!     r#"
//!     namespace = "local.oplog.rs"
//!     extent_sizes = [65536, 65536, 65536]
//!     max_records = 1000
//!     "#,
//! )?;
//! let oplog = CappedCollection::create(config)?;
//! assert_eq!(oplog.stats()?.extent_count, 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ extent 0 │──▶│ extent 1 │──▶│ extent 2 │──┐
//! └──────────┘   └──────────┘   └──────────┘  │
//!      ▲            cap extent                │
//!      └──────────────────────────────────────┘
//!
//! bucket 0: [slots of extent 1][boundary: last slot of extent 0][other slots]
//! ```
//!
//! Inserts only ever take space from the active ("cap") extent. When it has
//! no fit, the oldest record of that extent is evicted and its space
//! compacted; once the extent holds only records from the current pass, the
//! cursor moves on to the next extent in the ring.

pub mod core;

pub use crate::core::{
    collection::{CappedCollection, CappedStats, CappedWriter},
    config::{AllocLimits, CappedConfig},
    details::{BoundaryMarker, CappedDetails, PassTracking},
    diagnostics::{Diagnostics, TracingDiagnostics},
    error::{CappedError, ErrorClass, Result},
    freelist::FreeSlot,
    loc::Loc,
    state::CappedState,
    validation::Namespace,
};

//! Capped collection storage engine
//!
//! - [`error`] - Error types and their classification
//! - [`loc`] - Location handles and their persisted sentinels
//! - [`extent`], [`record`], [`arena`] - Extents, slots and the store holding them
//! - [`details`], [`state`] - Persisted cursor state and the state it governs
//! - [`freelist`] - Bucket-0 bookkeeping and extent membership tests
//! - [`compact`], [`cursor`], [`alloc`], [`capped`], [`migrate`] - The allocator proper
//! - [`config`], [`validation`], [`diagnostics`] - Configuration and reporting
//! - [`persist`], [`collection`] - Snapshots and the public handle

pub mod alloc;
pub mod arena;
pub mod capped;
pub mod collection;
pub mod compact;
pub mod config;
pub mod cursor;
pub mod details;
pub mod diagnostics;
pub mod error;
pub mod extent;
pub mod freelist;
pub mod loc;
pub mod migrate;
pub mod persist;
pub mod record;
pub mod state;
pub mod validation;

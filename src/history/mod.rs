//! Append-only log of batch attempts and the usage rollup derived from it.
//!
//! - `log`: in-memory log, entries, and rollup.
//! - `store`: persistence seam and the JSON file implementation.

pub mod log;
pub mod store;

pub use self::log::{HistoryEntry, HistoryLog, Rollup, SurfaceCount, ToneCount};
pub use self::store::{HistoryStore, HistoryStoreError, JsonFileStore, MemoryStore};

// ============================================================================
// roster-trim Library
// ============================================================================
//
// Keeps every account under a character limit by moving its lowest ranked
// characters into a recoverable overflow store, and puts them back on
// restore.

pub mod backup;
pub mod config;
pub mod core;
pub mod engine;
pub mod facade;
pub mod ranking;
pub mod report;
pub mod storage;

// Re-export main types for convenience
pub use config::RosterConfig;
pub use crate::core::{
    Account, AccountId, Character, CharacterId, OverflowEntry, Result, RosterError, WriteMode,
};
pub use engine::{
    OverflowPolicy, RestoreOutcome, TrimAction, TrimOptions, TrimResult, restore, run_restore,
    run_trim, trim,
};
pub use facade::Roster;
pub use ranking::{Criterion, rank};
pub use report::{RestoreReport, TrimReport};
pub use storage::{FileRecordStore, MemoryRecordStore, OverflowState, RecordStore, StoreLayout};

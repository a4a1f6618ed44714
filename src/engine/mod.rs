pub mod restore;
pub mod runner;
pub mod trim;

pub use restore::{RestoreOutcome, restore};
pub use runner::{run_restore, run_trim};
pub use trim::{
    CharacterLine, DEFAULT_CHARACTER_LIMIT, LineStatus, OverflowPolicy, TrimAction, TrimOptions,
    TrimResult, trim,
};

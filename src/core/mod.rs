pub mod error;
pub mod types;

pub use error::{Result, RosterError};
pub use types::{
    Account, AccountId, CHARACTER_NAME_FIELD, CHARACTERS_FIELD, Character, CharacterId,
    OverflowEntry, UNKNOWN_CHARACTER_NAME, WriteMode,
};

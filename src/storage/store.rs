use crate::core::{Account, AccountId, Character, CharacterId, OverflowEntry, Result, WriteMode};

/// Condition of the overflow side-store as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowState {
    /// The side-store location does not exist.
    Missing,
    /// The location exists but holds no entries.
    Empty,
    Populated,
}

/// Record store trait - storage access for accounts, characters and overflow entries
///
/// Every write takes an explicit [`WriteMode`]. Under [`WriteMode::DryRun`]
/// the write is logged and reported as successful but storage is untouched.
pub trait RecordStore {
    /// List account identifiers, sorted ascending
    fn list_accounts(&self) -> Result<Vec<AccountId>>;

    /// Load one account; `Decode` if the content is not a valid record
    fn load_account(&self, id: &AccountId) -> Result<Account>;

    /// Load one character; `Ok(None)` if no record exists for `id`
    fn load_character(&self, id: &CharacterId) -> Result<Option<Character>>;

    /// Persist an account's record
    fn save_account(&mut self, account: &Account, mode: WriteMode) -> Result<()>;

    /// Whether the overflow side-store exists and holds anything
    fn overflow_state(&self) -> Result<OverflowState>;

    /// List accounts with a pending overflow entry, sorted ascending
    fn list_overflow(&self) -> Result<Vec<AccountId>>;

    /// Load the pending overflow entry for an account
    fn load_overflow(&self, account: &AccountId) -> Result<Option<OverflowEntry>>;

    /// Create or replace the overflow entry for `entry.account`
    fn save_overflow(&mut self, entry: &OverflowEntry, mode: WriteMode) -> Result<()>;

    /// Remove the overflow entry for an account
    fn delete_overflow(&mut self, account: &AccountId, mode: WriteMode) -> Result<()>;
}

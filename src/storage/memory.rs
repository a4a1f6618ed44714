use super::store::{OverflowState, RecordStore};
use crate::core::{
    Account, AccountId, Character, CharacterId, OverflowEntry, Result, RosterError, WriteMode,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// In-memory record store.
///
/// Records are kept as raw JSON documents so undecodable content can be
/// represented. Counts applied writes, and can be told to fail account saves,
/// which makes it the store of choice for engine tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    accounts: BTreeMap<AccountId, Value>,
    characters: BTreeMap<CharacterId, Value>,
    overflow: BTreeMap<AccountId, Vec<CharacterId>>,
    failing_accounts: BTreeSet<AccountId>,
    writes: usize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&mut self, id: impl Into<AccountId>, document: Value) {
        self.accounts.insert(id.into(), document);
    }

    pub fn insert_character(&mut self, id: impl Into<CharacterId>, document: Value) {
        self.characters.insert(id.into(), document);
    }

    pub fn insert_overflow(&mut self, account: impl Into<AccountId>, ids: Vec<CharacterId>) {
        self.overflow.insert(account.into(), ids);
    }

    /// Make every later `save_account` for `id` fail with an I/O error.
    pub fn fail_saves_for(&mut self, id: impl Into<AccountId>) {
        self.failing_accounts.insert(id.into());
    }

    pub fn account_document(&self, id: &AccountId) -> Option<&Value> {
        self.accounts.get(id)
    }

    pub fn overflow_ids(&self, account: &AccountId) -> Option<&[CharacterId]> {
        self.overflow.get(account).map(Vec::as_slice)
    }

    /// Number of writes that actually changed the store.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl RecordStore for MemoryRecordStore {
    fn list_accounts(&self) -> Result<Vec<AccountId>> {
        Ok(self.accounts.keys().cloned().collect())
    }

    fn load_account(&self, id: &AccountId) -> Result<Account> {
        let document = self
            .accounts
            .get(id)
            .ok_or_else(|| RosterError::Io(format!("Account record '{}' not found", id)))?;
        Account::from_document(id.clone(), document.clone())
    }

    fn load_character(&self, id: &CharacterId) -> Result<Option<Character>> {
        self.characters
            .get(id)
            .map(|document| Character::from_document(id.clone(), document.clone()))
            .transpose()
    }

    fn save_account(&mut self, account: &Account, mode: WriteMode) -> Result<()> {
        if mode.is_dry_run() {
            info!(account = %account.id, "simulating save");
            return Ok(());
        }
        if self.failing_accounts.contains(&account.id) {
            return Err(RosterError::Io(format!(
                "Failed to write account '{}': simulated failure",
                account.id
            )));
        }
        self.accounts.insert(account.id.clone(), account.to_document());
        self.writes += 1;
        Ok(())
    }

    fn overflow_state(&self) -> Result<OverflowState> {
        Ok(if self.overflow.is_empty() {
            OverflowState::Empty
        } else {
            OverflowState::Populated
        })
    }

    fn list_overflow(&self) -> Result<Vec<AccountId>> {
        Ok(self.overflow.keys().cloned().collect())
    }

    fn load_overflow(&self, account: &AccountId) -> Result<Option<OverflowEntry>> {
        Ok(self
            .overflow
            .get(account)
            .map(|ids| OverflowEntry::new(account.clone(), ids.clone())))
    }

    fn save_overflow(&mut self, entry: &OverflowEntry, mode: WriteMode) -> Result<()> {
        if mode.is_dry_run() {
            info!(account = %entry.account, "simulating overflow save");
            return Ok(());
        }
        self.overflow
            .insert(entry.account.clone(), entry.trimmed_characters.clone());
        self.writes += 1;
        Ok(())
    }

    fn delete_overflow(&mut self, account: &AccountId, mode: WriteMode) -> Result<()> {
        if mode.is_dry_run() {
            info!(account = %account, "simulating overflow delete");
            return Ok(());
        }
        if self.overflow.remove(account).is_some() {
            self.writes += 1;
        }
        Ok(())
    }
}

//! Trim engine
//!
//! Enforces the per-account character limit: ranks the account's characters,
//! keeps the top `limit`, and moves the rest into the account's overflow
//! entry so they can be restored later.

use crate::core::{
    Account, AccountId, Character, CharacterId, OverflowEntry, Result, RosterError, WriteMode,
};
use crate::ranking::{Criterion, rank};
use crate::storage::RecordStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Default maximum number of characters an account retains.
pub const DEFAULT_CHARACTER_LIMIT: usize = 50;

/// What to do when an account is trimmed while a previous overflow entry is
/// still waiting to be restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Keep the pending identifiers and append the new overflow after them.
    #[default]
    Merge,
    /// Leave the account untouched until the pending entry is restored.
    Reject,
    /// Overwrite the pending entry. The earlier identifiers are lost.
    Replace,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverflowPolicy::Merge => "merge",
            OverflowPolicy::Reject => "reject",
            OverflowPolicy::Replace => "replace",
        };
        f.write_str(name)
    }
}

impl FromStr for OverflowPolicy {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(OverflowPolicy::Merge),
            "reject" => Ok(OverflowPolicy::Reject),
            "replace" => Ok(OverflowPolicy::Replace),
            other => Err(RosterError::InvalidArgument(format!(
                "unsupported overflow policy '{}' (expected merge, reject or replace)",
                other
            ))),
        }
    }
}

/// Parameters of a trim run, shared by every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimOptions {
    pub criterion: Criterion,
    pub limit: usize,
    pub policy: OverflowPolicy,
}

impl TrimOptions {
    pub fn new(criterion: Criterion, limit: usize) -> Self {
        Self {
            criterion,
            limit,
            policy: OverflowPolicy::default(),
        }
    }

    pub fn policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(RosterError::InvalidArgument(
                "character limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self::new(Criterion::default(), DEFAULT_CHARACTER_LIMIT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimAction {
    /// At or under the limit; nothing written.
    NoOp,
    Trimmed,
    /// Over the limit, but a pending overflow entry blocked the trim.
    OverflowPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Kept,
    Trimmed,
}

/// Per-character outcome of a trim.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterLine {
    pub character: CharacterId,
    pub status: LineStatus,
    pub name: String,
    pub criterion: Criterion,
    pub value: String,
}

impl fmt::Display for CharacterLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            LineStatus::Kept => "KEPT",
            LineStatus::Trimmed => "TRIMMED",
        };
        write!(
            f,
            " → [{}] {} - {}: {}",
            status,
            self.name,
            self.criterion.label(),
            self.value
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrimResult {
    pub account: AccountId,
    pub original_count: usize,
    /// Identifiers left on the account, in rank order when trimmed.
    pub kept: Vec<CharacterId>,
    /// Identifiers moved out by this trim, in rank order.
    pub overflow: Vec<CharacterId>,
    /// Identifiers already pending from an earlier trim.
    pub previously_pending: usize,
    pub action: TrimAction,
    pub lines: Vec<CharacterLine>,
    /// Characters ranked with default attributes because their record was
    /// missing or unreadable.
    pub placeholders: usize,
}

impl TrimResult {
    fn unchanged(account: &Account, action: TrimAction, previously_pending: usize) -> Self {
        Self {
            account: account.id.clone(),
            original_count: account.character_count(),
            kept: account.characters.clone(),
            overflow: Vec::new(),
            previously_pending,
            action,
            lines: Vec::new(),
            placeholders: 0,
        }
    }
}

/// Trim one account down to `options.limit` characters.
///
/// On success `account` holds the kept identifiers in rank order. Under
/// [`WriteMode::DryRun`] the store is untouched but the result and `account`
/// are the same as for a real run.
pub fn trim<S: RecordStore + ?Sized>(
    store: &mut S,
    account: &mut Account,
    options: &TrimOptions,
    mode: WriteMode,
) -> Result<TrimResult> {
    options.validate()?;

    let original_count = account.character_count();
    if original_count <= options.limit {
        debug!(account = %account.id, count = original_count, "within limit");
        return Ok(TrimResult::unchanged(account, TrimAction::NoOp, 0));
    }

    let pending = load_pending(store, &account.id, options.policy)?;
    let previously_pending = pending.as_ref().map_or(0, OverflowEntry::len);
    if options.policy == OverflowPolicy::Reject && previously_pending > 0 {
        warn!(
            account = %account.id,
            pending = previously_pending,
            "overflow entry not yet restored, leaving account untouched"
        );
        return Ok(TrimResult::unchanged(
            account,
            TrimAction::OverflowPending,
            previously_pending,
        ));
    }

    let mut characters = Vec::with_capacity(original_count);
    let mut placeholders = 0;
    for id in &account.characters {
        let (character, placeholder) = load_or_placeholder(store, id)?;
        if placeholder {
            placeholders += 1;
        }
        characters.push(character);
    }

    let ranked = rank(characters, options.criterion);
    let lines = ranked
        .iter()
        .enumerate()
        .map(|(index, character)| CharacterLine {
            character: character.id.clone(),
            status: if index < options.limit {
                LineStatus::Kept
            } else {
                LineStatus::Trimmed
            },
            name: character.name.clone(),
            criterion: options.criterion,
            value: options.criterion.display_value(character),
        })
        .collect::<Vec<_>>();

    let mut ids: Vec<CharacterId> = ranked.into_iter().map(|c| c.id).collect();
    let overflow = ids.split_off(options.limit);
    let kept = ids;

    let stored = match (pending, options.policy) {
        (Some(previous), OverflowPolicy::Merge) if !previous.is_empty() => {
            merge_pending(&previous.trimmed_characters, &kept, &overflow)
        }
        (Some(previous), OverflowPolicy::Replace) if !previous.is_empty() => {
            warn!(
                account = %account.id,
                lost = previous.len(),
                "replacing un-restored overflow entry"
            );
            overflow.clone()
        }
        _ => overflow.clone(),
    };

    // Overflow first: if the account write fails, the identifiers are still
    // recorded and the account keeps its full list.
    let entry = OverflowEntry::new(account.id.clone(), stored);
    store.save_overflow(&entry, mode)?;

    let mut updated = account.clone();
    updated.characters = kept.clone();
    store.save_account(&updated, mode)?;
    *account = updated;

    info!(
        account = %account.id,
        kept = kept.len(),
        trimmed = overflow.len(),
        criterion = %options.criterion,
        dry_run = mode.is_dry_run(),
        "trimmed account"
    );

    Ok(TrimResult {
        account: account.id.clone(),
        original_count,
        kept,
        overflow,
        previously_pending,
        action: TrimAction::Trimmed,
        lines,
        placeholders,
    })
}

/// Load a character, falling back to a placeholder when the record is
/// missing or undecodable. Other I/O failures propagate.
fn load_or_placeholder<S: RecordStore + ?Sized>(
    store: &S,
    id: &CharacterId,
) -> Result<(Character, bool)> {
    match store.load_character(id) {
        Ok(Some(character)) => Ok((character, false)),
        Ok(None) => {
            warn!(character = %id, "character record missing, ranking with defaults");
            Ok((Character::placeholder(id.clone()), true))
        }
        Err(err) if err.is_decode() => {
            warn!(character = %id, error = %err, "character record unreadable, ranking with defaults");
            Ok((Character::placeholder(id.clone()), true))
        }
        Err(err) => Err(err),
    }
}

/// Pending identifiers still off the account, then the new overflow, without
/// duplicates.
/// Un-restored overflow entry for `account`, if any. Under `Replace` an
/// undecodable entry counts as absent.
fn load_pending<S: RecordStore + ?Sized>(
    store: &S,
    account: &AccountId,
    policy: OverflowPolicy,
) -> Result<Option<OverflowEntry>> {
    match store.load_overflow(account) {
        Ok(pending) => Ok(pending),
        Err(err) if err.is_decode() && policy == OverflowPolicy::Replace => {
            warn!(account = %account, error = %err, "replacing unreadable overflow entry");
            Ok(None)
        }
        Err(RosterError::Decode(message)) => Err(RosterError::Decode(format!(
            "Overflow entry unreadable: {}",
            message
        ))),
        Err(err) => Err(err),
    }
}

fn merge_pending(
    previous: &[CharacterId],
    kept: &[CharacterId],
    overflow: &[CharacterId],
) -> Vec<CharacterId> {
    let on_account: HashSet<&CharacterId> = kept.iter().collect();
    let mut seen = HashSet::new();
    previous
        .iter()
        .filter(|id| !on_account.contains(id))
        .chain(overflow.iter())
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRecordStore;
    use serde_json::json;

    fn store_with(account: &str, characters: &[(&str, i64)]) -> MemoryRecordStore {
        let mut store = MemoryRecordStore::new();
        let ids: Vec<&str> = characters.iter().map(|(id, _)| *id).collect();
        store.insert_account(account, json!({ "characters": ids }));
        for (id, marks) in characters {
            store.insert_character(*id, json!({ "characterName": id.to_uppercase(), "marks": marks }));
        }
        store
    }

    fn ids(list: &[&str]) -> Vec<CharacterId> {
        list.iter().map(|id| CharacterId::from(*id)).collect()
    }

    #[test]
    fn test_trim_scenario() {
        let mut store = store_with("P1", &[("c1", 5), ("c2", 20), ("c3", 1)]);
        let mut account = store.load_account(&"P1".into()).unwrap();

        let result = trim(
            &mut store,
            &mut account,
            &TrimOptions::new(Criterion::Marks, 2),
            WriteMode::Apply,
        )
        .unwrap();

        assert_eq!(result.action, TrimAction::Trimmed);
        assert_eq!(result.kept, ids(&["c2", "c1"]));
        assert_eq!(result.overflow, ids(&["c3"]));
        assert_eq!(account.characters, ids(&["c2", "c1"]));
        assert_eq!(store.overflow_ids(&"P1".into()).unwrap(), ids(&["c3"]).as_slice());
        assert_eq!(
            store.account_document(&"P1".into()).unwrap()["characters"],
            json!(["c2", "c1"])
        );

        let rendered: Vec<String> = result.lines.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                " → [KEPT] C2 - Marks: 20",
                " → [KEPT] C1 - Marks: 5",
                " → [TRIMMED] C3 - Marks: 1",
            ]
        );
    }

    #[test]
    fn test_within_limit_is_noop() {
        let mut store = store_with("P1", &[("c1", 5), ("c2", 20)]);
        let mut account = store.load_account(&"P1".into()).unwrap();

        let result = trim(
            &mut store,
            &mut account,
            &TrimOptions::new(Criterion::Marks, 2),
            WriteMode::Apply,
        )
        .unwrap();

        assert_eq!(result.action, TrimAction::NoOp);
        assert!(result.lines.is_empty());
        assert_eq!(account.characters, ids(&["c1", "c2"]));
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_ties_keep_account_order() {
        let mut store = store_with("P1", &[("a", 10), ("b", 10), ("c", 5)]);
        let mut account = store.load_account(&"P1".into()).unwrap();

        let result = trim(
            &mut store,
            &mut account,
            &TrimOptions::new(Criterion::Marks, 2),
            WriteMode::Apply,
        )
        .unwrap();

        assert_eq!(result.kept, ids(&["a", "b"]));
        assert_eq!(result.overflow, ids(&["c"]));
    }

    #[test]
    fn test_missing_and_broken_characters_are_counted() {
        let mut store = store_with("P1", &[("c1", 5)]);
        store.insert_account("P1", json!({ "characters": ["ghost", "c1", "broken"] }));
        store.insert_character("broken", json!("not an object"));
        let mut account = store.load_account(&"P1".into()).unwrap();

        let result = trim(
            &mut store,
            &mut account,
            &TrimOptions::new(Criterion::Marks, 2),
            WriteMode::Apply,
        )
        .unwrap();

        assert_eq!(result.placeholders, 2);
        assert_eq!(result.kept, ids(&["c1", "ghost"]));
        assert_eq!(result.overflow, ids(&["broken"]));
        assert_eq!(result.lines[1].name, "Unknown");
        assert_eq!(result.lines[1].value, "0");
    }

    #[test]
    fn test_dry_run_matches_real_run_without_writes() {
        let store = store_with("P1", &[("c1", 5), ("c2", 20), ("c3", 1)]);
        let options = TrimOptions::new(Criterion::Marks, 2);

        let mut dry_store = store.clone();
        let mut dry_account = dry_store.load_account(&"P1".into()).unwrap();
        let dry = trim(&mut dry_store, &mut dry_account, &options, WriteMode::DryRun).unwrap();

        let mut real_store = store.clone();
        let mut real_account = real_store.load_account(&"P1".into()).unwrap();
        let real = trim(&mut real_store, &mut real_account, &options, WriteMode::Apply).unwrap();

        assert_eq!(dry, real);
        assert_eq!(dry_account, real_account);
        assert_eq!(dry_store.writes(), 0);
        assert!(dry_store.overflow_ids(&"P1".into()).is_none());
        assert_eq!(
            dry_store.account_document(&"P1".into()).unwrap()["characters"],
            json!(["c1", "c2", "c3"])
        );
    }

    #[test]
    fn test_second_trim_merges_pending_overflow() {
        let mut store = store_with("P1", &[("c1", 5), ("c2", 20), ("c3", 1)]);
        let options = TrimOptions::new(Criterion::Marks, 2);
        let mut account = store.load_account(&"P1".into()).unwrap();
        trim(&mut store, &mut account, &options, WriteMode::Apply).unwrap();

        // a new character shows up before anyone restored
        store.insert_character("c4", json!({ "characterName": "C4", "marks": 50 }));
        store.insert_account("P1", json!({ "characters": ["c2", "c1", "c4"] }));
        let mut account = store.load_account(&"P1".into()).unwrap();

        let result = trim(&mut store, &mut account, &options, WriteMode::Apply).unwrap();
        assert_eq!(result.previously_pending, 1);
        assert_eq!(result.kept, ids(&["c4", "c2"]));
        assert_eq!(result.overflow, ids(&["c1"]));
        assert_eq!(store.overflow_ids(&"P1".into()).unwrap(), ids(&["c3", "c1"]).as_slice());
    }

    #[test]
    fn test_second_trim_rejected_leaves_account() {
        let mut store = store_with("P1", &[("c1", 5), ("c2", 20), ("c3", 1)]);
        store.insert_overflow("P1", ids(&["old"]));
        let mut account = store.load_account(&"P1".into()).unwrap();

        let options = TrimOptions::new(Criterion::Marks, 2).policy(OverflowPolicy::Reject);
        let result = trim(&mut store, &mut account, &options, WriteMode::Apply).unwrap();

        assert_eq!(result.action, TrimAction::OverflowPending);
        assert_eq!(store.writes(), 0);
        assert_eq!(account.characters, ids(&["c1", "c2", "c3"]));
        assert_eq!(store.overflow_ids(&"P1".into()).unwrap(), ids(&["old"]).as_slice());
    }

    #[test]
    fn test_second_trim_replace_drops_pending() {
        let mut store = store_with("P1", &[("c1", 5), ("c2", 20), ("c3", 1)]);
        store.insert_overflow("P1", ids(&["old"]));
        let mut account = store.load_account(&"P1".into()).unwrap();

        let options = TrimOptions::new(Criterion::Marks, 2).policy(OverflowPolicy::Replace);
        trim(&mut store, &mut account, &options, WriteMode::Apply).unwrap();

        assert_eq!(store.overflow_ids(&"P1".into()).unwrap(), ids(&["c3"]).as_slice());
    }

    #[test]
    fn test_failed_account_save_keeps_account_and_overflow() {
        let mut store = store_with("P1", &[("c1", 5), ("c2", 20), ("c3", 1)]);
        store.fail_saves_for("P1");
        let mut account = store.load_account(&"P1".into()).unwrap();

        let err = trim(
            &mut store,
            &mut account,
            &TrimOptions::new(Criterion::Marks, 2),
            WriteMode::Apply,
        )
        .unwrap_err();

        assert!(matches!(err, RosterError::Io(_)));
        assert_eq!(account.characters, ids(&["c1", "c2", "c3"]));
        assert_eq!(store.overflow_ids(&"P1".into()).unwrap(), ids(&["c3"]).as_slice());
    }

    #[test]
    fn test_zero_limit_is_invalid() {
        let mut store = store_with("P1", &[("c1", 5)]);
        let mut account = store.load_account(&"P1".into()).unwrap();
        let err = trim(
            &mut store,
            &mut account,
            &TrimOptions::new(Criterion::Marks, 0),
            WriteMode::Apply,
        )
        .unwrap_err();
        assert!(matches!(err, RosterError::InvalidArgument(_)));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Merge".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Merge);
        assert_eq!("reject".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Reject);
        assert!("drop".parse::<OverflowPolicy>().is_err());
    }
}

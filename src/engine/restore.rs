//! Restore engine
//!
//! Puts an account's trimmed characters back and consumes its overflow entry.

use crate::core::{Account, Result, WriteMode};
use crate::storage::RecordStore;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored {
        /// Identifiers appended to the account.
        restored: usize,
        /// Identifiers already on the account, not appended again.
        duplicates: usize,
    },
    /// No overflow entry for this account.
    NotFound,
}

/// Append an account's overflow identifiers to its character list.
///
/// Restored identifiers go after the current characters, in the order they
/// were stored (rank order at trim time), so the pre-trim order is not
/// reproduced. The account is saved before the overflow entry is deleted;
/// if the save fails the entry stays and `account` is left unchanged.
pub fn restore<S: RecordStore + ?Sized>(
    store: &mut S,
    account: &mut Account,
    mode: WriteMode,
) -> Result<RestoreOutcome> {
    let Some(entry) = store.load_overflow(&account.id)? else {
        debug!(account = %account.id, "no overflow entry");
        return Ok(RestoreOutcome::NotFound);
    };

    let mut present: HashSet<_> = account.characters.iter().cloned().collect();
    let mut updated = account.clone();
    let mut duplicates = 0;
    for id in entry.trimmed_characters {
        if present.insert(id.clone()) {
            updated.characters.push(id);
        } else {
            duplicates += 1;
        }
    }
    let restored = updated.character_count() - account.character_count();

    if duplicates > 0 {
        warn!(
            account = %account.id,
            duplicates,
            "overflow entry lists characters already on the account"
        );
    }

    store.save_account(&updated, mode)?;
    store.delete_overflow(&account.id, mode)?;
    *account = updated;

    info!(
        account = %account.id,
        restored,
        dry_run = mode.is_dry_run(),
        "restored trimmed characters"
    );

    Ok(RestoreOutcome::Restored {
        restored,
        duplicates,
    })
}

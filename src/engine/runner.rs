//! Whole-store runs
//!
//! Accounts are visited one at a time in identifier order. A failure on one
//! account is recorded in the report and the run moves on; only invalid
//! options or an unreadable account listing abort the run.

use super::restore::restore;
use super::trim::{TrimOptions, trim};
use crate::core::{AccountId, Result, RosterError, WriteMode};
use crate::report::{
    RestoreEntry, RestoreEntryOutcome, RestoreReport, TrimEntry, TrimOutcome, TrimReport,
};
use crate::storage::{OverflowState, RecordStore};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Trim every account in the store.
pub fn run_trim<S: RecordStore + ?Sized>(
    store: &mut S,
    options: &TrimOptions,
    mode: WriteMode,
) -> Result<TrimReport> {
    options.validate()?;

    let accounts = store.list_accounts()?;
    info!(
        accounts = accounts.len(),
        criterion = %options.criterion,
        limit = options.limit,
        policy = %options.policy,
        dry_run = mode.is_dry_run(),
        "starting trim run"
    );

    let mut report = TrimReport::new(options.criterion, options.limit, mode.is_dry_run());
    for id in accounts {
        let outcome = match store.load_account(&id) {
            Ok(mut account) => match trim(store, &mut account, options, mode) {
                Ok(result) => TrimOutcome::Completed(result),
                Err(err) => trim_failure(&id, err),
            },
            Err(err) => trim_failure(&id, err),
        };
        report.entries.push(TrimEntry {
            account: id,
            outcome,
        });
    }

    Ok(report)
}

fn trim_failure(account: &AccountId, err: RosterError) -> TrimOutcome {
    if err.is_decode() {
        warn!(account = %account, error = %err, "skipping account");
        TrimOutcome::Skipped(err.to_string())
    } else {
        warn!(account = %account, error = %err, "account failed");
        TrimOutcome::Failed(err.to_string())
    }
}

/// Restore every account that has a pending overflow entry.
pub fn run_restore<S: RecordStore + ?Sized>(
    store: &mut S,
    mode: WriteMode,
) -> Result<RestoreReport> {
    let state = store.overflow_state()?;
    let mut report = RestoreReport::new(mode.is_dry_run(), state);
    match state {
        OverflowState::Missing => {
            info!("overflow store does not exist, nothing to restore");
            return Ok(report);
        }
        OverflowState::Empty => {
            info!("overflow store is empty, nothing to restore");
            return Ok(report);
        }
        OverflowState::Populated => {}
    }

    let accounts = store.list_accounts()?;
    info!(
        accounts = accounts.len(),
        dry_run = mode.is_dry_run(),
        "starting restore run"
    );

    for id in &accounts {
        let outcome = match store.load_account(id) {
            Ok(mut account) => match restore(store, &mut account, mode) {
                Ok(outcome) => RestoreEntryOutcome::Completed(outcome),
                Err(err) => restore_failure(id, err),
            },
            Err(err) => restore_failure(id, err),
        };
        report.entries.push(RestoreEntry {
            account: id.clone(),
            outcome,
        });
    }

    let known: BTreeSet<_> = accounts.into_iter().collect();
    report.orphans = store
        .list_overflow()?
        .into_iter()
        .filter(|id| !known.contains(id))
        .collect();
    for orphan in &report.orphans {
        warn!(account = %orphan, "overflow entry has no matching account");
    }

    Ok(report)
}

fn restore_failure(account: &AccountId, err: RosterError) -> RestoreEntryOutcome {
    if err.is_decode() {
        warn!(account = %account, error = %err, "skipping account");
        RestoreEntryOutcome::Skipped(err.to_string())
    } else {
        warn!(account = %account, error = %err, "account failed");
        RestoreEntryOutcome::Failed(err.to_string())
    }
}

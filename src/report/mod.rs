//! Run reports
//!
//! Every account visited by a run gets one entry, so skips, no-ops, trims,
//! restores and failures are all observable individually. `Display` renders
//! the console form.

use crate::core::AccountId;
use crate::engine::{RestoreOutcome, TrimAction, TrimResult};
use crate::ranking::Criterion;
use crate::storage::OverflowState;
use std::fmt;

// ============================================================================
// Trim
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TrimOutcome {
    Completed(TrimResult),
    /// Account record or its overflow entry could not be decoded.
    Skipped(String),
    /// Storage failure; other accounts were still processed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrimEntry {
    pub account: AccountId,
    pub outcome: TrimOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrimReport {
    pub criterion: Criterion,
    pub limit: usize,
    pub dry_run: bool,
    pub entries: Vec<TrimEntry>,
}

impl TrimReport {
    pub fn new(criterion: Criterion, limit: usize, dry_run: bool) -> Self {
        Self {
            criterion,
            limit,
            dry_run,
            entries: Vec::new(),
        }
    }

    pub fn entry(&self, account: &AccountId) -> Option<&TrimEntry> {
        self.entries.iter().find(|entry| &entry.account == account)
    }

    fn count_action(&self, action: TrimAction) -> usize {
        self.entries
            .iter()
            .filter(|entry| {
                matches!(&entry.outcome, TrimOutcome::Completed(result) if result.action == action)
            })
            .count()
    }

    pub fn trimmed_accounts(&self) -> usize {
        self.count_action(TrimAction::Trimmed)
    }

    pub fn unchanged_accounts(&self) -> usize {
        self.count_action(TrimAction::NoOp)
    }

    pub fn pending_accounts(&self) -> usize {
        self.count_action(TrimAction::OverflowPending)
    }

    pub fn skipped_accounts(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, TrimOutcome::Skipped(_)))
            .count()
    }

    pub fn failed_accounts(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, TrimOutcome::Failed(_)))
            .count()
    }

    pub fn trimmed_characters(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| match &entry.outcome {
                TrimOutcome::Completed(result) => result.overflow.len(),
                _ => 0,
            })
            .sum()
    }
}

impl fmt::Display for TrimEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            TrimOutcome::Completed(result) => {
                let header = format!("{} [Character(s): {}]", self.account, result.original_count);
                match result.action {
                    TrimAction::NoOp => write!(f, "{} - Skipping.", header),
                    TrimAction::OverflowPending => write!(
                        f,
                        "{} - Skipping, {} trimmed character(s) not yet restored.",
                        header, result.previously_pending
                    ),
                    TrimAction::Trimmed => {
                        write!(f, "{} - Processing.", header)?;
                        for line in &result.lines {
                            write!(f, "\n{}", line)?;
                        }
                        Ok(())
                    }
                }
            }
            TrimOutcome::Skipped(reason) => write!(f, "{} - Skipped: {}", self.account, reason),
            TrimOutcome::Failed(error) => write!(f, "{} - Failed: {}", self.account, error),
        }
    }
}

impl fmt::Display for TrimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "[dry run] no files will be modified.")?;
        }
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        write!(
            f,
            "Trimmed {} character(s) from {} account(s) by {} (limit {}); {} unchanged, {} pending restore, {} skipped, {} failed.",
            self.trimmed_characters(),
            self.trimmed_accounts(),
            self.criterion,
            self.limit,
            self.unchanged_accounts(),
            self.pending_accounts(),
            self.skipped_accounts(),
            self.failed_accounts()
        )
    }
}

// ============================================================================
// Restore
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreEntryOutcome {
    Completed(RestoreOutcome),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreEntry {
    pub account: AccountId,
    pub outcome: RestoreEntryOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    pub dry_run: bool,
    /// Side-store condition when the run started.
    pub state: OverflowState,
    pub entries: Vec<RestoreEntry>,
    /// Overflow entries whose account no longer exists; left in place.
    pub orphans: Vec<AccountId>,
}

impl RestoreReport {
    pub fn new(dry_run: bool, state: OverflowState) -> Self {
        Self {
            dry_run,
            state,
            entries: Vec::new(),
            orphans: Vec::new(),
        }
    }

    pub fn entry(&self, account: &AccountId) -> Option<&RestoreEntry> {
        self.entries.iter().find(|entry| &entry.account == account)
    }

    /// True when the side-store held nothing to restore.
    pub fn nothing_to_restore(&self) -> bool {
        self.state != OverflowState::Populated
    }

    pub fn restored_accounts(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| {
                matches!(
                    entry.outcome,
                    RestoreEntryOutcome::Completed(RestoreOutcome::Restored { .. })
                )
            })
            .count()
    }

    pub fn failed_accounts(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, RestoreEntryOutcome::Failed(_)))
            .count()
    }

    pub fn restored_characters(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| match entry.outcome {
                RestoreEntryOutcome::Completed(RestoreOutcome::Restored { restored, .. }) => {
                    restored
                }
                _ => 0,
            })
            .sum()
    }
}

impl fmt::Display for RestoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            RestoreEntryOutcome::Completed(RestoreOutcome::Restored {
                restored,
                duplicates,
            }) => {
                write!(
                    f,
                    "Restored {} trimmed characters to {}.",
                    restored, self.account
                )?;
                if *duplicates > 0 {
                    write!(f, " ({} already present)", duplicates)?;
                }
                Ok(())
            }
            RestoreEntryOutcome::Completed(RestoreOutcome::NotFound) => {
                write!(f, "{} - Nothing to restore.", self.account)
            }
            RestoreEntryOutcome::Skipped(reason) => {
                write!(f, "{} - Skipped: {}", self.account, reason)
            }
            RestoreEntryOutcome::Failed(error) => {
                write!(f, "{} - Failed: {}", self.account, error)
            }
        }
    }
}

impl fmt::Display for RestoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            OverflowState::Missing => {
                return write!(f, "The trimmed characters folder does not exist.");
            }
            OverflowState::Empty => return write!(f, "The trimmed characters folder is empty."),
            OverflowState::Populated => {}
        }

        if self.dry_run {
            writeln!(f, "[dry run] no files will be modified.")?;
        }
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        for orphan in &self.orphans {
            writeln!(
                f,
                "Trimmed characters for unknown account {} left in place.",
                orphan
            )?;
        }
        write!(
            f,
            "Restored {} character(s) to {} account(s).",
            self.restored_characters(),
            self.restored_accounts()
        )
    }
}

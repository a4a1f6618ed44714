use crate::backup::create_backup;
use crate::config::RosterConfig;
use crate::core::Result;
use crate::engine::{run_restore, run_trim};
use crate::report::{RestoreReport, TrimReport};
use crate::storage::FileRecordStore;
use std::path::PathBuf;

/// Save-data directory opened with a configuration
///
/// The operation surface used by the command line: back up, trim, restore.
/// Confirmation prompts belong to the caller.
///
/// # Examples
///
/// ```no_run
/// use roster_trim::{Criterion, Roster, RosterConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RosterConfig::new("/srv/pot/Saved/Database")
///     .criterion(Criterion::LastPlayedDate)
///     .dry_run(true);
/// let mut roster = Roster::open(config)?;
///
/// let report = roster.run_trim()?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
pub struct Roster {
    config: RosterConfig,
    store: FileRecordStore,
}

impl Roster {
    /// Validate the configuration and open the store
    pub fn open(config: RosterConfig) -> Result<Self> {
        config.validate()?;
        let store = FileRecordStore::new(config.layout());
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    pub fn store(&self) -> &FileRecordStore {
        &self.store
    }

    /// Archive the account and character directories
    ///
    /// Returns `None` in dry-run mode, where nothing is written.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        if self.config.dry_run {
            return Ok(None);
        }
        let layout = self.store.layout();
        let sources = [layout.accounts_dir.as_path(), layout.characters_dir.as_path()];
        create_backup(&sources, &self.config.resolved_backup_dir()).map(Some)
    }

    /// Trim every account to the configured limit
    pub fn run_trim(&mut self) -> Result<TrimReport> {
        let options = self.config.trim_options();
        run_trim(&mut self.store, &options, self.config.write_mode())
    }

    /// Restore every pending overflow entry
    pub fn run_restore(&mut self) -> Result<RestoreReport> {
        run_restore(&mut self.store, self.config.write_mode())
    }
}

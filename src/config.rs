use crate::core::{Result, RosterError, WriteMode};
use crate::engine::{DEFAULT_CHARACTER_LIMIT, OverflowPolicy, TrimOptions};
use crate::ranking::Criterion;
use crate::storage::StoreLayout;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Run configuration
///
/// Directory overrides are optional; anything left unset resolves under
/// `root` using the standard save-data layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RosterConfig {
    /// Save-data root containing `Account/` and `Character/`
    pub root: PathBuf,

    /// Account records (default: `<root>/Account`)
    pub accounts_dir: Option<PathBuf>,

    /// Character records (default: `<root>/Character`)
    pub characters_dir: Option<PathBuf>,

    /// Overflow side-store (default: `<root>/TrimmedCharacters`)
    pub overflow_dir: Option<PathBuf>,

    /// Where backup archives are written (default: `<root>`)
    pub backup_dir: Option<PathBuf>,

    /// Maximum characters kept per account
    pub limit: usize,

    /// Ranking attribute
    pub criterion: Criterion,

    /// Handling of un-restored overflow on a repeated trim
    pub overflow_policy: OverflowPolicy,

    /// Report without modifying any record
    pub dry_run: bool,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

impl RosterConfig {
    /// Create a configuration rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            accounts_dir: None,
            characters_dir: None,
            overflow_dir: None,
            backup_dir: None,
            limit: DEFAULT_CHARACTER_LIMIT,
            criterion: Criterion::default(),
            overflow_policy: OverflowPolicy::default(),
            dry_run: false,
        }
    }

    /// Load a JSON configuration file
    ///
    /// Unknown keys, an unsupported criterion or a zero limit are rejected.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| RosterError::io("read", path, err))?;
        let config: Self = serde_json::from_str(&text).map_err(|err| {
            RosterError::InvalidArgument(format!("invalid config '{}': {}", path.display(), err))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the save-data root
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the account directory
    pub fn accounts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.accounts_dir = Some(dir.into());
        self
    }

    /// Set the character directory
    pub fn characters_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.characters_dir = Some(dir.into());
        self
    }

    /// Set the overflow side-store directory
    pub fn overflow_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.overflow_dir = Some(dir.into());
        self
    }

    /// Set the backup directory
    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Set the character limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the ranking criterion
    pub fn criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the overflow policy
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Enable or disable dry-run
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.trim_options().validate()
    }

    pub fn layout(&self) -> StoreLayout {
        let standard = StoreLayout::under(&self.root);
        StoreLayout {
            accounts_dir: self.accounts_dir.clone().unwrap_or(standard.accounts_dir),
            characters_dir: self.characters_dir.clone().unwrap_or(standard.characters_dir),
            overflow_dir: self.overflow_dir.clone().unwrap_or(standard.overflow_dir),
        }
    }

    pub fn resolved_backup_dir(&self) -> PathBuf {
        self.backup_dir.clone().unwrap_or_else(|| self.root.clone())
    }

    pub fn write_mode(&self) -> WriteMode {
        WriteMode::from_dry_run(self.dry_run)
    }

    pub fn trim_options(&self) -> TrimOptions {
        TrimOptions::new(self.criterion, self.limit).policy(self.overflow_policy)
    }
}

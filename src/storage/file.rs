//! File-backed record store
//!
//! Layout under a save-data root:
//!
//! ```text
//! Account/<account id>.json            { "characters": [...], ... }
//! Character/<character id>.json        { "characterName": ..., "marks": ..., ... }
//! TrimmedCharacters/<account id>.json  { "trimmed_characters": [...] }
//! ```
//!
//! The record identifier is the file stem. That mapping lives here only;
//! everything above the store works with explicit [`AccountId`] and
//! [`CharacterId`] values.

use super::store::{OverflowState, RecordStore};
use crate::core::{
    Account, AccountId, Character, CharacterId, OverflowEntry, Result, RosterError, WriteMode,
};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RECORD_EXTENSION: &str = "json";

/// Directory locations of the three record kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub accounts_dir: PathBuf,
    pub characters_dir: PathBuf,
    pub overflow_dir: PathBuf,
}

impl StoreLayout {
    /// Standard save-data layout under `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            accounts_dir: root.join("Account"),
            characters_dir: root.join("Character"),
            overflow_dir: root.join("TrimmedCharacters"),
        }
    }
}

pub struct FileRecordStore {
    layout: StoreLayout,
}

impl FileRecordStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn account_path(&self, id: &AccountId) -> PathBuf {
        record_path(&self.layout.accounts_dir, id.as_str())
    }

    pub fn character_path(&self, id: &CharacterId) -> PathBuf {
        record_path(&self.layout.characters_dir, id.as_str())
    }

    pub fn overflow_path(&self, account: &AccountId) -> PathBuf {
        record_path(&self.layout.overflow_dir, account.as_str())
    }
}

impl RecordStore for FileRecordStore {
    fn list_accounts(&self) -> Result<Vec<AccountId>> {
        Ok(list_record_stems(&self.layout.accounts_dir)?
            .into_iter()
            .map(AccountId::from)
            .collect())
    }

    fn load_account(&self, id: &AccountId) -> Result<Account> {
        let path = self.account_path(id);
        let document = read_json(&path)?
            .ok_or_else(|| RosterError::Io(format!("Account record '{}' not found", path.display())))?;
        Account::from_document(id.clone(), document)
    }

    fn load_character(&self, id: &CharacterId) -> Result<Option<Character>> {
        let path = self.character_path(id);
        match read_json(&path)? {
            Some(document) => Character::from_document(id.clone(), document).map(Some),
            None => Ok(None),
        }
    }

    fn save_account(&mut self, account: &Account, mode: WriteMode) -> Result<()> {
        let path = self.account_path(&account.id);
        write_json(&path, &account.to_document(), mode)
    }

    fn overflow_state(&self) -> Result<OverflowState> {
        let dir = &self.layout.overflow_dir;
        if !dir.exists() {
            return Ok(OverflowState::Missing);
        }
        if list_record_stems(dir)?.is_empty() {
            Ok(OverflowState::Empty)
        } else {
            Ok(OverflowState::Populated)
        }
    }

    fn list_overflow(&self) -> Result<Vec<AccountId>> {
        if !self.layout.overflow_dir.exists() {
            return Ok(Vec::new());
        }
        Ok(list_record_stems(&self.layout.overflow_dir)?
            .into_iter()
            .map(AccountId::from)
            .collect())
    }

    fn load_overflow(&self, account: &AccountId) -> Result<Option<OverflowEntry>> {
        let path = self.overflow_path(account);
        let Some(document) = read_json(&path)? else {
            return Ok(None);
        };
        let mut entry: OverflowEntry = serde_json::from_value(document).map_err(|err| {
            RosterError::Decode(format!("Failed to decode '{}': {}", path.display(), err))
        })?;
        entry.account = account.clone();
        Ok(Some(entry))
    }

    fn save_overflow(&mut self, entry: &OverflowEntry, mode: WriteMode) -> Result<()> {
        let path = self.overflow_path(&entry.account);
        let document = serde_json::to_value(entry)
            .map_err(|err| RosterError::Io(format!("Failed to encode overflow entry: {}", err)))?;
        write_json(&path, &document, mode)
    }

    fn delete_overflow(&mut self, account: &AccountId, mode: WriteMode) -> Result<()> {
        let path = self.overflow_path(account);
        if mode.is_dry_run() {
            info!(path = %path.display(), "simulating delete");
            return Ok(());
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "deleted record");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RosterError::io("delete", &path, err)),
        }
    }
}

// ============================================================================
// File helpers
// ============================================================================

fn record_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}.{}", id, RECORD_EXTENSION))
}

/// File stems of every `*.json` file in `dir`, sorted.
fn list_record_stems(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|err| RosterError::io("read directory", dir, err))?;

    let mut stems = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| RosterError::io("read directory", dir, err))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            stems.push(stem.to_string());
        }
    }
    stems.sort();
    Ok(stems)
}

/// Read and decode a JSON record. `Ok(None)` if the file does not exist.
fn read_json(path: &Path) -> Result<Option<Value>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(RosterError::io("read", path, err)),
    };

    let text = String::from_utf8(bytes).map_err(|err| {
        RosterError::Decode(format!("'{}' is not valid UTF-8: {}", path.display(), err))
    })?;

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|err| RosterError::Decode(format!("Failed to decode '{}': {}", path.display(), err)))
}

/// Write a record as four-space indented JSON, atomically.
fn write_json(path: &Path, document: &Value, mode: WriteMode) -> Result<()> {
    if mode.is_dry_run() {
        info!(path = %path.display(), "simulating save");
        return Ok(());
    }

    let dir = path
        .parent()
        .ok_or_else(|| RosterError::Io(format!("'{}' has no parent directory", path.display())))?;
    fs::create_dir_all(dir).map_err(|err| RosterError::io("create directory", dir, err))?;

    let bytes = to_pretty_json(document)?;
    let mut tmp = temp_file_builder()
        .tempfile_in(dir)
        .map_err(|err| RosterError::io("create temp file in", dir, err))?;
    if let Some(permissions) = existing_permissions(path)? {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|err| RosterError::io("copy permissions of", path, err))?;
    }
    tmp.write_all(&bytes)
        .map_err(|err| RosterError::io("write temp file for", path, err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| RosterError::io("sync temp file for", path, err))?;
    tmp.persist(path)
        .map_err(|err| RosterError::io("replace", path, err.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "saved record");
    Ok(())
}

/// Temp files start as `0666` minus the umask, like a plain `fs::write`.
fn temp_file_builder() -> tempfile::Builder<'static, 'static> {
    #[allow(unused_mut)]
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder
}

/// Permissions of the record being replaced, kept across the rename.
fn existing_permissions(path: &Path) -> Result<Option<fs::Permissions>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata.permissions())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(RosterError::io("stat", path, err)),
    }
}

fn to_pretty_json(document: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document
        .serialize(&mut serializer)
        .map_err(|err| RosterError::Io(format!("Failed to encode record: {}", err)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileRecordStore {
        FileRecordStore::new(StoreLayout::under(dir.path()))
    }

    fn write(path: PathBuf, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_list_accounts_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let dir = &store.layout().accounts_dir;
        write(dir.join("b.json"), "{}");
        write(dir.join("a.json"), "{}");
        write(dir.join("notes.txt"), "ignored");
        fs::create_dir_all(dir.join("nested.json")).unwrap();

        let ids = store.list_accounts().unwrap();
        assert_eq!(ids, vec![AccountId::from("a"), AccountId::from("b")]);
    }

    #[test]
    fn test_list_accounts_missing_dir_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        assert!(matches!(store.list_accounts(), Err(RosterError::Io(_))));
    }

    #[test]
    fn test_list_accounts_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::create_dir_all(&store.layout().accounts_dir).unwrap();
        assert!(store.list_accounts().unwrap().is_empty());
    }

    #[test]
    fn test_decode_errors() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        write(store.account_path(&AccountId::from("p1")), "{ not json");
        let mut latin1 = b"{\"characterName\": \"".to_vec();
        latin1.push(0xE9);
        latin1.extend_from_slice(b"\"}");
        fs::create_dir_all(&store.layout().characters_dir).unwrap();
        fs::write(store.character_path(&CharacterId::from("c1")), latin1).unwrap();

        assert!(store.load_account(&AccountId::from("p1")).unwrap_err().is_decode());
        assert!(store.load_character(&CharacterId::from("c1")).unwrap_err().is_decode());
    }

    #[test]
    fn test_missing_character_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        assert!(store.load_character(&CharacterId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn test_save_account_writes_four_space_json() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir);
        let id = AccountId::from("p1");
        write(store.account_path(&id), r#"{"name": "Rex", "characters": ["a", "b"]}"#);

        let mut account = store.load_account(&id).unwrap();
        account.characters.truncate(1);
        store.save_account(&account, WriteMode::Apply).unwrap();

        let text = fs::read_to_string(store.account_path(&id)).unwrap();
        assert_eq!(
            text,
            "{\n    \"name\": \"Rex\",\n    \"characters\": [\n        \"a\"\n    ]\n}"
        );
    }

    #[test]
    fn test_dry_run_leaves_files_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir);
        let id = AccountId::from("p1");
        write(store.account_path(&id), r#"{"characters": ["a", "b"]}"#);
        write(store.overflow_path(&id), r#"{"trimmed_characters": ["z"]}"#);

        let account = Account::new("p1", vec![]);
        store.save_account(&account, WriteMode::DryRun).unwrap();
        store
            .save_overflow(&OverflowEntry::new(id.clone(), vec!["q".into()]), WriteMode::DryRun)
            .unwrap();
        store.delete_overflow(&id, WriteMode::DryRun).unwrap();

        assert_eq!(
            fs::read_to_string(store.account_path(&id)).unwrap(),
            r#"{"characters": ["a", "b"]}"#
        );
        assert_eq!(
            store.load_overflow(&id).unwrap().unwrap().trimmed_characters,
            vec![CharacterId::from("z")]
        );
    }

    #[test]
    fn test_overflow_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir);
        let id = AccountId::from("p1");

        assert_eq!(store.overflow_state().unwrap(), OverflowState::Missing);
        assert!(store.list_overflow().unwrap().is_empty());

        let entry = OverflowEntry::new(id.clone(), vec!["c3".into(), "c4".into()]);
        store.save_overflow(&entry, WriteMode::Apply).unwrap();
        assert_eq!(store.overflow_state().unwrap(), OverflowState::Populated);
        assert_eq!(store.load_overflow(&id).unwrap(), Some(entry));

        let on_disk: Value =
            serde_json::from_str(&fs::read_to_string(store.overflow_path(&id)).unwrap()).unwrap();
        assert_eq!(on_disk, json!({ "trimmed_characters": ["c3", "c4"] }));

        store.delete_overflow(&id, WriteMode::Apply).unwrap();
        assert_eq!(store.overflow_state().unwrap(), OverflowState::Empty);
        assert!(store.load_overflow(&id).unwrap().is_none());

        // deleting twice is fine
        store.delete_overflow(&id, WriteMode::Apply).unwrap();
    }

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[test]
    fn test_save_account_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir);
        let id = AccountId::from("p1");
        let path = store.account_path(&id);
        write(path.clone(), r#"{"characters": ["a", "b"]}"#);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut account = store.load_account(&id).unwrap();
        account.characters.truncate(1);
        store.save_account(&account, WriteMode::Apply).unwrap();

        assert_eq!(mode_of(&path), 0o644);
        assert_eq!(store.load_account(&id).unwrap().characters.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_overflow_rewrite_keeps_group_write() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir);
        let id = AccountId::from("p1");

        let entry = OverflowEntry::new(id.clone(), vec!["c3".into()]);
        store.save_overflow(&entry, WriteMode::Apply).unwrap();
        let path = store.overflow_path(&id);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o664)).unwrap();

        let entry = OverflowEntry::new(id.clone(), vec!["c3".into(), "c4".into()]);
        store.save_overflow(&entry, WriteMode::Apply).unwrap();
        assert_eq!(mode_of(&path), 0o664);
    }

    #[cfg(unix)]
    #[test]
    fn test_new_record_is_not_owner_only() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir);
        let id = AccountId::from("p1");

        let entry = OverflowEntry::new(id.clone(), vec!["c3".into()]);
        store.save_overflow(&entry, WriteMode::Apply).unwrap();

        let path = store.overflow_path(&id);
        let plain = temp_dir.path().join("plain.json");
        fs::write(&plain, "{}").unwrap();
        assert_eq!(mode_of(&path), mode_of(&plain));
    }
}

//! Backup archives of the save data
//!
//! Before a trim, the account and character directories are packed into a
//! timestamped `tar.gz` next to the save data. Entries keep their directory
//! name (`Account/<id>.json`, `Character/<id>.json`) so an archive can be
//! unpacked straight over the save-data root.

use crate::core::{Result, RosterError};
use chrono::Local;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Archive every directory in `sources` into a new backup under `backup_dir`.
///
/// Missing source directories are skipped with a warning. Returns the archive
/// path, `backup_YYYYMMDD_HHMMSS.tar.gz` (suffixed if that name is taken).
pub fn create_backup(sources: &[&Path], backup_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)
        .map_err(|err| RosterError::io("create backup directory", backup_dir, err))?;

    let stem = Local::now().format("backup_%Y%m%d_%H%M%S").to_string();
    let output = available_name(backup_dir, &stem);

    let tmp = NamedTempFile::new_in(backup_dir)
        .map_err(|err| RosterError::io("create temp file in", backup_dir, err))?;
    let encoder = GzEncoder::new(
        tmp.reopen()
            .map_err(|err| RosterError::io("open temp archive in", backup_dir, err))?,
        Compression::default(),
    );
    let mut builder = tar::Builder::new(encoder);

    for source in sources {
        if !source.is_dir() {
            warn!(path = %source.display(), "backup source missing, skipping");
            continue;
        }
        let name = source.file_name().ok_or_else(|| {
            RosterError::Io(format!("'{}' has no directory name", source.display()))
        })?;
        builder
            .append_dir_all(name, source)
            .map_err(|err| RosterError::io("archive", source, err))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|err| RosterError::io("finish archive", &output, err))?;
    encoder
        .finish()
        .map_err(|err| RosterError::io("compress archive", &output, err))?
        .sync_all()
        .map_err(|err| RosterError::io("sync archive", &output, err))?;

    tmp.persist(&output)
        .map_err(|err| RosterError::io("write archive", &output, err.error))?;

    info!(path = %output.display(), "backup created");
    Ok(output)
}

/// Paths of the files stored in a backup archive, in archive order.
pub fn list_backup(archive: &Path) -> Result<Vec<String>> {
    let file = File::open(archive).map_err(|err| RosterError::io("open", archive, err))?;
    let mut reader = tar::Archive::new(GzDecoder::new(file));

    let entries = reader
        .entries()
        .map_err(|err| RosterError::io("read archive", archive, err))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| RosterError::io("read archive", archive, err))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|err| RosterError::io("read archive", archive, err))?;
        files.push(path.to_string_lossy().replace('\\', "/"));
    }
    Ok(files)
}

fn available_name(dir: &Path, stem: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.tar.gz", stem));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}.tar.gz", stem, n)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_contains_both_stores() {
        let temp_dir = TempDir::new().unwrap();
        let accounts = temp_dir.path().join("Account");
        let characters = temp_dir.path().join("Character");
        fs::create_dir_all(&accounts).unwrap();
        fs::create_dir_all(&characters).unwrap();
        fs::write(accounts.join("p1.json"), r#"{"characters": ["c1"]}"#).unwrap();
        fs::write(characters.join("c1.json"), r#"{"marks": 1}"#).unwrap();

        let backups = temp_dir.path().join("backups");
        let archive = create_backup(&[accounts.as_path(), characters.as_path()], &backups).unwrap();

        let name = archive.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("backup_"));
        assert!(name.ends_with(".tar.gz"));

        let mut files = list_backup(&archive).unwrap();
        files.sort();
        assert_eq!(files, vec!["Account/p1.json", "Character/c1.json"]);
    }

    #[test]
    fn test_backup_names_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let accounts = temp_dir.path().join("Account");
        fs::create_dir_all(&accounts).unwrap();

        let first = create_backup(&[accounts.as_path()], temp_dir.path()).unwrap();
        let second = create_backup(&[accounts.as_path()], temp_dir.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("Nope");
        let archive = create_backup(&[missing.as_path()], temp_dir.path()).unwrap();
        assert!(list_backup(&archive).unwrap().is_empty());
    }
}

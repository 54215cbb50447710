//! File-system helpers for reading, writing and discovering presets.
//!
//! Writes go through a sibling temporary file that is renamed over the
//! destination, then read back and compared. A failed comparison restores the
//! backup (when one was taken) before reporting [`Error::VerifyFailed`].

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

/// Extensions searched by default when looking for preset files
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["gp5", "gp50", "preset"];

/// Options for [`write_file`]
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Back up an existing destination before replacing it
    pub backup: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { backup: true }
    }
}

/// What [`write_file`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// The written destination
    pub path: PathBuf,
    /// The backup taken, if any
    pub backup: Option<PathBuf>,
}

/// Reads a whole file
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    trace!("reading {}", path.display());
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::not_found(path),
        _ => Error::file_read(path, e),
    })
}

/// Creates `path` and its parents if missing
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| Error::directory_create(path, e))
}

/// Returns the first unused backup name: `<path>.backup`, then `<path>.backup1`, ...
pub fn backup_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let candidate = with_suffix(path, ".backup");
    if !candidate.exists() {
        return candidate;
    }

    let mut counter = 1u32;
    loop {
        let candidate = with_suffix(path, &format!(".backup{}", counter));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Copies `path` to a fresh backup and returns where it went
pub fn create_backup(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::not_found(path));
    }

    let backup = backup_path(path);
    fs::copy(path, &backup).map_err(|e| Error::backup(path, e))?;
    info!("backed up {} to {}", path.display(), backup.display());
    Ok(backup)
}

/// Writes `data` to `path` and verifies it by reading it back
pub fn write_file(
    path: impl AsRef<Path>,
    data: &[u8],
    options: WriteOptions,
) -> Result<WriteOutcome> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let backup = if options.backup && path.exists() {
        Some(create_backup(path)?)
    } else {
        None
    };

    let temp = with_suffix(path, ".tmp");
    fs::write(&temp, data).map_err(|e| Error::file_write(&temp, e))?;
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(Error::file_write(path, e));
    }

    let written = fs::read(path).map_err(|e| Error::file_read(path, e))?;
    if written != data {
        warn!("verification of {} failed", path.display());
        if let Some(backup) = &backup {
            if let Err(e) = fs::copy(backup, path) {
                warn!("could not restore {} from backup: {}", path.display(), e);
            }
        }
        return Err(Error::VerifyFailed {
            path: path.to_path_buf(),
        });
    }

    debug!("wrote {} bytes to {}", data.len(), path.display());
    Ok(WriteOutcome {
        path: path.to_path_buf(),
        backup,
    })
}

/// Recursively lists files under `dir` whose extension is in `extensions`.
///
/// Extensions are given without the dot and matched case-insensitively. The
/// result is sorted and free of duplicates.
pub fn find_files(dir: impl AsRef<Path>, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Err(Error::not_found(dir));
    }
    if !dir.is_dir() {
        return Err(Error::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let wanted: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let mut found = BTreeSet::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| wanted.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false);
        if matches {
            found.insert(path.to_path_buf());
        } else {
            trace!("skipping {}", path.display());
        }
    }

    debug!("found {} preset file(s) in {}", found.len(), dir.display());
    Ok(found.into_iter().collect())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_file(dir.path().join("nope.gp5")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_write_creates_parents_and_verifies() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out/nested/lead.gp50");

        let outcome = write_file(&target, b"GP50data", WriteOptions::default()).unwrap();
        assert_eq!(outcome.path, target);
        assert_eq!(outcome.backup, None);
        assert_eq!(read_file(&target).unwrap(), b"GP50data");
        assert!(!with_suffix(&target, ".tmp").exists());
    }

    #[test]
    fn test_backup_names_increment() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("clean.gp50");
        fs::write(&target, b"v1").unwrap();

        let first = write_file(&target, b"v2", WriteOptions::default()).unwrap();
        assert_eq!(first.backup, Some(dir.path().join("clean.gp50.backup")));

        let second = write_file(&target, b"v3", WriteOptions::default()).unwrap();
        assert_eq!(second.backup, Some(dir.path().join("clean.gp50.backup1")));

        assert_eq!(fs::read(dir.path().join("clean.gp50.backup")).unwrap(), b"v1");
        assert_eq!(fs::read(dir.path().join("clean.gp50.backup1")).unwrap(), b"v2");
        assert_eq!(fs::read(&target).unwrap(), b"v3");
        assert_eq!(backup_path(&target), dir.path().join("clean.gp50.backup2"));
    }

    #[test]
    fn test_write_without_backup() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x.gp50");
        fs::write(&target, b"old").unwrap();

        let outcome = write_file(&target, b"new", WriteOptions { backup: false }).unwrap();
        assert_eq!(outcome.backup, None);
        assert!(!dir.path().join("x.gp50.backup").exists());
    }

    #[test]
    fn test_create_backup_missing_source() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            create_backup(dir.path().join("ghost")),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_find_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("bank/a")).unwrap();
        for name in ["b.gp5", "bank/a/c.GP5", "bank/d.preset", "notes.txt", "e.gp50"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let found = find_files(dir.path(), &["gp5", ".preset", "GP5"]).unwrap();
        assert_eq!(
            found,
            vec![
                dir.path().join("b.gp5"),
                dir.path().join("bank/a/c.GP5"),
                dir.path().join("bank/d.preset"),
            ]
        );
        assert_eq!(find_files(dir.path(), &DEFAULT_EXTENSIONS).unwrap().len(), 4);
    }

    #[test]
    fn test_find_files_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("single.gp5");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            find_files(&file, &["gp5"]),
            Err(Error::NotADirectory { .. })
        ));
    }
}

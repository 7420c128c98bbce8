//! Store directory management.
//!
//! This module handles the file system layout for a diskdict store:
//!
//! ```text
//! <name>.diskdict/
//! ├─ CONFIG            # Persisted configuration record (JSON text)
//! ├─ data.mdb          # LMDB data file (opaque to this layer)
//! └─ lock.mdb          # LMDB reader/writer lock table (opaque)
//! ```
//!
//! Paths are normalized so that `"foo"`, `"foo/"`, and `"foo.diskdict"`
//! all address the same store directory. The CONFIG file is written once
//! at creation and loaded verbatim on every subsequent open.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix appended to every normalized store path.
pub const STORE_SUFFIX: &str = "diskdict";

/// File names within the store directory.
const CONFIG_FILE: &str = "CONFIG";
/// Temporary file for atomic CONFIG writes.
const CONFIG_TEMP: &str = "CONFIG.tmp";

/// Normalizes a store path.
///
/// Trailing separators are dropped, a recognized `.diskdict` suffix is
/// stripped, and the suffix is re-appended, so normalization is
/// idempotent and the three spellings of a store address one directory.
pub fn normalize_path(path: &Path) -> StoreResult<PathBuf> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            StoreError::validation(format!("invalid store path: {}", path.display()))
        })?;
    let suffix = format!(".{STORE_SUFFIX}");
    let stem = name.strip_suffix(suffix.as_str()).unwrap_or(name);
    if stem.is_empty() {
        return Err(StoreError::validation(format!(
            "invalid store path: {}",
            path.display()
        )));
    }
    Ok(path.with_file_name(format!("{stem}{suffix}")))
}

/// Manages the store directory and the persisted configuration record.
#[derive(Debug)]
pub struct StoreDir {
    /// Normalized store directory path.
    path: PathBuf,
}

impl StoreDir {
    /// Opens or creates a store directory at the normalized path.
    ///
    /// With `reset`, anything already at the path is deleted first:
    /// a directory tree, a stray file, or a dangling symlink all go.
    pub fn open(path: &Path, reset: bool) -> StoreResult<Self> {
        let path = normalize_path(path)?;

        if reset {
            Self::clear_path(&path)?;
        }

        if path.exists() {
            if !path.is_dir() {
                return Err(StoreError::validation(format!(
                    "store path exists and is not a directory: {}",
                    path.display()
                )));
            }
        } else {
            fs::create_dir_all(&path).map_err(|e| {
                StoreError::validation(format!(
                    "cannot create store directory {}: {e}",
                    path.display()
                ))
            })?;
        }

        Ok(Self { path })
    }

    /// Deletes whatever exists at `path`, tolerating half-existing state.
    fn clear_path(path: &Path) -> StoreResult<()> {
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else if path.symlink_metadata().is_ok() {
            // A stray file (or dangling symlink) where the directory
            // should be.
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Returns the normalized store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the CONFIG file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE)
    }

    /// Checks whether a configuration record has been persisted here.
    #[must_use]
    pub fn has_config(&self) -> bool {
        self.config_path().exists()
    }

    /// Loads the persisted configuration record.
    ///
    /// A missing or corrupt record is a validation failure: the caller
    /// is pointing at a directory that is not (or no longer is) a
    /// usable store.
    pub fn load_config(&self) -> StoreResult<StoreConfig> {
        let config_path = self.config_path();
        let text = fs::read_to_string(&config_path).map_err(|e| {
            StoreError::validation(format!(
                "cannot read store configuration {}: {e}",
                config_path.display()
            ))
        })?;
        let config: StoreConfig = serde_json::from_str(&text).map_err(|e| {
            StoreError::validation(format!(
                "corrupt store configuration {}: {e}",
                config_path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration record atomically.
    ///
    /// Uses the write-then-rename pattern for crash safety:
    /// 1. Write to temporary file
    /// 2. Sync temporary file to disk
    /// 3. Rename temporary file to CONFIG
    /// 4. Fsync the directory so the rename is durable
    pub fn save_config(&self, config: &StoreConfig) -> StoreResult<()> {
        let config_path = self.config_path();
        let temp_path = self.path.join(CONFIG_TEMP);

        let text = serde_json::to_string_pretty(config)
            .map_err(|e| StoreError::validation(format!("cannot encode configuration: {e}")))?;
        let mut file = File::create(&temp_path)?;
        file.write_all(text.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &config_path)?;
        self.sync_directory()?;

        Ok(())
    }

    /// Removes the store directory and everything inside it.
    pub fn remove(&self) -> StoreResult<()> {
        if self.path.exists() {
            fs::remove_dir_all(&self.path)?;
        }
        Ok(())
    }

    /// Syncs the store directory so metadata updates are durable.
    ///
    /// On Windows, directory fsync is not supported; the NTFS journal
    /// provides equivalent metadata durability.
    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreOptions;
    use tempfile::tempdir;

    #[test]
    fn normalization_is_idempotent() {
        let normalized = normalize_path(Path::new("foo")).unwrap();
        assert_eq!(normalized, PathBuf::from("foo.diskdict"));
        assert_eq!(normalize_path(&normalized).unwrap(), normalized);
        assert_eq!(
            normalize_path(Path::new("foo/")).unwrap(),
            PathBuf::from("foo.diskdict")
        );
        assert_eq!(
            normalize_path(Path::new("foo.diskdict")).unwrap(),
            PathBuf::from("foo.diskdict")
        );
    }

    #[test]
    fn normalization_keeps_parent() {
        let normalized = normalize_path(Path::new("/tmp/cache/store")).unwrap();
        assert_eq!(normalized, PathBuf::from("/tmp/cache/store.diskdict"));
    }

    #[test]
    fn normalization_rejects_bare_suffix() {
        assert!(normalize_path(Path::new(".diskdict")).is_err());
        assert!(normalize_path(Path::new("/")).is_err());
    }

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("fresh");

        let dir = StoreDir::open(&base, false).unwrap();
        assert!(dir.path().is_dir());
        assert!(dir.path().to_string_lossy().ends_with(".diskdict"));
        assert!(!dir.has_config());
    }

    #[test]
    fn config_round_trip() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(&temp.path().join("cfg"), false).unwrap();

        let config = StoreOptions::new().compress(true).buffer_size(7).config();
        dir.save_config(&config).unwrap();
        assert!(dir.has_config());

        let loaded = dir.load_config().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn corrupt_config_fails_load() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(&temp.path().join("bad"), false).unwrap();

        fs::write(dir.config_path(), b"not json at all").unwrap();
        assert!(matches!(
            dir.load_config(),
            Err(StoreError::Validation { .. })
        ));
    }

    #[test]
    fn missing_config_fails_load() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(&temp.path().join("none"), false).unwrap();
        assert!(dir.load_config().is_err());
    }

    #[test]
    fn reset_clears_directory() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("wipe");

        let dir = StoreDir::open(&base, false).unwrap();
        dir.save_config(&StoreOptions::default().config()).unwrap();

        let dir = StoreDir::open(&base, true).unwrap();
        assert!(!dir.has_config());
    }

    #[test]
    fn reset_clears_stray_file() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("stray");
        // A file sits where the store directory should be.
        fs::write(temp.path().join("stray.diskdict"), b"junk").unwrap();

        let dir = StoreDir::open(&base, true).unwrap();
        assert!(dir.path().is_dir());
    }

    #[test]
    fn existing_file_without_reset_fails() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("taken.diskdict"), b"junk").unwrap();

        let result = StoreDir::open(&temp.path().join("taken"), false);
        assert!(matches!(result, Err(StoreError::Validation { .. })));
    }

    #[test]
    fn remove_deletes_tree() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(&temp.path().join("gone"), false).unwrap();
        dir.save_config(&StoreOptions::default().config()).unwrap();

        dir.remove().unwrap();
        assert!(!dir.path().exists());
        // Idempotent.
        dir.remove().unwrap();
    }
}

//! Keystore directory
//!
//! One JSON keystore per file, named `UTC--<timestamp>--<address>`. Names
//! live inside the records, so lookups by name scan the directory. Writes go
//! to a temp file in the same directory and are renamed into place.

use ankr_crypto_keystore::{KeyInfo, KeystoreRecord};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{WalletError, WalletResult};

/// File name prefix of keystore files
pub const FILE_PREFIX: &str = "UTC--";

/// File name for a keystore written at `timestamp`
pub fn keystore_file_name(address: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}{}--{}",
        FILE_PREFIX,
        timestamp.format("%Y-%m-%dT%H-%M-%S%.9fZ"),
        address
    )
}

/// Filesystem-backed collection of keystore records
#[derive(Debug, Clone)]
pub struct KeystoreStore {
    dir: PathBuf,
}

impl KeystoreStore {
    /// Open the store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> WalletResult<Self> {
        let dir = dir.into();
        if dir.exists() {
            if !dir.is_dir() {
                return Err(WalletError::Config(format!(
                    "keystore path {} is not a directory",
                    dir.display()
                )));
            }
        } else {
            fs::create_dir_all(&dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
            }
            debug!("Created keystore directory {}", dir.display());
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every decodable record with its backing file, in directory order
    fn entries(&self) -> WalletResult<Vec<(PathBuf, KeystoreRecord)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let is_keystore = file_name
                .to_str()
                .map(|n| n.starts_with(FILE_PREFIX))
                .unwrap_or(false);
            if !is_keystore || !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            let bytes = fs::read(&path)?;
            match KeystoreRecord::decode(&bytes) {
                Ok(record) => entries.push((path, record)),
                Err(e) => warn!("Skipping unreadable keystore {}: {}", path.display(), e),
            }
        }
        Ok(entries)
    }

    fn find_entry(&self, name: &str) -> WalletResult<(PathBuf, KeystoreRecord)> {
        self.entries()?
            .into_iter()
            .find(|(_, record)| record.name() == name)
            .ok_or_else(|| WalletError::NotFound(name.to_string()))
    }

    /// Persist a new record. Fails without touching anything if the name is
    /// already taken.
    pub fn create(&self, record: &KeystoreRecord) -> WalletResult<PathBuf> {
        if self
            .entries()?
            .iter()
            .any(|(_, existing)| existing.name() == record.name())
        {
            return Err(WalletError::DuplicateName(record.name().to_string()));
        }

        let bytes = record.encode()?;
        let path = self
            .dir
            .join(keystore_file_name(record.address(), Utc::now()));
        self.write_new(&path, &bytes)?;
        Ok(path)
    }

    /// Atomically write `bytes` to `path`, which must not exist yet. On
    /// failure the temp file is removed.
    fn write_new(&self, path: &Path, bytes: &[u8]) -> WalletResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist_noclobber(path).map_err(|e| WalletError::Io(e.error))?;
        debug!("Wrote keystore {}", path.display());
        Ok(())
    }

    /// Listing metadata for every record
    pub fn list(&self) -> WalletResult<Vec<KeyInfo>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|(_, record)| record.info())
            .collect())
    }

    pub fn find_by_name(&self, name: &str) -> WalletResult<KeystoreRecord> {
        self.find_entry(name).map(|(_, record)| record)
    }

    /// Remove the record's backing file
    pub fn delete(&self, name: &str) -> WalletResult<PathBuf> {
        let (path, _) = self.find_entry(name)?;
        fs::remove_file(&path)?;
        debug!("Deleted keystore {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ankr_crypto_keystore::{KeyPair, ScryptParams};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fast() -> ScryptParams {
        ScryptParams {
            n: 16,
            r: 1,
            p: 1,
            dklen: 32,
        }
    }

    fn record(name: &str) -> KeystoreRecord {
        let pair = KeyPair::generate().unwrap();
        KeystoreRecord::encrypt(name, &pair, b"pw", &fast()).unwrap()
    }

    #[test]
    fn test_file_name_format() {
        let ts = Utc.with_ymd_and_hms(2019, 7, 1, 12, 30, 5).unwrap()
            + chrono::Duration::nanoseconds(42);
        assert_eq!(
            keystore_file_name("ABCDEF", ts),
            "UTC--2019-07-01T12-30-05.000000042Z--ABCDEF"
        );
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("keys");
        let store = KeystoreStore::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(store.dir(), path);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_open_rejects_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not-a-dir");
        fs::write(&path, b"x").unwrap();
        assert!(matches!(
            KeystoreStore::open(&path),
            Err(WalletError::Config(_))
        ));
    }

    #[test]
    fn test_create_find_delete() {
        let dir = TempDir::new().unwrap();
        let store = KeystoreStore::open(dir.path()).unwrap();
        let alice = record("alice");

        let path = store.create(&alice).unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(file_name.starts_with(FILE_PREFIX));
        assert!(file_name.ends_with(alice.address()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert_eq!(store.find_by_name("alice").unwrap(), alice);
        assert!(matches!(
            store.find_by_name("bob"),
            Err(WalletError::NotFound(_))
        ));

        assert_eq!(store.delete("alice").unwrap(), path);
        assert!(!path.exists());
        assert!(matches!(store.delete("alice"), Err(WalletError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dir = TempDir::new().unwrap();
        let store = KeystoreStore::open(dir.path()).unwrap();
        let path = store.create(&record("alice")).unwrap();
        let before = fs::read(&path).unwrap();

        let result = store.create(&record("alice"));
        assert!(matches!(result, Err(WalletError::DuplicateName(n)) if n == "alice"));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_skips_foreign_and_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let store = KeystoreStore::open(dir.path()).unwrap();
        store.create(&record("alice")).unwrap();
        store.create(&record("bob")).unwrap();
        fs::write(dir.path().join("config.toml"), "[network]\n").unwrap();
        fs::write(dir.path().join("UTC--garbage--0000"), b"{not json").unwrap();

        let mut names: Vec<_> = store.list().unwrap().into_iter().map(|k| k.name).collect();
        names.sort();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn test_failed_write_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let store = KeystoreStore::open(dir.path()).unwrap();
        let taken = dir.path().join("UTC--2019-07-01T12-30-05.000000042Z--ABCDEF");
        fs::write(&taken, b"existing").unwrap();

        let result = store.write_new(&taken, br#"{"version":3}"#);
        assert!(matches!(result, Err(WalletError::Io(_))));
        assert_eq!(fs::read(&taken).unwrap(), b"existing");

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names.iter().all(|n| !n.starts_with(".tmp")));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = KeystoreStore::open(dir.path()).unwrap();
        store.create(&record("alice")).unwrap();
        let count = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }
}

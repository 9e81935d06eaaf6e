use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto;
use crate::models::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("data directory not found")]
    NoDataDir,
}

/// `<data_local_dir>/cycle-charm/snapshot.charm`
pub fn default_path() -> Result<PathBuf, StorageError> {
    let dir = dirs::data_local_dir()
        .ok_or(StorageError::NoDataDir)?
        .join("cycle-charm");
    Ok(dir.join("snapshot.charm"))
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Encrypt and write the offline snapshot.
pub fn save(path: &Path, passphrase: &str, snapshot: &Snapshot) -> Result<(), StorageError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_vec(snapshot)?;
    let sealed = crypto::seal(passphrase, &json)?;
    fs::write(path, sealed)?;
    tracing::debug!(path = %path.display(), periods = snapshot.period_logs.len(), "snapshot saved");
    Ok(())
}

/// Read and decrypt the offline snapshot.
pub fn load(path: &Path, passphrase: &str) -> Result<Snapshot, StorageError> {
    let sealed = fs::read(path)?;
    let json = crypto::open(passphrase, &sealed)?;
    let snapshot: Snapshot = serde_json::from_slice(&json)?;
    tracing::debug!(path = %path.display(), user = %snapshot.user_id, "snapshot loaded");
    Ok(snapshot)
}

/// Delete the snapshot. Returns whether there was one.
pub fn wipe(path: &Path) -> Result<bool, StorageError> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path)?;
    tracing::info!(path = %path.display(), "snapshot wiped");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::{CycleProfile, PeriodLog};

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.charm");
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let mut snapshot = Snapshot::new(Uuid::new_v4());
        snapshot.profile = Some(CycleProfile::new(start));
        snapshot.period_logs.push(PeriodLog::new(start, None));

        assert!(!exists(&path));
        save(&path, "pass", &snapshot).unwrap();
        assert!(exists(&path));
        assert_eq!(load(&path, "pass").unwrap(), snapshot);
        assert!(matches!(
            load(&path, "nope"),
            Err(StorageError::Crypto(crypto::CryptoError::Decryption))
        ));
    }

    #[test]
    fn wipe_removes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.charm");
        save(&path, "pass", &Snapshot::new(Uuid::new_v4())).unwrap();
        assert!(wipe(&path).unwrap());
        assert!(!wipe(&path).unwrap());
        assert!(!exists(&path));
    }
}

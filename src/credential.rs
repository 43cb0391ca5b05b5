//! Enrolled credential storage
//!
//! Exactly one enrolled embedding exists per installation. Saving replaces it
//! wholesale and readers see either the previous or the new record, never a
//! mix of both.

use crate::config::DEFAULT_CREDENTIAL_KEY;
use crate::error::StorageError;
use crate::types::Embedding;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Durable home of the enrolled embedding
pub trait CredentialStore {
    /// Replace the enrolled embedding
    fn save(&self, embedding: &Embedding) -> Result<(), StorageError>;

    /// The enrolled embedding, or `None` before the first enrollment
    fn load(&self) -> Result<Option<Embedding>, StorageError>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for &T {
    fn save(&self, embedding: &Embedding) -> Result<(), StorageError> {
        (**self).save(embedding)
    }

    fn load(&self) -> Result<Option<Embedding>, StorageError> {
        (**self).load()
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    fn save(&self, embedding: &Embedding) -> Result<(), StorageError> {
        (**self).save(embedding)
    }

    fn load(&self) -> Result<Option<Embedding>, StorageError> {
        (**self).load()
    }
}

/// Persisted form of an enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub credential_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
    pub dimension: usize,
    pub embedding: Embedding,
}

impl CredentialRecord {
    pub fn new(embedding: Embedding) -> Self {
        Self {
            credential_id: Uuid::new_v4(),
            enrolled_at: Utc::now(),
            dimension: embedding.dimension(),
            embedding,
        }
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.dimension != self.embedding.dimension() {
            return Err(StorageError::Corrupt(format!(
                "record {} declares {} dimensions but holds {}",
                self.credential_id,
                self.dimension,
                self.embedding.dimension()
            )));
        }
        Ok(())
    }
}

/// Process-local store, mainly for tests and embedding hosts with their own persistence
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: RwLock<Option<Arc<CredentialRecord>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> Option<Arc<CredentialRecord>> {
        self.record.read().clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, embedding: &Embedding) -> Result<(), StorageError> {
        let record = Arc::new(CredentialRecord::new(embedding.clone()));
        *self.record.write() = Some(record);
        Ok(())
    }

    fn load(&self) -> Result<Option<Embedding>, StorageError> {
        Ok(self.record.read().as_ref().map(|r| r.embedding.clone()))
    }
}

/// JSON key-value file holding the enrolled embedding under a fixed key.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a crash never leaves a half-written credential.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    key: String,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_key(path, DEFAULT_CREDENTIAL_KEY)
    }

    pub fn with_key(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Full record, including enrollment metadata
    pub fn load_record(&self) -> Result<Option<CredentialRecord>, StorageError> {
        let mut entries = self.read_entries()?;
        match entries.remove(&self.key) {
            Some(record) => {
                record.check()?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn read_entries(&self) -> Result<BTreeMap<String, CredentialRecord>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            StorageError::Corrupt(format!("{}: {e}", self.path.display()))
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, embedding: &Embedding) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();

        let mut entries = self.read_entries()?;
        let record = CredentialRecord::new(embedding.clone());
        let credential_id = record.credential_id;
        entries.insert(self.key.clone(), record);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &entries)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            %credential_id,
            dimension = embedding.dimension(),
            "enrolled embedding saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<Embedding>, StorageError> {
        Ok(self.load_record()?.map(|record| record.embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_replaces() {
        let store = MemoryCredentialStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&Embedding::new(vec![1.0, 2.0])).unwrap();
        store.save(&Embedding::new(vec![3.0, 4.0, 5.0])).unwrap();

        assert_eq!(store.load().unwrap(), Some(Embedding::new(vec![3.0, 4.0, 5.0])));
        assert_eq!(store.record().unwrap().dimension, 3);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));
        assert!(store.load().unwrap().is_none());

        let embedding = Embedding::new(vec![0.125, -3.5, 1e-3]);
        store.save(&embedding).unwrap();

        let reopened = FileCredentialStore::new(dir.path().join("credentials.json"));
        assert_eq!(reopened.load().unwrap(), Some(embedding));

        let record = reopened.load_record().unwrap().unwrap();
        assert_eq!(record.dimension, 3);
    }

    #[test]
    fn test_file_store_overwrites_and_keeps_other_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let main = FileCredentialStore::new(&path);
        let other = FileCredentialStore::with_key(&path, "Other");

        other.save(&Embedding::new(vec![9.0])).unwrap();
        main.save(&Embedding::new(vec![1.0, 1.0])).unwrap();
        let first_id = main.load_record().unwrap().unwrap().credential_id;
        main.save(&Embedding::new(vec![2.0, 2.0])).unwrap();

        let record = main.load_record().unwrap().unwrap();
        assert_eq!(record.embedding, Embedding::new(vec![2.0, 2.0]));
        assert_ne!(record.credential_id, first_id);
        assert_eq!(other.load().unwrap(), Some(Embedding::new(vec![9.0])));
    }

    #[test]
    fn test_corrupt_file_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(matches!(store.load(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_mismatched_dimension_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let mut record = CredentialRecord::new(Embedding::new(vec![1.0, 2.0]));
        record.dimension = 5;
        let mut entries = BTreeMap::new();
        entries.insert(DEFAULT_CREDENTIAL_KEY.to_string(), record);
        fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

        assert!(matches!(
            FileCredentialStore::new(&path).load(),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_values() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.save(&Embedding::new(vec![0.0; 32])).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..200 {
                    store.save(&Embedding::new(vec![i as f32; 32])).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let embedding = store.load().unwrap().unwrap();
            let first = embedding.as_slice()[0];
            assert!(embedding.as_slice().iter().all(|v| *v == first));
        }
        writer.join().unwrap();
    }
}

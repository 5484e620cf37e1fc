/*
[INPUT]:  String keys and values from the credential store
[OUTPUT]: Durable key-value persistence (file) or process-local (memory)
[POS]:    Auth layer - persistence backends behind the credential store
[UPDATE]: When storage format or file permission policy changes
*/

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::warn;
use uuid::Uuid;

use crate::http::Result;

/// Minimal durable key-value store, shaped like browser local storage
pub trait KeyValueStore: Debug + Send + Sync {
    /// Read a single value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write every entry in one atomic step
    fn set_all(&self, entries: &[(&str, String)]) -> Result<()>;

    /// Remove every listed key in one atomic step
    fn remove_all(&self, keys: &[&str]) -> Result<()>;
}

/// Process-local store; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set_all(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut guard = self.entries();
        for (key, value) in entries {
            guard.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut guard = self.entries();
        for key in keys {
            guard.remove(*key);
        }
        Ok(())
    }
}

/// JSON document on disk holding every key.
///
/// Writes go to a temp file in the same directory and are renamed into
/// place. The file is readable by its owner only.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absent or unreadable documents read as empty
    fn read_entries(&self) -> HashMap<String, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return HashMap::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "credential file unreadable");
                return HashMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "credential file corrupt, ignoring");
                HashMap::new()
            }
        }
    }

    fn write_entries(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let temp_path = self.path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        let written = fs::write(&temp_path, content)
            .and_then(|()| restrict_permissions(&temp_path))
            .and_then(|()| fs::rename(&temp_path, &self.path));
        if let Err(err) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut HashMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries();
        apply(&mut entries);
        self.write_entries(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries().remove(key))
    }

    fn set_all(&self, entries: &[(&str, String)]) -> Result<()> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert((*key).to_string(), value.clone());
            }
        })
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        self.update(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_dir() -> PathBuf {
        let mut path = env::temp_dir();
        path.push(format!("workflow-client-test-{}", Uuid::new_v4()));
        fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        store
            .set_all(&[("a", "1".to_string()), ("b", "2".to_string())])
            .unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));

        store.remove_all(&["a"]).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_file_store_survives_new_instance() {
        let dir = temp_dir();
        let path = dir.join("session.json");

        let first = FileStore::new(&path);
        first
            .set_all(&[("accessToken", "token-1".to_string())])
            .unwrap();

        let second = FileStore::new(&path);
        assert_eq!(second.get("accessToken").unwrap(), Some("token-1".to_string()));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_store_missing_file_reads_empty() {
        let dir = temp_dir();
        let store = FileStore::new(dir.join("absent.json"));
        assert_eq!(store.get("accessToken").unwrap(), None);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file_reads_empty() {
        let dir = temp_dir();
        let path = dir.join("session.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get("accessToken").unwrap(), None);

        store.set_all(&[("accessToken", "fresh".to_string())]).unwrap();
        assert_eq!(store.get("accessToken").unwrap(), Some("fresh".to_string()));

        fs::remove_dir_all(dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = temp_dir();
        let path = dir.join("nested").join("session.json");
        let store = FileStore::new(&path);
        store.set_all(&[("refreshToken", "r".to_string())]).unwrap();

        let metadata = fs::metadata(&path).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        fs::remove_dir_all(dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        use crate::http::WorkflowError;

        let dir = temp_dir();
        // A directory in place of the document makes the final rename fail
        let path = dir.join("session.json");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let store = FileStore::new(&path);
        let err = store
            .set_all(&[("accessToken", "token-1".to_string())])
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Storage(_)));

        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        fs::remove_dir_all(dir).unwrap();
    }
}

//! File-backed configuration store.
//!
//! Persists the merged configuration document as one JSON file.  Maps the
//! filesystem's failure modes onto the [`ConfigPort`] contract: a missing
//! file is [`ConfigError::NotFound`], an unparseable one is
//! [`ConfigError::Corrupted`] (the supervisor deletes it and falls back to
//! defaults).

use std::fs;
use std::io;
use std::path::PathBuf;

use serde_json::Value;

use crate::ports::{ConfigError, ConfigPort};

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigPort for FileStore {
    fn load(&self) -> Result<Value, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ConfigError::NotFound),
            Err(_) => return Err(ConfigError::IoError),
        };
        serde_json::from_str(&text).map_err(|_| ConfigError::Corrupted)
    }

    fn save(&self, document: &Value) -> Result<(), ConfigError> {
        let text = serde_json::to_string(document).map_err(|_| ConfigError::IoError)?;
        fs::write(&self.path, text).map_err(|_| ConfigError::IoError)
    }

    fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("lightbridge-{}-{}.json", name, std::process::id()));
        path
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = FileStore::new(scratch_path("roundtrip"));
        store.remove();
        let document = json!({"id": "dev1", "poll_interval_ms": 250});
        store.save(&document).unwrap();
        assert_eq!(store.load().unwrap(), document);
        store.remove();
    }

    #[test]
    fn missing_file_is_not_found() {
        let store = FileStore::new(scratch_path("missing"));
        store.remove();
        assert_eq!(store.load(), Err(ConfigError::NotFound));
    }

    #[test]
    fn unparseable_file_is_corrupted() {
        let path = scratch_path("corrupt");
        fs::write(&path, "{ nope").unwrap();
        let store = FileStore::new(&path);
        assert_eq!(store.load(), Err(ConfigError::Corrupted));
        store.remove();
        assert_eq!(store.load(), Err(ConfigError::NotFound));
    }

    #[test]
    fn remove_tolerates_absent_file() {
        let store = FileStore::new(scratch_path("absent"));
        store.remove();
        store.remove();
    }
}

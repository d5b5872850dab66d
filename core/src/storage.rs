use std::{
	collections::HashMap,
	fs, io,
	path::{Path, PathBuf},
};

use parking_lot::RwLock;
use quire_utils::error::FileIOError;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("corrupted value <key='{key}'>: {source}")]
	Corrupted {
		key: String,
		#[source]
		source: serde_json::Error,
	},
	#[error("failed to encode value <key='{key}'>: {source}")]
	Encode {
		key: String,
		#[source]
		source: serde_json::Error,
	},
}

/// String blob storage provided by the embedding application.
///
/// No transactional guarantees are expected; the last writer wins.
pub trait KeyValueStore: Send + Sync + 'static {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

	fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

	fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
	values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		Ok(self.values.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
		self.values.write().insert(key.to_string(), value);
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StorageError> {
		self.values.write().remove(key);
		Ok(())
	}
}

/// One file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
	dir: PathBuf,
}

impl FileStore {
	pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
		let dir = dir.into();
		fs::create_dir_all(&dir).map_err(|e| FileIOError::from_std_io_err(&dir, e))?;

		Ok(Self { dir })
	}

	#[must_use]
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn path_for(&self, key: &str) -> PathBuf {
		let file_name = key
			.chars()
			.map(|c| {
				if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
					c
				} else {
					'_'
				}
			})
			.collect::<String>();

		self.dir.join(format!("{file_name}.json"))
	}
}

impl KeyValueStore for FileStore {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		let path = self.path_for(key);

		match fs::read_to_string(&path) {
			Ok(value) => Ok(Some(value)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(FileIOError::from_std_io_err(path, e).into()),
		}
	}

	fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
		let path = self.path_for(key);
		let tmp_path = path.with_extension("json.tmp");

		fs::write(&tmp_path, value).map_err(|e| FileIOError::from_std_io_err(&tmp_path, e))?;
		fs::rename(&tmp_path, &path)
			.map_err(|e| FileIOError::from_std_io_err_with_msg(&path, e, "replacing value"))?;

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StorageError> {
		let path = self.path_for(key);

		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(FileIOError::from_std_io_err(path, e).into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;

	fn exercise(store: &dyn KeyValueStore) {
		assert_eq!(store.get("quire.watermark.bookmarks").unwrap(), None);

		store
			.set("quire.watermark.bookmarks", r#"{"a":1}"#.to_string())
			.unwrap();
		store
			.set("quire.watermark.bookmarks", r#"{"a":2}"#.to_string())
			.unwrap();
		assert_eq!(
			store.get("quire.watermark.bookmarks").unwrap().as_deref(),
			Some(r#"{"a":2}"#)
		);

		store.remove("quire.watermark.bookmarks").unwrap();
		store.remove("quire.watermark.bookmarks").unwrap();
		assert_eq!(store.get("quire.watermark.bookmarks").unwrap(), None);
	}

	#[test]
	fn memory_store() {
		exercise(&MemoryStore::new());
	}

	#[test]
	fn file_store() {
		let dir = tempfile::tempdir().unwrap();
		exercise(&FileStore::new(dir.path().join("kv")).unwrap());
	}

	#[test]
	fn file_store_keys_stay_inside_its_dir() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path()).unwrap();

		store.set("../escape/attempt", "x".to_string()).unwrap();

		assert!(dir.path().join(".._escape_attempt.json").exists());
		assert_eq!(
			store.get("../escape/attempt").unwrap().as_deref(),
			Some("x")
		);
	}
}

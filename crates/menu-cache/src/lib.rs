//! Disk-persisted snapshot cache.
//!
//! A [`SnapshotStore`] holds at most one value of an arbitrary serializable
//! type behind a read/write lock and mirrors it into a single binary file.
//! Readers always receive their own deep copy, so nothing a caller does with
//! a loaded value can leak back into the cache or into another caller's copy.

use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

/// Errors that can occur while opening or writing a snapshot store.
#[derive(Debug, Error)]
pub enum CacheError {
	/// The directory holding the cache file is missing and cannot be created,
	/// or the path exists but is not a directory.
	#[error("Cache directory error: {0}")]
	Directory(String),
	/// The cache file cannot be read or written.
	#[error("Cache file error: {0}")]
	File(String),
	/// The value cannot be serialized.
	#[error("Failed to encode snapshot: {0}")]
	Encode(String),
	/// The file content cannot be deserialized into the stored type.
	#[error("Failed to decode snapshot: {0}")]
	Decode(String),
}

/// Concurrency-safe holder of one cached value, persisted to a file.
///
/// Any number of [`load`](Self::load) calls may run together; a
/// [`store`](Self::store) excludes all other access for its whole duration,
/// including the durable write.
pub struct SnapshotStore<T> {
	/// Location of the backing file.
	path: PathBuf,
	/// Current value; `None` until something is stored or loaded from disk.
	data: RwLock<Option<T>>,
}

impl<T> SnapshotStore<T>
where
	T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
	/// Opens the store backed by the file at `path`.
	///
	/// The parent directory is created when absent. If a file already exists
	/// its content becomes the initial value; otherwise the store starts empty.
	pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
		let path = path.into();
		ensure_parent_dir(&path).await?;

		let data = match fs::read(&path).await {
			Ok(bytes) => {
				let value: T = bincode::deserialize(&bytes).map_err(|e| {
					CacheError::Decode(format!("{}: {}", path.display(), e))
				})?;
				debug!("Loaded cached snapshot from {:?}", path);
				Some(value)
			}
			Err(e) if e.kind() == ErrorKind::NotFound => {
				debug!("No cached snapshot at {:?}, starting empty", path);
				None
			}
			Err(e) => {
				return Err(CacheError::File(format!(
					"failed to open {}: {}",
					path.display(),
					e
				)))
			}
		};

		Ok(Self {
			path,
			data: RwLock::new(data),
		})
	}

	/// Replaces the cached value and overwrites the backing file.
	///
	/// The value is written to a temporary file and renamed into place while
	/// the exclusive lock is held. The in-memory value is only swapped once
	/// the file is durable, so a failed store leaves the previous value intact.
	pub async fn store(&self, value: T) -> Result<(), CacheError> {
		let mut guard = self.data.write().await;

		let bytes = bincode::serialize(&value).map_err(|e| CacheError::Encode(e.to_string()))?;

		let temp_path = self.path.with_extension("tmp");
		fs::write(&temp_path, &bytes).await.map_err(|e| {
			CacheError::File(format!("failed to write {}: {}", temp_path.display(), e))
		})?;
		fs::rename(&temp_path, &self.path).await.map_err(|e| {
			CacheError::File(format!(
				"failed to move snapshot into {}: {}",
				self.path.display(),
				e
			))
		})?;

		*guard = Some(value);
		debug!("Stored snapshot ({} bytes) at {:?}", bytes.len(), self.path);
		Ok(())
	}

	/// Returns an independent copy of the cached value, if any.
	pub async fn load(&self) -> Option<T> {
		self.data.read().await.clone()
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}
}

async fn ensure_parent_dir(path: &Path) -> Result<(), CacheError> {
	let dir = match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent,
		_ => Path::new("."),
	};

	match fs::metadata(dir).await {
		Ok(meta) if meta.is_dir() => Ok(()),
		Ok(_) => Err(CacheError::Directory(format!(
			"{} is not a directory",
			dir.display()
		))),
		Err(e) if e.kind() == ErrorKind::NotFound => {
			fs::create_dir_all(dir).await.map_err(|e| {
				CacheError::Directory(format!("failed to create {}: {}", dir.display(), e))
			})?;
			debug!("Created cache directory {:?}", dir);
			Ok(())
		}
		Err(e) => Err(CacheError::Directory(format!(
			"failed to stat {}: {}",
			dir.display(),
			e
		))),
	}
}

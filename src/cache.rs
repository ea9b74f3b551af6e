//! Session-scoped response cache.

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};
use tracing::{debug, trace, warn};

/// Namespace of cache keys within the shared storage.
pub const CACHE_PREFIX: &str = "lazy_";

/// A string key-value store shared with unrelated code on the page, like
/// [***sessionStorage***](https://developer.mozilla.org/en-US/docs/Web/API/Window/sessionStorage).
///
/// Every operation is a single atomic upsert, read or removal.
pub trait Storage {
	/// # Errors
	///
	/// Iff the store can't be accessed.
	fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

	/// # Errors
	///
	/// Iff the store can't be accessed or the write would exceed its quota.
	fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

	/// # Errors
	///
	/// Iff the store can't be accessed.
	fn remove_item(&self, key: &str) -> Result<(), StorageError>;

	/// # Errors
	///
	/// Iff the store can't be accessed.
	fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<S: Storage + ?Sized> Storage for Rc<S> {
	fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
		(**self).get_item(key)
	}

	fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
		(**self).set_item(key, value)
	}

	fn remove_item(&self, key: &str) -> Result<(), StorageError> {
		(**self).remove_item(key)
	}

	fn keys(&self) -> Result<Vec<String>, StorageError> {
		(**self).keys()
	}
}

/// In-process [`Storage`]. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
	inner: Rc<RefCell<MemoryStorageInner>>,
}

#[derive(Debug, Default)]
struct MemoryStorageInner {
	entries: BTreeMap<String, String>,
	quota: Option<usize>,
}

impl MemoryStorage {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// A store that rejects writes once keys and values together would exceed `bytes`.
	#[must_use]
	pub fn with_quota(bytes: usize) -> Self {
		let storage = Self::default();
		storage.inner.borrow_mut().quota = Some(bytes);
		storage
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.inner.borrow().entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Storage for MemoryStorage {
	fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
		Ok(self.inner.borrow().entries.get(key).cloned())
	}

	fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let mut inner = self.inner.borrow_mut();
		if let Some(quota) = inner.quota {
			let used: usize = inner.entries.iter().filter(|(k, _)| k.as_str() != key).map(|(k, v)| k.len() + v.len()).sum();
			if used + key.len() + value.len() > quota {
				return Err(StorageError::QuotaExceeded);
			}
		}
		inner.entries.insert(key.to_owned(), value.to_owned());
		Ok(())
	}

	fn remove_item(&self, key: &str) -> Result<(), StorageError> {
		self.inner.borrow_mut().entries.remove(key);
		Ok(())
	}

	fn keys(&self) -> Result<Vec<String>, StorageError> {
		Ok(self.inner.borrow().entries.keys().cloned().collect())
	}
}

/// A cached fragment. Serialized as `{"time": …, "result": …}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
	/// Creation time, in milliseconds since the Unix epoch.
	#[serde(rename = "time")]
	pub created: u64,
	#[serde(rename = "result")]
	pub payload: String,
}

/// Fragment cache keyed by load URL.
///
/// Failures never propagate: unreadable entries are misses and failed writes report `false`.
#[derive(Debug)]
pub struct Cache<S> {
	storage: S,
	enabled: bool,
}

impl<S: Storage> Cache<S> {
	pub fn new(storage: S, enabled: bool) -> Self {
		Self { storage, enabled }
	}

	#[must_use]
	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	pub fn storage(&self) -> &S {
		&self.storage
	}

	fn key(url: &str) -> String {
		format!("{}{}", CACHE_PREFIX, url)
	}

	#[must_use]
	pub fn get(&self, url: &str) -> Option<CacheEntry> {
		if !self.enabled {
			return None;
		}
		read_entry(&self.storage, &Self::key(url))
	}

	/// Stores `payload` for `url`, created at `now`.
	///
	/// Returns `false` iff the entry could not be written. A disabled cache accepts and drops everything.
	pub fn set(&self, url: &str, payload: &str, now: u64) -> bool {
		if !self.enabled {
			return true;
		}
		let key = Self::key(url);
		trace!("Caching {:?}.", key);
		let entry = CacheEntry { created: now, payload: payload.to_owned() };
		let serialized = match serde_json::to_string(&entry) {
			Ok(serialized) => serialized,
			Err(error) => {
				warn!("Could not serialize cache entry {:?}: {}", key, error);
				return false;
			}
		};
		match self.storage.set_item(&key, &serialized) {
			Ok(()) => true,
			Err(error) => {
				warn!("Could not write cache entry {:?}: {}", key, error);
				false
			}
		}
	}

	pub fn delete(&self, url: &str) -> bool {
		remove_entry(&self.storage, &Self::key(url))
	}

	/// Deletes every entry older than `ttl_ms` at `now`, including unreadable ones.
	///
	/// Returns how many entries were removed.
	pub fn sweep(&self, ttl_ms: u64, now: u64) -> usize {
		if !self.enabled {
			return 0;
		}
		let keys = match self.storage.keys() {
			Ok(keys) => keys,
			Err(error) => {
				warn!("Could not list cache entries: {}", error);
				return 0;
			}
		};

		let mut removed = 0;
		for key in keys.iter().filter(|key| key.starts_with(CACHE_PREFIX)) {
			let created = read_entry(&self.storage, key).map_or(0, |entry| entry.created);
			if created.saturating_add(ttl_ms) < now && remove_entry(&self.storage, key) {
				removed += 1;
			}
		}
		if removed > 0 {
			debug!("Swept {} stale cache entr{}.", removed, if removed == 1 { "y" } else { "ies" });
		}
		removed
	}
}

fn read_entry<S: Storage + ?Sized>(storage: &S, key: &str) -> Option<CacheEntry> {
	let raw = match storage.get_item(key) {
		Ok(raw) => raw?,
		Err(error) => {
			debug!("Cache read of {:?} failed: {}", key, error);
			return None;
		}
	};
	match serde_json::from_str(&raw) {
		Ok(entry) => Some(entry),
		Err(error) => {
			debug!("Ignoring corrupt cache entry {:?}: {}", key, error);
			None
		}
	}
}

fn remove_entry<S: Storage + ?Sized>(storage: &S, key: &str) -> bool {
	trace!("Deleting cache entry {:?}.", key);
	match storage.remove_item(key) {
		Ok(()) => true,
		Err(error) => {
			warn!("Could not delete cache entry {:?}: {}", key, error);
			false
		}
	}
}

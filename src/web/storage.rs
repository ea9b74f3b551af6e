use crate::{cache::Storage, error::StorageError};
use tracing::warn;
use wasm_bindgen::JsValue;
use web_sys::Window;

/// The window's [***sessionStorage***](https://developer.mozilla.org/en-US/docs/Web/API/Window/sessionStorage).
///
/// If the browser refuses access, every operation fails with [`StorageError::Unavailable`],
/// which the cache treats as misses and failed writes.
#[derive(Debug, Clone)]
pub struct SessionStorage(Option<web_sys::Storage>);

impl SessionStorage {
	#[must_use]
	pub fn new(window: &Window) -> Self {
		match window.session_storage() {
			Ok(Some(storage)) => Self(Some(storage)),
			Ok(None) => {
				warn!("sessionStorage is not available; caching is disabled.");
				Self(None)
			}
			Err(error) => {
				warn!("sessionStorage access was refused ({:?}); caching is disabled.", error);
				Self(None)
			}
		}
	}

	fn storage(&self) -> Result<&web_sys::Storage, StorageError> {
		self.0.as_ref().ok_or_else(|| StorageError::Unavailable("no sessionStorage".to_owned()))
	}
}

fn backend(error: JsValue) -> StorageError {
	let name = js_sys::Reflect::get(&error, &JsValue::from_str("name")).ok().and_then(|name| name.as_string());
	match name.as_deref() {
		Some("QuotaExceededError") | Some("NS_ERROR_DOM_QUOTA_REACHED") => StorageError::QuotaExceeded,
		Some("SecurityError") => StorageError::Unavailable(format!("{:?}", error)),
		_ => StorageError::Backend(format!("{:?}", error)),
	}
}

impl Storage for SessionStorage {
	fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
		self.storage()?.get_item(key).map_err(backend)
	}

	fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
		self.storage()?.set_item(key, value).map_err(backend)
	}

	fn remove_item(&self, key: &str) -> Result<(), StorageError> {
		self.storage()?.remove_item(key).map_err(backend)
	}

	fn keys(&self) -> Result<Vec<String>, StorageError> {
		let storage = self.storage()?;
		let length = storage.length().map_err(backend)?;
		let mut keys = Vec::with_capacity(length as usize);
		for i in 0..length {
			if let Some(key) = storage.key(i).map_err(backend)? {
				keys.push(key);
			}
		}
		Ok(keys)
	}
}

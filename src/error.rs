//! Error types.
//!
//! None of these are fatal to a page: the loader logs them and degrades to leaving the affected
//! element in its current (failed or pending) state.

use thiserror::Error;

/// Why a fragment fetch did not produce usable content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
	/// The server answered with a status outside `200..=299`.
	#[error("unexpected HTTP status {0}")]
	Status(u16),

	/// No response arrived within the configured timeout.
	#[error("timed out after {after_ms} ms")]
	Timeout {
		/// The timeout that elapsed, in milliseconds.
		after_ms: u32,
	},

	/// The request could not be sent or the body could not be read.
	#[error("network error: {0}")]
	Network(String),
}

/// A failed [`Storage`](`crate::cache::Storage`) operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
	/// The backing store doesn't exist or refuses access (for example in sandboxed frames).
	#[error("storage unavailable: {0}")]
	Unavailable(String),

	/// A write would exceed the store's quota.
	#[error("storage quota exceeded")]
	QuotaExceeded,

	/// Any other error reported by the backend.
	#[error("storage backend error: {0}")]
	Backend(String),
}

/// Invalid loader options.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The options couldn't be deserialized.
	#[error("could not parse options: {0}")]
	Parse(#[from] serde_json::Error),

	/// An option has a value the loader can't work with.
	#[error("invalid option `{option}`: {reason}")]
	Invalid {
		/// Name of the offending option, as spelled in the options object.
		option: &'static str,
		/// What is wrong with it.
		reason: &'static str,
	},
}

impl ConfigError {
	pub(crate) fn invalid(option: &'static str, reason: &'static str) -> Self {
		Self::Invalid { option, reason }
	}
}

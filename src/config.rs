//! Loader options.

use crate::{error::ConfigError, visibility::DEFAULT_MARGIN};
use serde::Deserialize;

/// When the retry timer gets (re)armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryTrigger {
	/// Every failed load re-arms the timer.
	OnFailure,
	/// Every successful load re-arms the timer while failed elements exist. Failures alone don't.
	OnSuccess,
}

impl Default for RetryTrigger {
	fn default() -> Self {
		Self::OnFailure
	}
}

/// What a discovery pass does with elements that failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailedRetention {
	/// Failed elements stay tracked until the retry timer resets them.
	Retain,
	/// Every discovery pass forgets failed elements. A retry still finds them through their `lazy-failed` class.
	ClearOnDiscover,
}

impl Default for FailedRetention {
	fn default() -> Self {
		Self::Retain
	}
}

/// Loader configuration, fixed for the lifetime of a loader.
///
/// Deserializes from the same option names a page would pass to `new LazyLoad({...})`:
///
/// ```
/// let config = lazy_dom::Config::from_json(r#"{ "delay": 100, "cacheTime": 5 }"#).unwrap();
/// assert_eq!(config.delay, 100);
/// assert_eq!(config.cache_ttl_ms(), 5 * 60 * 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Minimum interval between two scroll-triggered evaluation passes, in milliseconds.
	pub delay: u32,
	/// Whether failed loads are retried.
	#[serde(rename = "failretry")]
	pub fail_retry: bool,
	/// Time between the (last) failure and the retry, in milliseconds.
	#[serde(rename = "faildelay")]
	pub fail_delay: u32,
	/// Install a console subscriber for this crate's `tracing` output (browser driver only).
	pub debug: bool,
	/// Whether elements may opt into response caching with `data-lazycache`.
	#[serde(alias = "cache")]
	pub cache_enabled: bool,
	/// Cache entry lifetime, in minutes.
	#[serde(alias = "cacheTime")]
	pub cache_time_to_live: u32,
	/// Fetch timeout, in seconds.
	pub timeout: u32,
	/// Distance beyond the viewport edges within which elements already count as visible.
	pub margin: f64,
	pub retry_trigger: RetryTrigger,
	pub failed_retention: FailedRetention,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			delay: 200,
			fail_retry: true,
			fail_delay: 2000,
			debug: false,
			cache_enabled: true,
			cache_time_to_live: 15,
			timeout: 5,
			margin: DEFAULT_MARGIN,
			retry_trigger: RetryTrigger::default(),
			failed_retention: FailedRetention::default(),
		}
	}
}

impl Config {
	/// Parses and [validates](`Config::validate`) a JSON options object. Missing options take their defaults.
	///
	/// # Errors
	///
	/// Iff the JSON is malformed, has options of the wrong type or fails validation.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// # Errors
	///
	/// Iff an interval is zero or the margin isn't a finite, non-negative number.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.delay == 0 {
			return Err(ConfigError::invalid("delay", "must be greater than zero"));
		}
		if self.fail_delay == 0 {
			return Err(ConfigError::invalid("faildelay", "must be greater than zero"));
		}
		if self.timeout == 0 {
			return Err(ConfigError::invalid("timeout", "must be greater than zero"));
		}
		if !self.margin.is_finite() || self.margin < 0.0 {
			return Err(ConfigError::invalid("margin", "must be a finite, non-negative number"));
		}
		Ok(())
	}

	#[must_use]
	pub fn cache_ttl_ms(&self) -> u64 {
		u64::from(self.cache_time_to_live) * 60 * 1000
	}

	#[must_use]
	pub fn timeout_ms(&self) -> u32 {
		self.timeout.saturating_mul(1000)
	}

	/// How often stale cache entries are swept, or [`None`] if there's nothing to sweep.
	#[must_use]
	pub fn sweep_period_ms(&self) -> Option<u64> {
		match self.cache_ttl_ms() / 3 {
			0 => None,
			_ if !self.cache_enabled => None,
			period => Some(period),
		}
	}
}

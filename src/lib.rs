//! Loads HTML fragments into placeholder elements as they scroll into view.
//!
//! Placeholders are marked up like this:
//!
//! ```html
//! <div class="lazy" data-lazyload="/fragments/comments" data-lazycache></div>
//! ```
//!
//! The core, [`LazyLoader`], decides *when* to load which element and drives each element
//! through `lazy → lazy-loading → lazy-loaded | lazy-failed`. It talks to the page through
//! [`Dom`] and [`Storage`] and leaves network requests and timers to its caller.
//! On `wasm32`, the `web` module supplies all of that for a real browser window.

#![doc(html_root_url = "https://docs.rs/lazy-dom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod cache;
pub mod config;
pub mod dom;
pub mod element;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod registry;
pub mod retry;
pub mod throttle;
pub mod visibility;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use cache::{Cache, CacheEntry, MemoryStorage, Storage};
pub use config::{Config, FailedRetention, RetryTrigger};
pub use dom::{Dom, LazyEvent, Rect, Viewport};
pub use element::{LazyElement, Status};
pub use error::{ConfigError, FetchError, StorageError};
pub use loader::{Action, FetchRequest, FetchResponse, LazyLoader, Ticket};

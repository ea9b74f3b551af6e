//! The load orchestrator.
//!
//! [`LazyLoader`] is a synchronous state machine. It reads and mutates the document through
//! [`Dom`], but never performs I/O or waits on anything itself: network requests and timers are
//! handed to the caller as [`Action`]s, and their results come back in through
//! [`LazyLoader::complete`], [`LazyLoader::retry_elapsed`] and [`LazyLoader::throttle_elapsed`].
//!
//! # Lifecycle
//!
//! ```text
//! pending --(visible)--> loading --(2xx)--> loaded
//!                           |
//!                           +--(other status, timeout, network error)--> failed --(retry)--> pending
//! ```
//!
//! At most one element is loading at any time.

use crate::{
	cache::{Cache, Storage},
	config::{Config, RetryTrigger},
	dom::{Dom, LazyEvent},
	element::{swap_class, LazyElement, Status, FAILED_CLASS, LAZY_CLASS, LOADED_CLASS, LOADING_CLASS, URL_ATTRIBUTE},
	error::FetchError,
	hooks::Hooks,
	registry::Registry,
	retry::{RetryScheduler, RetryTimer},
	throttle::{Gate, Throttle},
	visibility::is_visible,
};
use tracing::{debug, info, instrument, trace, trace_span, warn};

/// Header carrying the page's CSRF token, read from the element with this id.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Identifies one issued fetch. Completions must present the ticket of the fetch in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// A GET request the driver should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
	pub ticket: Ticket,
	pub url: String,
	pub method: &'static str,
	pub headers: Vec<(String, String)>,
	pub timeout_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
	pub status: u16,
	pub body: String,
}

impl FetchResponse {
	#[must_use]
	pub fn is_success(&self) -> bool {
		(200..=299).contains(&self.status)
	}
}

/// Side effects requested by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	/// Perform the request and report back through [`LazyLoader::complete`].
	Fetch(FetchRequest),
	/// Call [`LazyLoader::retry_elapsed`] after [`RetryTimer::delay_ms`], cancelling any previously armed retry timer.
	ArmRetry(RetryTimer),
	/// Call [`LazyLoader::throttle_elapsed`] after this many milliseconds.
	ArmThrottle { after_ms: u64 },
}

#[derive(Debug)]
struct InFlight<N> {
	ticket: Ticket,
	element: LazyElement<N>,
}

/// Loads lazy elements of one document as they scroll into view.
#[derive(Debug)]
pub struct LazyLoader<D: Dom, S> {
	dom: D,
	config: Config,
	registry: Registry<D::Node>,
	cache: Cache<S>,
	hooks: Hooks<D::Node>,
	retry: RetryScheduler,
	throttle: Throttle,
	in_flight: Option<InFlight<D::Node>>,
	next_ticket: u64,
}

impl<D: Dom, S: Storage> LazyLoader<D, S> {
	/// Creates a loader. Nothing is scanned until [`start`](`LazyLoader::start`) or [`register`](`LazyLoader::register`) is called.
	pub fn new(dom: D, storage: S, config: Config) -> Self {
		Self {
			registry: Registry::new(),
			cache: Cache::new(storage, config.cache_enabled),
			hooks: Hooks::default(),
			retry: RetryScheduler::new(config.fail_retry, config.fail_delay),
			throttle: Throttle::new(u64::from(config.delay)),
			in_flight: None,
			next_ticket: 0,
			dom,
			config,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn dom(&self) -> &D {
		&self.dom
	}

	pub fn cache(&self) -> &Cache<S> {
		&self.cache
	}

	#[must_use]
	pub fn status(&self, node: &D::Node) -> Option<Status> {
		self.registry.status(node)
	}

	#[must_use]
	pub fn pending(&self) -> &[D::Node] {
		self.registry.pending()
	}

	#[must_use]
	pub fn failed(&self) -> &[D::Node] {
		self.registry.failed()
	}

	#[must_use]
	pub fn is_loading(&self) -> bool {
		self.in_flight.is_some()
	}

	/// Makes `middleware` available to elements with `data-lazymiddleware="{name}"`.
	pub fn register_middleware(&mut self, name: impl Into<String>, middleware: impl Fn(&D::Node, String) -> String + 'static) {
		self.hooks.insert_middleware(name, middleware);
	}

	/// Makes `callback` available to elements with `data-lazycallback="{name}"`.
	pub fn register_callback(&mut self, name: impl Into<String>, callback: impl Fn(&D::Node) + 'static) {
		self.hooks.insert_callback(name, callback);
	}

	/// Calls `callback` after each successful load whose target node, or one of its ancestors, matches `selector`.
	///
	/// The callback receives the matching node.
	pub fn on_lazy_load(&mut self, selector: impl Into<String>, callback: impl Fn(&D::Node) + 'static) {
		self.hooks.add_loaded_listener(selector, callback);
	}

	/// Initial scan and evaluation pass.
	pub fn start(&mut self) -> Vec<Action> {
		info!("Starting lazy loader.");
		self.register()
	}

	/// Re-scans the document for lazy elements and loads any that are visible.
	///
	/// Call this after adding placeholders to the page.
	#[instrument(skip(self))]
	pub fn register(&mut self) -> Vec<Action> {
		self.discover();
		self.evaluate()
	}

	/// Handles a scroll signal, rate-limited to one evaluation pass per [`Config::delay`].
	#[instrument(skip(self))]
	pub fn scroll(&mut self, now: u64) -> Vec<Action> {
		match self.throttle.hit(now) {
			Gate::Run => self.evaluate(),
			Gate::Trailing { after_ms } => vec![Action::ArmThrottle { after_ms }],
			Gate::Coalesced => Vec::new(),
		}
	}

	/// The trailing throttle timer fired.
	#[instrument(skip(self))]
	pub fn throttle_elapsed(&mut self, now: u64) -> Vec<Action> {
		if self.throttle.trailing_elapsed(now) {
			self.evaluate()
		} else {
			Vec::new()
		}
	}

	/// Starts loading the first visible pending element, unless a load is already in flight.
	///
	/// Cache hits complete on the spot, after which the next visible element is considered.
	pub fn evaluate(&mut self) -> Vec<Action> {
		let mut actions = Vec::new();
		self.pump(&mut actions);
		actions
	}

	/// Feeds back the outcome of the fetch issued with `ticket`.
	///
	/// `now` is the current time in milliseconds since the Unix epoch, used to date cache entries.
	#[instrument(skip(self, outcome))]
	pub fn complete(&mut self, ticket: Ticket, outcome: Result<FetchResponse, FetchError>, now: u64) -> Vec<Action> {
		let in_flight = match self.in_flight.take() {
			Some(in_flight) if in_flight.ticket == ticket => in_flight,
			other => {
				warn!("Ignoring completion of {:?}, which is not in flight.", ticket);
				self.in_flight = other;
				return Vec::new();
			}
		};
		let element = in_flight.element;

		let mut actions = Vec::new();
		match outcome.and_then(|response| if response.is_success() { Ok(response.body) } else { Err(FetchError::Status(response.status)) }) {
			Ok(body) => {
				if self.cache_applies(&element) && !self.cache.set(&element.url, &body, now) {
					warn!("Could not cache {:?}; continuing uncached.", element.url);
				}
				self.succeed(element, body, &mut actions);
			}
			Err(error) => self.fail(&element, &error, &mut actions),
		}
		self.pump(&mut actions);
		actions
	}

	/// The retry timer fired. Resets failed elements to pending and runs a fresh discovery pass.
	#[instrument(skip(self))]
	pub fn retry_elapsed(&mut self, timer: RetryTimer) -> Vec<Action> {
		if !self.retry.fire(timer) {
			return Vec::new();
		}

		let mut reset = self.registry.take_failed();
		for node in self.dom.elements_by_class(FAILED_CLASS) {
			if self.dom.has_attribute(&node, URL_ATTRIBUTE) && !reset.contains(&node) {
				reset.push(node);
			}
		}
		info!("Retrying {} failed element(s).", reset.len());
		for node in &reset {
			swap_class(&self.dom, node, FAILED_CLASS, LAZY_CLASS);
		}

		self.register()
	}

	/// Deletes cache entries older than the configured time to live. Returns how many were removed.
	pub fn sweep_cache(&mut self, now: u64) -> usize {
		self.cache.sweep(self.config.cache_ttl_ms(), now)
	}

	fn discover(&mut self) {
		self.registry.discover(&self.dom, self.config.failed_retention);
	}

	fn cache_applies(&self, element: &LazyElement<D::Node>) -> bool {
		self.cache.is_enabled() && element.cache
	}

	fn next_visible(&self) -> Option<LazyElement<D::Node>> {
		self.registry
			.pending()
			.iter()
			.filter(|node| is_visible(&self.dom, node, self.config.margin))
			.find_map(|node| LazyElement::load(&self.dom, node))
	}

	fn pump(&mut self, actions: &mut Vec<Action>) {
		loop {
			if let Some(in_flight) = &self.in_flight {
				trace!("{:?} is in flight; deferring.", in_flight.ticket);
				return;
			}
			let element = match self.next_visible() {
				Some(element) => element,
				None => return,
			};

			let span = trace_span!("Loading", url = %element.url);
			let _enter = span.enter();

			self.registry.start_loading(&element.node);
			self.dom.dispatch(&element.node, LazyEvent::Loading);
			swap_class(&self.dom, &element.node, LAZY_CLASS, LOADING_CLASS);

			if self.cache_applies(&element) {
				if let Some(entry) = self.cache.get(&element.url) {
					debug!("Cache hit.");
					self.succeed(element, entry.payload, actions);
					continue;
				}
			}

			let ticket = Ticket(self.next_ticket);
			self.next_ticket += 1;
			debug!("Fetching as {:?}.", ticket);
			actions.push(Action::Fetch(self.request(ticket, &element.url)));
			self.in_flight = Some(InFlight { ticket, element });
			return;
		}
	}

	fn request(&self, ticket: Ticket, url: &str) -> FetchRequest {
		let mut headers = Vec::new();
		if let Some(token) = self.dom.meta_content(CSRF_HEADER) {
			headers.push((CSRF_HEADER.to_owned(), token));
		}
		FetchRequest {
			ticket,
			url: url.to_owned(),
			method: "GET",
			headers,
			timeout_ms: self.config.timeout_ms(),
		}
	}

	fn succeed(&mut self, element: LazyElement<D::Node>, content: String, actions: &mut Vec<Action>) {
		let LazyElement { node, middleware, parent_replace, callback, .. } = element;
		debug!("Loaded.");

		self.registry.mark_loaded(&node);
		swap_class(&self.dom, &node, LOADING_CLASS, LOADED_CLASS);

		let content = match middleware.as_deref().map(|name| (name, self.hooks.middleware(name))) {
			Some((_, Some(middleware))) => middleware(&node, content),
			Some((name, None)) => {
				debug!("Middleware {:?} is not registered; skipping it.", name);
				content
			}
			None => content,
		};
		#[cfg(feature = "dangerous-logging")]
		trace!(content = %content, "Injecting fragment.");

		let parent = if parent_replace { self.dom.parent(&node) } else { None };
		let target = match parent {
			Some(parent) => {
				self.dom.append_html(&parent, &content);
				parent
			}
			None => {
				if parent_replace {
					warn!("Element has no parent to receive its content; filling it instead.");
				}
				self.dom.set_html(&node, &content);
				node.clone()
			}
		};

		if let Some(name) = callback {
			match self.hooks.callback(&name) {
				Some(callback) => callback(&target),
				None => debug!("Callback {:?} is not registered; skipping it.", name),
			}
		}
		if target != node {
			self.dom.remove(&node);
		}

		self.dom.dispatch(&target, LazyEvent::Loaded);
		for (selector, listener) in self.hooks.loaded_listeners() {
			if let Some(matched) = self.dom.closest(&target, &selector) {
				listener(&matched);
			}
		}

		if self.config.retry_trigger == RetryTrigger::OnSuccess && !self.registry.failed().is_empty() {
			actions.extend(self.retry.arm().map(Action::ArmRetry));
		}

		self.discover();
	}

	fn fail(&mut self, element: &LazyElement<D::Node>, error: &FetchError, actions: &mut Vec<Action>) {
		warn!("Loading {:?} failed: {}", element.url, error);

		self.registry.mark_failed(&element.node);
		swap_class(&self.dom, &element.node, LOADING_CLASS, FAILED_CLASS);
		self.dom.dispatch(&element.node, LazyEvent::Failed);

		if self.config.retry_trigger == RetryTrigger::OnFailure {
			actions.extend(self.retry.arm().map(Action::ArmRetry));
		}
	}
}

//! Browser driver: binds [`LazyLoader`] to a live page.
//!
//! [`LazyLoad`] owns the loader together with its scroll listener and timers, performs the
//! [`Action`]s the loader requests and feeds their results back. It is also exported to
//! JavaScript:
//!
//! ```js
//! const lazy = new LazyLoad({ delay: 200, faildelay: 2000, cacheTimeToLive: 15 });
//! lazy.registerMiddleware("markdown", (element, content) => render(content));
//! lazy.onLazyLoad(".comments", (element) => highlight(element));
//! lazy.register(); // after adding placeholders
//! ```

mod dom;
mod fetch;
mod storage;

pub use dom::WebDom;
pub use fetch::fetch;
pub use storage::SessionStorage;

use crate::{
	config::Config,
	loader::{Action, LazyLoader},
};
use core::cell::RefCell;
use gloo_timers::callback::{Interval, Timeout};
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, trace, warn};
use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{AddEventListenerOptions, Element, Window};

type WebLoader = LazyLoader<WebDom, SessionStorage>;

/// Milliseconds since the Unix epoch.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn now() -> u64 {
	js_sys::Date::now() as u64
}

fn millis(ms: u64) -> u32 {
	u32::try_from(ms).unwrap_or(u32::MAX)
}

/// A lazy loader attached to the current window.
///
/// Dropping it (or calling `free()` from JavaScript) removes the scroll listener and cancels all timers.
#[wasm_bindgen]
#[derive(Debug)]
pub struct LazyLoad {
	shared: Rc<Shared>,
}

struct Shared {
	window: Window,
	loader: RefCell<WebLoader>,
	retry_timer: RefCell<Option<Timeout>>,
	throttle_timer: RefCell<Option<Timeout>>,
	sweep_interval: RefCell<Option<Interval>>,
	scroll_listener: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl core::fmt::Debug for Shared {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Shared")
			.field("loader", &self.loader)
			.field("retry_armed", &self.retry_timer.borrow().is_some())
			.field("throttle_armed", &self.throttle_timer.borrow().is_some())
			.field("sweeping", &self.sweep_interval.borrow().is_some())
			.finish()
	}
}

#[wasm_bindgen]
impl LazyLoad {
	/// Creates a loader from a JavaScript options object (or `undefined` for the defaults) and
	/// runs the first discovery pass.
	///
	/// # Errors
	///
	/// Iff the options are invalid or there is no window with a document.
	#[wasm_bindgen(constructor)]
	pub fn new(options: JsValue) -> Result<LazyLoad, JsValue> {
		let config = if options.is_undefined() || options.is_null() {
			Config::default()
		} else {
			let json: String = js_sys::JSON::stringify(&options)?.into();
			Config::from_json(&json).map_err(|error| JsValue::from_str(&error.to_string()))?
		};
		Self::with_config(config)
	}

	/// Re-scans the document for lazy elements. Call this after adding placeholders.
	pub fn register(&self) {
		self.shared.with_loader(WebLoader::register);
	}

	/// Calls `callback` with the matching element after each successful load into an element
	/// matching `selector` or a descendant of one.
	#[wasm_bindgen(js_name = onLazyLoad)]
	pub fn on_lazy_load(&self, selector: String, callback: js_sys::Function) {
		debug!("Delegating lazy-loaded events for {:?}.", selector);
		self.shared.with_loader(move |loader| {
			loader.on_lazy_load(selector, move |element: &Element| {
				let element: &JsValue = element.as_ref();
				if let Err(error) = callback.call1(&JsValue::NULL, element) {
					error!("onLazyLoad callback threw: {:?}", error)
				}
			});
			Vec::new()
		});
	}

	/// Registers `middleware(element, content) -> content` under `name`, for `data-lazymiddleware`.
	#[wasm_bindgen(js_name = registerMiddleware)]
	pub fn register_middleware(&self, name: String, middleware: js_sys::Function) {
		self.shared.with_loader(move |loader| {
			loader.register_middleware(name, move |element: &Element, content: String| {
				let element: &JsValue = element.as_ref();
				match middleware.call2(&JsValue::NULL, element, &JsValue::from_str(&content)) {
					Ok(transformed) => transformed.as_string().unwrap_or_else(|| {
						warn!("Middleware returned {:?} instead of a string; injecting the fragment unchanged.", transformed);
						content
					}),
					Err(error) => {
						error!("Middleware threw: {:?}", error);
						content
					}
				}
			});
			Vec::new()
		});
	}

	/// Registers `callback(element)` under `name`, for `data-lazycallback`.
	#[wasm_bindgen(js_name = registerCallback)]
	pub fn register_callback(&self, name: String, callback: js_sys::Function) {
		self.shared.with_loader(move |loader| {
			loader.register_callback(name, move |element: &Element| {
				let element: &JsValue = element.as_ref();
				if let Err(error) = callback.call1(&JsValue::NULL, element) {
					error!("Load callback threw: {:?}", error)
				}
			});
			Vec::new()
		});
	}
}

impl LazyLoad {
	/// Creates a loader for the current window and runs the first discovery pass.
	///
	/// # Errors
	///
	/// Iff `config` is invalid, there is no window or it has no document,
	/// or the scroll listener can't be attached.
	pub fn with_config(config: Config) -> Result<Self, JsValue> {
		config.validate().map_err(|error| JsValue::from_str(&error.to_string()))?;
		if config.debug {
			console_error_panic_hook::set_once();
			if tracing_wasm::try_set_as_global_default().is_err() {
				debug!("A global tracing subscriber is already installed.");
			}
		}

		let window = web_sys::window().ok_or_else(|| JsValue::from_str("lazy-dom: No window."))?;
		let dom = WebDom::new(window.clone())?;
		let storage = SessionStorage::new(&window);
		let sweep_period = config.sweep_period_ms();

		let shared = Rc::new(Shared {
			window,
			loader: RefCell::new(LazyLoader::new(dom, storage, config)),
			retry_timer: RefCell::default(),
			throttle_timer: RefCell::default(),
			sweep_interval: RefCell::default(),
			scroll_listener: RefCell::default(),
		});

		let weak = Rc::downgrade(&shared);
		let listener = Closure::wrap(Box::new(move || {
			if let Some(shared) = weak.upgrade() {
				shared.with_loader(|loader| loader.scroll(now()));
			}
		}) as Box<dyn FnMut()>);
		let options = AddEventListenerOptions::new();
		options.set_passive(true);
		shared.window.add_event_listener_with_callback_and_add_event_listener_options("scroll", listener.as_ref().unchecked_ref(), &options)?;
		shared.scroll_listener.replace(Some(listener));

		if let Some(period) = sweep_period {
			let weak = Rc::downgrade(&shared);
			let interval = Interval::new(millis(period), move || {
				if let Some(shared) = weak.upgrade() {
					shared.with_loader(|loader| {
						loader.sweep_cache(now());
						Vec::new()
					});
				}
			});
			shared.sweep_interval.replace(Some(interval));
		}

		info!("Attached lazy loader to window.");
		shared.with_loader(WebLoader::start);
		Ok(Self { shared })
	}

	/// Runs `operation` on the loader, or later if this is a re-entrant call from inside a loader
	/// operation (a hook or event listener calling back into [`LazyLoad`]).
	pub fn with_loader(&self, operation: impl 'static + FnOnce(&mut LazyLoader<WebDom, SessionStorage>) -> Vec<Action>) {
		self.shared.with_loader(operation)
	}
}

impl Shared {
	fn with_loader(self: &Rc<Self>, operation: impl 'static + FnOnce(&mut WebLoader) -> Vec<Action>) {
		let actions = match self.loader.try_borrow_mut() {
			Ok(mut loader) => operation(&mut loader),
			Err(_) => {
				trace!("Loader busy; deferring re-entrant call.");
				let weak = Rc::downgrade(self);
				return spawn_local(async move {
					if let Some(shared) = weak.upgrade() {
						shared.with_loader(operation)
					}
				});
			}
		};
		self.apply(actions);
	}

	fn apply(self: &Rc<Self>, actions: Vec<Action>) {
		for action in actions {
			match action {
				Action::Fetch(request) => {
					let weak = Rc::downgrade(self);
					spawn_local(async move {
						let outcome = fetch(&request).await;
						if let Some(shared) = weak.upgrade() {
							let ticket = request.ticket;
							shared.with_loader(move |loader| loader.complete(ticket, outcome, now()));
						}
					});
				}
				Action::ArmRetry(timer) => {
					let timeout = Timeout::new(timer.delay_ms(), self.upgraded(move |shared| shared.with_loader(move |loader| loader.retry_elapsed(timer))));
					// Dropping the replaced handle cancels it.
					self.retry_timer.replace(Some(timeout));
				}
				Action::ArmThrottle { after_ms } => {
					let timeout = Timeout::new(millis(after_ms), self.upgraded(|shared| shared.with_loader(|loader| loader.throttle_elapsed(now()))));
					self.throttle_timer.replace(Some(timeout));
				}
			}
		}
	}

	/// Wraps `f` so that it only runs while the loader is still alive.
	fn upgraded(self: &Rc<Self>, f: impl 'static + FnOnce(&Rc<Self>)) -> impl 'static + FnOnce() {
		let weak: Weak<Self> = Rc::downgrade(self);
		move || {
			if let Some(shared) = weak.upgrade() {
				f(&shared)
			}
		}
	}
}

impl Drop for Shared {
	fn drop(&mut self) {
		if let Some(listener) = self.scroll_listener.get_mut().take() {
			if let Err(error) = self.window.remove_event_listener_with_callback("scroll", listener.as_ref().unchecked_ref()) {
				error!("Failed to remove scroll listener: {:?}", error)
			}
		}
		debug!("Detached lazy loader.");
	}
}

use hashbrown::HashMap;
use std::{fmt, rc::Rc};

/// Transforms a loaded fragment before it is injected. Receives the placeholder node.
pub type Middleware<N> = Rc<dyn Fn(&N, String) -> String>;
/// Runs after injection with the node that received the fragment.
pub type Callback<N> = Rc<dyn Fn(&N)>;

/// Named hooks that elements refer to through `data-lazymiddleware` and `data-lazycallback`,
/// plus the delegated `lazy-loaded` subscriptions.
pub struct Hooks<N> {
	middleware: HashMap<String, Middleware<N>>,
	callbacks: HashMap<String, Callback<N>>,
	loaded_listeners: Vec<(String, Callback<N>)>,
}

impl<N> Default for Hooks<N> {
	fn default() -> Self {
		Self {
			middleware: HashMap::new(),
			callbacks: HashMap::new(),
			loaded_listeners: Vec::new(),
		}
	}
}

impl<N> fmt::Debug for Hooks<N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Hooks")
			.field("middleware", &self.middleware.keys().collect::<Vec<_>>())
			.field("callbacks", &self.callbacks.keys().collect::<Vec<_>>())
			.field("loaded_listeners", &self.loaded_listeners.iter().map(|(selector, _)| selector).collect::<Vec<_>>())
			.finish()
	}
}

impl<N> Hooks<N> {
	/// Registers (or replaces) the middleware called `name`.
	pub fn insert_middleware(&mut self, name: impl Into<String>, middleware: impl Fn(&N, String) -> String + 'static) {
		self.middleware.insert(name.into(), Rc::new(middleware));
	}

	/// Registers (or replaces) the callback called `name`.
	pub fn insert_callback(&mut self, name: impl Into<String>, callback: impl Fn(&N) + 'static) {
		self.callbacks.insert(name.into(), Rc::new(callback));
	}

	pub fn add_loaded_listener(&mut self, selector: impl Into<String>, callback: impl Fn(&N) + 'static) {
		self.loaded_listeners.push((selector.into(), Rc::new(callback)));
	}

	#[must_use]
	pub fn middleware(&self, name: &str) -> Option<Middleware<N>> {
		self.middleware.get(name).cloned()
	}

	#[must_use]
	pub fn callback(&self, name: &str) -> Option<Callback<N>> {
		self.callbacks.get(name).cloned()
	}

	#[must_use]
	pub fn loaded_listeners(&self) -> Vec<(String, Callback<N>)> {
		self.loaded_listeners.clone()
	}
}

//! Reading lazy elements out of the document.

use crate::dom::Dom;

/// Class marking candidate placeholders.
pub const LAZY_CLASS: &str = "lazy";
pub const LOADING_CLASS: &str = "lazy-loading";
pub const LOADED_CLASS: &str = "lazy-loaded";
pub const FAILED_CLASS: &str = "lazy-failed";

/// Required: the URL of the fragment to load.
pub const URL_ATTRIBUTE: &str = "data-lazyload";
/// Presence opts the element into response caching.
pub const CACHE_ATTRIBUTE: &str = "data-lazycache";
/// Name of a registered middleware hook that transforms the fragment before injection.
pub const MIDDLEWARE_ATTRIBUTE: &str = "data-lazymiddleware";
/// Presence makes the fragment go into the element's parent, replacing the element.
pub const PARENT_ATTRIBUTE: &str = "data-lazyparent";
/// Name of a registered callback hook invoked with the node that received the fragment.
pub const CALLBACK_ATTRIBUTE: &str = "data-lazycallback";

/// Where an element is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
	Pending,
	Loading,
	/// Terminal.
	Loaded,
	Failed,
}

/// A placeholder together with the load instructions found on it.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyElement<N> {
	pub node: N,
	pub url: String,
	pub cache: bool,
	pub middleware: Option<String>,
	pub parent_replace: bool,
	pub callback: Option<String>,
}

impl<N: Clone> LazyElement<N> {
	/// Reads the load instructions from `node`, or returns [`None`] if it has no load URL.
	///
	/// Attributes are read fresh on every call, so changes made by page scripts between
	/// discovery and loading are honoured.
	pub fn load<D: Dom<Node = N> + ?Sized>(dom: &D, node: &N) -> Option<Self> {
		let url = dom.attribute(node, URL_ATTRIBUTE)?;
		Some(Self {
			node: node.clone(),
			url,
			cache: dom.has_attribute(node, CACHE_ATTRIBUTE),
			middleware: non_empty(dom.attribute(node, MIDDLEWARE_ATTRIBUTE)),
			parent_replace: dom.has_attribute(node, PARENT_ATTRIBUTE),
			callback: non_empty(dom.attribute(node, CALLBACK_ATTRIBUTE)),
		})
	}
}

fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|value| !value.trim().is_empty())
}

/// Moves `node` from one state class to the next.
pub(crate) fn swap_class<D: Dom + ?Sized>(dom: &D, node: &D::Node, from: &str, to: &str) {
	dom.remove_class(node, from);
	dom.add_class(node, to);
}

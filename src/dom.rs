//! The document surface the loader works against.
//!
//! [`LazyLoader`](`crate::LazyLoader`) never touches a browser API directly. Everything it needs
//! from a page goes through [`Dom`], which `web::WebDom` implements on top of [`web_sys`](https://docs.rs/web-sys)
//! and which tests implement over an in-memory tree.

use core::fmt::Debug;

/// An axis-aligned rectangle in viewport coordinates, as returned by
/// [***getBoundingClientRect()***](https://developer.mozilla.org/en-US/docs/Web/API/Element/getBoundingClientRect).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
	pub top: f64,
	pub left: f64,
	pub width: f64,
	pub height: f64,
}

impl Rect {
	#[must_use]
	pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
		Self { top, left, width, height }
	}

	#[must_use]
	pub fn bottom(&self) -> f64 {
		self.top + self.height
	}

	#[must_use]
	pub fn right(&self) -> f64 {
		self.left + self.width
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.width <= 0.0 && self.height <= 0.0
	}
}

/// Size of the visible area of the page.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
	pub width: f64,
	pub height: f64,
}

/// Events fired on lazy elements as they move through their lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LazyEvent {
	Loading,
	Loaded,
	Failed,
}

impl LazyEvent {
	/// The DOM event type.
	#[must_use]
	pub fn name(self) -> &'static str {
		match self {
			LazyEvent::Loading => "lazy-loading",
			LazyEvent::Loaded => "lazy-loaded",
			LazyEvent::Failed => "lazy-failed",
		}
	}
}

/// Document operations used by the loader.
///
/// Methods take `&self` since a live document is shared, interior-mutable state.
/// Implementations should not call back into the loader.
pub trait Dom {
	/// A handle to an element. Equality must be node identity.
	type Node: Clone + PartialEq + Debug;

	/// All elements currently in the document that carry `class`, in document order.
	fn elements_by_class(&self, class: &str) -> Vec<Self::Node>;

	fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
	fn has_attribute(&self, node: &Self::Node, name: &str) -> bool {
		self.attribute(node, name).is_some()
	}

	fn add_class(&self, node: &Self::Node, class: &str);
	fn remove_class(&self, node: &Self::Node, class: &str);

	/// The node's bounding rectangle, or [`None`] if it isn't attached to the document.
	fn bounds(&self, node: &Self::Node) -> Option<Rect>;

	/// Whether styling hides the node (`display: none`, `visibility: hidden` or equivalent).
	fn is_hidden(&self, node: &Self::Node) -> bool;

	fn viewport(&self) -> Viewport;

	fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

	/// Replaces the node's content with `html`.
	fn set_html(&self, node: &Self::Node, html: &str);

	/// Appends `html` after the node's existing content.
	fn append_html(&self, node: &Self::Node, html: &str);

	/// Detaches the node from the document.
	fn remove(&self, node: &Self::Node);

	/// Fires `event` on the node. The event bubbles.
	fn dispatch(&self, node: &Self::Node, event: LazyEvent);

	/// The node itself or its nearest ancestor matching the CSS `selector`.
	fn closest(&self, node: &Self::Node, selector: &str) -> Option<Self::Node>;

	/// The `content` attribute of the element with id `id`, typically a `<meta>` tag.
	fn meta_content(&self, id: &str) -> Option<String>;
}

use crate::dom::{Dom, LazyEvent, Rect, Viewport};
use tracing::{error, warn};
use wasm_bindgen::JsValue;
use web_sys::{CustomEvent, CustomEventInit, Document, Element, Window};

/// [`Dom`] over a live browser document.
#[derive(Debug, Clone)]
pub struct WebDom {
	window: Window,
	document: Document,
}

impl WebDom {
	/// # Errors
	///
	/// Iff `window` has no document.
	pub fn new(window: Window) -> Result<Self, JsValue> {
		let document = window.document().ok_or_else(|| JsValue::from_str("lazy-dom: No document found for window."))?;
		Ok(Self { window, document })
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}
}

impl Dom for WebDom {
	type Node = Element;

	fn elements_by_class(&self, class: &str) -> Vec<Element> {
		// The collection is live, so it's copied out before anything can change the document.
		let collection = self.document.get_elements_by_class_name(class);
		(0..collection.length()).filter_map(|i| collection.item(i)).collect()
	}

	fn attribute(&self, node: &Element, name: &str) -> Option<String> {
		node.get_attribute(name)
	}

	fn has_attribute(&self, node: &Element, name: &str) -> bool {
		node.has_attribute(name)
	}

	fn add_class(&self, node: &Element, class: &str) {
		if let Err(error) = node.class_list().add_1(class) {
			error!("Failed to add class {:?} to {:?}: {:?}", class, node, error)
		}
	}

	fn remove_class(&self, node: &Element, class: &str) {
		if let Err(error) = node.class_list().remove_1(class) {
			error!("Failed to remove class {:?} from {:?}: {:?}", class, node, error)
		}
	}

	fn bounds(&self, node: &Element) -> Option<Rect> {
		if !node.is_connected() {
			return None;
		}
		let rect = node.get_bounding_client_rect();
		Some(Rect::new(rect.top(), rect.left(), rect.width(), rect.height()))
	}

	fn is_hidden(&self, node: &Element) -> bool {
		// No boxes at all means `display: none` on the element or an ancestor.
		if node.get_client_rects().length() == 0 {
			return true;
		}
		match self.window.get_computed_style(node) {
			Ok(Some(style)) => style.get_property_value("visibility").map_or(false, |visibility| visibility == "hidden"),
			Ok(None) => false,
			Err(error) => {
				warn!("Could not compute style of {:?}: {:?}", node, error);
				false
			}
		}
	}

	fn viewport(&self) -> Viewport {
		let dimension = |value: Result<JsValue, JsValue>| value.ok().and_then(|value| value.as_f64()).unwrap_or(0.0);
		Viewport {
			width: dimension(self.window.inner_width()),
			height: dimension(self.window.inner_height()),
		}
	}

	fn parent(&self, node: &Element) -> Option<Element> {
		node.parent_element()
	}

	fn set_html(&self, node: &Element, html: &str) {
		node.set_inner_html(html)
	}

	fn append_html(&self, node: &Element, html: &str) {
		if let Err(error) = node.insert_adjacent_html("beforeend", html) {
			error!("Failed to append HTML to {:?}: {:?}", node, error)
		}
	}

	fn remove(&self, node: &Element) {
		node.remove()
	}

	fn dispatch(&self, node: &Element, event: LazyEvent) {
		let init = CustomEventInit::new();
		init.set_bubbles(true);
		match CustomEvent::new_with_event_init_dict(event.name(), &init) {
			Ok(custom_event) => {
				if let Err(error) = node.dispatch_event(&custom_event) {
					error!("Failed to dispatch {:?} on {:?}: {:?}", event.name(), node, error)
				}
			}
			Err(error) => error!("Failed to create {:?} event: {:?}", event.name(), error),
		}
	}

	fn closest(&self, node: &Element, selector: &str) -> Option<Element> {
		match node.closest(selector) {
			Ok(matched) => matched,
			Err(error) => {
				warn!("Invalid selector {:?}: {:?}", selector, error);
				None
			}
		}
	}

	fn meta_content(&self, id: &str) -> Option<String> {
		self.document.get_element_by_id(id)?.get_attribute("content")
	}
}

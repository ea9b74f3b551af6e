use crate::dom::{Dom, Rect, Viewport};

/// Default distance beyond the viewport within which elements count as visible.
pub const DEFAULT_MARGIN: f64 = 25.0;

/// Whether `rect` at least partially overlaps the viewport grown by `margin` on every side.
#[must_use]
pub fn in_viewport(rect: &Rect, viewport: &Viewport, margin: f64) -> bool {
	rect.bottom() + margin > 0.0 && rect.right() + margin > 0.0 && rect.top - margin < viewport.height && rect.left - margin < viewport.width
}

/// Whether `node` is close enough to the viewport and actually rendered, so that loading it now makes sense.
///
/// Detached nodes are never visible.
pub fn is_visible<D: Dom + ?Sized>(dom: &D, node: &D::Node, margin: f64) -> bool {
	let rect = match dom.bounds(node) {
		Some(rect) => rect,
		None => return false,
	};
	!rect.is_empty() && in_viewport(&rect, &dom.viewport(), margin) && !dom.is_hidden(node)
}

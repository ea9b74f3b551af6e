//! Bookkeeping of which placeholders are waiting, loading, loaded or failed.

use crate::{
	config::FailedRetention,
	dom::Dom,
	element::{Status, LAZY_CLASS, URL_ATTRIBUTE},
};
use tracing::{debug, trace};

/// Per-element status, keyed by node identity.
///
/// A node is in at most one of the lists at any time, and never twice in the same one.
#[derive(Debug)]
pub struct Registry<N> {
	pending: Vec<N>,
	loading: Option<N>,
	loaded: Vec<N>,
	failed: Vec<N>,
}

impl<N> Default for Registry<N> {
	fn default() -> Self {
		Self {
			pending: Vec::new(),
			loading: None,
			loaded: Vec::new(),
			failed: Vec::new(),
		}
	}
}

impl<N: Clone + PartialEq> Registry<N> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Rebuilds the pending list from the document.
	///
	/// Candidates are elements with the `lazy` class and a load URL. Those already loading,
	/// loaded or (retained as) failed are skipped. Repeating the pass without document changes
	/// leaves the registry as it is.
	///
	/// Loaded and failed nodes that are no longer attached are dropped.
	pub fn discover<D: Dom<Node = N> + ?Sized>(&mut self, dom: &D, retention: FailedRetention) {
		let tracked = self.loaded.len() + self.failed.len();
		self.loaded.retain(|node| dom.bounds(node).is_some());
		self.failed.retain(|node| dom.bounds(node).is_some());
		if self.loaded.len() + self.failed.len() != tracked {
			trace!("Forgot {} detached element(s).", tracked - self.loaded.len() - self.failed.len());
		}

		if retention == FailedRetention::ClearOnDiscover && !self.failed.is_empty() {
			trace!("Forgetting {} failed element(s).", self.failed.len());
			self.failed.clear();
		}

		let mut pending = Vec::with_capacity(self.pending.len());
		for node in dom.elements_by_class(LAZY_CLASS) {
			if !dom.has_attribute(&node, URL_ATTRIBUTE) {
				continue;
			}
			if pending.contains(&node) || self.is_settled_or_busy(&node) {
				continue;
			}
			pending.push(node);
		}

		if pending.len() != self.pending.len() {
			debug!("Discovered {} pending element(s) (previously {}).", pending.len(), self.pending.len());
		}
		self.pending = pending;
	}

	fn is_settled_or_busy(&self, node: &N) -> bool {
		self.loading.as_ref() == Some(node) || self.loaded.contains(node) || self.failed.contains(node)
	}

	#[must_use]
	pub fn status(&self, node: &N) -> Option<Status> {
		if self.loading.as_ref() == Some(node) {
			Some(Status::Loading)
		} else if self.pending.contains(node) {
			Some(Status::Pending)
		} else if self.loaded.contains(node) {
			Some(Status::Loaded)
		} else if self.failed.contains(node) {
			Some(Status::Failed)
		} else {
			None
		}
	}

	#[must_use]
	pub fn pending(&self) -> &[N] {
		&self.pending
	}

	#[must_use]
	pub fn failed(&self) -> &[N] {
		&self.failed
	}

	/// Moves a pending node into the loading slot.
	///
	/// # Panics
	///
	/// If another node is already loading.
	pub fn start_loading(&mut self, node: &N) {
		assert!(self.loading.is_none(), "Only one element may load at a time.");
		self.pending.retain(|pending| pending != node);
		self.loading = Some(node.clone());
	}

	pub fn mark_loaded(&mut self, node: &N) {
		self.forget_active(node);
		if !self.loaded.contains(node) {
			self.loaded.push(node.clone());
		}
	}

	pub fn mark_failed(&mut self, node: &N) {
		self.forget_active(node);
		if !self.failed.contains(node) {
			self.failed.push(node.clone());
		}
	}

	/// Empties the failed list, handing its nodes back for resetting.
	pub fn take_failed(&mut self) -> Vec<N> {
		std::mem::take(&mut self.failed)
	}

	fn forget_active(&mut self, node: &N) {
		if self.loading.as_ref() == Some(node) {
			self.loading = None;
		}
		self.pending.retain(|pending| pending != node);
	}
}

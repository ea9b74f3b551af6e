use tracing::trace;

/// Handle to one arming of the retry timer.
///
/// Only the most recently armed timer is honoured; earlier ones are stale once re-armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimer {
	generation: u64,
	delay_ms: u32,
}

impl RetryTimer {
	#[must_use]
	pub fn delay_ms(&self) -> u32 {
		self.delay_ms
	}
}

/// Debounced retry timer: re-arming replaces the previous deadline instead of adding one.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
	enabled: bool,
	delay_ms: u32,
	generation: u64,
	armed: bool,
}

impl RetryScheduler {
	#[must_use]
	pub fn new(enabled: bool, delay_ms: u32) -> Self {
		Self { enabled, delay_ms, generation: 0, armed: false }
	}

	#[must_use]
	pub fn is_armed(&self) -> bool {
		self.armed
	}

	/// (Re)arms the timer, or returns [`None`] if retrying is disabled.
	pub fn arm(&mut self) -> Option<RetryTimer> {
		if !self.enabled {
			return None;
		}
		self.generation += 1;
		self.armed = true;
		trace!(generation = self.generation, delay_ms = self.delay_ms, "Armed retry timer.");
		Some(RetryTimer { generation: self.generation, delay_ms: self.delay_ms })
	}

	/// Returns whether `timer` is the current one and failed elements should now be reset.
	pub fn fire(&mut self, timer: RetryTimer) -> bool {
		if !self.armed || timer.generation != self.generation {
			trace!(generation = timer.generation, current = self.generation, "Ignoring stale retry timer.");
			return false;
		}
		self.armed = false;
		self.enabled
	}
}

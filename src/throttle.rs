/// Outcome of a scroll signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
	/// Run an evaluation pass now.
	Run,
	/// Arm a timer and call [`Throttle::trailing_elapsed`] after this many milliseconds.
	Trailing { after_ms: u64 },
	/// A trailing pass is already scheduled and will cover this signal.
	Coalesced,
}

/// Leading- and trailing-edge rate limit: at most one pass per `interval_ms`, and the last
/// signal in a burst is never lost.
#[derive(Debug, Clone)]
pub struct Throttle {
	interval_ms: u64,
	last_run: Option<u64>,
	trailing: bool,
}

impl Throttle {
	#[must_use]
	pub fn new(interval_ms: u64) -> Self {
		Self { interval_ms, last_run: None, trailing: false }
	}

	pub fn hit(&mut self, now: u64) -> Gate {
		match self.last_run {
			Some(last_run) if now.saturating_sub(last_run) < self.interval_ms => {
				if self.trailing {
					Gate::Coalesced
				} else {
					self.trailing = true;
					Gate::Trailing { after_ms: self.interval_ms - now.saturating_sub(last_run) }
				}
			}
			_ => {
				// A trailing timer still armed from the previous window is now stale.
				self.trailing = false;
				self.last_run = Some(now);
				Gate::Run
			}
		}
	}

	/// Returns whether the trailing pass should run.
	pub fn trailing_elapsed(&mut self, now: u64) -> bool {
		if !self.trailing {
			return false;
		}
		self.trailing = false;
		self.last_run = Some(now);
		true
	}
}

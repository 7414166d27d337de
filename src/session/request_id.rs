use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::SessionError;

/// Returned when the request ID space is exhausted.
///
/// `announce` is set the first time the generator blocks on a given limit, so
/// exactly one REQUESTS_BLOCKED is emitted per limit.
#[derive(Debug)]
pub(super) struct Blocked {
	pub limit: u64,
	pub announce: bool,
}

/// Allocates our request IDs: the parity of our perspective, step 2, bounded
/// by the peer's MAX_REQUEST_ID grant.
pub(super) struct OutgoingRequestIds {
	state: Mutex<OutgoingState>,
}

struct OutgoingState {
	next: u64,
	max: u64,
	blocked_sent: Option<u64>,
}

impl OutgoingRequestIds {
	pub fn new(initial: u64) -> Self {
		Self {
			state: Mutex::new(OutgoingState {
				next: initial,
				max: 0,
				blocked_sent: None,
			}),
		}
	}

	pub fn allocate(&self) -> Result<u64, Blocked> {
		let mut state = self.state.lock().unwrap();

		if state.next >= state.max {
			let announce = state.blocked_sent != Some(state.max);
			state.blocked_sent = Some(state.max);

			return Err(Blocked {
				limit: state.max,
				announce,
			});
		}

		let id = state.next;
		state.next += 2;

		Ok(id)
	}

	/// Raise the limit; a lower value is ignored.
	pub fn set_max(&self, max: u64) {
		let mut state = self.state.lock().unwrap();
		state.max = state.max.max(max);
	}

	/// Whether the given ID was already allocated by us.
	pub fn issued(&self, id: u64) -> bool {
		let state = self.state.lock().unwrap();
		id < state.next && id % 2 == state.next % 2
	}
}

/// Validates the peer's request IDs: strictly sequential in the peer's parity
/// class and below our advertised limit.
pub(super) struct IncomingRequestIds {
	state: Mutex<IncomingState>,
}

struct IncomingState {
	next: u64,
	max: u64,
}

impl IncomingRequestIds {
	pub fn new(initial: u64, max: u64) -> Self {
		Self {
			state: Mutex::new(IncomingState { next: initial, max }),
		}
	}

	pub fn validate(&self, request_id: u64) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();

		if request_id != state.next {
			return Err(SessionError::InvalidRequestId);
		}
		if request_id >= state.max {
			return Err(SessionError::TooManyRequests);
		}

		state.next += 2;
		Ok(())
	}

	/// Extend the peer's budget, returning the new limit to advertise.
	pub fn grant(&self, additional: u64) -> u64 {
		let mut state = self.state.lock().unwrap();
		state.max += additional;
		state.max
	}

	/// The limit we currently advertise to the peer.
	pub fn limit(&self) -> u64 {
		self.state.lock().unwrap().max
	}
}

/// A monotonic counter, used for track aliases.
pub(super) struct Sequence {
	next: AtomicU64,
}

impl Sequence {
	pub fn new(initial: u64) -> Self {
		Self {
			next: AtomicU64::new(initial),
		}
	}

	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::Relaxed)
	}

	/// The next value that would be returned, without claiming it.
	pub fn peek(&self) -> u64 {
		self.next.load(Ordering::Relaxed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parity_and_step() {
		let ids = OutgoingRequestIds::new(1);
		ids.set_max(100);

		assert_eq!(ids.allocate().unwrap(), 1);
		assert_eq!(ids.allocate().unwrap(), 3);
		assert_eq!(ids.allocate().unwrap(), 5);

		assert!(ids.issued(3));
		assert!(!ids.issued(2));
		assert!(!ids.issued(7));
	}

	#[test]
	fn blocked_announced_once() {
		let ids = OutgoingRequestIds::new(0);
		ids.set_max(2);

		assert_eq!(ids.allocate().unwrap(), 0);

		let blocked = ids.allocate().unwrap_err();
		assert_eq!(blocked.limit, 2);
		assert!(blocked.announce);

		// Only the first failure per limit announces.
		let blocked = ids.allocate().unwrap_err();
		assert!(!blocked.announce);

		// Raising the limit re-arms the announcement.
		ids.set_max(4);
		assert_eq!(ids.allocate().unwrap(), 2);
		let blocked = ids.allocate().unwrap_err();
		assert_eq!(blocked.limit, 4);
		assert!(blocked.announce);
	}

	#[test]
	fn lower_max_ignored() {
		let ids = OutgoingRequestIds::new(0);
		ids.set_max(10);
		ids.set_max(4);

		for expect in [0, 2, 4, 6, 8] {
			assert_eq!(ids.allocate().unwrap(), expect);
		}
		assert!(ids.allocate().is_err());
	}

	#[test]
	fn incoming_sequence() {
		let ids = IncomingRequestIds::new(1, 100);

		ids.validate(1).unwrap();
		ids.validate(3).unwrap();

		// Out of order, wrong parity, or replayed IDs are rejected.
		assert!(matches!(ids.validate(3), Err(SessionError::InvalidRequestId)));
		assert!(matches!(ids.validate(4), Err(SessionError::InvalidRequestId)));
		ids.validate(5).unwrap();
	}

	#[test]
	fn incoming_limit() {
		let ids = IncomingRequestIds::new(0, 2);

		ids.validate(0).unwrap();
		assert!(matches!(ids.validate(2), Err(SessionError::TooManyRequests)));

		ids.grant(2);
		ids.validate(2).unwrap();
	}
}

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::SessionError;

/// Pending solicited requests of one family, keyed by request ID.
///
/// Each entry owns a one-shot result slot; the caller holds the receiver.
pub(super) struct RequestMap<T> {
	state: Mutex<State<T>>,
}

struct State<T> {
	entries: HashMap<u64, oneshot::Sender<Result<T, SessionError>>>,
	closed: Option<SessionError>,
}

impl<T> Default for RequestMap<T> {
	fn default() -> Self {
		Self {
			state: Mutex::new(State {
				entries: HashMap::new(),
				closed: None,
			}),
		}
	}
}

impl<T> RequestMap<T> {
	pub fn insert(&self, request_id: u64) -> Result<oneshot::Receiver<Result<T, SessionError>>, SessionError> {
		let mut state = self.state.lock().unwrap();

		if let Some(err) = &state.closed {
			return Err(err.clone());
		}
		if state.entries.contains_key(&request_id) {
			return Err(SessionError::Duplicate);
		}

		let (tx, rx) = oneshot::channel();
		state.entries.insert(request_id, tx);

		Ok(rx)
	}

	/// Resolve a pending request; a missing entry is the peer's protocol violation.
	pub fn complete(&self, request_id: u64, result: Result<T, SessionError>) -> Result<(), SessionError> {
		let tx = self
			.state
			.lock()
			.unwrap()
			.entries
			.remove(&request_id)
			.ok_or(SessionError::ProtocolViolation("response for unknown request ID"))?;

		// The caller may have been dropped; the entry is gone either way.
		tx.send(result).ok();
		Ok(())
	}

	/// Resolve a pending request if there is one; a no-op otherwise.
	pub fn complete_maybe(&self, request_id: u64, result: Result<T, SessionError>) {
		if let Some(tx) = self.state.lock().unwrap().entries.remove(&request_id) {
			tx.send(result).ok();
		}
	}

	/// Fail every pending request with the given cause.
	pub fn close_all(&self, err: SessionError) {
		let mut state = self.state.lock().unwrap();

		if state.closed.is_none() {
			state.closed = Some(err.clone());
		}

		for (_, tx) in state.entries.drain() {
			tx.send(Err(err.clone())).ok();
		}
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.state.lock().unwrap().entries.len()
	}
}

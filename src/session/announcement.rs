use std::collections::HashMap;
use std::sync::Mutex;

use crate::coding::Tuple;
use crate::error::SessionError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum AnnouncementState {
	Pending,
	Accepted,
}

struct Announcement {
	request_id: u64,
	state: AnnouncementState,
}

/// Announced namespaces, keyed by namespace tuple.
///
/// One instance tracks our announcements, another the peer's.
#[derive(Default)]
pub(super) struct AnnouncementMap {
	state: Mutex<HashMap<Tuple, Announcement>>,
}

impl AnnouncementMap {
	pub fn insert_pending(&self, namespace: Tuple, request_id: u64) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();

		if state.contains_key(&namespace) {
			return Err(SessionError::Duplicate);
		}

		state.insert(
			namespace,
			Announcement {
				request_id,
				state: AnnouncementState::Pending,
			},
		);

		Ok(())
	}

	/// Mark a pending announcement accepted, returning its namespace.
	pub fn accept(&self, request_id: u64) -> Option<Tuple> {
		let mut state = self.state.lock().unwrap();

		for (namespace, entry) in state.iter_mut() {
			if entry.request_id == request_id && entry.state == AnnouncementState::Pending {
				entry.state = AnnouncementState::Accepted;
				return Some(namespace.clone());
			}
		}

		None
	}

	/// Remove a pending announcement, returning its namespace.
	pub fn reject(&self, request_id: u64) -> Option<Tuple> {
		let mut state = self.state.lock().unwrap();

		let namespace = state
			.iter()
			.find(|(_, entry)| entry.request_id == request_id && entry.state == AnnouncementState::Pending)
			.map(|(namespace, _)| namespace.clone())?;

		state.remove(&namespace);
		Some(namespace)
	}

	/// Remove an announcement in any state.
	pub fn remove(&self, namespace: &Tuple) -> bool {
		self.state.lock().unwrap().remove(namespace).is_some()
	}

	pub fn contains(&self, namespace: &Tuple) -> bool {
		self.state.lock().unwrap().contains_key(namespace)
	}

	pub fn clear(&self) {
		self.state.lock().unwrap().clear();
	}
}

/// Announce-subscription prefixes, keyed by request ID.
#[derive(Default)]
pub(super) struct AnnouncementSubscriptionMap {
	state: Mutex<HashMap<u64, Tuple>>,
}

impl AnnouncementSubscriptionMap {
	pub fn insert(&self, request_id: u64, prefix: Tuple) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();

		if state.values().any(|existing| *existing == prefix) {
			return Err(SessionError::Duplicate);
		}

		state.insert(request_id, prefix);
		Ok(())
	}

	pub fn contains(&self, request_id: u64) -> bool {
		self.state.lock().unwrap().contains_key(&request_id)
	}

	pub fn remove(&self, request_id: u64) -> Option<Tuple> {
		self.state.lock().unwrap().remove(&request_id)
	}

	/// Remove by prefix, returning the request ID it was registered under.
	pub fn remove_prefix(&self, prefix: &Tuple) -> Option<u64> {
		let mut state = self.state.lock().unwrap();

		let request_id = state
			.iter()
			.find(|(_, existing)| *existing == prefix)
			.map(|(request_id, _)| *request_id)?;

		state.remove(&request_id);
		Some(request_id)
	}

	pub fn clear(&self) {
		self.state.lock().unwrap().clear();
	}
}

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::data::Object;
use crate::error::SessionError;

use super::Session;

/// A track the local endpoint subscribed to or fetched from the peer.
///
/// Returned once the peer accepts the request. Objects already received for
/// the track before the acceptance arrived are waiting in the channel.
pub struct RemoteTrack {
	session: Session,
	request_id: u64,
	track_alias: Option<u64>,
	objects: mpsc::UnboundedReceiver<Object>,
}

impl std::fmt::Debug for RemoteTrack {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RemoteTrack")
			.field("request_id", &self.request_id)
			.field("track_alias", &self.track_alias)
			.finish()
	}
}

impl RemoteTrack {
	pub(super) fn new(
		session: Session,
		request_id: u64,
		track_alias: Option<u64>,
		objects: mpsc::UnboundedReceiver<Object>,
	) -> Self {
		Self {
			session,
			request_id,
			track_alias,
			objects,
		}
	}

	pub fn request_id(&self) -> u64 {
		self.request_id
	}

	/// The alias carried in object headers; `None` for fetches.
	pub fn track_alias(&self) -> Option<u64> {
		self.track_alias
	}

	/// The next object, or `None` once the track is done.
	pub async fn next(&mut self) -> Option<Object> {
		self.objects.recv().await
	}

	/// Stop receiving: sends UNSUBSCRIBE (or FETCH_CANCEL for a fetch).
	pub fn close(self) {
		match self.track_alias {
			Some(_) => self.session.unsubscribe(self.request_id).ok(),
			None => self.session.fetch_cancel(self.request_id).ok(),
		};
	}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RemoteTrackState {
	Requested,
	Active,
}

struct RemoteEntry {
	state: RemoteTrackState,
	track_alias: Option<u64>,
	sender: mpsc::UnboundedSender<Object>,

	// Held until the peer accepts, then handed to the caller.
	handle: Option<RemoteTrack>,
}

/// Tracks requested from the peer, keyed by our request ID with a track-alias
/// index for the object hot path.
#[derive(Default)]
pub(super) struct RemoteTrackMap {
	state: Mutex<State>,
}

#[derive(Default)]
struct State {
	entries: HashMap<u64, RemoteEntry>,
	aliases: HashMap<u64, u64>,
}

impl RemoteTrackMap {
	/// Register a requested track before the message is sent.
	pub fn insert(&self, request_id: u64, handle: RemoteTrack, sender: mpsc::UnboundedSender<Object>) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();

		if state.entries.contains_key(&request_id) {
			return Err(SessionError::Duplicate);
		}

		let track_alias = handle.track_alias;
		if let Some(alias) = track_alias {
			if state.aliases.contains_key(&alias) {
				return Err(SessionError::DuplicateTrackAlias);
			}
			state.aliases.insert(alias, request_id);
		}

		let entry = RemoteEntry {
			state: RemoteTrackState::Requested,
			track_alias,
			sender,
			handle: Some(handle),
		};

		state.entries.insert(request_id, entry);
		Ok(())
	}

	/// Activate a requested track, returning the caller's handle.
	///
	/// A second activation for the same ID is the peer's protocol violation.
	pub fn promote(&self, request_id: u64) -> Result<RemoteTrack, SessionError> {
		let mut state = self.state.lock().unwrap();

		let entry = state
			.entries
			.get_mut(&request_id)
			.filter(|entry| entry.state == RemoteTrackState::Requested)
			.ok_or(SessionError::ProtocolViolation("response for unknown request ID"))?;

		entry.state = RemoteTrackState::Active;
		entry
			.handle
			.take()
			.ok_or(SessionError::ProtocolViolation("response for unknown request ID"))
	}

	/// Finish a track: the entry is removed and its channel closed.
	pub fn complete(&self, request_id: u64) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();

		let entry = state
			.entries
			.remove(&request_id)
			.ok_or(SessionError::ProtocolViolation("response for unknown request ID"))?;

		if let Some(alias) = entry.track_alias {
			state.aliases.remove(&alias);
		}

		Ok(())
	}

	/// Remove a track at the caller's initiative; lenient about unknown IDs.
	pub fn remove(&self, request_id: u64) -> bool {
		let mut state = self.state.lock().unwrap();

		match state.entries.remove(&request_id) {
			Some(entry) => {
				if let Some(alias) = entry.track_alias {
					state.aliases.remove(&alias);
				}
				true
			}
			None => false,
		}
	}

	/// Deliver an object by track alias, returning false if the track is gone.
	pub fn push_by_alias(&self, track_alias: u64, object: Object) -> bool {
		let state = self.state.lock().unwrap();

		let Some(request_id) = state.aliases.get(&track_alias) else {
			return false;
		};

		// The receiver may already be dropped; the stream keeps draining.
		state.entries[request_id].sender.send(object).ok();
		true
	}

	/// Deliver an object by request ID (fetches), returning false if gone.
	pub fn push_by_request(&self, request_id: u64, object: Object) -> bool {
		let state = self.state.lock().unwrap();

		match state.entries.get(&request_id) {
			Some(entry) => {
				entry.sender.send(object).ok();
				true
			}
			None => false,
		}
	}

	pub fn contains_alias(&self, track_alias: u64) -> bool {
		self.state.lock().unwrap().aliases.contains_key(&track_alias)
	}

	pub fn contains(&self, request_id: u64) -> bool {
		self.state.lock().unwrap().entries.contains_key(&request_id)
	}

	pub fn clear(&self) {
		let mut state = self.state.lock().unwrap();
		state.entries.clear();
		state.aliases.clear();
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.state.lock().unwrap().entries.len()
	}
}

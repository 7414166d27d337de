use std::collections::{hash_map, HashMap};
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::coding::Tuple;
use crate::data::Object;
use crate::error::SessionError;
use crate::message::{GroupOrder, Location};

/// The engine half of a published track, registered with
/// [`Session::add_local_track`](super::Session::add_local_track) before a
/// subscription may be accepted.
///
/// The object scheduler that drains `objects` and maps them onto data streams
/// lives outside the session engine.
pub struct LocalTrack {
	pub(crate) objects: mpsc::UnboundedReceiver<Object>,
}

impl LocalTrack {
	pub fn produce() -> (LocalTrackWriter, LocalTrack) {
		let (send, recv) = mpsc::unbounded_channel();

		let writer = LocalTrackWriter { objects: send };
		let track = LocalTrack { objects: recv };

		(writer, track)
	}

	/// The next object submitted by the application, or `None` once the
	/// writer is gone.
	pub async fn next(&mut self) -> Option<Object> {
		self.objects.recv().await
	}
}

/// The application half of a published track: where objects are submitted.
#[derive(Clone)]
pub struct LocalTrackWriter {
	objects: mpsc::UnboundedSender<Object>,
}

impl LocalTrackWriter {
	/// Submit an object for delivery; fails once the subscription is gone.
	pub fn write(&self, object: Object) -> Result<(), SessionError> {
		self.objects.send(object).map_err(|_| SessionError::Closed)
	}
}

/// What an inbound SUBSCRIBE or FETCH asked for, for the application to
/// inspect before accepting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionInfo {
	pub track_alias: u64,
	pub namespace: Tuple,
	pub name: String,
	pub subscriber_priority: u8,
	pub group_order: GroupOrder,
	pub filter_type: u64,
	pub start: Location,
	pub end_group: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum LocalTrackKind {
	Subscribe,
	Fetch,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum LocalTrackState {
	Pending,
	Active,
}

/// A subscription or fetch served by the local endpoint.
pub(super) struct LocalEntry {
	pub kind: LocalTrackKind,
	pub state: LocalTrackState,

	pub request_id: u64,

	/// Chosen by the subscriber for subscriptions; zero for fetches.
	pub track_alias: u64,

	pub namespace: Tuple,
	pub name: String,

	pub subscriber_priority: u8,
	pub group_order: GroupOrder,
	pub filter_type: u64,
	pub start: Location,
	pub end_group: u64,

	pub track: Option<LocalTrack>,
}

/// Tracks published by the local endpoint, keyed by the peer's request ID.
#[derive(Default)]
pub(super) struct LocalTrackMap {
	state: Mutex<HashMap<u64, LocalEntry>>,
}

impl LocalTrackMap {
	pub fn insert(&self, entry: LocalEntry) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();

		// A track alias must be unique across the session's subscriptions.
		if entry.kind == LocalTrackKind::Subscribe
			&& state
				.values()
				.any(|existing| existing.kind == LocalTrackKind::Subscribe && existing.track_alias == entry.track_alias)
		{
			return Err(SessionError::DuplicateTrackAlias);
		}

		if state.insert(entry.request_id, entry).is_some() {
			return Err(SessionError::Duplicate);
		}

		Ok(())
	}

	pub fn set_track(&self, request_id: u64, track: LocalTrack) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();
		let entry = state.get_mut(&request_id).ok_or(SessionError::NotFound)?;

		entry.track = Some(track);
		Ok(())
	}

	/// Activate a pending subscription; requires a registered track.
	///
	/// Returns the group order requested by the subscriber, so the acceptance
	/// can honor it.
	pub fn accept(&self, request_id: u64) -> Result<GroupOrder, SessionError> {
		let mut state = self.state.lock().unwrap();
		let entry = state.get_mut(&request_id).ok_or(SessionError::NotFound)?;

		if entry.kind != LocalTrackKind::Subscribe || entry.state != LocalTrackState::Pending {
			return Err(SessionError::NotFound);
		}
		if entry.track.is_none() {
			return Err(SessionError::NotFound);
		}

		entry.state = LocalTrackState::Active;
		Ok(entry.group_order)
	}

	/// Drop a pending subscription, returning the alias to echo in the error.
	pub fn reject(&self, request_id: u64) -> Result<u64, SessionError> {
		let mut state = self.state.lock().unwrap();

		match state.entry(request_id) {
			hash_map::Entry::Occupied(entry)
				if entry.get().kind == LocalTrackKind::Subscribe && entry.get().state == LocalTrackState::Pending =>
			{
				Ok(entry.remove().track_alias)
			}
			_ => Err(SessionError::NotFound),
		}
	}

	/// Activate a pending fetch.
	pub fn accept_fetch(&self, request_id: u64) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();
		let entry = state.get_mut(&request_id).ok_or(SessionError::NotFound)?;

		if entry.kind != LocalTrackKind::Fetch || entry.state != LocalTrackState::Pending {
			return Err(SessionError::NotFound);
		}

		entry.state = LocalTrackState::Active;
		Ok(())
	}

	/// Drop a pending fetch.
	pub fn reject_fetch(&self, request_id: u64) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();

		match state.entry(request_id) {
			hash_map::Entry::Occupied(entry)
				if entry.get().kind == LocalTrackKind::Fetch && entry.get().state == LocalTrackState::Pending =>
			{
				entry.remove();
				Ok(())
			}
			_ => Err(SessionError::NotFound),
		}
	}

	/// Apply a SUBSCRIBE_UPDATE to an existing subscription.
	pub fn update(&self, request_id: u64, start: Location, end_group: u64, priority: u8) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();
		let entry = state
			.get_mut(&request_id)
			.filter(|entry| entry.kind == LocalTrackKind::Subscribe)
			.ok_or(SessionError::ProtocolViolation("update for unknown subscription"))?;

		entry.start = start;
		entry.end_group = end_group;
		entry.subscriber_priority = priority;

		Ok(())
	}

	/// End an active subscription from the publisher's side.
	pub fn finish(&self, request_id: u64) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();

		match state.get(&request_id) {
			Some(entry) if entry.kind == LocalTrackKind::Subscribe && entry.state == LocalTrackState::Active => {}
			_ => return Err(SessionError::NotFound),
		}

		state.remove(&request_id);
		Ok(())
	}

	pub fn remove(&self, request_id: u64) -> Option<LocalEntry> {
		self.state.lock().unwrap().remove(&request_id)
	}

	/// The identity of a subscription, used to resolve joining fetches.
	pub fn identity(&self, request_id: u64) -> Option<(Tuple, String)> {
		let state = self.state.lock().unwrap();
		state
			.get(&request_id)
			.map(|entry| (entry.namespace.clone(), entry.name.clone()))
	}

	pub fn info(&self, request_id: u64) -> Option<SubscriptionInfo> {
		let state = self.state.lock().unwrap();
		state.get(&request_id).map(|entry| SubscriptionInfo {
			track_alias: entry.track_alias,
			namespace: entry.namespace.clone(),
			name: entry.name.clone(),
			subscriber_priority: entry.subscriber_priority,
			group_order: entry.group_order,
			filter_type: entry.filter_type,
			start: entry.start,
			end_group: entry.end_group,
		})
	}

	pub fn clear(&self) {
		self.state.lock().unwrap().clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn produce() {
		let (writer, mut track) = LocalTrack::produce();

		writer.write(Object::default()).unwrap();
		assert!(track.next().await.is_some());

		drop(writer);
		assert!(track.next().await.is_none());
	}
}

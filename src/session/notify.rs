use crate::coding::Tuple;
use crate::message::Location;

/// A peer request or notification surfaced on the application queue.
///
/// Requests (Subscribe, Announce, Fetch, ...) stay pending until the
/// application calls the matching accept or reject operation on the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionMessage {
	/// The peer wants to subscribe to a track we publish.
	Subscribe {
		request_id: u64,
		track_alias: u64,
		namespace: Tuple,
		track: String,
		authorization: String,
	},

	/// The peer announced a namespace.
	Announce { request_id: u64, namespace: Tuple },

	/// The peer wants announcements under a prefix.
	SubscribeAnnounces { request_id: u64, namespace_prefix: Tuple },

	/// The peer wants a past range of a track we publish.
	Fetch {
		request_id: u64,
		namespace: Tuple,
		track: String,
	},

	/// The peer asks about the status of a track.
	TrackStatusRequest {
		request_id: u64,
		namespace: Tuple,
		track: String,
	},

	/// The peer narrowed one of its subscriptions.
	SubscribeUpdate {
		request_id: u64,
		start: Location,
		end_group: u64,
		subscriber_priority: u8,
	},

	/// The peer ended one of its subscriptions.
	Unsubscribe { request_id: u64 },

	/// The peer withdrew an announcement.
	Unannounce { namespace: Tuple },

	/// The peer revoked its interest in a prefix.
	UnsubscribeAnnounces { namespace_prefix: Tuple },

	/// The peer revoked an announcement it had accepted.
	AnnounceCancel {
		namespace: Tuple,
		error_code: u64,
		reason: String,
	},

	/// The peer abandoned one of its fetches.
	FetchCancel { request_id: u64 },

	/// The peer asks us to reconnect.
	GoAway { new_session_uri: String },
}

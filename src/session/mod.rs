mod announcement;
mod control;
mod local_track;
mod notify;
mod remote_track;
mod request_id;
mod requests;

pub use local_track::{LocalTrack, LocalTrackWriter, SubscriptionInfo};
pub use notify::SessionMessage;
pub use remote_track::RemoteTrack;

pub(crate) use control::{run_recv, run_send};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use announcement::{AnnouncementMap, AnnouncementSubscriptionMap};
use local_track::{LocalEntry, LocalTrackKind, LocalTrackState};
use remote_track::RemoteTrackMap;
use request_id::{IncomingRequestIds, OutgoingRequestIds, Sequence};
use requests::RequestMap;

use crate::coding::{
	Decode, Params, Tuple, AUTHORIZATION_TOKEN_PARAMETER, MAX_REQUEST_ID_PARAMETER, PATH_PARAMETER,
};
use crate::data::{Datagram, Header, ObjectStream};
use crate::error::SessionError;
use crate::message::{
	Announce, ClientSetup, FetchInfo, GoAway, GroupOrder, Location, MaxRequestId, Message, RequestsBlocked,
	ServerSetup, Subscribe, SubscribeDone, SubscribeError, SubscribeOk, SubscribeUpdate, TrackStatus,
	TrackStatusRequest, Unsubscribe,
};
use crate::message::{
	AnnounceError, AnnounceOk, Fetch, FetchCancel, FetchError, FetchOk, SubscribeAnnounces,
	SubscribeAnnouncesError, SubscribeAnnouncesOk, Unannounce, UnsubscribeAnnounces,
};
use crate::setup::Version;
use crate::transport::{Perspective, Protocol};
use crate::util::Queue;

/// Configuration for a session.
#[derive(Clone, Debug)]
pub struct Config {
	/// The path sent in the PATH setup parameter; native QUIC clients only.
	pub path: String,

	/// How many request IDs we grant the peer, advertised during setup.
	pub max_request_id: u64,

	/// Capacity of the application message queue.
	pub message_capacity: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			path: "/".to_string(),
			max_request_id: 100,
			message_capacity: 32,
		}
	}
}

#[derive(Clone)]
enum Handshake {
	Pending,
	Done,
	Failed(SessionError),
}

struct State {
	version: Option<Version>,
	path: String,
	closed: Option<SessionError>,
}

/// The session state machine.
///
/// All state is shared: clones are cheap handles onto the same session, so
/// the control loops and any number of application tasks can drive it
/// concurrently. Inbound control messages enter through [`receive`], outbound
/// ones leave through [`next_control_message`]; everything in between is
/// bookkeeping.
///
/// [`receive`]: Session::receive
/// [`next_control_message`]: Session::next_control_message
#[derive(Clone)]
pub struct Session {
	perspective: Perspective,
	protocol: Protocol,

	state: Arc<Mutex<State>>,
	handshake: Arc<watch::Sender<Handshake>>,

	outgoing: Queue<Message, SessionError>,
	messages: mpsc::Sender<SessionMessage>,

	request_ids: Arc<OutgoingRequestIds>,
	incoming_request_ids: Arc<IncomingRequestIds>,
	track_aliases: Arc<Sequence>,

	// One pending map per request family.
	subscribes: Arc<RequestMap<RemoteTrack>>,
	fetches: Arc<RequestMap<RemoteTrack>>,
	announces: Arc<RequestMap<()>>,
	announce_subscriptions: Arc<RequestMap<()>>,
	track_statuses: Arc<RequestMap<TrackStatus>>,

	outgoing_announcements: Arc<AnnouncementMap>,
	incoming_announcements: Arc<AnnouncementMap>,
	outgoing_announcement_subscriptions: Arc<AnnouncementSubscriptionMap>,
	incoming_announcement_subscriptions: Arc<AnnouncementSubscriptionMap>,

	local_tracks: Arc<local_track::LocalTrackMap>,
	remote_tracks: Arc<RemoteTrackMap>,
	incoming_track_statuses: Arc<Mutex<HashMap<u64, (Tuple, String)>>>,
}

impl Session {
	/// Create a session; a client immediately queues its CLIENT_SETUP.
	///
	/// The returned receiver is the application queue: peer requests and
	/// notifications surface there and stay pending until accepted or
	/// rejected.
	pub fn new(
		perspective: Perspective,
		protocol: Protocol,
		config: Config,
	) -> (Self, mpsc::Receiver<SessionMessage>) {
		let (messages, recv) = mpsc::channel(config.message_capacity.max(1));
		let (handshake, _) = watch::channel(Handshake::Pending);

		let session = Self {
			perspective,
			protocol,
			state: Arc::new(Mutex::new(State {
				version: None,
				path: config.path,
				closed: None,
			})),
			handshake: Arc::new(handshake),
			outgoing: Default::default(),
			messages,
			request_ids: Arc::new(OutgoingRequestIds::new(perspective.request_id_parity())),
			incoming_request_ids: Arc::new(IncomingRequestIds::new(
				perspective.peer().request_id_parity(),
				config.max_request_id,
			)),
			track_aliases: Arc::new(Sequence::new(0)),
			subscribes: Default::default(),
			fetches: Default::default(),
			announces: Default::default(),
			announce_subscriptions: Default::default(),
			track_statuses: Default::default(),
			outgoing_announcements: Default::default(),
			incoming_announcements: Default::default(),
			outgoing_announcement_subscriptions: Default::default(),
			incoming_announcement_subscriptions: Default::default(),
			local_tracks: Default::default(),
			remote_tracks: Default::default(),
			incoming_track_statuses: Default::default(),
		};

		if perspective == Perspective::Client {
			session.send_client_setup();
		}

		(session, recv)
	}

	pub fn perspective(&self) -> Perspective {
		self.perspective
	}

	pub fn protocol(&self) -> Protocol {
		self.protocol
	}

	/// The negotiated version, once the handshake completed.
	pub fn version(&self) -> Option<Version> {
		self.state.lock().unwrap().version
	}

	/// The application path: configured on the client, learned from the
	/// PATH parameter on a native QUIC server.
	pub fn path(&self) -> String {
		self.state.lock().unwrap().path.clone()
	}

	pub fn closed(&self) -> Option<SessionError> {
		self.state.lock().unwrap().closed.clone()
	}

	/// The next message to write to the control stream; used by the send loop.
	pub async fn next_control_message(&self) -> Result<Message, SessionError> {
		self.outgoing.pop().await
	}

	fn send_client_setup(&self) {
		let mut params = Params::new();
		params.set_varint(MAX_REQUEST_ID_PARAMETER, self.incoming_request_ids.limit());

		if self.protocol == Protocol::Quic {
			let path = self.path();
			params.set_bytes(PATH_PARAMETER, path.into_bytes());
		}

		let setup = ClientSetup {
			versions: Version::supported(),
			params,
		};

		self.outgoing.push(setup.into()).ok();
	}

	fn handshake_complete(&self) -> bool {
		matches!(*self.handshake.borrow(), Handshake::Done)
	}

	async fn wait_handshake(&self) -> Result<(), SessionError> {
		let mut status = self.handshake.subscribe();

		let status = status
			.wait_for(|status| !matches!(status, Handshake::Pending))
			.await
			.map_err(|_| SessionError::Closed)?;

		match &*status {
			Handshake::Done => Ok(()),
			Handshake::Failed(err) => Err(err.clone()),
			Handshake::Pending => Err(SessionError::Closed),
		}
	}

	async fn deliver(&self, msg: SessionMessage) -> Result<(), SessionError> {
		self.messages.send(msg).await.map_err(|_| SessionError::Closed)
	}

	/// Process one control message from the peer.
	///
	/// An error return is fatal: the caller tears down the session with it.
	pub async fn receive(&self, msg: Message) -> Result<(), SessionError> {
		log::debug!("received message: {:?}", msg);

		if !self.handshake_complete() {
			return match msg {
				Message::ClientSetup(msg) => self.recv_client_setup(msg),
				Message::ServerSetup(msg) => self.recv_server_setup(msg),
				_ => Err(SessionError::ProtocolViolation("message before setup")),
			};
		}

		match msg {
			Message::ClientSetup(_) | Message::ServerSetup(_) => {
				Err(SessionError::ProtocolViolation("setup after handshake"))
			}

			// Requests initiated by the peer.
			Message::Subscribe(msg) => self.recv_subscribe(msg).await,
			Message::Announce(msg) => self.recv_announce(msg).await,
			Message::SubscribeAnnounces(msg) => self.recv_subscribe_announces(msg).await,
			Message::Fetch(msg) => self.recv_fetch(msg).await,
			Message::TrackStatusRequest(msg) => self.recv_track_status_request(msg).await,

			// Updates to requests initiated by the peer.
			Message::SubscribeUpdate(msg) => self.recv_subscribe_update(msg).await,
			Message::Unsubscribe(msg) => self.recv_unsubscribe(msg).await,
			Message::Unannounce(msg) => self.recv_unannounce(msg).await,
			Message::UnsubscribeAnnounces(msg) => self.recv_unsubscribe_announces(msg).await,
			Message::AnnounceCancel(msg) => self.recv_announce_cancel(msg).await,
			Message::FetchCancel(msg) => self.recv_fetch_cancel(msg).await,

			// Responses to requests initiated by us.
			Message::SubscribeOk(msg) => self.recv_subscribe_ok(msg),
			Message::SubscribeError(msg) => self.recv_subscribe_error(msg),
			Message::SubscribeDone(msg) => self.recv_subscribe_done(msg),
			Message::AnnounceOk(msg) => self.recv_announce_ok(msg),
			Message::AnnounceError(msg) => self.recv_announce_error(msg),
			Message::SubscribeAnnouncesOk(msg) => self.recv_subscribe_announces_ok(msg),
			Message::SubscribeAnnouncesError(msg) => self.recv_subscribe_announces_error(msg),
			Message::FetchOk(msg) => self.recv_fetch_ok(msg),
			Message::FetchError(msg) => self.recv_fetch_error(msg),
			Message::TrackStatus(msg) => self.recv_track_status(msg),

			// Session-level messages.
			Message::MaxRequestId(msg) => self.recv_max_request_id(msg),
			Message::RequestsBlocked(msg) => self.recv_requests_blocked(msg),
			Message::GoAway(msg) => self.recv_go_away(msg).await,
		}
	}

	fn recv_client_setup(&self, msg: ClientSetup) -> Result<(), SessionError> {
		if self.perspective != Perspective::Server {
			return Err(SessionError::ProtocolViolation("CLIENT_SETUP at the client"));
		}

		// Select the highest version the client offered that we also speak.
		let supported = Version::supported();
		let version = msg
			.versions
			.iter()
			.copied()
			.filter(|version| supported.contains(version))
			.max()
			.ok_or(SessionError::Version(msg.versions.clone(), supported))?;

		match self.protocol {
			Protocol::Quic => {
				let path = msg
					.params
					.bytes(PATH_PARAMETER)
					.ok_or(SessionError::ProtocolViolation("missing PATH parameter"))?;
				let path = String::from_utf8(path.to_vec())
					.map_err(|_| SessionError::ProtocolViolation("invalid PATH parameter"))?;

				self.state.lock().unwrap().path = path;
			}
			Protocol::WebTransport => {
				if msg.params.contains(PATH_PARAMETER) {
					return Err(SessionError::ProtocolViolation("PATH parameter over WebTransport"));
				}
			}
		}

		if let Some(max) = msg.params.varint(MAX_REQUEST_ID_PARAMETER) {
			self.request_ids.set_max(max);
		}

		let mut params = Params::new();
		params.set_varint(MAX_REQUEST_ID_PARAMETER, self.incoming_request_ids.limit());

		self.state.lock().unwrap().version = Some(version);
		self.outgoing.push(ServerSetup { version, params }.into())?;
		self.handshake.send_replace(Handshake::Done);

		Ok(())
	}

	fn recv_server_setup(&self, msg: ServerSetup) -> Result<(), SessionError> {
		if self.perspective != Perspective::Client {
			return Err(SessionError::ProtocolViolation("SERVER_SETUP at the server"));
		}

		let supported = Version::supported();
		if !supported.contains(&msg.version) {
			return Err(SessionError::Version([msg.version].into(), supported));
		}

		if msg.params.contains(PATH_PARAMETER) {
			return Err(SessionError::ProtocolViolation("PATH parameter in SERVER_SETUP"));
		}

		if let Some(max) = msg.params.varint(MAX_REQUEST_ID_PARAMETER) {
			self.request_ids.set_max(max);
		}

		self.state.lock().unwrap().version = Some(msg.version);
		self.handshake.send_replace(Handshake::Done);

		Ok(())
	}

	async fn recv_subscribe(&self, msg: Subscribe) -> Result<(), SessionError> {
		self.incoming_request_ids.validate(msg.request_id)?;

		let authorization = msg
			.params
			.bytes(AUTHORIZATION_TOKEN_PARAMETER)
			.map(|token| String::from_utf8_lossy(token).to_string())
			.unwrap_or_default();

		self.local_tracks.insert(LocalEntry {
			kind: LocalTrackKind::Subscribe,
			state: LocalTrackState::Pending,
			request_id: msg.request_id,
			track_alias: msg.track_alias,
			namespace: msg.namespace.clone(),
			name: msg.name.clone(),
			subscriber_priority: msg.subscriber_priority,
			group_order: msg.group_order,
			filter_type: msg.filter_type,
			start: msg.start,
			end_group: msg.end_group,
			track: None,
		})?;

		self.deliver(SessionMessage::Subscribe {
			request_id: msg.request_id,
			track_alias: msg.track_alias,
			namespace: msg.namespace,
			track: msg.name,
			authorization,
		})
		.await
	}

	async fn recv_announce(&self, msg: Announce) -> Result<(), SessionError> {
		self.incoming_request_ids.validate(msg.request_id)?;

		self.incoming_announcements
			.insert_pending(msg.namespace.clone(), msg.request_id)
			.map_err(|_| SessionError::ProtocolViolation("duplicate announced namespace"))?;

		self.deliver(SessionMessage::Announce {
			request_id: msg.request_id,
			namespace: msg.namespace,
		})
		.await
	}

	async fn recv_subscribe_announces(&self, msg: SubscribeAnnounces) -> Result<(), SessionError> {
		self.incoming_request_ids.validate(msg.request_id)?;

		self.incoming_announcement_subscriptions
			.insert(msg.request_id, msg.namespace_prefix.clone())
			.map_err(|_| SessionError::ProtocolViolation("duplicate announce subscription"))?;

		self.deliver(SessionMessage::SubscribeAnnounces {
			request_id: msg.request_id,
			namespace_prefix: msg.namespace_prefix,
		})
		.await
	}

	async fn recv_fetch(&self, msg: Fetch) -> Result<(), SessionError> {
		self.incoming_request_ids.validate(msg.request_id)?;

		let (namespace, name, start, end_group) = match msg.info {
			FetchInfo::Standalone {
				namespace,
				name,
				start,
				end,
			} => (namespace, name, start, end.group),
			FetchInfo::Joining { joining_request_id, .. } => {
				let (namespace, name) = self
					.local_tracks
					.identity(joining_request_id)
					.ok_or(SessionError::ProtocolViolation("fetch joins an unknown subscription"))?;
				(namespace, name, Location::default(), 0)
			}
		};

		self.local_tracks.insert(LocalEntry {
			kind: LocalTrackKind::Fetch,
			state: LocalTrackState::Pending,
			request_id: msg.request_id,
			track_alias: 0,
			namespace: namespace.clone(),
			name: name.clone(),
			subscriber_priority: msg.subscriber_priority,
			group_order: msg.group_order,
			filter_type: 0,
			start,
			end_group,
			track: None,
		})?;

		self.deliver(SessionMessage::Fetch {
			request_id: msg.request_id,
			namespace,
			track: name,
		})
		.await
	}

	async fn recv_track_status_request(&self, msg: TrackStatusRequest) -> Result<(), SessionError> {
		self.incoming_request_ids.validate(msg.request_id)?;

		self.incoming_track_statuses
			.lock()
			.unwrap()
			.insert(msg.request_id, (msg.namespace.clone(), msg.name.clone()));

		self.deliver(SessionMessage::TrackStatusRequest {
			request_id: msg.request_id,
			namespace: msg.namespace,
			track: msg.name,
		})
		.await
	}

	async fn recv_subscribe_update(&self, msg: SubscribeUpdate) -> Result<(), SessionError> {
		self.local_tracks
			.update(msg.request_id, msg.start, msg.end_group, msg.subscriber_priority)?;

		self.deliver(SessionMessage::SubscribeUpdate {
			request_id: msg.request_id,
			start: msg.start,
			end_group: msg.end_group,
			subscriber_priority: msg.subscriber_priority,
		})
		.await
	}

	async fn recv_unsubscribe(&self, msg: Unsubscribe) -> Result<(), SessionError> {
		// The subscription may have ended on our side already.
		if self.local_tracks.remove(msg.request_id).is_none() {
			return Ok(());
		}

		self.deliver(SessionMessage::Unsubscribe {
			request_id: msg.request_id,
		})
		.await
	}

	async fn recv_unannounce(&self, msg: Unannounce) -> Result<(), SessionError> {
		if !self.incoming_announcements.remove(&msg.namespace) {
			return Ok(());
		}

		self.deliver(SessionMessage::Unannounce {
			namespace: msg.namespace,
		})
		.await
	}

	async fn recv_unsubscribe_announces(&self, msg: UnsubscribeAnnounces) -> Result<(), SessionError> {
		if self
			.incoming_announcement_subscriptions
			.remove_prefix(&msg.namespace_prefix)
			.is_none()
		{
			return Ok(());
		}

		self.deliver(SessionMessage::UnsubscribeAnnounces {
			namespace_prefix: msg.namespace_prefix,
		})
		.await
	}

	async fn recv_announce_cancel(&self, msg: crate::message::AnnounceCancel) -> Result<(), SessionError> {
		if !self.outgoing_announcements.remove(&msg.namespace) {
			return Ok(());
		}

		self.deliver(SessionMessage::AnnounceCancel {
			namespace: msg.namespace,
			error_code: msg.error_code,
			reason: msg.reason,
		})
		.await
	}

	async fn recv_fetch_cancel(&self, msg: FetchCancel) -> Result<(), SessionError> {
		if self.local_tracks.remove(msg.request_id).is_none() {
			return Ok(());
		}

		self.deliver(SessionMessage::FetchCancel {
			request_id: msg.request_id,
		})
		.await
	}

	fn recv_subscribe_ok(&self, msg: SubscribeOk) -> Result<(), SessionError> {
		let track = self.remote_tracks.promote(msg.request_id)?;
		if track.track_alias().is_none() {
			return Err(SessionError::ProtocolViolation("SUBSCRIBE_OK for a fetch"));
		}

		self.subscribes.complete(msg.request_id, Ok(track))
	}

	fn recv_subscribe_error(&self, msg: SubscribeError) -> Result<(), SessionError> {
		self.remote_tracks.complete(msg.request_id)?;
		self.subscribes.complete(
			msg.request_id,
			Err(SessionError::Rejected {
				code: msg.error_code,
				reason: msg.reason,
			}),
		)
	}

	fn recv_subscribe_done(&self, msg: SubscribeDone) -> Result<(), SessionError> {
		self.remote_tracks.complete(msg.request_id)?;

		// A DONE can still beat our pending OK; the waiter learns the outcome.
		self.subscribes.complete_maybe(
			msg.request_id,
			Err(SessionError::Rejected {
				code: msg.status_code,
				reason: msg.reason,
			}),
		);

		Ok(())
	}

	fn recv_announce_ok(&self, msg: AnnounceOk) -> Result<(), SessionError> {
		self.outgoing_announcements
			.accept(msg.request_id)
			.ok_or(SessionError::ProtocolViolation("response for unknown request ID"))?;

		self.announces.complete(msg.request_id, Ok(()))
	}

	fn recv_announce_error(&self, msg: AnnounceError) -> Result<(), SessionError> {
		self.outgoing_announcements
			.reject(msg.request_id)
			.ok_or(SessionError::ProtocolViolation("response for unknown request ID"))?;

		self.announces.complete(
			msg.request_id,
			Err(SessionError::Rejected {
				code: msg.error_code,
				reason: msg.reason,
			}),
		)
	}

	fn recv_subscribe_announces_ok(&self, msg: SubscribeAnnouncesOk) -> Result<(), SessionError> {
		if !self.outgoing_announcement_subscriptions.contains(msg.request_id) {
			return Err(SessionError::ProtocolViolation("response for unknown request ID"));
		}

		self.announce_subscriptions.complete(msg.request_id, Ok(()))
	}

	fn recv_subscribe_announces_error(&self, msg: SubscribeAnnouncesError) -> Result<(), SessionError> {
		self.outgoing_announcement_subscriptions
			.remove(msg.request_id)
			.ok_or(SessionError::ProtocolViolation("response for unknown request ID"))?;

		self.announce_subscriptions.complete(
			msg.request_id,
			Err(SessionError::Rejected {
				code: msg.error_code,
				reason: msg.reason,
			}),
		)
	}

	fn recv_fetch_ok(&self, msg: FetchOk) -> Result<(), SessionError> {
		let track = self.remote_tracks.promote(msg.request_id)?;
		if track.track_alias().is_some() {
			return Err(SessionError::ProtocolViolation("FETCH_OK for a subscription"));
		}

		self.fetches.complete(msg.request_id, Ok(track))
	}

	fn recv_fetch_error(&self, msg: FetchError) -> Result<(), SessionError> {
		self.remote_tracks.complete(msg.request_id)?;
		self.fetches.complete(
			msg.request_id,
			Err(SessionError::Rejected {
				code: msg.error_code,
				reason: msg.reason,
			}),
		)
	}

	fn recv_track_status(&self, msg: TrackStatus) -> Result<(), SessionError> {
		let request_id = msg.request_id;
		self.track_statuses.complete(request_id, Ok(msg))
	}

	fn recv_max_request_id(&self, msg: MaxRequestId) -> Result<(), SessionError> {
		// Raising the limit unblocks future requests; a lower value is ignored.
		self.request_ids.set_max(msg.request_id);
		Ok(())
	}

	fn recv_requests_blocked(&self, msg: RequestsBlocked) -> Result<(), SessionError> {
		// Informational; raising our grant is the application's call.
		log::debug!("peer blocked on request ID limit: {}", msg.max_request_id);
		Ok(())
	}

	async fn recv_go_away(&self, msg: GoAway) -> Result<(), SessionError> {
		if self.perspective == Perspective::Server && !msg.new_session_uri.is_empty() {
			return Err(SessionError::ProtocolViolation("GOAWAY with a session URI from the client"));
		}

		self.deliver(SessionMessage::GoAway {
			new_session_uri: msg.new_session_uri,
		})
		.await
	}

	fn next_request_id(&self) -> Result<u64, SessionError> {
		match self.request_ids.allocate() {
			Ok(id) => Ok(id),
			Err(blocked) => {
				// Exactly one REQUESTS_BLOCKED per limit.
				if blocked.announce {
					self.outgoing.push(
						RequestsBlocked {
							max_request_id: blocked.limit,
						}
						.into(),
					)?;
				}

				Err(SessionError::TooManyRequests)
			}
		}
	}

	/// Subscribe to a track, returning once the peer accepts.
	pub async fn subscribe(
		&self,
		namespace: Tuple,
		name: &str,
		authorization: &str,
	) -> Result<RemoteTrack, SessionError> {
		self.wait_handshake().await?;

		let request_id = self.next_request_id()?;
		let track_alias = self.track_aliases.next();

		let (send, recv) = mpsc::unbounded_channel();
		let track = RemoteTrack::new(self.clone(), request_id, Some(track_alias), recv);
		self.remote_tracks.insert(request_id, track, send)?;

		let pending = match self.subscribes.insert(request_id) {
			Ok(pending) => pending,
			Err(err) => {
				self.remote_tracks.remove(request_id);
				return Err(err);
			}
		};

		let mut params = Params::new();
		if !authorization.is_empty() {
			params.set_bytes(AUTHORIZATION_TOKEN_PARAMETER, authorization.as_bytes().to_vec());
		}

		let msg = Subscribe {
			request_id,
			track_alias,
			namespace,
			name: name.to_string(),
			subscriber_priority: 0,
			group_order: GroupOrder::Publisher,
			filter_type: 0,
			start: Location::default(),
			end_group: 0,
			params,
		};

		if let Err(err) = self.outgoing.push(msg.into()) {
			self.remote_tracks.remove(request_id);
			self.subscribes.complete_maybe(request_id, Err(err.clone()));
			return Err(err);
		}

		pending.await.map_err(|_| SessionError::Closed)?
	}

	/// Announce a namespace, returning once the peer accepts.
	pub async fn announce(&self, namespace: Tuple) -> Result<(), SessionError> {
		self.wait_handshake().await?;

		// Check before burning a request ID on a known duplicate.
		if self.outgoing_announcements.contains(&namespace) {
			return Err(SessionError::Duplicate);
		}

		let request_id = self.next_request_id()?;
		self.outgoing_announcements
			.insert_pending(namespace.clone(), request_id)?;

		let pending = match self.announces.insert(request_id) {
			Ok(pending) => pending,
			Err(err) => {
				self.outgoing_announcements.remove(&namespace);
				return Err(err);
			}
		};

		let msg = Announce {
			request_id,
			namespace: namespace.clone(),
			params: Default::default(),
		};

		if let Err(err) = self.outgoing.push(msg.into()) {
			self.outgoing_announcements.remove(&namespace);
			self.announces.complete_maybe(request_id, Err(err.clone()));
			return Err(err);
		}

		pending.await.map_err(|_| SessionError::Closed)?
	}

	/// Withdraw an announcement.
	pub fn unannounce(&self, namespace: &Tuple) -> Result<(), SessionError> {
		if !self.outgoing_announcements.remove(namespace) {
			return Err(SessionError::NotFound);
		}

		self.outgoing.push(
			Unannounce {
				namespace: namespace.clone(),
			}
			.into(),
		)
	}

	/// Request announcements under a prefix, returning once the peer accepts.
	pub async fn subscribe_announces(&self, prefix: Tuple) -> Result<(), SessionError> {
		self.wait_handshake().await?;

		let request_id = self.next_request_id()?;
		self.outgoing_announcement_subscriptions
			.insert(request_id, prefix.clone())?;

		let pending = match self.announce_subscriptions.insert(request_id) {
			Ok(pending) => pending,
			Err(err) => {
				self.outgoing_announcement_subscriptions.remove(request_id);
				return Err(err);
			}
		};

		let msg = SubscribeAnnounces {
			request_id,
			namespace_prefix: prefix.clone(),
			params: Default::default(),
		};

		if let Err(err) = self.outgoing.push(msg.into()) {
			self.outgoing_announcement_subscriptions.remove(request_id);
			self.announce_subscriptions.complete_maybe(request_id, Err(err.clone()));
			return Err(err);
		}

		pending.await.map_err(|_| SessionError::Closed)?
	}

	/// Stop receiving announcements for a prefix.
	pub fn unsubscribe_announces(&self, prefix: &Tuple) -> Result<(), SessionError> {
		if self.outgoing_announcement_subscriptions.remove_prefix(prefix).is_none() {
			return Err(SessionError::NotFound);
		}

		self.outgoing.push(
			UnsubscribeAnnounces {
				namespace_prefix: prefix.clone(),
			}
			.into(),
		)
	}

	/// Fetch a past range of a track, returning once the peer accepts.
	pub async fn fetch(
		&self,
		namespace: Tuple,
		name: &str,
		start: Location,
		end: Location,
	) -> Result<RemoteTrack, SessionError> {
		self.wait_handshake().await?;

		let request_id = self.next_request_id()?;

		let (send, recv) = mpsc::unbounded_channel();
		let track = RemoteTrack::new(self.clone(), request_id, None, recv);
		self.remote_tracks.insert(request_id, track, send)?;

		let pending = match self.fetches.insert(request_id) {
			Ok(pending) => pending,
			Err(err) => {
				self.remote_tracks.remove(request_id);
				return Err(err);
			}
		};

		let msg = Fetch {
			request_id,
			subscriber_priority: 0,
			group_order: GroupOrder::Publisher,
			info: FetchInfo::Standalone {
				namespace,
				name: name.to_string(),
				start,
				end,
			},
			params: Default::default(),
		};

		if let Err(err) = self.outgoing.push(msg.into()) {
			self.remote_tracks.remove(request_id);
			self.fetches.complete_maybe(request_id, Err(err.clone()));
			return Err(err);
		}

		pending.await.map_err(|_| SessionError::Closed)?
	}

	/// Query the status of a track.
	pub async fn request_track_status(&self, namespace: Tuple, name: &str) -> Result<TrackStatus, SessionError> {
		self.wait_handshake().await?;

		let request_id = self.next_request_id()?;
		let pending = self.track_statuses.insert(request_id)?;

		let msg = TrackStatusRequest {
			request_id,
			namespace,
			name: name.to_string(),
			params: Default::default(),
		};

		if let Err(err) = self.outgoing.push(msg.into()) {
			self.track_statuses.complete_maybe(request_id, Err(err.clone()));
			return Err(err);
		}

		pending.await.map_err(|_| SessionError::Closed)?
	}

	/// End one of our subscriptions.
	pub fn unsubscribe(&self, request_id: u64) -> Result<(), SessionError> {
		if !self.remote_tracks.remove(request_id) {
			return Err(SessionError::NotFound);
		}

		// A waiter still pending learns the subscription is gone.
		self.subscribes.complete_maybe(request_id, Err(SessionError::Closed));

		self.outgoing.push(Unsubscribe { request_id }.into())
	}

	/// Abandon one of our fetches.
	pub fn fetch_cancel(&self, request_id: u64) -> Result<(), SessionError> {
		if !self.remote_tracks.remove(request_id) {
			return Err(SessionError::NotFound);
		}

		self.fetches.complete_maybe(request_id, Err(SessionError::Closed));

		self.outgoing.push(FetchCancel { request_id }.into())
	}

	/// Narrow one of our subscriptions.
	pub fn subscribe_update(
		&self,
		request_id: u64,
		start: Location,
		end_group: u64,
		subscriber_priority: u8,
	) -> Result<(), SessionError> {
		if !self.remote_tracks.contains(request_id) {
			return Err(SessionError::NotFound);
		}

		self.outgoing.push(
			SubscribeUpdate {
				request_id,
				start,
				end_group,
				subscriber_priority,
				params: Default::default(),
			}
			.into(),
		)
	}

	/// Register the track serving an inbound subscription.
	///
	/// Required before [`accept_subscription`](Session::accept_subscription).
	pub fn add_local_track(&self, request_id: u64, track: LocalTrack) -> Result<(), SessionError> {
		self.local_tracks.set_track(request_id, track)
	}

	/// What an inbound SUBSCRIBE or FETCH asked for, while it is pending.
	pub fn subscription(&self, request_id: u64) -> Option<SubscriptionInfo> {
		self.local_tracks.info(request_id)
	}

	/// Accept an inbound subscription, emitting SUBSCRIBE_OK.
	pub fn accept_subscription(&self, request_id: u64) -> Result<(), SessionError> {
		let group_order = match self.local_tracks.accept(request_id)? {
			// Ascending is our default when the subscriber has no preference.
			GroupOrder::Publisher => GroupOrder::Ascending,
			order => order,
		};

		self.outgoing.push(
			SubscribeOk {
				request_id,
				expires: 0,
				group_order,
				largest: None,
				params: Default::default(),
			}
			.into(),
		)
	}

	/// Reject an inbound subscription, emitting SUBSCRIBE_ERROR.
	pub fn reject_subscription(&self, request_id: u64, error_code: u64, reason: &str) -> Result<(), SessionError> {
		let track_alias = self.local_tracks.reject(request_id)?;

		self.outgoing.push(
			SubscribeError {
				request_id,
				error_code,
				reason: reason.to_string(),
				track_alias,
			}
			.into(),
		)
	}

	/// End an accepted subscription from the publisher's side.
	pub fn subscribe_done(&self, request_id: u64, status_code: u64, reason: &str) -> Result<(), SessionError> {
		self.local_tracks.finish(request_id)?;

		self.outgoing.push(
			SubscribeDone {
				request_id,
				status_code,
				stream_count: 0,
				reason: reason.to_string(),
			}
			.into(),
		)
	}

	/// Accept an inbound announcement, emitting ANNOUNCE_OK.
	pub fn accept_announcement(&self, request_id: u64) -> Result<(), SessionError> {
		self.incoming_announcements
			.accept(request_id)
			.ok_or(SessionError::NotFound)?;

		self.outgoing.push(AnnounceOk { request_id }.into())
	}

	/// Reject an inbound announcement, emitting ANNOUNCE_ERROR.
	pub fn reject_announcement(&self, request_id: u64, error_code: u64, reason: &str) -> Result<(), SessionError> {
		self.incoming_announcements
			.reject(request_id)
			.ok_or(SessionError::NotFound)?;

		self.outgoing.push(
			AnnounceError {
				request_id,
				error_code,
				reason: reason.to_string(),
			}
			.into(),
		)
	}

	/// Accept an inbound announce subscription.
	pub fn accept_announcement_subscription(&self, request_id: u64) -> Result<(), SessionError> {
		if !self.incoming_announcement_subscriptions.contains(request_id) {
			return Err(SessionError::NotFound);
		}

		self.outgoing.push(SubscribeAnnouncesOk { request_id }.into())
	}

	/// Reject an inbound announce subscription.
	pub fn reject_announcement_subscription(
		&self,
		request_id: u64,
		error_code: u64,
		reason: &str,
	) -> Result<(), SessionError> {
		self.incoming_announcement_subscriptions
			.remove(request_id)
			.ok_or(SessionError::NotFound)?;

		self.outgoing.push(
			SubscribeAnnouncesError {
				request_id,
				error_code,
				reason: reason.to_string(),
			}
			.into(),
		)
	}

	/// Accept an inbound fetch, emitting FETCH_OK.
	pub fn accept_fetch(&self, request_id: u64, largest: Location) -> Result<(), SessionError> {
		self.local_tracks.accept_fetch(request_id)?;

		self.outgoing.push(
			FetchOk {
				request_id,
				group_order: GroupOrder::Ascending,
				end_of_track: false,
				largest,
				params: Default::default(),
			}
			.into(),
		)
	}

	/// Reject an inbound fetch, emitting FETCH_ERROR.
	pub fn reject_fetch(&self, request_id: u64, error_code: u64, reason: &str) -> Result<(), SessionError> {
		self.local_tracks.reject_fetch(request_id)?;

		self.outgoing.push(
			FetchError {
				request_id,
				error_code,
				reason: reason.to_string(),
			}
			.into(),
		)
	}

	/// Answer an inbound TRACK_STATUS_REQUEST.
	pub fn track_status(&self, request_id: u64, status_code: u64, largest: Location) -> Result<(), SessionError> {
		self.incoming_track_statuses
			.lock()
			.unwrap()
			.remove(&request_id)
			.ok_or(SessionError::NotFound)?;

		self.outgoing.push(
			TrackStatus {
				request_id,
				status_code,
				largest,
				params: Default::default(),
			}
			.into(),
		)
	}

	/// Grant the peer additional request IDs, emitting MAX_REQUEST_ID.
	pub fn extend_max_request_id(&self, additional: u64) -> Result<(), SessionError> {
		let limit = self.incoming_request_ids.grant(additional);

		self.outgoing.push(MaxRequestId { request_id: limit }.into())
	}

	/// Ask the peer to reconnect; only a server may provide a new URI.
	pub fn go_away(&self, new_session_uri: &str) -> Result<(), SessionError> {
		if self.perspective == Perspective::Client && !new_session_uri.is_empty() {
			return Err(SessionError::ProtocolViolation("GOAWAY with a session URI from the client"));
		}

		self.outgoing.push(
			GoAway {
				new_session_uri: new_session_uri.to_string(),
			}
			.into(),
		)
	}

	/// Route an incoming unidirectional data stream to its remote track.
	pub async fn handle_uni_stream<P: ObjectStream>(&self, mut stream: P) -> Result<(), SessionError> {
		#[derive(Copy, Clone)]
		enum Target {
			Alias(u64),
			Request(u64),
		}

		let target = match stream.header() {
			Header::Track(header) => Target::Alias(header.track_alias),
			Header::Subgroup(header) => Target::Alias(header.track_alias),
			Header::Fetch(header) => Target::Request(header.request_id),
		};

		match target {
			Target::Alias(alias) if !self.remote_tracks.contains_alias(alias) => {
				// An alias we never issued is the peer's fault; one belonging
				// to a finished subscription is just late.
				if alias >= self.track_aliases.peek() {
					return Err(SessionError::ProtocolViolation("unknown track alias"));
				}

				stream.stop(SessionError::Closed.code());
				return Ok(());
			}
			Target::Request(request_id) if !self.remote_tracks.contains(request_id) => {
				if !self.request_ids.issued(request_id) {
					return Err(SessionError::ProtocolViolation("fetch stream for an unknown request ID"));
				}

				stream.stop(SessionError::Closed.code());
				return Ok(());
			}
			_ => {}
		}

		while let Some(object) = stream.next().await? {
			let delivered = match target {
				Target::Alias(alias) => self.remote_tracks.push_by_alias(alias, object),
				Target::Request(request_id) => self.remote_tracks.push_by_request(request_id, object),
			};

			// The track ended mid-stream.
			if !delivered {
				stream.stop(SessionError::Closed.code());
				return Ok(());
			}
		}

		Ok(())
	}

	/// Route an incoming datagram to its remote track.
	pub fn handle_datagram(&self, payload: Bytes) -> Result<(), SessionError> {
		let mut payload = payload;
		let datagram = Datagram::decode(&mut payload)?;

		let track_alias = datagram.track_alias;
		if !self.remote_tracks.push_by_alias(track_alias, datagram.into_object()) {
			if track_alias >= self.track_aliases.peek() {
				return Err(SessionError::ProtocolViolation("datagram for an unknown track alias"));
			}

			// Datagrams for finished tracks are dropped.
			log::trace!("dropped datagram for finished track: alias={}", track_alias);
		}

		Ok(())
	}

	/// Tear down the session, failing every pending request with the cause.
	pub fn close(&self, err: SessionError) {
		{
			let mut state = self.state.lock().unwrap();
			if state.closed.is_some() {
				return;
			}
			state.closed = Some(err.clone());
		}

		log::debug!("closing session: {}", err);

		self.outgoing.close(err.clone()).ok();

		self.subscribes.close_all(err.clone());
		self.fetches.close_all(err.clone());
		self.announces.close_all(err.clone());
		self.announce_subscriptions.close_all(err.clone());
		self.track_statuses.close_all(err.clone());

		self.outgoing_announcements.clear();
		self.incoming_announcements.clear();
		self.outgoing_announcement_subscriptions.clear();
		self.incoming_announcement_subscriptions.clear();
		self.local_tracks.clear();
		self.remote_tracks.clear();
		self.incoming_track_statuses.lock().unwrap().clear();

		// Wake anyone still waiting on the handshake.
		self.handshake.send_if_modified(|status| match status {
			Handshake::Pending => {
				*status = Handshake::Failed(err);
				true
			}
			_ => false,
		});
	}
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque;

	use async_trait::async_trait;
	use futures::FutureExt;

	use crate::coding::Encode;
	use crate::data::{FetchHeader, Object, SubgroupHeader};
	use crate::error::{SUBSCRIBE_DONE_TRACK_ENDED, SUBSCRIBE_ERROR_TRACK_DOES_NOT_EXIST};
	use crate::message::{TRACK_STATUS_DOES_NOT_EXIST, TRACK_STATUS_IN_PROGRESS};

	use super::*;

	fn session(perspective: Perspective, protocol: Protocol) -> (Session, mpsc::Receiver<SessionMessage>) {
		let config = Config {
			path: "/path".to_string(),
			max_request_id: 100,
			message_capacity: 32,
		};

		Session::new(perspective, protocol, config)
	}

	// A session with the handshake already complete and a peer grant of 100.
	fn ready(perspective: Perspective) -> (Session, mpsc::Receiver<SessionMessage>) {
		let (session, messages) = session(perspective, Protocol::Quic);

		if perspective == Perspective::Client {
			pop(&session).expect("expected CLIENT_SETUP");
		}

		session.request_ids.set_max(100);
		session.handshake.send_replace(Handshake::Done);

		(session, messages)
	}

	fn pop(session: &Session) -> Option<Message> {
		session.next_control_message().now_or_never().map(|msg| msg.unwrap())
	}

	fn subscribe_ok(request_id: u64) -> Message {
		SubscribeOk {
			request_id,
			expires: 0,
			group_order: GroupOrder::Ascending,
			largest: None,
			params: Default::default(),
		}
		.into()
	}

	fn inbound_subscribe(request_id: u64) -> Message {
		Subscribe {
			request_id,
			track_alias: 0,
			namespace: Tuple::new(),
			name: "".to_string(),
			subscriber_priority: 0,
			group_order: GroupOrder::Publisher,
			filter_type: 0,
			start: Location::default(),
			end_group: 0,
			params: Default::default(),
		}
		.into()
	}

	struct TestObjects {
		header: Header,
		objects: VecDeque<Object>,
		stopped: Arc<Mutex<Option<u64>>>,
	}

	impl TestObjects {
		fn new<const N: usize>(header: Header, objects: [Object; N]) -> Self {
			Self {
				header,
				objects: objects.into_iter().collect(),
				stopped: Default::default(),
			}
		}
	}

	#[async_trait]
	impl ObjectStream for TestObjects {
		fn header(&self) -> &Header {
			&self.header
		}

		async fn next(&mut self) -> Result<Option<Object>, SessionError> {
			Ok(self.objects.pop_front())
		}

		fn stop(&mut self, code: u64) {
			*self.stopped.lock().unwrap() = Some(code);
		}
	}

	#[tokio::test]
	async fn client_setup_quic() {
		let (session, _messages) = session(Perspective::Client, Protocol::Quic);

		let mut params = Params::new();
		params.set_varint(MAX_REQUEST_ID_PARAMETER, 100);
		params.set_bytes(PATH_PARAMETER, "/path".as_bytes());

		assert_eq!(
			pop(&session).unwrap(),
			ClientSetup {
				versions: Version::supported(),
				params,
			}
			.into()
		);
		assert!(pop(&session).is_none());
	}

	#[tokio::test]
	async fn client_setup_webtransport() {
		let (session, _messages) = session(Perspective::Client, Protocol::WebTransport);

		let mut params = Params::new();
		params.set_varint(MAX_REQUEST_ID_PARAMETER, 100);

		assert_eq!(
			pop(&session).unwrap(),
			ClientSetup {
				versions: Version::supported(),
				params,
			}
			.into()
		);
		assert!(pop(&session).is_none());
	}

	#[tokio::test]
	async fn server_completes_handshake() {
		let (session, _messages) = session(Perspective::Server, Protocol::Quic);

		let mut params = Params::new();
		params.set_varint(MAX_REQUEST_ID_PARAMETER, 50);
		params.set_bytes(PATH_PARAMETER, "/live".as_bytes());

		session
			.receive(
				ClientSetup {
					versions: Version::supported(),
					params,
				}
				.into(),
			)
			.await
			.unwrap();

		let mut expected = Params::new();
		expected.set_varint(MAX_REQUEST_ID_PARAMETER, 100);

		assert_eq!(
			pop(&session).unwrap(),
			ServerSetup {
				version: Version::DRAFT_11,
				params: expected,
			}
			.into()
		);

		assert_eq!(session.version(), Some(Version::DRAFT_11));
		assert_eq!(session.path(), "/live");

		// The client's grant bounds our requests: server parity, step 2.
		assert_eq!(session.request_ids.allocate().unwrap(), 1);
		assert_eq!(session.request_ids.allocate().unwrap(), 3);
	}

	#[tokio::test]
	async fn server_rejects_quic_client_without_path() {
		let (session, _messages) = session(Perspective::Server, Protocol::Quic);

		let err = session
			.receive(
				ClientSetup {
					versions: Version::supported(),
					params: Params::new(),
				}
				.into(),
			)
			.await
			.unwrap_err();

		assert!(matches!(err, SessionError::ProtocolViolation(_)));
		assert!(pop(&session).is_none());
	}

	#[tokio::test]
	async fn server_rejects_unknown_versions() {
		let (session, _messages) = session(Perspective::Server, Protocol::WebTransport);

		let err = session
			.receive(
				ClientSetup {
					versions: [Version(0xff000000)].into(),
					params: Params::new(),
				}
				.into(),
			)
			.await
			.unwrap_err();

		// No SERVER_SETUP is sent on a failed negotiation.
		assert!(matches!(err, SessionError::Version(..)));
		assert!(pop(&session).is_none());
	}

	#[tokio::test]
	async fn client_rejects_unknown_version() {
		let (session, _messages) = session(Perspective::Client, Protocol::Quic);
		pop(&session).unwrap();

		let err = session
			.receive(
				ServerSetup {
					version: Version(0xff000000),
					params: Params::new(),
				}
				.into(),
			)
			.await
			.unwrap_err();

		assert!(matches!(err, SessionError::Version(..)));
	}

	#[tokio::test]
	async fn no_messages_before_setup() {
		let (session, _messages) = session(Perspective::Client, Protocol::Quic);
		pop(&session).unwrap();

		let err = session
			.receive(MaxRequestId { request_id: 200 }.into())
			.await
			.unwrap_err();

		assert!(matches!(err, SessionError::ProtocolViolation(_)));
	}

	#[tokio::test]
	async fn no_setup_after_handshake() {
		let (session, _messages) = ready(Perspective::Client);

		let err = session
			.receive(
				ServerSetup {
					version: Version::DRAFT_11,
					params: Params::new(),
				}
				.into(),
			)
			.await
			.unwrap_err();

		assert!(matches!(err, SessionError::ProtocolViolation(_)));
	}

	#[tokio::test]
	async fn subscribe() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(session.subscribe(namespace.clone(), "track", "auth"), async {
			let mut params = Params::new();
			params.set_bytes(AUTHORIZATION_TOKEN_PARAMETER, "auth".as_bytes().to_vec());

			assert_eq!(
				session.next_control_message().await.unwrap(),
				Subscribe {
					request_id: 0,
					track_alias: 0,
					namespace: namespace.clone(),
					name: "track".to_string(),
					subscriber_priority: 0,
					group_order: GroupOrder::Publisher,
					filter_type: 0,
					start: Location::default(),
					end_group: 0,
					params,
				}
				.into()
			);

			session.receive(subscribe_ok(0)).await.unwrap();
		});

		let track = track.unwrap();
		assert_eq!(track.request_id(), 0);
		assert_eq!(track.track_alias(), Some(0));
	}

	#[tokio::test]
	async fn subscribe_rejected() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(session.subscribe(namespace.clone(), "track", ""), async {
			session.next_control_message().await.unwrap();
			session
				.receive(
					SubscribeError {
						request_id: 0,
						error_code: SUBSCRIBE_ERROR_TRACK_DOES_NOT_EXIST,
						reason: "nope".to_string(),
						track_alias: 0,
					}
					.into(),
				)
				.await
				.unwrap();
		});

		match track.unwrap_err() {
			SessionError::Rejected { code, reason } => {
				assert_eq!(code, SUBSCRIBE_ERROR_TRACK_DOES_NOT_EXIST);
				assert_eq!(reason, "nope");
			}
			other => panic!("expected rejection: {:?}", other),
		}

		assert_eq!(session.remote_tracks.len(), 0);
		assert_eq!(session.subscribes.len(), 0);
	}

	#[tokio::test]
	async fn subscribe_blocked_on_request_id_limit() {
		let (session, _messages) = session(Perspective::Client, Protocol::Quic);
		pop(&session).unwrap();
		session.request_ids.set_max(2);
		session.handshake.send_replace(Handshake::Done);

		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(session.subscribe(namespace.clone(), "track1", "auth"), async {
			assert!(matches!(session.next_control_message().await.unwrap(), Message::Subscribe(_)));
			session.receive(subscribe_ok(0)).await.unwrap();
		});
		assert!(track.is_ok());

		// The limit is reached: fail and send REQUESTS_BLOCKED exactly once.
		let err = session.subscribe(namespace.clone(), "track2", "auth").await.unwrap_err();
		assert!(matches!(err, SessionError::TooManyRequests));
		assert_eq!(pop(&session).unwrap(), RequestsBlocked { max_request_id: 2 }.into());

		let err = session.subscribe(namespace.clone(), "track3", "auth").await.unwrap_err();
		assert!(matches!(err, SessionError::TooManyRequests));
		assert!(pop(&session).is_none());

		// Raising the limit unblocks us and re-arms the announcement.
		session.receive(MaxRequestId { request_id: 4 }.into()).await.unwrap();

		let (track, _) = tokio::join!(session.subscribe(namespace.clone(), "track4", "auth"), async {
			assert!(matches!(session.next_control_message().await.unwrap(), Message::Subscribe(_)));
			session.receive(subscribe_ok(2)).await.unwrap();
		});
		assert!(track.is_ok());

		let err = session.subscribe(namespace, "track5", "auth").await.unwrap_err();
		assert!(matches!(err, SessionError::TooManyRequests));
		assert_eq!(pop(&session).unwrap(), RequestsBlocked { max_request_id: 4 }.into());
	}

	#[tokio::test]
	async fn object_before_subscribe_ok() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(session.subscribe(namespace.clone(), "trackname", "auth"), async {
			assert!(matches!(session.next_control_message().await.unwrap(), Message::Subscribe(_)));

			// A data stream for the subscription races ahead of the OK.
			let stream = TestObjects::new(
				SubgroupHeader {
					track_alias: 0,
					group_id: 0,
					subgroup_id: 0,
					publisher_priority: 0,
				}
				.into(),
				[Object::default()],
			);
			session.handle_uni_stream(stream).await.unwrap();

			session.receive(subscribe_ok(0)).await.unwrap();
		});

		let mut track = track.unwrap();
		let object = track.next().await.expect("expected the buffered object");
		assert_eq!(object.object_id, 0);
	}

	#[tokio::test]
	async fn duplicate_subscribe_ok() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(session.subscribe(namespace, "track", ""), async {
			session.next_control_message().await.unwrap();
			session.receive(subscribe_ok(0)).await.unwrap();
		});
		let _track = track.unwrap();

		// A duplicate OK is a protocol violation, not a no-op.
		let err = session.receive(subscribe_ok(0)).await.unwrap_err();
		assert!(matches!(err, SessionError::ProtocolViolation(_)));
	}

	#[tokio::test]
	async fn subscribe_done_ends_remote_track() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(session.subscribe(namespace, "track", ""), async {
			session.next_control_message().await.unwrap();
			session.receive(subscribe_ok(0)).await.unwrap();
		});
		let mut track = track.unwrap();

		session
			.receive(
				SubscribeDone {
					request_id: 0,
					status_code: SUBSCRIBE_DONE_TRACK_ENDED,
					stream_count: 0,
					reason: "".to_string(),
				}
				.into(),
			)
			.await
			.unwrap();

		assert!(track.next().await.is_none());
		assert_eq!(session.remote_tracks.len(), 0);
	}

	#[tokio::test]
	async fn unsubscribe() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(session.subscribe(namespace, "track", ""), async {
			session.next_control_message().await.unwrap();
			session.receive(subscribe_ok(0)).await.unwrap();
		});

		track.unwrap().close();
		assert_eq!(pop(&session).unwrap(), Unsubscribe { request_id: 0 }.into());
		assert_eq!(session.remote_tracks.len(), 0);
	}

	#[tokio::test]
	async fn request_ids_and_aliases_are_unique() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (one, two, _) = tokio::join!(
			session.subscribe(namespace.clone(), "one", ""),
			session.subscribe(namespace.clone(), "two", ""),
			async {
				match (
					session.next_control_message().await.unwrap(),
					session.next_control_message().await.unwrap(),
				) {
					(Message::Subscribe(first), Message::Subscribe(second)) => {
						assert_eq!(first.request_id, 0);
						assert_eq!(second.request_id, 2);
						assert_eq!(first.track_alias, 0);
						assert_eq!(second.track_alias, 1);
					}
					other => panic!("expected two SUBSCRIBEs: {:?}", other),
				}

				session.receive(subscribe_ok(0)).await.unwrap();
				session.receive(subscribe_ok(2)).await.unwrap();
			}
		);

		assert_eq!(one.unwrap().track_alias(), Some(0));
		assert_eq!(two.unwrap().track_alias(), Some(1));
		assert_eq!(session.subscribes.len(), 0);
		assert_eq!(session.remote_tracks.len(), 2);
	}

	#[tokio::test]
	async fn reject_inbound_subscribe() {
		let (session, mut messages) = ready(Perspective::Server);

		session.receive(inbound_subscribe(0)).await.unwrap();

		assert_eq!(
			messages.recv().await.unwrap(),
			SessionMessage::Subscribe {
				request_id: 0,
				track_alias: 0,
				namespace: Tuple::new(),
				track: "".to_string(),
				authorization: "".to_string(),
			}
		);

		session
			.reject_subscription(0, SUBSCRIBE_ERROR_TRACK_DOES_NOT_EXIST, "track not found")
			.unwrap();

		assert_eq!(
			pop(&session).unwrap(),
			SubscribeError {
				request_id: 0,
				error_code: SUBSCRIBE_ERROR_TRACK_DOES_NOT_EXIST,
				reason: "track not found".to_string(),
				track_alias: 0,
			}
			.into()
		);
	}

	#[tokio::test]
	async fn accept_inbound_subscribe() {
		let (session, mut messages) = ready(Perspective::Server);

		session.receive(inbound_subscribe(0)).await.unwrap();
		messages.recv().await.unwrap();

		assert_eq!(
			session.subscription(0).unwrap(),
			SubscriptionInfo {
				track_alias: 0,
				namespace: Tuple::new(),
				name: "".to_string(),
				subscriber_priority: 0,
				group_order: GroupOrder::Publisher,
				filter_type: 0,
				start: Location::default(),
				end_group: 0,
			}
		);

		// Accepting requires a registered track; rejecting never does.
		assert!(matches!(session.accept_subscription(0), Err(SessionError::NotFound)));

		let (writer, track) = LocalTrack::produce();
		session.add_local_track(0, track).unwrap();
		session.accept_subscription(0).unwrap();

		assert_eq!(pop(&session).unwrap(), subscribe_ok(0));
		writer.write(Object::default()).unwrap();

		session.subscribe_done(0, SUBSCRIBE_DONE_TRACK_ENDED, "done").unwrap();
		assert_eq!(
			pop(&session).unwrap(),
			SubscribeDone {
				request_id: 0,
				status_code: SUBSCRIBE_DONE_TRACK_ENDED,
				stream_count: 0,
				reason: "done".to_string(),
			}
			.into()
		);

		// The track is gone; the writer learns on the next submit.
		assert!(writer.write(Object::default()).is_err());
	}

	#[tokio::test]
	async fn inbound_unsubscribe_removes_local_track() {
		let (session, mut messages) = ready(Perspective::Server);

		session.receive(inbound_subscribe(0)).await.unwrap();
		messages.recv().await.unwrap();

		let (writer, track) = LocalTrack::produce();
		session.add_local_track(0, track).unwrap();
		session.accept_subscription(0).unwrap();
		pop(&session).unwrap();

		session.receive(Unsubscribe { request_id: 0 }.into()).await.unwrap();
		assert_eq!(messages.recv().await.unwrap(), SessionMessage::Unsubscribe { request_id: 0 });
		assert!(writer.write(Object::default()).is_err());
	}

	#[tokio::test]
	async fn inbound_request_id_out_of_sequence() {
		let (session, _messages) = ready(Perspective::Client);

		// The peer is a server: its first request ID must be 1.
		let err = session.receive(inbound_subscribe(0)).await.unwrap_err();
		assert!(matches!(err, SessionError::InvalidRequestId));
	}

	#[tokio::test]
	async fn inbound_request_ids_shared_across_families() {
		let (session, mut messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("live");

		session.receive(inbound_subscribe(1)).await.unwrap();
		messages.recv().await.unwrap();

		session
			.receive(
				Announce {
					request_id: 3,
					namespace: namespace.clone(),
					params: Default::default(),
				}
				.into(),
			)
			.await
			.unwrap();

		assert_eq!(
			messages.recv().await.unwrap(),
			SessionMessage::Announce {
				request_id: 3,
				namespace: namespace.clone(),
			}
		);

		session.accept_announcement(3).unwrap();
		assert_eq!(pop(&session).unwrap(), AnnounceOk { request_id: 3 }.into());
	}

	#[tokio::test]
	async fn inbound_requests_limited_by_grant() {
		let config = Config {
			path: "/path".to_string(),
			max_request_id: 2,
			message_capacity: 32,
		};
		let (session, mut messages) = Session::new(Perspective::Server, Protocol::Quic, config);
		session.handshake.send_replace(Handshake::Done);

		session.receive(inbound_subscribe(0)).await.unwrap();
		messages.recv().await.unwrap();

		// ID 2 is next in sequence but beyond the grant of 2.
		let err = session.receive(inbound_subscribe(2)).await.unwrap_err();
		assert!(matches!(err, SessionError::TooManyRequests));
	}

	#[tokio::test]
	async fn announce() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (res, _) = tokio::join!(session.announce(namespace.clone()), async {
			assert_eq!(
				session.next_control_message().await.unwrap(),
				Announce {
					request_id: 0,
					namespace: namespace.clone(),
					params: Default::default(),
				}
				.into()
			);

			session.receive(AnnounceOk { request_id: 0 }.into()).await.unwrap();
		});
		res.unwrap();

		// Announcing the same namespace twice is a local error.
		let err = session.announce(namespace.clone()).await.unwrap_err();
		assert!(matches!(err, SessionError::Duplicate));

		session.unannounce(&namespace).unwrap();
		assert_eq!(
			pop(&session).unwrap(),
			Unannounce {
				namespace: namespace.clone(),
			}
			.into()
		);
		assert!(matches!(session.unannounce(&namespace), Err(SessionError::NotFound)));
	}

	#[tokio::test]
	async fn announce_rejected() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (res, _) = tokio::join!(session.announce(namespace.clone()), async {
			session.next_control_message().await.unwrap();
			session
				.receive(
					AnnounceError {
						request_id: 0,
						error_code: 1,
						reason: "unwanted".to_string(),
					}
					.into(),
				)
				.await
				.unwrap();
		});

		assert!(matches!(res.unwrap_err(), SessionError::Rejected { code: 1, .. }));

		// The rejection freed the namespace.
		assert!(!session.outgoing_announcements.contains(&namespace));
	}

	#[tokio::test]
	async fn response_for_unknown_request() {
		let (session, _messages) = ready(Perspective::Client);

		let err = session.receive(AnnounceOk { request_id: 0 }.into()).await.unwrap_err();
		assert!(matches!(err, SessionError::ProtocolViolation(_)));
	}

	#[tokio::test]
	async fn subscribe_announces() {
		let (session, _messages) = ready(Perspective::Client);
		let prefix = Tuple::new().push("live");

		let (res, _) = tokio::join!(session.subscribe_announces(prefix.clone()), async {
			assert_eq!(
				session.next_control_message().await.unwrap(),
				SubscribeAnnounces {
					request_id: 0,
					namespace_prefix: prefix.clone(),
					params: Default::default(),
				}
				.into()
			);

			session.receive(SubscribeAnnouncesOk { request_id: 0 }.into()).await.unwrap();
		});
		res.unwrap();

		session.unsubscribe_announces(&prefix).unwrap();
		assert_eq!(
			pop(&session).unwrap(),
			UnsubscribeAnnounces {
				namespace_prefix: prefix,
			}
			.into()
		);
	}

	#[tokio::test]
	async fn inbound_subscribe_announces() {
		let (session, mut messages) = ready(Perspective::Server);
		let prefix = Tuple::new().push("live");

		session
			.receive(
				SubscribeAnnounces {
					request_id: 0,
					namespace_prefix: prefix.clone(),
					params: Default::default(),
				}
				.into(),
			)
			.await
			.unwrap();

		assert_eq!(
			messages.recv().await.unwrap(),
			SessionMessage::SubscribeAnnounces {
				request_id: 0,
				namespace_prefix: prefix.clone(),
			}
		);

		session.accept_announcement_subscription(0).unwrap();
		assert_eq!(pop(&session).unwrap(), SubscribeAnnouncesOk { request_id: 0 }.into());

		session
			.receive(
				UnsubscribeAnnounces {
					namespace_prefix: prefix.clone(),
				}
				.into(),
			)
			.await
			.unwrap();

		assert_eq!(
			messages.recv().await.unwrap(),
			SessionMessage::UnsubscribeAnnounces {
				namespace_prefix: prefix,
			}
		);
	}

	#[tokio::test]
	async fn track_status_round_trip() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (status, _) = tokio::join!(session.request_track_status(namespace.clone(), "track"), async {
			assert_eq!(
				session.next_control_message().await.unwrap(),
				TrackStatusRequest {
					request_id: 0,
					namespace: namespace.clone(),
					name: "track".to_string(),
					params: Default::default(),
				}
				.into()
			);

			session
				.receive(
					TrackStatus {
						request_id: 0,
						status_code: TRACK_STATUS_IN_PROGRESS,
						largest: Location { group: 4, object: 2 },
						params: Default::default(),
					}
					.into(),
				)
				.await
				.unwrap();
		});

		let status = status.unwrap();
		assert_eq!(status.status_code, TRACK_STATUS_IN_PROGRESS);
		assert_eq!(status.largest, Location { group: 4, object: 2 });
	}

	#[tokio::test]
	async fn inbound_track_status_request() {
		let (session, mut messages) = ready(Perspective::Server);
		let namespace = Tuple::new().push("live");

		session
			.receive(
				TrackStatusRequest {
					request_id: 0,
					namespace: namespace.clone(),
					name: "track".to_string(),
					params: Default::default(),
				}
				.into(),
			)
			.await
			.unwrap();
		messages.recv().await.unwrap();

		session.track_status(0, TRACK_STATUS_DOES_NOT_EXIST, Location::default()).unwrap();
		assert_eq!(
			pop(&session).unwrap(),
			TrackStatus {
				request_id: 0,
				status_code: TRACK_STATUS_DOES_NOT_EXIST,
				largest: Location::default(),
				params: Default::default(),
			}
			.into()
		);

		// Only once per request.
		assert!(matches!(
			session.track_status(0, TRACK_STATUS_DOES_NOT_EXIST, Location::default()),
			Err(SessionError::NotFound)
		));
	}

	#[tokio::test]
	async fn fetch() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(
			session.fetch(namespace.clone(), "track", Location::default(), Location { group: 9, object: 0 }),
			async {
				assert!(matches!(session.next_control_message().await.unwrap(), Message::Fetch(_)));

				session
					.receive(
						FetchOk {
							request_id: 0,
							group_order: GroupOrder::Ascending,
							end_of_track: false,
							largest: Location { group: 8, object: 4 },
							params: Default::default(),
						}
						.into(),
					)
					.await
					.unwrap();
			}
		);

		let mut track = track.unwrap();
		assert_eq!(track.track_alias(), None);

		// Fetch data arrives on a stream identified by request ID.
		let stream = TestObjects::new(
			FetchHeader { request_id: 0 }.into(),
			[Object {
				group_id: 1,
				..Default::default()
			}],
		);
		session.handle_uni_stream(stream).await.unwrap();

		assert_eq!(track.next().await.unwrap().group_id, 1);
	}

	#[tokio::test]
	async fn inbound_fetch() {
		let (session, mut messages) = ready(Perspective::Server);
		let namespace = Tuple::new().push("live");

		session
			.receive(
				Fetch {
					request_id: 0,
					subscriber_priority: 0,
					group_order: GroupOrder::Publisher,
					info: FetchInfo::Standalone {
						namespace: namespace.clone(),
						name: "track".to_string(),
						start: Location::default(),
						end: Location { group: 5, object: 0 },
					},
					params: Default::default(),
				}
				.into(),
			)
			.await
			.unwrap();

		assert_eq!(
			messages.recv().await.unwrap(),
			SessionMessage::Fetch {
				request_id: 0,
				namespace,
				track: "track".to_string(),
			}
		);

		session.accept_fetch(0, Location { group: 4, object: 7 }).unwrap();
		assert_eq!(
			pop(&session).unwrap(),
			FetchOk {
				request_id: 0,
				group_order: GroupOrder::Ascending,
				end_of_track: false,
				largest: Location { group: 4, object: 7 },
				params: Default::default(),
			}
			.into()
		);
	}

	#[tokio::test]
	async fn unknown_track_alias() {
		let (session, _messages) = ready(Perspective::Client);

		let stream = TestObjects::new(
			SubgroupHeader {
				track_alias: 9,
				group_id: 0,
				subgroup_id: 0,
				publisher_priority: 0,
			}
			.into(),
			[],
		);

		let err = session.handle_uni_stream(stream).await.unwrap_err();
		assert!(matches!(err, SessionError::ProtocolViolation(_)));
	}

	#[tokio::test]
	async fn late_stream_for_finished_subscription() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(session.subscribe(namespace, "track", ""), async {
			session.next_control_message().await.unwrap();
			session.receive(subscribe_ok(0)).await.unwrap();
		});

		track.unwrap().close();
		pop(&session).unwrap();

		// The alias was valid once, so a late stream is stopped, not fatal.
		let stream = TestObjects::new(
			SubgroupHeader {
				track_alias: 0,
				group_id: 0,
				subgroup_id: 0,
				publisher_priority: 0,
			}
			.into(),
			[Object::default()],
		);
		let stopped = stream.stopped.clone();

		session.handle_uni_stream(stream).await.unwrap();
		assert!(stopped.lock().unwrap().is_some());
	}

	#[tokio::test]
	async fn datagrams() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (track, _) = tokio::join!(session.subscribe(namespace, "track", ""), async {
			session.next_control_message().await.unwrap();
			session.receive(subscribe_ok(0)).await.unwrap();
		});
		let mut track = track.unwrap();

		let datagram = Datagram {
			track_alias: 0,
			group_id: 1,
			object_id: 2,
			publisher_priority: 0,
			payload: Bytes::from_static(b"frame"),
		};

		let mut buf = Vec::new();
		datagram.encode(&mut buf).unwrap();
		session.handle_datagram(buf.into()).unwrap();

		let object = track.next().await.unwrap();
		assert_eq!(object.group_id, 1);
		assert_eq!(object.object_id, 2);
		assert_eq!(object.payload.as_ref(), b"frame");

		// A datagram for an alias we never issued is fatal.
		let unknown = Datagram {
			track_alias: 9,
			..datagram
		};
		let mut buf = Vec::new();
		unknown.encode(&mut buf).unwrap();
		assert!(session.handle_datagram(buf.into()).is_err());
	}

	#[tokio::test]
	async fn go_away() {
		let (session, mut messages) = ready(Perspective::Client);

		session
			.receive(
				GoAway {
					new_session_uri: "https://example.com/live".to_string(),
				}
				.into(),
			)
			.await
			.unwrap();

		assert_eq!(
			messages.recv().await.unwrap(),
			SessionMessage::GoAway {
				new_session_uri: "https://example.com/live".to_string(),
			}
		);

		// A client cannot redirect the server.
		assert!(session.go_away("https://example.com").is_err());
		session.go_away("").unwrap();
		assert_eq!(
			pop(&session).unwrap(),
			GoAway {
				new_session_uri: "".to_string(),
			}
			.into()
		);
	}

	#[tokio::test]
	async fn go_away_with_uri_from_client() {
		let (session, _messages) = ready(Perspective::Server);

		let err = session
			.receive(
				GoAway {
					new_session_uri: "https://example.com".to_string(),
				}
				.into(),
			)
			.await
			.unwrap_err();

		assert!(matches!(err, SessionError::ProtocolViolation(_)));
	}

	#[tokio::test]
	async fn extend_grant() {
		let (session, _messages) = ready(Perspective::Client);

		session.extend_max_request_id(50).unwrap();
		assert_eq!(pop(&session).unwrap(), MaxRequestId { request_id: 150 }.into());
	}

	#[tokio::test]
	async fn requests_wait_for_handshake() {
		let (session, _messages) = session(Perspective::Client, Protocol::Quic);
		pop(&session).unwrap();
		session.request_ids.set_max(100);

		let mut pending = Box::pin(session.subscribe(Tuple::new().push("namespace"), "track", ""));
		assert!(futures::poll!(&mut pending).is_pending());

		// Completing the handshake lets the request proceed.
		session
			.receive(
				ServerSetup {
					version: Version::DRAFT_11,
					params: Default::default(),
				}
				.into(),
			)
			.await
			.unwrap();

		assert!(futures::poll!(&mut pending).is_pending());
		assert!(matches!(session.next_control_message().await.unwrap(), Message::Subscribe(_)));
	}

	#[tokio::test]
	async fn close_fails_pending_requests() {
		let (session, _messages) = ready(Perspective::Client);
		let namespace = Tuple::new().push("namespace");

		let (res, _) = tokio::join!(session.subscribe(namespace, "track", ""), async {
			assert!(matches!(session.next_control_message().await.unwrap(), Message::Subscribe(_)));
			session.close(SessionError::ProtocolViolation("test"));
		});

		assert!(matches!(res.unwrap_err(), SessionError::ProtocolViolation(_)));
		assert!(session.next_control_message().await.is_err());
		assert_eq!(session.remote_tracks.len(), 0);
		assert!(session.closed().is_some());

		// New requests fail immediately.
		let err = session.subscribe(Tuple::new().push("other"), "track", "").await.unwrap_err();
		assert!(matches!(err, SessionError::ProtocolViolation(_)));
	}
}

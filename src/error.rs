use crate::coding;
use crate::setup;
use crate::transport::TransportError;

/// A fatal session error, or the reason a request failed.
///
/// Errors are cloneable so a single cause can propagate to every pending
/// request during teardown.
#[derive(thiserror::Error, Debug, Clone)]
pub enum SessionError {
	#[error("transport error: {0}")]
	Transport(#[from] TransportError),

	#[error("decode error: {0}")]
	Decode(#[from] coding::DecodeError),

	#[error("encode error: {0}")]
	Encode(#[from] coding::EncodeError),

	/// No common protocol version between the peers.
	#[error("unsupported versions: peer={0:?} supported={1:?}")]
	Version(setup::Versions, setup::Versions),

	/// The peer broke a rule of the protocol; the session is torn down.
	#[error("protocol violation: {0}")]
	ProtocolViolation(&'static str),

	/// The peer used a request ID out of sequence.
	#[error("invalid request ID")]
	InvalidRequestId,

	/// A track alias is already in use.
	#[error("duplicate track alias")]
	DuplicateTrackAlias,

	/// The request ID space is exhausted until the peer raises its limit.
	#[error("too many requests")]
	TooManyRequests,

	/// A local identifier is already in use.
	#[error("duplicate")]
	Duplicate,

	/// The identified request or track does not exist.
	#[error("not found")]
	NotFound,

	/// The peer rejected our request.
	#[error("rejected: code={code} reason={reason}")]
	Rejected { code: u64, reason: String },

	/// The session was closed locally.
	#[error("session closed")]
	Closed,
}

impl SessionError {
	/// The application error code used when closing the connection.
	pub fn code(&self) -> u64 {
		match self {
			Self::Closed => 0x0,
			Self::Transport(_) | Self::Encode(_) | Self::Duplicate | Self::NotFound => 0x1,
			Self::Decode(_) | Self::ProtocolViolation(_) => 0x3,
			Self::InvalidRequestId => 0x4,
			Self::DuplicateTrackAlias => 0x5,
			Self::TooManyRequests => 0x6,
			Self::Version(..) => 0x14,
			Self::Rejected { code, .. } => *code,
		}
	}
}

// Error codes carried in SUBSCRIBE_ERROR.
pub const SUBSCRIBE_ERROR_INTERNAL: u64 = 0x0;
pub const SUBSCRIBE_ERROR_UNAUTHORIZED: u64 = 0x1;
pub const SUBSCRIBE_ERROR_TIMEOUT: u64 = 0x2;
pub const SUBSCRIBE_ERROR_NOT_SUPPORTED: u64 = 0x3;
pub const SUBSCRIBE_ERROR_TRACK_DOES_NOT_EXIST: u64 = 0x4;
pub const SUBSCRIBE_ERROR_INVALID_RANGE: u64 = 0x5;

// Error codes carried in ANNOUNCE_ERROR and SUBSCRIBE_ANNOUNCES_ERROR.
pub const ANNOUNCE_ERROR_INTERNAL: u64 = 0x0;
pub const ANNOUNCE_ERROR_UNAUTHORIZED: u64 = 0x1;
pub const ANNOUNCE_ERROR_UNINTERESTED: u64 = 0x4;

// Status codes carried in SUBSCRIBE_DONE.
pub const SUBSCRIBE_DONE_INTERNAL: u64 = 0x0;
pub const SUBSCRIBE_DONE_UNAUTHORIZED: u64 = 0x1;
pub const SUBSCRIBE_DONE_TRACK_ENDED: u64 = 0x2;
pub const SUBSCRIBE_DONE_SUBSCRIPTION_ENDED: u64 = 0x3;
pub const SUBSCRIBE_DONE_GOING_AWAY: u64 = 0x4;
pub const SUBSCRIBE_DONE_EXPIRED: u64 = 0x5;

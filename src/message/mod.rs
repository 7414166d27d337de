mod announce;
mod fetch;
mod go_away;
mod max_request_id;
mod subscribe;
mod subscribe_announces;
mod track_status;

pub use announce::*;
pub use fetch::*;
pub use go_away::*;
pub use max_request_id::*;
pub use subscribe::*;
pub use subscribe_announces::*;
pub use track_status::*;

pub use crate::setup::{Client as ClientSetup, Server as ServerSetup};

use std::fmt;

use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError};

// Use a macro to generate the message types rather than copy-paste.
// Each message is framed as: type (varint), length (u16), payload.
macro_rules! message_types {
    {$($name:ident = $val:expr,)*} => {
		/// A control message, exchanged on the session's control stream.
		#[derive(Clone, PartialEq, Eq)]
		pub enum Message {
			$($name($name)),*
		}

		impl Decode for Message {
			fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
				let t = u64::decode(r)?;

				Self::decode_remaining(r, 2)?;
				let size = r.get_u16() as usize;
				Self::decode_remaining(r, size)?;

				let mut payload = r.copy_to_bytes(size);

				let msg = match t {
					$($val => Self::$name($name::decode(&mut payload)?),)*
					_ => return Err(DecodeError::InvalidMessage(t)),
				};

				// The payload length must match the frame exactly.
				if payload.has_remaining() {
					return Err(DecodeError::InvalidValue);
				}

				Ok(msg)
			}
		}

		impl Encode for Message {
			fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
				match self {
					$(Self::$name(m) => {
						($val as u64).encode(w)?;

						let mut payload = Vec::new();
						m.encode(&mut payload)?;

						let size: u16 = payload.len().try_into().map_err(|_| EncodeError::TooLong)?;
						w.put_u16(size);
						w.put_slice(&payload);

						Ok(())
					},)*
				}
			}
		}

		impl Message {
			pub fn name(&self) -> &'static str {
				match self {
					$(Self::$name(_) => stringify!($name),)*
				}
			}
		}

		$(impl From<$name> for Message {
			fn from(m: $name) -> Self {
				Message::$name(m)
			}
		})*

		impl fmt::Debug for Message {
			// Delegate to the message formatter
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				match self {
					$(Self::$name(ref m) => m.fmt(f),)*
				}
			}
		}
    }
}

// Message types from the draft.
message_types! {
	SubscribeUpdate = 0x02,
	Subscribe = 0x03,
	SubscribeOk = 0x04,
	SubscribeError = 0x05,
	Announce = 0x06,
	AnnounceOk = 0x07,
	AnnounceError = 0x08,
	Unannounce = 0x09,
	Unsubscribe = 0x0a,
	SubscribeDone = 0x0b,
	AnnounceCancel = 0x0c,
	TrackStatusRequest = 0x0d,
	TrackStatus = 0x0e,
	GoAway = 0x10,
	SubscribeAnnounces = 0x11,
	SubscribeAnnouncesOk = 0x12,
	SubscribeAnnouncesError = 0x13,
	UnsubscribeAnnounces = 0x14,
	MaxRequestId = 0x15,
	Fetch = 0x16,
	FetchCancel = 0x17,
	FetchOk = 0x18,
	FetchError = 0x19,
	RequestsBlocked = 0x1a,
	ClientSetup = 0x20,
	ServerSetup = 0x21,
}

use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Sent by the server to ask the client to reconnect elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoAway {
	/// Where to reconnect; empty to reuse the current URI.
	pub new_session_uri: String,
}

impl Decode for GoAway {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let new_session_uri = String::decode(r)?;

		Ok(Self { new_session_uri })
	}
}

impl Encode for GoAway {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.new_session_uri.encode(w)
	}
}

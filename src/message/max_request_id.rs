use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Raises the limit on the request IDs the peer may use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaxRequestId {
	/// Request IDs must stay strictly below this value.
	pub request_id: u64,
}

impl Decode for MaxRequestId {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;

		Ok(Self { request_id })
	}
}

impl Encode for MaxRequestId {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)
	}
}

/// Tells the peer we would issue more requests if the limit allowed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestsBlocked {
	/// The limit we are blocked on.
	pub max_request_id: u64,
}

impl Decode for RequestsBlocked {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let max_request_id = u64::decode(r)?;

		Ok(Self { max_request_id })
	}
}

impl Encode for RequestsBlocked {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.max_request_id.encode(w)
	}
}

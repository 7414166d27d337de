use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, Params, Tuple};

/// Sent by the subscriber to request announcements under a namespace prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeAnnounces {
	pub request_id: u64,
	pub namespace_prefix: Tuple,
	pub params: Params,
}

impl Decode for SubscribeAnnounces {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let namespace_prefix = Tuple::decode(r)?;
		let params = Params::decode(r)?;

		Ok(Self {
			request_id,
			namespace_prefix,
			params,
		})
	}
}

impl Encode for SubscribeAnnounces {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.namespace_prefix.encode(w)?;
		self.params.encode(w)?;

		Ok(())
	}
}

/// Sent by the publisher to accept an announce subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeAnnouncesOk {
	pub request_id: u64,
}

impl Decode for SubscribeAnnouncesOk {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;

		Ok(Self { request_id })
	}
}

impl Encode for SubscribeAnnouncesOk {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)
	}
}

/// Sent by the publisher to reject an announce subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeAnnouncesError {
	pub request_id: u64,
	pub error_code: u64,
	pub reason: String,
}

impl Decode for SubscribeAnnouncesError {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let error_code = u64::decode(r)?;
		let reason = String::decode(r)?;

		Ok(Self {
			request_id,
			error_code,
			reason,
		})
	}
}

impl Encode for SubscribeAnnouncesError {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.error_code.encode(w)?;
		self.reason.encode(w)?;

		Ok(())
	}
}

/// Sent by the subscriber to stop receiving announcements for a prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsubscribeAnnounces {
	pub namespace_prefix: Tuple,
}

impl Decode for UnsubscribeAnnounces {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let namespace_prefix = Tuple::decode(r)?;

		Ok(Self { namespace_prefix })
	}
}

impl Encode for UnsubscribeAnnounces {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.namespace_prefix.encode(w)
	}
}

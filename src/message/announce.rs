use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, Params, Tuple};

/// Sent by the publisher to advertise a namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announce {
	pub request_id: u64,
	pub namespace: Tuple,
	pub params: Params,
}

impl Decode for Announce {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let namespace = Tuple::decode(r)?;
		let params = Params::decode(r)?;

		Ok(Self {
			request_id,
			namespace,
			params,
		})
	}
}

impl Encode for Announce {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.namespace.encode(w)?;
		self.params.encode(w)?;

		Ok(())
	}
}

/// Sent by the subscriber to accept an announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnounceOk {
	pub request_id: u64,
}

impl Decode for AnnounceOk {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;

		Ok(Self { request_id })
	}
}

impl Encode for AnnounceOk {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)
	}
}

/// Sent by the subscriber to reject an announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnounceError {
	pub request_id: u64,
	pub error_code: u64,
	pub reason: String,
}

impl Decode for AnnounceError {
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

impl Encode for AnnounceError {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.error_code.encode(w)?;
		self.reason.encode(w)?;

		Ok(())
	}
}

/// Sent by the publisher to withdraw an announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unannounce {
	pub namespace: Tuple,
}

impl Decode for Unannounce {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let namespace = Tuple::decode(r)?;

		Ok(Self { namespace })
	}
}

impl Encode for Unannounce {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.namespace.encode(w)
	}
}

/// Sent by the subscriber to revoke a previously accepted announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnounceCancel {
	pub namespace: Tuple,
	pub error_code: u64,
	pub reason: String,
}

impl Decode for AnnounceCancel {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let namespace = Tuple::decode(r)?;
		let error_code = u64::decode(r)?;
		let reason = String::decode(r)?;

		Ok(Self {
			namespace,
			error_code,
			reason,
		})
	}
}

impl Encode for AnnounceCancel {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.namespace.encode(w)?;
		self.error_code.encode(w)?;
		self.reason.encode(w)?;

		Ok(())
	}
}

use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, Params, Tuple};

use super::{GroupOrder, Location};

/// What a FETCH requests: an explicit range, or a range relative to an
/// existing subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchInfo {
	Standalone {
		namespace: Tuple,
		name: String,
		start: Location,
		end: Location,
	},

	/// Fetch the groups preceding an existing subscription.
	Joining {
		joining_request_id: u64,
		joining_start: u64,
	},
}

/// Sent by the subscriber to request a past range of a track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetch {
	pub request_id: u64,
	pub subscriber_priority: u8,
	pub group_order: GroupOrder,
	pub info: FetchInfo,
	pub params: Params,
}

impl Decode for Fetch {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let subscriber_priority = u8::decode(r)?;
		let group_order = GroupOrder::decode(r)?;

		let info = match u64::decode(r)? {
			0x1 => FetchInfo::Standalone {
				namespace: Tuple::decode(r)?,
				name: String::decode(r)?,
				start: Location::decode(r)?,
				end: Location::decode(r)?,
			},
			0x2 => FetchInfo::Joining {
				joining_request_id: u64::decode(r)?,
				joining_start: u64::decode(r)?,
			},
			_ => return Err(DecodeError::InvalidValue),
		};

		let params = Params::decode(r)?;

		Ok(Self {
			request_id,
			subscriber_priority,
			group_order,
			info,
			params,
		})
	}
}

impl Encode for Fetch {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.subscriber_priority.encode(w)?;
		self.group_order.encode(w)?;

		match &self.info {
			FetchInfo::Standalone {
				namespace,
				name,
				start,
				end,
			} => {
				0x1u64.encode(w)?;
				namespace.encode(w)?;
				name.encode(w)?;
				start.encode(w)?;
				end.encode(w)?;
			}
			FetchInfo::Joining {
				joining_request_id,
				joining_start,
			} => {
				0x2u64.encode(w)?;
				joining_request_id.encode(w)?;
				joining_start.encode(w)?;
			}
		}

		self.params.encode(w)?;

		Ok(())
	}
}

/// Sent by the publisher to accept a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOk {
	pub request_id: u64,
	pub group_order: GroupOrder,

	/// Whether the fetch range covers the end of the track.
	pub end_of_track: bool,
	pub largest: Location,
	pub params: Params,
}

impl Decode for FetchOk {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let group_order = GroupOrder::decode(r)?;
		let end_of_track = bool::decode(r)?;
		let largest = Location::decode(r)?;
		let params = Params::decode(r)?;

		Ok(Self {
			request_id,
			group_order,
			end_of_track,
			largest,
			params,
		})
	}
}

impl Encode for FetchOk {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.group_order.encode(w)?;
		self.end_of_track.encode(w)?;
		self.largest.encode(w)?;
		self.params.encode(w)?;

		Ok(())
	}
}

/// Sent by the publisher to reject a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchError {
	pub request_id: u64,
	pub error_code: u64,
	pub reason: String,
}

impl Decode for FetchError {
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

impl Encode for FetchError {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.error_code.encode(w)?;
		self.reason.encode(w)?;

		Ok(())
	}
}

/// Sent by the subscriber to abandon a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchCancel {
	pub request_id: u64,
}

impl Decode for FetchCancel {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;

		Ok(Self { request_id })
	}
}

impl Encode for FetchCancel {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)
	}
}

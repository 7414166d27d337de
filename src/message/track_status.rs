use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, Params, Tuple};

use super::Location;

// Status codes carried in TRACK_STATUS.
pub const TRACK_STATUS_IN_PROGRESS: u64 = 0x0;
pub const TRACK_STATUS_DOES_NOT_EXIST: u64 = 0x1;
pub const TRACK_STATUS_NOT_YET_BEGUN: u64 = 0x2;
pub const TRACK_STATUS_FINISHED: u64 = 0x3;

/// Sent to query the current status of a track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackStatusRequest {
	pub request_id: u64,
	pub namespace: Tuple,
	pub name: String,
	pub params: Params,
}

impl Decode for TrackStatusRequest {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let namespace = Tuple::decode(r)?;
		let name = String::decode(r)?;
		let params = Params::decode(r)?;

		Ok(Self {
			request_id,
			namespace,
			name,
			params,
		})
	}
}

impl Encode for TrackStatusRequest {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.namespace.encode(w)?;
		self.name.encode(w)?;
		self.params.encode(w)?;

		Ok(())
	}
}

/// The answer to a TRACK_STATUS_REQUEST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackStatus {
	pub request_id: u64,
	pub status_code: u64,
	pub largest: Location,
	pub params: Params,
}

impl Decode for TrackStatus {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let status_code = u64::decode(r)?;
		let largest = Location::decode(r)?;
		let params = Params::decode(r)?;

		Ok(Self {
			request_id,
			status_code,
			largest,
			params,
		})
	}
}

impl Encode for TrackStatus {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.status_code.encode(w)?;
		self.largest.encode(w)?;
		self.params.encode(w)?;

		Ok(())
	}
}

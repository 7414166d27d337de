use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// The header starting an incoming unidirectional data stream.
///
/// The variant selects how the objects that follow are encoded, and whether
/// the stream belongs to a subscription (by track alias) or a fetch (by
/// request ID).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Header {
	Track(TrackHeader),
	Subgroup(SubgroupHeader),
	Fetch(FetchHeader),
}

impl Header {
	pub fn track_alias(&self) -> Option<u64> {
		match self {
			Self::Track(header) => Some(header.track_alias),
			Self::Subgroup(header) => Some(header.track_alias),
			Self::Fetch(_) => None,
		}
	}
}

impl Decode for Header {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let t = u64::decode(r)?;

		match t {
			0x02 => Ok(Self::Track(TrackHeader::decode(r)?)),
			0x04 => Ok(Self::Subgroup(SubgroupHeader::decode(r)?)),
			0x05 => Ok(Self::Fetch(FetchHeader::decode(r)?)),
			_ => Err(DecodeError::InvalidStream(t)),
		}
	}
}

impl Encode for Header {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		match self {
			Self::Track(header) => {
				0x02u64.encode(w)?;
				header.encode(w)
			}
			Self::Subgroup(header) => {
				0x04u64.encode(w)?;
				header.encode(w)
			}
			Self::Fetch(header) => {
				0x05u64.encode(w)?;
				header.encode(w)
			}
		}
	}
}

impl From<TrackHeader> for Header {
	fn from(header: TrackHeader) -> Self {
		Self::Track(header)
	}
}

impl From<SubgroupHeader> for Header {
	fn from(header: SubgroupHeader) -> Self {
		Self::Subgroup(header)
	}
}

impl From<FetchHeader> for Header {
	fn from(header: FetchHeader) -> Self {
		Self::Fetch(header)
	}
}

/// A stream carrying objects for an entire track; objects carry their own group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackHeader {
	pub track_alias: u64,
	pub publisher_priority: u8,
}

impl Decode for TrackHeader {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let track_alias = u64::decode(r)?;
		let publisher_priority = u8::decode(r)?;

		Ok(Self {
			track_alias,
			publisher_priority,
		})
	}
}

impl Encode for TrackHeader {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.track_alias.encode(w)?;
		self.publisher_priority.encode(w)?;

		Ok(())
	}
}

/// A stream carrying one subgroup of one group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubgroupHeader {
	pub track_alias: u64,
	pub group_id: u64,
	pub subgroup_id: u64,
	pub publisher_priority: u8,
}

impl Decode for SubgroupHeader {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let track_alias = u64::decode(r)?;
		let group_id = u64::decode(r)?;
		let subgroup_id = u64::decode(r)?;
		let publisher_priority = u8::decode(r)?;

		Ok(Self {
			track_alias,
			group_id,
			subgroup_id,
			publisher_priority,
		})
	}
}

impl Encode for SubgroupHeader {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.track_alias.encode(w)?;
		self.group_id.encode(w)?;
		self.subgroup_id.encode(w)?;
		self.publisher_priority.encode(w)?;

		Ok(())
	}
}

/// A stream carrying the response to a FETCH, identified by request ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchHeader {
	pub request_id: u64,
}

impl Decode for FetchHeader {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;

		Ok(Self { request_id })
	}
}

impl Encode for FetchHeader {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)
	}
}

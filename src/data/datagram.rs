use bytes::{Buf, BufMut, Bytes};

use crate::coding::{Decode, DecodeError, Encode, EncodeError};

use super::{Object, OBJECT_STATUS_NORMAL};

/// A single object carried in a datagram instead of a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datagram {
	pub track_alias: u64,
	pub group_id: u64,
	pub object_id: u64,
	pub publisher_priority: u8,

	pub payload: Bytes,
}

impl Datagram {
	pub(crate) fn into_object(self) -> Object {
		Object {
			group_id: self.group_id,
			subgroup_id: 0,
			object_id: self.object_id,
			publisher_priority: self.publisher_priority,
			status: OBJECT_STATUS_NORMAL,
			payload: self.payload,
		}
	}
}

impl Decode for Datagram {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let t = u64::decode(r)?;
		if t != 0x01 {
			return Err(DecodeError::InvalidStream(t));
		}

		let track_alias = u64::decode(r)?;
		let group_id = u64::decode(r)?;
		let object_id = u64::decode(r)?;
		let publisher_priority = u8::decode(r)?;

		// The payload is the remainder of the datagram.
		let payload = r.copy_to_bytes(r.remaining());

		Ok(Self {
			track_alias,
			group_id,
			object_id,
			publisher_priority,
			payload,
		})
	}
}

impl Encode for Datagram {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		0x01u64.encode(w)?;
		self.track_alias.encode(w)?;
		self.group_id.encode(w)?;
		self.object_id.encode(w)?;
		self.publisher_priority.encode(w)?;
		w.put_slice(&self.payload);

		Ok(())
	}
}

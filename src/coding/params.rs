use bytes::{Buf, BufMut, Bytes};

use super::{Decode, DecodeError, Encode, EncodeError};

/// The PATH setup parameter; mandatory for native QUIC clients, forbidden over WebTransport.
pub const PATH_PARAMETER: u64 = 0x01;

/// The MAX_REQUEST_ID setup parameter, granting request IDs to the peer.
pub const MAX_REQUEST_ID_PARAMETER: u64 = 0x02;

/// The AUTHORIZATION_TOKEN parameter carried on SUBSCRIBE and friends.
pub const AUTHORIZATION_TOKEN_PARAMETER: u64 = 0x03;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Value {
	VarInt(u64),
	Bytes(Bytes),
}

/// An ordered key-value parameter list.
///
/// Even keys carry a varint value, odd keys carry a length-prefixed byte
/// string. Unknown keys are preserved verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<(u64, Value)>);

impl Params {
	pub fn new() -> Self {
		Self::default()
	}

	/// Set a varint parameter, replacing any existing value for the key.
	pub fn set_varint(&mut self, key: u64, value: u64) {
		self.0.retain(|(k, _)| *k != key);
		self.0.push((key, Value::VarInt(value)));
	}

	/// Set a byte string parameter, replacing any existing value for the key.
	pub fn set_bytes<B: Into<Bytes>>(&mut self, key: u64, value: B) {
		self.0.retain(|(k, _)| *k != key);
		self.0.push((key, Value::Bytes(value.into())));
	}

	pub fn varint(&self, key: u64) -> Option<u64> {
		self.0.iter().find_map(|(k, v)| match v {
			Value::VarInt(value) if *k == key => Some(*value),
			_ => None,
		})
	}

	pub fn bytes(&self, key: u64) -> Option<&Bytes> {
		self.0.iter().find_map(|(k, v)| match v {
			Value::Bytes(value) if *k == key => Some(value),
			_ => None,
		})
	}

	pub fn contains(&self, key: u64) -> bool {
		self.0.iter().any(|(k, _)| *k == key)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl Decode for Params {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let count = usize::decode(r)?;
		let mut params = Vec::with_capacity(count.min(16));

		for _ in 0..count {
			let key = u64::decode(r)?;
			if params.iter().any(|(k, _): &(u64, Value)| *k == key) {
				return Err(DecodeError::DuplicateParameter);
			}

			// The key parity selects the value encoding.
			let value = if key % 2 == 0 {
				Value::VarInt(u64::decode(r)?)
			} else {
				Value::Bytes(Bytes::decode(r)?)
			};

			params.push((key, value));
		}

		Ok(Self(params))
	}
}

impl Encode for Params {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.0.len().encode(w)?;

		for (key, value) in &self.0 {
			key.encode(w)?;
			match value {
				Value::VarInt(value) => value.encode(w)?,
				Value::Bytes(value) => value.encode(w)?,
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decode() {
		// A varint parameter followed by an unknown byte string parameter.
		let mut buf: &[u8] = &[0x02, 0x02, 0x02, 0x01, 0x01, b'a'];
		let params = Params::decode(&mut buf).unwrap();

		assert_eq!(params.varint(MAX_REQUEST_ID_PARAMETER), Some(2));
		assert_eq!(params.bytes(PATH_PARAMETER).unwrap().as_ref(), b"a");
		assert!(buf.is_empty());
	}

	#[test]
	fn duplicate() {
		let mut buf: &[u8] = &[0x02, 0x02, 0x02, 0x02, 0x03];
		assert!(matches!(Params::decode(&mut buf), Err(DecodeError::DuplicateParameter)));
	}

	#[test]
	fn roundtrip() {
		let mut params = Params::new();
		params.set_varint(MAX_REQUEST_ID_PARAMETER, 100);
		params.set_bytes(PATH_PARAMETER, Bytes::from_static(b"/path"));

		let mut buf = Vec::new();
		params.encode(&mut buf).unwrap();

		let decoded = Params::decode(&mut buf.as_slice()).unwrap();
		assert_eq!(decoded, params);
	}
}

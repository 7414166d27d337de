use std::string::FromUtf8Error;

use bytes::{Buf, Bytes};
use thiserror::Error;

pub trait Decode: Sized {
	fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError>;

	// Helper function to make sure we have enough bytes to decode
	fn decode_remaining<B: Buf>(buf: &mut B, required: usize) -> Result<(), DecodeError> {
		let needed = required.saturating_sub(buf.remaining());
		if needed > 0 {
			Err(DecodeError::More(needed))
		} else {
			Ok(())
		}
	}
}

/// A decode error.
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
	#[error("fill buffer")]
	More(usize),

	#[error("invalid string")]
	InvalidString(#[from] FromUtf8Error),

	#[error("invalid message type: {0}")]
	InvalidMessage(u64),

	#[error("invalid stream type: {0}")]
	InvalidStream(u64),

	#[error("invalid value")]
	InvalidValue,

	#[error("duplicate parameter")]
	DuplicateParameter,

	#[error("varint bounds exceeded")]
	BoundsExceeded,

	#[error("unexpected end of stream")]
	UnexpectedEnd,
}

impl Decode for u8 {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		Self::decode_remaining(r, 1)?;
		Ok(r.get_u8())
	}
}

impl Decode for bool {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		match u8::decode(r)? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(DecodeError::InvalidValue),
		}
	}
}

impl Decode for Bytes {
	/// Decode a byte string with a varint length prefix.
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let size = usize::decode(r)?;
		Self::decode_remaining(r, size)?;
		Ok(r.copy_to_bytes(size))
	}
}

impl Decode for String {
	/// Decode a string with a varint length prefix.
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let data = Bytes::decode(r)?;
		Ok(String::from_utf8(data.to_vec())?)
	}
}
